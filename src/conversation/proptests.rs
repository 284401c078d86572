//! Property-based tests for reply extraction and the conversation store

use super::reply::visible_text;
use super::{ConversationStore, Message, Origin};
use proptest::prelude::*;

/// Text that never contains the delimiter or a line break
fn arb_plain_line() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.!?,:'-]{0,60}"
}

fn arb_message() -> impl Strategy<Value = Message> {
    (any::<bool>(), "[a-zA-Z0-9 ⸘\n]{0,40}").prop_map(|(is_user, text)| {
        if is_user {
            Message::user(text)
        } else {
            Message::model(text)
        }
    })
}

proptest! {
    #[test]
    fn delimited_span_is_displayed(
        prefix in "[a-zA-Z0-9 \n]{0,40}",
        span in "[a-zA-Z0-9 _.!?]{1,60}",
        suffix in "[a-zA-Z0-9 ⸘\n]{0,40}",
    ) {
        let raw = format!("{prefix}⸘{span}⸘{suffix}");
        prop_assert_eq!(visible_text(&raw), span.as_str());
    }

    #[test]
    fn undelimited_text_is_verbatim(raw in "[a-zA-Z0-9 _.!?\n]{0,120}") {
        prop_assert_eq!(visible_text(&raw), raw.as_str());
    }

    #[test]
    fn single_delimiter_is_verbatim(a in arb_plain_line(), b in arb_plain_line()) {
        let raw = format!("{a}⸘{b}");
        prop_assert_eq!(visible_text(&raw), raw.as_str());
    }

    #[test]
    fn instruction_never_in_transcript(
        instruction in "[A-Z]{8,20}",
        messages in proptest::collection::vec(arb_message(), 0..20),
    ) {
        let mut store = ConversationStore::new(instruction);
        for message in messages.iter().cloned() {
            store.append(message);
        }

        prop_assert_eq!(store.len(), 1 + messages.len());

        let transcript = store.transcript();
        prop_assert_eq!(transcript.len(), messages.len());
        prop_assert!(transcript.iter().all(|entry| entry.index >= 1));
        for (entry, message) in transcript.iter().zip(&messages) {
            prop_assert_eq!(entry.origin, message.origin());
            if message.origin() == Origin::User {
                prop_assert_eq!(entry.text.as_str(), message.text());
            }
        }
    }
}
