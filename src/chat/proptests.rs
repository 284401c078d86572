//! Property-based tests for the submit flow

use super::requester::{ResponseRequester, SENTINEL_REPLY};
use super::session::{ChatSession, SubmitOutcome};
use crate::conversation::Origin;
use crate::llm::testing::MockLlmService;
use crate::llm::LlmError;
use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

/// One user action and how the model side answers it
#[derive(Debug, Clone)]
enum Turn {
    Blank(String),
    Answered { input: String, reply: String },
    Failed { input: String },
}

fn arb_input() -> impl Strategy<Value = String> {
    " {0,3}[a-zA-Z0-9?!][a-zA-Z0-9 ?!]{0,30}"
}

fn arb_turn() -> impl Strategy<Value = Turn> {
    prop_oneof![
        "[ \t\n]{0,6}".prop_map(Turn::Blank),
        (arb_input(), "[a-zA-Z0-9 ⸘.]{1,40}")
            .prop_map(|(input, reply)| Turn::Answered { input, reply }),
        arb_input().prop_map(|input| Turn::Failed { input }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn store_grows_by_two_per_non_blank_submission(
        turns in proptest::collection::vec(arb_turn(), 0..16),
    ) {
        let rt = runtime();
        let mock = Arc::new(MockLlmService::new("mock"));
        let requester = ResponseRequester::new(mock.clone(), true);
        let session = Arc::new(ChatSession::new(Uuid::new_v4(), "rules", requester));

        let mut exchanges = 0;
        for turn in &turns {
            let (input, expected) = match turn {
                Turn::Blank(input) => (input, SubmitOutcome::Ignored),
                Turn::Answered { input, reply } => {
                    mock.queue_text(reply);
                    (input, SubmitOutcome::Answered { reply: reply.clone() })
                }
                Turn::Failed { input } => {
                    mock.queue_error(LlmError::network("unreachable"));
                    (input, SubmitOutcome::Answered { reply: SENTINEL_REPLY.to_string() })
                }
            };

            let outcome = rt.block_on(session.submit(input)).unwrap();
            prop_assert_eq!(&outcome, &expected);
            if let SubmitOutcome::Answered { reply } = expected {
                exchanges += 1;
                let messages = rt.block_on(session.messages());
                let user = &messages[messages.len() - 2];
                let model = &messages[messages.len() - 1];
                prop_assert_eq!(user.origin(), Origin::User);
                prop_assert_eq!(user.text(), input.as_str());
                prop_assert_eq!(model.origin(), Origin::Model);
                prop_assert_eq!(model.text(), reply.as_str());
            }

            prop_assert!(!session.is_awaiting_response());
            prop_assert_eq!(rt.block_on(session.messages()).len(), 1 + 2 * exchanges);
        }

        prop_assert_eq!(mock.recorded_requests().len(), exchanges);
        prop_assert_eq!(rt.block_on(session.transcript()).len(), 2 * exchanges);
    }
}
