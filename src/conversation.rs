//! Conversation state: messages, the observable store, and reply display

mod message;
mod reply;
mod store;

#[cfg(test)]
mod proptests;

pub use message::{Message, Origin, TranscriptEntry};
pub use reply::REPLY_DELIMITER;
pub use store::{ConversationObserver, ConversationStore, StoreChange};
