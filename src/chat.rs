//! Request dispatch: user input in, model reply out, both kept in the store

mod requester;
mod session;

#[cfg(test)]
mod proptests;

pub use requester::ResponseRequester;
pub use session::{ChatError, ChatSession, SessionEvent, SessionSummary};
