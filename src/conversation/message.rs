//! Message and transcript types

use super::reply::visible_text;
use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Model,
}

/// One exchanged message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    origin: Origin,
    text: String,
}

impl Message {
    pub fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Origin::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Origin::Model, text)
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text as it should be shown: model replies are reduced to their
    /// delimited span, user text is shown as typed
    pub fn display_text(&self) -> &str {
        match self.origin {
            Origin::User => &self.text,
            Origin::Model => visible_text(&self.text),
        }
    }
}

/// A visible entry of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    /// Position in the underlying conversation
    pub index: usize,
    pub origin: Origin,
    pub text: String,
}

impl TranscriptEntry {
    pub fn from_message(index: usize, message: &Message) -> Self {
        Self {
            index,
            origin: message.origin(),
            text: message.display_text().to_string(),
        }
    }
}
