//! Ordered, observable conversation history

use super::message::{Message, TranscriptEntry};
use std::sync::Arc;

/// A mutation of the store, delivered to observers in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Appended { index: usize, message: Message },
    Reset,
}

/// Receives every change made to a [`ConversationStore`]
pub trait ConversationObserver: Send + Sync {
    fn on_change(&self, change: &StoreChange);
}

/// Conversation history for one session.
///
/// Starts with the system instruction at index 0. The instruction is part of
/// every replayed request but never part of the transcript.
pub struct ConversationStore {
    messages: Vec<Message>,
    has_instruction: bool,
    observers: Vec<Arc<dyn ConversationObserver>>,
}

impl ConversationStore {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            // The instruction travels with the user role, like any other turn
            messages: vec![Message::user(system_instruction)],
            has_instruction: true,
            observers: Vec::new(),
        }
    }

    /// Register an observer for subsequent changes
    pub fn subscribe(&mut self, observer: Arc<dyn ConversationObserver>) {
        self.observers.push(observer);
    }

    /// Add a message to the end and notify observers
    pub fn append(&mut self, message: Message) {
        let index = self.messages.len();
        self.messages.push(message.clone());
        self.notify(&StoreChange::Appended { index, message });
    }

    /// The full ordered sequence, system instruction included
    pub fn current(&self) -> &[Message] {
        &self.messages
    }

    /// Clear everything, the system instruction included.
    ///
    /// Later requests are sent without any instruction.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.has_instruction = false;
        self.notify(&StoreChange::Reset);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[allow(dead_code)] // API completeness
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_instruction(&self) -> bool {
        self.has_instruction
    }

    /// Visible entries, in display order
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        let skip = usize::from(self.has_instruction);
        self.messages
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(index, message)| TranscriptEntry::from_message(index, message))
            .collect()
    }

    fn notify(&self, change: &StoreChange) {
        for observer in &self.observers {
            observer.on_change(change);
        }
    }
}
