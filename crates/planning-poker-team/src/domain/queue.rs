//! Per-participant message queue with client-acknowledged delivery.

use std::collections::VecDeque;

use planning_poker_core::error::DomainError;
use tokio::sync::watch;

use super::message::Message;

/// FIFO of pending messages plus the acknowledgment cursor.
///
/// Invariants: `acknowledged_message_id <= last_message_id`, and every queued
/// message has `acknowledged_message_id < id <= last_message_id` in strictly
/// increasing order.
#[derive(Debug)]
pub struct MessageQueue {
    messages: VecDeque<Message>,
    last_message_id: u64,
    acknowledged_message_id: u64,
    available: watch::Sender<u64>,
}

impl MessageQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cursors(VecDeque::new(), 0, 0)
    }

    fn with_cursors(
        messages: VecDeque<Message>,
        last_message_id: u64,
        acknowledged_message_id: u64,
    ) -> Self {
        let (available, _) = watch::channel(last_message_id);
        Self {
            messages,
            last_message_id,
            acknowledged_message_id,
            available,
        }
    }

    /// Rebuilds a queue from snapshot data.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Reconstruction` if the cursors and message ids
    /// break the queue invariants.
    pub(crate) fn restore(
        messages: Vec<Message>,
        last_message_id: u64,
        acknowledged_message_id: u64,
    ) -> Result<Self, DomainError> {
        if acknowledged_message_id > last_message_id {
            return Err(DomainError::Reconstruction(format!(
                "acknowledged message {acknowledged_message_id} is beyond last message {last_message_id}"
            )));
        }

        let mut previous = acknowledged_message_id;
        for message in &messages {
            if message.id() <= previous || message.id() > last_message_id {
                return Err(DomainError::Reconstruction(format!(
                    "message {} is out of order in queue (acknowledged {acknowledged_message_id}, last {last_message_id})",
                    message.id()
                )));
            }
            previous = message.id();
        }

        Ok(Self::with_cursors(
            messages.into(),
            last_message_id,
            acknowledged_message_id,
        ))
    }

    /// Whether any message is waiting for the client.
    #[must_use]
    pub fn has_message(&self) -> bool {
        !self.messages.is_empty()
    }

    /// Pending messages in arrival order.
    pub fn messages(&self) -> impl ExactSizeIterator<Item = &Message> {
        self.messages.iter()
    }

    /// Highest id assigned so far.
    #[must_use]
    pub fn last_message_id(&self) -> u64 {
        self.last_message_id
    }

    /// Highest id the client has confirmed.
    #[must_use]
    pub fn acknowledged_message_id(&self) -> u64 {
        self.acknowledged_message_id
    }

    /// Subscribes to the "message available" signal.
    ///
    /// The receiver starts with the current last id marked as seen, so
    /// `changed()` resolves on the next enqueue only.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.available.subscribe()
    }

    /// Assigns the next id, appends the message and wakes any waiting reader.
    pub(crate) fn push(&mut self, mut message: Message) -> u64 {
        self.last_message_id += 1;
        message.assign_id(self.last_message_id);
        self.messages.push_back(message);
        self.available.send_replace(self.last_message_id);
        self.last_message_id
    }

    /// Advances the cursor and drops the acknowledged prefix.
    ///
    /// Returns `false` when `last_message_id` does not move the cursor. Ids
    /// beyond the last assigned one are clamped to it.
    pub(crate) fn acknowledge(&mut self, last_message_id: u64) -> bool {
        let cursor = last_message_id.min(self.last_message_id);
        if cursor <= self.acknowledged_message_id {
            return false;
        }

        self.acknowledged_message_id = cursor;
        while self
            .messages
            .front()
            .is_some_and(|message| message.id() <= cursor)
        {
            self.messages.pop_front();
        }
        true
    }

    /// Drops everything and moves the cursor to the last assigned id.
    pub(crate) fn clear(&mut self) -> u64 {
        self.messages.clear();
        self.acknowledged_message_id = self.last_message_id;
        self.last_message_id
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}
