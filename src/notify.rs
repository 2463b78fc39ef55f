//! Notification sink abstraction
//!
//! The monitor pushes rendered text at an opaque destination and can
//! later edit a previously sent message in place. Chat transports
//! implement [`NotificationSink`] outside the core; the crate ships a
//! console sink for daemon mode and tests.

use crate::errors::NotifyError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a delivered message, usable for later edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef(pub String);

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `text` to `destination`, returning a reference for edits.
    async fn send(&self, destination: &str, text: &str) -> Result<MessageRef, NotifyError>;

    /// Replace the content of a previously delivered message.
    async fn edit(
        &self,
        destination: &str,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), NotifyError>;
}

/// Prints notifications to the log; stands in when no chat transport is
/// wired up.
pub struct ConsoleSink {
    counter: AtomicU64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn send(&self, destination: &str, text: &str) -> Result<MessageRef, NotifyError> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        logger::info(LogTag::Notify, &format!("[{}] {}", destination, text));
        Ok(MessageRef(id.to_string()))
    }

    async fn edit(
        &self,
        destination: &str,
        message: &MessageRef,
        text: &str,
    ) -> Result<(), NotifyError> {
        logger::info(
            LogTag::Notify,
            &format!("[{}] (edit {}) {}", destination, message.0, text),
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every delivery for assertions.
    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<(String, String)>>,
        pub edits: Mutex<Vec<(String, String, String)>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn edit_count(&self) -> usize {
            self.edits.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, destination: &str, text: &str) -> Result<MessageRef, NotifyError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push((destination.to_string(), text.to_string()));
            Ok(MessageRef(format!("msg-{}", sent.len())))
        }

        async fn edit(
            &self,
            destination: &str,
            message: &MessageRef,
            text: &str,
        ) -> Result<(), NotifyError> {
            self.edits.lock().unwrap().push((
                destination.to_string(),
                message.0.clone(),
                text.to_string(),
            ));
            Ok(())
        }
    }
}
