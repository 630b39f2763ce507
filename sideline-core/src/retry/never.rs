use crate::config::EngineConfig;
use crate::types::MessageId;

use super::RetryPolicy;

/// Retry policy that refuses every retry: a failed record is immediately
/// terminal. Useful for streams where replays are worse than gaps.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverRetry;

impl NeverRetry {
    pub fn new() -> Self {
        Self
    }
}

impl RetryPolicy for NeverRetry {
    fn open(&mut self, _config: &EngineConfig) {}

    fn failed(&mut self, _id: &MessageId) {}

    fn acked(&mut self, _id: &MessageId) {}

    fn retry_further(&mut self, _id: &MessageId) -> bool {
        false
    }

    fn next_failed_message_to_retry(&mut self) -> Option<MessageId> {
        None
    }
}
