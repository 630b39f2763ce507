mod backoff;
mod never;

pub use backoff::ExponentialBackoffRetry;
pub use never::NeverRetry;

use crate::config::EngineConfig;
use crate::types::MessageId;

/// Decides whether and when failed records are replayed.
///
/// The virtual consumer calls `failed` when a record may still be retried,
/// `acked` when a record resolves (successfully or terminally), and polls
/// `next_failed_message_to_retry` at the top of every pull. A policy owns
/// its own bookkeeping; ids it has never seen are fair inputs everywhere.
pub trait RetryPolicy: Send {
    /// Read tunables from configuration. Called once when the owning
    /// virtual consumer opens.
    fn open(&mut self, config: &EngineConfig);

    /// Record one more failure for the id and schedule its next attempt.
    fn failed(&mut self, id: &MessageId);

    /// Forget everything tracked for the id. No-op if absent.
    fn acked(&mut self, id: &MessageId);

    /// True iff the id is still within its retry budget.
    fn retry_further(&mut self, id: &MessageId) -> bool;

    /// Hand out one id whose retry deadline has passed, removing it from
    /// the waiting set. None when nothing is due.
    fn next_failed_message_to_retry(&mut self) -> Option<MessageId>;
}
