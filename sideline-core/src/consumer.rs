use crate::error::ConsumerError;
use crate::state::ConsumerState;
use crate::types::{ConsumerPartition, Record};

/// The partitioned log as seen by one virtual consumer.
///
/// An implementation is owned exclusively by a single virtual consumer;
/// nothing here needs to tolerate sharing. Offsets committed through
/// `commit_offset` are cumulative per partition: the frontier only ever
/// moves forward, and committing at or below it is a no-op.
pub trait LogConsumer: Send {
    /// Connect and subscribe. With a starting state, seek each of its
    /// partitions to exactly that offset; otherwise resume from the
    /// persisted frontier when one exists, else from the earliest
    /// available offset.
    fn open(&mut self, starting_state: Option<&ConsumerState>) -> Result<(), ConsumerError>;

    /// Pull one record from any subscribed partition, None when nothing
    /// is immediately available. Within a partition, offsets come back in
    /// increasing order and a given offset is returned at most once per
    /// open lifetime.
    fn next_record(&mut self) -> Result<Option<Record>, ConsumerError>;

    /// Raise the committed frontier for the partition to the offset, if
    /// it is higher than the current frontier.
    fn commit_offset(&mut self, namespace: &str, partition: i32, offset: i64);

    /// Persist the committed frontiers under this consumer's identity and
    /// return the snapshot that was written.
    fn flush_consumer_state(&mut self) -> Result<ConsumerState, ConsumerError>;

    /// Erase this consumer's persisted frontiers.
    fn remove_consumer_state(&mut self) -> Result<(), ConsumerError>;

    /// Committed frontiers of the currently subscribed partitions.
    fn current_state(&self) -> ConsumerState;

    /// Largest (latest offset - committed offset) across subscribed
    /// partitions.
    fn max_lag(&self) -> f64;

    /// Drop the partition from the active set; subsequent `next_record`
    /// calls never return it. True iff it was subscribed.
    fn unsubscribe_partition(&mut self, partition: &ConsumerPartition) -> bool;

    /// Release the connection. Safe to call more than once.
    fn close(&mut self) -> Result<(), ConsumerError>;
}
