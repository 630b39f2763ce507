use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use sideline_core::{
    ConsumerError, ConsumerPartition, ConsumerState, EngineConfig, InMemoryPersistenceAdapter,
    LogConsumer, MessageId, PersistenceAdapter, Record, RetryPolicy, VirtualConsumerId,
};

/// Observable state of a [`FakeLogConsumer`], shared with the test body.
#[derive(Default)]
pub struct FakeLog {
    pub records: VecDeque<Record>,
    pub committed: BTreeMap<ConsumerPartition, i64>,
    pub subscribed: BTreeSet<ConsumerPartition>,
    pub unsubscribed: Vec<ConsumerPartition>,
    pub opened: bool,
    pub closed: bool,
    pub state_removed: bool,
    pub flush_count: usize,
    pub lag: f64,
}

impl FakeLog {
    pub fn push_record(&mut self, namespace: &str, partition: i32, offset: i64) {
        self.subscribed
            .insert(ConsumerPartition::new(namespace, partition));
        self.records
            .push_back(Record::new(namespace, partition, offset, vec![json!(offset)]));
    }

    pub fn committed_offset(&self, namespace: &str, partition: i32) -> Option<i64> {
        self.committed
            .get(&ConsumerPartition::new(namespace, partition))
            .copied()
    }

    fn live_state(&self) -> ConsumerState {
        self.committed
            .iter()
            .filter(|(partition, _)| self.subscribed.contains(*partition))
            .map(|(partition, offset)| (partition.clone(), *offset))
            .collect()
    }
}

/// Scripted log consumer. Serves queued records in order, collapses
/// commits to the highest offset per partition, and keeps subscription
/// bookkeeping the engine contract demands.
pub struct FakeLogConsumer {
    consumer_id: VirtualConsumerId,
    persistence: Arc<InMemoryPersistenceAdapter>,
    inner: Arc<Mutex<FakeLog>>,
}

impl FakeLogConsumer {
    pub fn new(
        consumer_id: VirtualConsumerId,
        persistence: Arc<InMemoryPersistenceAdapter>,
    ) -> (Self, Arc<Mutex<FakeLog>>) {
        let inner = Arc::new(Mutex::new(FakeLog::default()));
        (
            Self {
                consumer_id,
                persistence,
                inner: Arc::clone(&inner),
            },
            inner,
        )
    }
}

impl LogConsumer for FakeLogConsumer {
    fn open(&mut self, starting_state: Option<&ConsumerState>) -> Result<(), ConsumerError> {
        let persisted = self.persistence.retrieve_consumer_state(&self.consumer_id)?;
        let mut inner = self.inner.lock();
        inner.opened = true;
        if let Some(start) = starting_state {
            for (partition, offset) in start.entries() {
                inner.subscribed.insert(partition.clone());
                inner.committed.insert(partition.clone(), offset - 1);
            }
        } else if let Some(persisted) = persisted {
            for (partition, offset) in persisted.entries() {
                inner.subscribed.insert(partition.clone());
                inner.committed.insert(partition.clone(), offset);
            }
        }
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record>, ConsumerError> {
        let mut inner = self.inner.lock();
        while let Some(record) = inner.records.pop_front() {
            if inner.subscribed.contains(&record.consumer_partition()) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn commit_offset(&mut self, namespace: &str, partition: i32, offset: i64) {
        let mut inner = self.inner.lock();
        let entry = inner
            .committed
            .entry(ConsumerPartition::new(namespace, partition))
            .or_insert(offset);
        if offset > *entry {
            *entry = offset;
        }
    }

    fn flush_consumer_state(&mut self) -> Result<ConsumerState, ConsumerError> {
        let state = {
            let mut inner = self.inner.lock();
            inner.flush_count += 1;
            inner.live_state()
        };
        self.persistence
            .persist_consumer_state(&self.consumer_id, &state)?;
        Ok(state)
    }

    fn remove_consumer_state(&mut self) -> Result<(), ConsumerError> {
        self.persistence.clear_consumer_state(&self.consumer_id)?;
        self.inner.lock().state_removed = true;
        Ok(())
    }

    fn current_state(&self) -> ConsumerState {
        self.inner.lock().live_state()
    }

    fn max_lag(&self) -> f64 {
        self.inner.lock().lag
    }

    fn unsubscribe_partition(&mut self, partition: &ConsumerPartition) -> bool {
        let mut inner = self.inner.lock();
        if !inner.subscribed.remove(partition) {
            return false;
        }
        inner.unsubscribed.push(partition.clone());
        true
    }

    fn close(&mut self) -> Result<(), ConsumerError> {
        self.inner.lock().closed = true;
        Ok(())
    }
}

/// Retry policy that hands out a pre-loaded id once and records acks, for
/// driving the replay path from the outside.
pub struct ScriptedRetry {
    pub due: Arc<Mutex<Option<MessageId>>>,
    pub acked: Arc<Mutex<Vec<MessageId>>>,
}

impl ScriptedRetry {
    pub fn new(due: Arc<Mutex<Option<MessageId>>>, acked: Arc<Mutex<Vec<MessageId>>>) -> Self {
        Self { due, acked }
    }
}

impl RetryPolicy for ScriptedRetry {
    fn open(&mut self, _config: &EngineConfig) {}

    fn failed(&mut self, _id: &MessageId) {}

    fn acked(&mut self, id: &MessageId) {
        self.acked.lock().push(id.clone());
    }

    fn retry_further(&mut self, _id: &MessageId) -> bool {
        true
    }

    fn next_failed_message_to_retry(&mut self) -> Option<MessageId> {
        self.due.lock().take()
    }
}

pub fn consumer_id(name: &str) -> VirtualConsumerId {
    VirtualConsumerId::new(name).unwrap()
}

/// Config with retries due immediately, so replay tests need no sleeping.
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        kafka_hosts: "localhost:9092".to_string(),
        kafka_topic: "events".to_string(),
        kafka_tls: false,
        kafka_consumer_offset_reset: "earliest".to_string(),
        poll_timeout_ms: 250,
        deserializer: "json".to_string(),
        retry_policy: "exponential_backoff".to_string(),
        persistence_adapter: "in_memory".to_string(),
        retry_limit: 25,
        retry_initial_delay_ms: 0,
        retry_delay_multiplier: 2.0,
        retry_max_delay_ms: 0,
        consumer_state_flush_interval_secs: 30,
    }
}
