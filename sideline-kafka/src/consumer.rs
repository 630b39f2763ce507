use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::{Message, Offset, TopicPartitionList};
use tracing::{debug, info, warn};

use sideline_core::metrics_consts::POISON_PILLS;
use sideline_core::{
    ConsumerError, ConsumerPartition, ConsumerState, Deserializer, LogConsumer,
    PersistenceAdapter, Record, VirtualConsumerId,
};

use crate::config::KafkaConsumerConfig;

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const WATERMARK_TIMEOUT: Duration = Duration::from_secs(10);

/// Partitions this consumer slot is responsible for, out of the topic's
/// full set: deterministic, stateless, and stable across restarts for a
/// fixed peer count.
fn partitions_for(partition_ids: &[i32], number_of_consumers: usize, consumer_index: usize) -> Vec<i32> {
    let mut sorted = partition_ids.to_vec();
    sorted.sort_unstable();
    sorted
        .into_iter()
        .filter(|partition| *partition as usize % number_of_consumers == consumer_index)
        .collect()
}

/// Kafka-backed log consumer for one virtual consumer.
///
/// Partitions are assigned manually (no broker-side group balancing), so
/// a bounded replay owns exactly the partitions its bounds name and a
/// record is pulled at most once per open lifetime. The committed
/// frontier lives here and is persisted through the shared persistence
/// adapter, never through the broker's commit log.
pub struct KafkaLogConsumer {
    config: KafkaConsumerConfig,
    consumer_id: VirtualConsumerId,
    deserializer: Arc<dyn Deserializer>,
    persistence: Arc<dyn PersistenceAdapter>,
    consumer: Option<BaseConsumer>,
    committed: BTreeMap<ConsumerPartition, i64>,
    subscribed: BTreeSet<ConsumerPartition>,
}

impl KafkaLogConsumer {
    pub fn new(
        config: KafkaConsumerConfig,
        consumer_id: VirtualConsumerId,
        deserializer: Arc<dyn Deserializer>,
        persistence: Arc<dyn PersistenceAdapter>,
    ) -> Self {
        Self {
            config,
            consumer_id,
            deserializer,
            persistence,
            consumer: None,
            committed: BTreeMap::new(),
            subscribed: BTreeSet::new(),
        }
    }

    fn connected(&self) -> Result<&BaseConsumer, ConsumerError> {
        self.consumer
            .as_ref()
            .ok_or_else(|| ConsumerError::Transport(anyhow::anyhow!("kafka consumer is not open")))
    }
}

impl LogConsumer for KafkaLogConsumer {
    fn open(&mut self, starting_state: Option<&ConsumerState>) -> Result<(), ConsumerError> {
        let consumer: BaseConsumer = self
            .config
            .client_config()
            .create()
            .context("failed to create kafka consumer")?;

        let metadata = consumer
            .fetch_metadata(Some(self.config.topic()), METADATA_TIMEOUT)
            .context("failed to fetch topic metadata")?;
        let topic = metadata
            .topics()
            .iter()
            .find(|topic| topic.name() == self.config.topic())
            .with_context(|| format!("topic {} not found", self.config.topic()))?;
        let partition_ids: Vec<i32> = topic.partitions().iter().map(|partition| partition.id()).collect();

        let assigned = partitions_for(
            &partition_ids,
            self.config.number_of_consumers(),
            self.config.consumer_index(),
        );

        let persisted = self.persistence.retrieve_consumer_state(&self.consumer_id)?;

        let mut assignment = TopicPartitionList::new();
        for partition_id in assigned {
            let partition = ConsumerPartition::new(self.config.topic(), partition_id);
            let explicit_start = starting_state.and_then(|state| state.offset_for(&partition));
            let persisted_frontier = persisted.as_ref().and_then(|state| state.offset_for(&partition));

            // An explicit starting offset is inclusive; a persisted
            // frontier names the last acknowledged offset, so the pull
            // resumes just past it.
            let (seek_to, frontier) = match (explicit_start, persisted_frontier) {
                (Some(offset), _) => (Offset::Offset(offset), offset - 1),
                (None, Some(committed)) => (Offset::Offset(committed + 1), committed),
                (None, None) => (Offset::Beginning, -1),
            };

            assignment
                .add_partition_offset(self.config.topic(), partition_id, seek_to)
                .context("failed to stage partition assignment")?;
            debug!(
                consumer_id = %self.consumer_id,
                %partition,
                ?seek_to,
                frontier,
                "assigning partition"
            );
            self.committed.insert(partition.clone(), frontier);
            self.subscribed.insert(partition);
        }

        consumer
            .assign(&assignment)
            .context("failed to assign partitions")?;

        info!(
            consumer_id = %self.consumer_id,
            topic = self.config.topic(),
            partitions = self.subscribed.len(),
            "kafka consumer opened"
        );
        self.consumer = Some(consumer);
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record>, ConsumerError> {
        let (namespace, partition, offset, values) = {
            let consumer = self.connected()?;
            let Some(polled) = consumer.poll(self.config.poll_timeout()) else {
                return Ok(None);
            };
            let message = polled.context("kafka poll failed")?;

            let namespace = message.topic().to_owned();
            let partition = message.partition();
            let offset = message.offset();

            if !self
                .subscribed
                .contains(&ConsumerPartition::new(namespace.clone(), partition))
            {
                debug!(
                    consumer_id = %self.consumer_id,
                    %namespace,
                    partition,
                    offset,
                    "dropping record from unsubscribed partition"
                );
                return Ok(None);
            }

            let values = self.deserializer.deserialize(
                &namespace,
                partition,
                offset,
                message.key(),
                message.payload(),
            );
            (namespace, partition, offset, values)
        };

        match values {
            Some(values) => Ok(Some(Record::new(namespace, partition, offset, values))),
            None => {
                // Poison pill: commit past it so the frontier keeps moving.
                warn!(
                    consumer_id = %self.consumer_id,
                    %namespace,
                    partition,
                    offset,
                    "record could not be deserialized, committing past it"
                );
                metrics::counter!(POISON_PILLS, "consumer_id" => self.consumer_id.to_string())
                    .increment(1);
                self.commit_offset(&namespace, partition, offset);
                Ok(None)
            }
        }
    }

    fn commit_offset(&mut self, namespace: &str, partition: i32, offset: i64) {
        let entry = self
            .committed
            .entry(ConsumerPartition::new(namespace, partition))
            .or_insert(offset);
        if offset > *entry {
            *entry = offset;
        }
    }

    fn flush_consumer_state(&mut self) -> Result<ConsumerState, ConsumerError> {
        let state = self.current_state();
        self.persistence
            .persist_consumer_state(&self.consumer_id, &state)?;
        debug!(consumer_id = %self.consumer_id, %state, "flushed consumer state");
        Ok(state)
    }

    fn remove_consumer_state(&mut self) -> Result<(), ConsumerError> {
        self.persistence.clear_consumer_state(&self.consumer_id)?;
        info!(consumer_id = %self.consumer_id, "removed persisted consumer state");
        Ok(())
    }

    fn current_state(&self) -> ConsumerState {
        self.committed
            .iter()
            .filter(|(partition, _)| self.subscribed.contains(*partition))
            .map(|(partition, offset)| (partition.clone(), *offset))
            .collect()
    }

    fn max_lag(&self) -> f64 {
        let Some(consumer) = self.consumer.as_ref() else {
            return 0.0;
        };

        let mut max_lag = 0.0f64;
        for partition in &self.subscribed {
            match consumer.fetch_watermarks(
                partition.namespace(),
                partition.partition(),
                WATERMARK_TIMEOUT,
            ) {
                Ok((_, high_watermark)) => {
                    let committed = self.committed.get(partition).copied().unwrap_or(-1);
                    let lag = ((high_watermark - 1) - committed).max(0) as f64;
                    if lag > max_lag {
                        max_lag = lag;
                    }
                }
                Err(error) => {
                    warn!(%partition, %error, "failed to fetch watermarks");
                }
            }
        }
        max_lag
    }

    fn unsubscribe_partition(&mut self, partition: &ConsumerPartition) -> bool {
        if !self.subscribed.remove(partition) {
            return false;
        }

        if let Some(consumer) = self.consumer.as_ref() {
            let mut removal = TopicPartitionList::new();
            removal.add_partition(partition.namespace(), partition.partition());
            if let Err(error) = consumer.incremental_unassign(&removal) {
                // The subscription guard in next_record still filters the
                // partition's records out.
                warn!(%partition, %error, "failed to unassign partition");
            }
        }

        info!(consumer_id = %self.consumer_id, %partition, "unsubscribed from partition");
        true
    }

    fn close(&mut self) -> Result<(), ConsumerError> {
        if self.consumer.take().is_some() {
            info!(consumer_id = %self.consumer_id, "kafka consumer closed");
        }
        Ok(())
    }
}
