use std::time::Duration;

use rdkafka::ClientConfig;

use sideline_core::{EngineConfig, VirtualConsumerId};

/// Connection settings for one virtual consumer's Kafka identity. The
/// group id is the virtual consumer id, so peers replaying the same range
/// under different identities never collide in the broker's bookkeeping.
#[derive(Debug, Clone)]
pub struct KafkaConsumerConfig {
    brokers: String,
    group_id: String,
    topic: String,
    number_of_consumers: usize,
    consumer_index: usize,
    offset_reset: String,
    tls: bool,
    poll_timeout: Duration,
}

impl KafkaConsumerConfig {
    pub fn new(
        brokers: impl Into<String>,
        group_id: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: group_id.into(),
            topic: topic.into(),
            number_of_consumers: 1,
            consumer_index: 0,
            offset_reset: "earliest".to_string(),
            tls: false,
            poll_timeout: Duration::from_millis(250),
        }
    }

    pub fn from_engine(config: &EngineConfig, consumer_id: &VirtualConsumerId) -> Self {
        let mut kafka_config = Self::new(
            config.kafka_hosts.clone(),
            consumer_id.as_str(),
            config.kafka_topic.clone(),
        );
        kafka_config.offset_reset = config.kafka_consumer_offset_reset.clone();
        kafka_config.tls = config.kafka_tls;
        kafka_config.poll_timeout = Duration::from_millis(config.poll_timeout_ms);
        kafka_config
    }

    /// How many peers share the topic, and which slot this consumer
    /// occupies. Partitions are distributed deterministically by slot.
    pub fn with_consumer_count(mut self, number_of_consumers: usize, consumer_index: usize) -> Self {
        self.number_of_consumers = number_of_consumers.max(1);
        self.consumer_index = consumer_index;
        self
    }

    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn number_of_consumers(&self) -> usize {
        self.number_of_consumers
    }

    pub fn consumer_index(&self) -> usize {
        self.consumer_index
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    pub(crate) fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", &self.offset_reset);

        if self.tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        }

        client_config
    }
}
