use std::fmt;

use serde_json::Value;
use uuid::Uuid;

use crate::error::VirtualConsumerError;

/// The deserialized payload of a record, as handed downstream.
pub type Values = Vec<Value>;

/// One shard of a namespace, with its own monotonic offset space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerPartition {
    namespace: String,
    partition: i32,
}

impl ConsumerPartition {
    pub fn new(namespace: impl Into<String>, partition: i32) -> Self {
        Self {
            namespace: namespace.into(),
            partition,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }
}

impl fmt::Display for ConsumerPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.namespace, self.partition)
    }
}

/// Unique identity of one virtual consumer. Never empty, never mutated
/// after construction; it doubles as the consumer-group identity against
/// the log and as the primary key for persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualConsumerId(String);

impl VirtualConsumerId {
    pub fn new(id: impl Into<String>) -> Result<Self, VirtualConsumerError> {
        let id = id.into();
        if id.is_empty() {
            return Err(VirtualConsumerError::EmptyConsumerId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VirtualConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token tying a bounded virtual consumer back to the sideline
/// request that spawned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SidelineRequestId(Uuid);

impl SidelineRequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for SidelineRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SidelineRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single record pulled from the log, already deserialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    namespace: String,
    partition: i32,
    offset: i64,
    values: Values,
}

impl Record {
    pub fn new(namespace: impl Into<String>, partition: i32, offset: i64, values: Values) -> Self {
        Self {
            namespace: namespace.into(),
            partition,
            offset,
            values,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn into_values(self) -> Values {
        self.values
    }

    pub fn consumer_partition(&self) -> ConsumerPartition {
        ConsumerPartition::new(self.namespace.clone(), self.partition)
    }
}

/// Ack token for one emitted record. Keys the in-flight table; equality
/// and hash cover all four fields, so ids from distinct virtual consumers
/// never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId {
    namespace: String,
    partition: i32,
    offset: i64,
    consumer_id: VirtualConsumerId,
}

impl MessageId {
    pub fn new(
        namespace: impl Into<String>,
        partition: i32,
        offset: i64,
        consumer_id: VirtualConsumerId,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            partition,
            offset,
            consumer_id,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn consumer_id(&self) -> &VirtualConsumerId {
        &self.consumer_id
    }

    pub fn consumer_partition(&self) -> ConsumerPartition {
        ConsumerPartition::new(self.namespace.clone(), self.partition)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}@{} ({})",
            self.namespace, self.partition, self.offset, self.consumer_id
        )
    }
}

/// The unit emitted downstream: an ack token plus the record's values.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    values: Values,
}

impl Message {
    pub fn new(id: MessageId, values: Values) -> Self {
        Self { id, values }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn into_values(self) -> Values {
        self.values
    }
}
