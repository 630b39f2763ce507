use std::collections::BTreeMap;
use std::fmt;

use crate::types::ConsumerPartition;

/// Snapshot of per-partition offsets. Serves three roles: the starting
/// bound of a virtual consumer (inclusive seek target), the ending bound
/// (inclusive upper limit), and the committed-frontier report persisted
/// between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerState {
    offsets: BTreeMap<ConsumerPartition, i64>,
}

impl ConsumerState {
    pub fn builder() -> ConsumerStateBuilder {
        ConsumerStateBuilder::default()
    }

    pub fn offset_for(&self, partition: &ConsumerPartition) -> Option<i64> {
        self.offsets.get(partition).copied()
    }

    pub fn contains(&self, partition: &ConsumerPartition) -> bool {
        self.offsets.contains_key(partition)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &ConsumerPartition> {
        self.offsets.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ConsumerPartition, i64)> {
        self.offsets.iter().map(|(partition, offset)| (partition, *offset))
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

impl FromIterator<(ConsumerPartition, i64)> for ConsumerState {
    fn from_iter<I: IntoIterator<Item = (ConsumerPartition, i64)>>(iter: I) -> Self {
        Self {
            offsets: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, (partition, offset)) in self.offsets.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{partition}={offset}")?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Default)]
pub struct ConsumerStateBuilder {
    offsets: BTreeMap<ConsumerPartition, i64>,
}

impl ConsumerStateBuilder {
    pub fn with_partition(mut self, namespace: impl Into<String>, partition: i32, offset: i64) -> Self {
        self.offsets
            .insert(ConsumerPartition::new(namespace, partition), offset);
        self
    }

    pub fn build(self) -> ConsumerState {
        ConsumerState {
            offsets: self.offsets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_partitions() {
        let state = ConsumerState::builder()
            .with_partition("events", 0, 12)
            .with_partition("events", 1, 7)
            .build();

        assert_eq!(state.len(), 2);
        assert_eq!(state.offset_for(&ConsumerPartition::new("events", 0)), Some(12));
        assert_eq!(state.offset_for(&ConsumerPartition::new("events", 1)), Some(7));
        assert_eq!(state.offset_for(&ConsumerPartition::new("events", 2)), None);
    }

    #[test]
    fn test_builder_last_write_wins() {
        let state = ConsumerState::builder()
            .with_partition("events", 0, 5)
            .with_partition("events", 0, 9)
            .build();

        assert_eq!(state.offset_for(&ConsumerPartition::new("events", 0)), Some(9));
    }

    #[test]
    fn test_display_is_ordered() {
        let state = ConsumerState::builder()
            .with_partition("events", 1, 7)
            .with_partition("events", 0, 12)
            .build();

        assert_eq!(state.to_string(), "{events-0=12, events-1=7}");
    }

    #[test]
    fn test_empty_state() {
        let state = ConsumerState::default();

        assert!(state.is_empty());
        assert_eq!(state.to_string(), "{}");
        assert_eq!(state.partitions().count(), 0);
    }
}
