use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::PersistenceError;
use crate::state::ConsumerState;
use crate::types::{ConsumerPartition, SidelineRequestId, VirtualConsumerId};

/// Key-value store of consumer frontiers and sideline request offsets.
///
/// One adapter instance is shared across every virtual consumer in a
/// process; writes are namespaced by consumer id or request id, so
/// instances never clobber each other.
pub trait PersistenceAdapter: Send + Sync {
    fn persist_consumer_state(
        &self,
        consumer_id: &VirtualConsumerId,
        state: &ConsumerState,
    ) -> Result<(), PersistenceError>;

    fn retrieve_consumer_state(
        &self,
        consumer_id: &VirtualConsumerId,
    ) -> Result<Option<ConsumerState>, PersistenceError>;

    fn clear_consumer_state(&self, consumer_id: &VirtualConsumerId) -> Result<(), PersistenceError>;

    fn persist_sideline_request_offset(
        &self,
        request: &SidelineRequestId,
        partition: &ConsumerPartition,
        offset: i64,
    ) -> Result<(), PersistenceError>;

    fn retrieve_sideline_request_offset(
        &self,
        request: &SidelineRequestId,
        partition: &ConsumerPartition,
    ) -> Result<Option<i64>, PersistenceError>;

    fn clear_sideline_request(
        &self,
        request: &SidelineRequestId,
        partition: &ConsumerPartition,
    ) -> Result<(), PersistenceError>;
}

/// Process-local adapter. The state lives exactly as long as the process,
/// which is what tests and single-node deployments want.
#[derive(Default)]
pub struct InMemoryPersistenceAdapter {
    consumer_states: Mutex<HashMap<VirtualConsumerId, ConsumerState>>,
    sideline_offsets: Mutex<HashMap<(SidelineRequestId, ConsumerPartition), i64>>,
}

impl InMemoryPersistenceAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceAdapter for InMemoryPersistenceAdapter {
    fn persist_consumer_state(
        &self,
        consumer_id: &VirtualConsumerId,
        state: &ConsumerState,
    ) -> Result<(), PersistenceError> {
        self.consumer_states
            .lock()
            .insert(consumer_id.clone(), state.clone());
        Ok(())
    }

    fn retrieve_consumer_state(
        &self,
        consumer_id: &VirtualConsumerId,
    ) -> Result<Option<ConsumerState>, PersistenceError> {
        Ok(self.consumer_states.lock().get(consumer_id).cloned())
    }

    fn clear_consumer_state(&self, consumer_id: &VirtualConsumerId) -> Result<(), PersistenceError> {
        self.consumer_states.lock().remove(consumer_id);
        Ok(())
    }

    fn persist_sideline_request_offset(
        &self,
        request: &SidelineRequestId,
        partition: &ConsumerPartition,
        offset: i64,
    ) -> Result<(), PersistenceError> {
        self.sideline_offsets
            .lock()
            .insert((*request, partition.clone()), offset);
        Ok(())
    }

    fn retrieve_sideline_request_offset(
        &self,
        request: &SidelineRequestId,
        partition: &ConsumerPartition,
    ) -> Result<Option<i64>, PersistenceError> {
        Ok(self
            .sideline_offsets
            .lock()
            .get(&(*request, partition.clone()))
            .copied())
    }

    fn clear_sideline_request(
        &self,
        request: &SidelineRequestId,
        partition: &ConsumerPartition,
    ) -> Result<(), PersistenceError> {
        self.sideline_offsets
            .lock()
            .remove(&(*request, partition.clone()));
        Ok(())
    }
}
