use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::consumer::LogConsumer;
use crate::error::VirtualConsumerError;
use crate::filter::FilterChain;
use crate::metrics_consts::{
    IN_FLIGHT_MESSAGES, MESSAGES_FAILED, MESSAGES_FILTERED, RETRY_LIMIT_EXCEEDED,
};
use crate::persistence::PersistenceAdapter;
use crate::retry::RetryPolicy;
use crate::state::ConsumerState;
use crate::stop::{InterruptHandle, StopSignal};
use crate::types::{Message, MessageId, SidelineRequestId, VirtualConsumerId};

/// One logical consumer against the log: its own group identity, filter
/// chain, in-flight table, retry policy, and optional range bounds.
///
/// A host runs many of these side by side. The firehose instance has no
/// bounds and tails the log forever; a sidelined instance carries a
/// starting and ending state and winds itself down once every partition's
/// committed frontier reaches its ending offset.
///
/// One thread drives `next_message`; acks and fails may arrive from the
/// host's dispatcher thread, and stop interrogation from anywhere, so all
/// methods take `&self` and the mutable state sits behind locks.
pub struct VirtualConsumer {
    id: VirtualConsumerId,
    config: Arc<EngineConfig>,
    consumer: Mutex<Option<Box<dyn LogConsumer>>>,
    persistence: Arc<dyn PersistenceAdapter>,
    retry_policy: Mutex<Box<dyn RetryPolicy>>,
    filter_chain: FilterChain,
    starting_state: Option<ConsumerState>,
    ending_state: Option<ConsumerState>,
    sideline_request: Option<SidelineRequestId>,
    in_flight: Mutex<HashMap<MessageId, Message>>,
    opened: AtomicBool,
    completed: AtomicBool,
    stop: StopSignal,
    filtered: AtomicU64,
    failed: AtomicU64,
    exceeded_retry_limit: AtomicU64,
}

pub struct VirtualConsumerBuilder {
    id: VirtualConsumerId,
    config: Arc<EngineConfig>,
    consumer: Box<dyn LogConsumer>,
    persistence: Arc<dyn PersistenceAdapter>,
    retry_policy: Box<dyn RetryPolicy>,
    starting_state: Option<ConsumerState>,
    ending_state: Option<ConsumerState>,
    sideline_request: Option<SidelineRequestId>,
}

impl VirtualConsumerBuilder {
    /// Inclusive first offsets to replay. Without it the log consumer
    /// resumes from its persisted frontier, or the head of the log.
    pub fn starting_state(mut self, state: ConsumerState) -> Self {
        self.starting_state = Some(state);
        self
    }

    /// Inclusive last offsets to process. Without it the consumer never
    /// completes.
    pub fn ending_state(mut self, state: ConsumerState) -> Self {
        self.ending_state = Some(state);
        self
    }

    /// Associate the consumer with the sideline request it serves; the
    /// request's stored offsets are cleared once the range completes.
    pub fn sideline_request(mut self, request: SidelineRequestId) -> Self {
        self.sideline_request = Some(request);
        self
    }

    pub fn build(self) -> VirtualConsumer {
        VirtualConsumer {
            id: self.id,
            config: self.config,
            consumer: Mutex::new(Some(self.consumer)),
            persistence: self.persistence,
            retry_policy: Mutex::new(self.retry_policy),
            filter_chain: FilterChain::new(),
            starting_state: self.starting_state,
            ending_state: self.ending_state,
            sideline_request: self.sideline_request,
            in_flight: Mutex::new(HashMap::new()),
            opened: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            stop: StopSignal::new(),
            filtered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            exceeded_retry_limit: AtomicU64::new(0),
        }
    }
}

impl VirtualConsumer {
    /// Both firehose and sidelined instances are assembled here; bounds
    /// and the request association are optional extras on the builder.
    pub fn builder(
        id: VirtualConsumerId,
        config: Arc<EngineConfig>,
        consumer: Box<dyn LogConsumer>,
        retry_policy: Box<dyn RetryPolicy>,
        persistence: Arc<dyn PersistenceAdapter>,
    ) -> VirtualConsumerBuilder {
        VirtualConsumerBuilder {
            id,
            config,
            consumer,
            persistence,
            retry_policy,
            starting_state: None,
            ending_state: None,
            sideline_request: None,
        }
    }

    /// Open the retry policy and the underlying log consumer. Permitted
    /// exactly once.
    pub fn open(&self) -> Result<(), VirtualConsumerError> {
        if self.opened.swap(true, Ordering::AcqRel) {
            return Err(VirtualConsumerError::AlreadyOpened);
        }

        info!(
            consumer_id = %self.id,
            starting = ?self.starting_state,
            ending = ?self.ending_state,
            "opening virtual consumer"
        );

        self.retry_policy.lock().open(&self.config);

        let mut guard = self.consumer.lock();
        let consumer = guard.as_mut().ok_or(VirtualConsumerError::Closed)?;
        consumer.open(self.starting_state.as_ref())?;
        Ok(())
    }

    /// Release the log consumer. A completed consumer erases its
    /// persisted state (and its sideline request's stored offsets); one
    /// stopped mid-range flushes instead so a restart picks up where it
    /// left off. Idempotent.
    pub fn close(&self) -> Result<(), VirtualConsumerError> {
        let mut guard = self.consumer.lock();
        let Some(consumer) = guard.as_mut() else {
            return Ok(());
        };

        if self.completed.load(Ordering::Acquire) {
            consumer.remove_consumer_state()?;

            if let Some(request) = self.sideline_request.as_ref() {
                // The ending state is the authoritative partition set for
                // a completed range; older deployments only recorded a
                // starting state.
                if let Some(bound) = self.ending_state.as_ref().or(self.starting_state.as_ref()) {
                    for partition in bound.partitions() {
                        self.persistence.clear_sideline_request(request, partition)?;
                    }
                }
            }
        } else {
            consumer.flush_consumer_state()?;
        }

        consumer.close()?;
        *guard = None;
        info!(consumer_id = %self.id, "virtual consumer closed");
        Ok(())
    }

    /// Pull one emittable message. Retries due for replay come first,
    /// then the log; records past their ending offset unsubscribe their
    /// partition, and filtered records are acked without being emitted.
    pub fn next_message(&self) -> Result<Option<Message>, VirtualConsumerError> {
        self.ensure_opened()?;

        let due_retry = self.retry_policy.lock().next_failed_message_to_retry();
        if let Some(id) = due_retry {
            let tracked = self.in_flight.lock().get(&id).cloned();
            if let Some(message) = tracked {
                return Ok(Some(message));
            }
            // Tracking was lost underneath the retry policy; drop the id
            // so it stops coming back.
            warn!(consumer_id = %self.id, message_id = %id, "no tracked message for due retry, dropping");
            self.retry_policy.lock().acked(&id);
        }

        let record = {
            let mut guard = self.consumer.lock();
            let consumer = guard.as_mut().ok_or(VirtualConsumerError::Closed)?;
            consumer.next_record()?
        };
        let Some(record) = record else {
            return Ok(None);
        };

        let message_id = MessageId::new(
            record.namespace().to_owned(),
            record.partition(),
            record.offset(),
            self.id.clone(),
        );

        if self.exceeds_ending_offset(&message_id)? {
            // Never emitted, never acked: the frontier for this partition
            // was already raised by the acks inside the range.
            debug!(consumer_id = %self.id, message_id = %message_id, "record is past the ending offset");
            let partition = message_id.consumer_partition();
            let mut guard = self.consumer.lock();
            let consumer = guard.as_mut().ok_or(VirtualConsumerError::Closed)?;
            if consumer.unsubscribe_partition(&partition) {
                info!(consumer_id = %self.id, %partition, "unsubscribed completed partition");
            }
            return Ok(None);
        }

        let message = Message::new(message_id.clone(), record.into_values());

        if self.filter_chain.filter(&message) {
            self.filtered.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(MESSAGES_FILTERED, "consumer_id" => self.id.to_string()).increment(1);
            self.ack(&message_id)?;
            return Ok(None);
        }

        let mut in_flight = self.in_flight.lock();
        in_flight.insert(message_id, message.clone());
        metrics::gauge!(IN_FLIGHT_MESSAGES, "consumer_id" => self.id.to_string())
            .set(in_flight.len() as f64);
        Ok(Some(message))
    }

    /// Resolve a message successfully: commit its offset, drop it from
    /// the in-flight table, and clear any retry tracking. Repeating an
    /// ack is harmless.
    pub fn ack(&self, id: &MessageId) -> Result<(), VirtualConsumerError> {
        self.ensure_opened()?;
        self.ensure_ours(id)?;

        {
            let mut guard = self.consumer.lock();
            let consumer = guard.as_mut().ok_or(VirtualConsumerError::Closed)?;
            consumer.commit_offset(id.namespace(), id.partition(), id.offset());
        }

        let mut in_flight = self.in_flight.lock();
        in_flight.remove(id);
        metrics::gauge!(IN_FLIGHT_MESSAGES, "consumer_id" => self.id.to_string())
            .set(in_flight.len() as f64);
        drop(in_flight);

        self.retry_policy.lock().acked(id);
        Ok(())
    }

    /// Report a message failed. Within budget the retry policy schedules
    /// a replay and the in-flight entry stays put; past budget the record
    /// is committed anyway and dropped.
    pub fn fail(&self, id: &MessageId) -> Result<(), VirtualConsumerError> {
        self.ensure_opened()?;
        self.ensure_ours(id)?;

        let mut retry_policy = self.retry_policy.lock();
        if !retry_policy.retry_further(id) {
            warn!(consumer_id = %self.id, message_id = %id, "retry budget exhausted, committing past the record");
            retry_policy.acked(id);
            drop(retry_policy);

            {
                let mut guard = self.consumer.lock();
                let consumer = guard.as_mut().ok_or(VirtualConsumerError::Closed)?;
                consumer.commit_offset(id.namespace(), id.partition(), id.offset());
            }

            let mut in_flight = self.in_flight.lock();
            in_flight.remove(id);
            metrics::gauge!(IN_FLIGHT_MESSAGES, "consumer_id" => self.id.to_string())
                .set(in_flight.len() as f64);
            drop(in_flight);

            self.exceeded_retry_limit.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(RETRY_LIMIT_EXCEEDED, "consumer_id" => self.id.to_string())
                .increment(1);
            return Ok(());
        }

        retry_policy.failed(id);
        drop(retry_policy);

        self.failed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(MESSAGES_FAILED, "consumer_id" => self.id.to_string()).increment(1);
        Ok(())
    }

    /// Maintenance tick: persist the committed frontiers, then check
    /// whether a bounded range has been fully worked off.
    pub fn flush_state(&self) -> Result<(), VirtualConsumerError> {
        self.ensure_opened()?;

        {
            let mut guard = self.consumer.lock();
            let consumer = guard.as_mut().ok_or(VirtualConsumerError::Closed)?;
            consumer.flush_consumer_state()?;
        }

        self.attempt_to_complete()
    }

    fn attempt_to_complete(&self) -> Result<(), VirtualConsumerError> {
        let Some(ending) = self.ending_state.as_ref() else {
            return Ok(());
        };
        if !self.in_flight.lock().is_empty() {
            return Ok(());
        }

        {
            let mut guard = self.consumer.lock();
            let consumer = guard.as_mut().ok_or(VirtualConsumerError::Closed)?;
            let current = consumer.current_state();

            for (partition, committed) in current.entries() {
                let ending_offset = ending
                    .offset_for(partition)
                    .ok_or_else(|| VirtualConsumerError::MissingEndingOffset(partition.clone()))?;
                if committed < ending_offset {
                    return Ok(());
                }
                if consumer.unsubscribe_partition(partition) {
                    debug!(
                        consumer_id = %self.id,
                        %partition,
                        committed,
                        ending_offset,
                        "partition reached its ending offset"
                    );
                }
            }
        }

        info!(consumer_id = %self.id, "all partitions reached their ending offsets, completing");
        self.completed.store(true, Ordering::Release);
        self.request_stop();
        Ok(())
    }

    fn exceeds_ending_offset(&self, id: &MessageId) -> Result<bool, VirtualConsumerError> {
        let Some(ending) = self.ending_state.as_ref() else {
            return Ok(false);
        };
        let partition = id.consumer_partition();
        let ending_offset = ending
            .offset_for(&partition)
            .ok_or(VirtualConsumerError::MissingEndingOffset(partition))?;
        Ok(id.offset() > ending_offset)
    }

    fn ensure_opened(&self) -> Result<(), VirtualConsumerError> {
        if !self.opened.load(Ordering::Acquire) {
            return Err(VirtualConsumerError::NotOpened);
        }
        Ok(())
    }

    fn ensure_ours(&self, id: &MessageId) -> Result<(), VirtualConsumerError> {
        if id.consumer_id() != &self.id {
            return Err(VirtualConsumerError::ForeignMessageId(id.clone()));
        }
        Ok(())
    }

    /// Ask the poll loop to wind down. Callable from any thread, any
    /// number of times.
    pub fn request_stop(&self) {
        self.stop.request();
    }

    /// True once a stop was requested or the interrupt handle fired;
    /// observing an interrupt clears it.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_requested()
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.stop.interrupt_handle()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn consumer_id(&self) -> &VirtualConsumerId {
        &self.id
    }

    pub fn sideline_request(&self) -> Option<&SidelineRequestId> {
        self.sideline_request.as_ref()
    }

    pub fn starting_state(&self) -> Option<&ConsumerState> {
        self.starting_state.as_ref()
    }

    pub fn ending_state(&self) -> Option<&ConsumerState> {
        self.ending_state.as_ref()
    }

    pub fn filter_chain(&self) -> &FilterChain {
        &self.filter_chain
    }

    /// Committed frontiers of the currently subscribed partitions.
    pub fn current_state(&self) -> Result<ConsumerState, VirtualConsumerError> {
        let guard = self.consumer.lock();
        let consumer = guard.as_ref().ok_or(VirtualConsumerError::Closed)?;
        Ok(consumer.current_state())
    }

    pub fn max_lag(&self) -> Result<f64, VirtualConsumerError> {
        let guard = self.consumer.lock();
        let consumer = guard.as_ref().ok_or(VirtualConsumerError::Closed)?;
        Ok(consumer.max_lag())
    }

    pub fn filters_applied(&self) -> usize {
        self.filter_chain.step_count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn filtered_count(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    pub fn fail_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn exceeded_retry_limit_count(&self) -> u64 {
        self.exceeded_retry_limit.load(Ordering::Relaxed)
    }
}
