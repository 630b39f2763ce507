use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::types::MessageId;

use super::RetryPolicy;

#[derive(Debug)]
struct RetryState {
    attempts: u32,
    // None while the id is handed out (or freshly tracked), Some while it
    // waits for its deadline.
    retry_at: Option<Instant>,
}

/// Retry policy with an exponential backoff curve and an optional budget.
///
/// Each failure bumps the attempt counter and schedules the next replay at
/// `initial_delay * multiplier^(attempts - 1)`, capped at `max_delay`. A
/// negative budget permits unlimited retries.
#[derive(Debug)]
pub struct ExponentialBackoffRetry {
    retry_limit: i32,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    tracked: HashMap<MessageId, RetryState>,
}

impl ExponentialBackoffRetry {
    pub fn new() -> Self {
        Self {
            retry_limit: 25,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(900),
            tracked: HashMap::new(),
        }
    }

    fn delay_for(&self, attempts: u32) -> Duration {
        let pow = self.multiplier.powi(attempts.saturating_sub(1) as i32);
        let scaled = if pow.is_finite() {
            self.initial_delay.mul_f64(pow)
        } else {
            self.max_delay
        };
        scaled.min(self.max_delay)
    }
}

impl Default for ExponentialBackoffRetry {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy for ExponentialBackoffRetry {
    fn open(&mut self, config: &EngineConfig) {
        self.retry_limit = config.retry_limit;
        self.initial_delay = Duration::from_millis(config.retry_initial_delay_ms);
        self.multiplier = config.retry_delay_multiplier;
        self.max_delay = Duration::from_millis(config.retry_max_delay_ms);
    }

    fn failed(&mut self, id: &MessageId) {
        let attempts = {
            let state = self.tracked.entry(id.clone()).or_insert(RetryState {
                attempts: 0,
                retry_at: None,
            });
            state.attempts += 1;
            state.attempts
        };
        let delay = self.delay_for(attempts);
        if let Some(state) = self.tracked.get_mut(id) {
            state.retry_at = Some(Instant::now() + delay);
        }
    }

    fn acked(&mut self, id: &MessageId) {
        self.tracked.remove(id);
    }

    fn retry_further(&mut self, id: &MessageId) -> bool {
        if self.retry_limit < 0 {
            return true;
        }
        let attempts = self.tracked.get(id).map(|state| state.attempts).unwrap_or(0);
        attempts < self.retry_limit as u32
    }

    fn next_failed_message_to_retry(&mut self) -> Option<MessageId> {
        let now = Instant::now();
        let id = self
            .tracked
            .iter()
            .filter_map(|(id, state)| {
                state
                    .retry_at
                    .filter(|retry_at| *retry_at <= now)
                    .map(|retry_at| (id.clone(), retry_at))
            })
            .min_by_key(|(_, retry_at)| *retry_at)
            .map(|(id, _)| id)?;

        if let Some(state) = self.tracked.get_mut(&id) {
            state.retry_at = None;
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VirtualConsumerId;

    fn message_id(offset: i64) -> MessageId {
        MessageId::new("events", 0, offset, VirtualConsumerId::new("test").unwrap())
    }

    fn policy(limit: i32, initial_ms: u64, multiplier: f64, max_ms: u64) -> ExponentialBackoffRetry {
        let mut policy = ExponentialBackoffRetry::new();
        policy.retry_limit = limit;
        policy.initial_delay = Duration::from_millis(initial_ms);
        policy.multiplier = multiplier;
        policy.max_delay = Duration::from_millis(max_ms);
        policy
    }

    #[test]
    fn test_delay_progression_and_cap() {
        let policy = policy(25, 1_000, 2.0, 10_000);

        // attempt -> expected delay, capped at 10s
        let cases = [
            (1, 1_000),
            (2, 2_000),
            (3, 4_000),
            (4, 8_000),
            (5, 10_000),
            (20, 10_000),
        ];
        for (attempt, expected_ms) in cases {
            assert_eq!(
                policy.delay_for(attempt),
                Duration::from_millis(expected_ms),
                "attempt {attempt}"
            );
        }
    }

    #[test]
    fn test_retry_budget() {
        let mut policy = policy(2, 0, 2.0, 0);
        let id = message_id(42);

        assert!(policy.retry_further(&id));
        policy.failed(&id);
        assert!(policy.retry_further(&id));
        policy.failed(&id);
        assert!(!policy.retry_further(&id));
    }

    #[test]
    fn test_negative_budget_is_unbounded() {
        let mut policy = policy(-1, 0, 2.0, 0);
        let id = message_id(42);

        for _ in 0..100 {
            policy.failed(&id);
        }
        assert!(policy.retry_further(&id));
    }

    #[test]
    fn test_due_message_handed_out_once() {
        let mut policy = policy(25, 0, 2.0, 0);
        let id = message_id(42);

        policy.failed(&id);
        assert_eq!(policy.next_failed_message_to_retry(), Some(id.clone()));
        // Handed out: not due again until it fails again.
        assert_eq!(policy.next_failed_message_to_retry(), None);

        policy.failed(&id);
        assert_eq!(policy.next_failed_message_to_retry(), Some(id));
    }

    #[test]
    fn test_nothing_due_before_deadline() {
        let mut policy = policy(25, 60_000, 2.0, 60_000);
        policy.failed(&message_id(42));

        assert_eq!(policy.next_failed_message_to_retry(), None);
    }

    #[test]
    fn test_earliest_deadline_first() {
        let mut policy = policy(25, 0, 2.0, 0);
        let first = message_id(1);
        let second = message_id(2);

        policy.failed(&first);
        policy.failed(&second);

        assert_eq!(policy.next_failed_message_to_retry(), Some(first));
        assert_eq!(policy.next_failed_message_to_retry(), Some(second));
        assert_eq!(policy.next_failed_message_to_retry(), None);
    }

    #[test]
    fn test_acked_clears_tracking() {
        let mut policy = policy(2, 0, 2.0, 0);
        let id = message_id(42);

        policy.failed(&id);
        policy.failed(&id);
        assert!(!policy.retry_further(&id));

        policy.acked(&id);
        assert!(policy.retry_further(&id));
        assert_eq!(policy.next_failed_message_to_retry(), None);
    }

    #[test]
    fn test_open_reads_config() {
        let mut policy = ExponentialBackoffRetry::new();
        let config = EngineConfig {
            kafka_hosts: "localhost:9092".to_string(),
            kafka_topic: "events".to_string(),
            kafka_tls: false,
            kafka_consumer_offset_reset: "earliest".to_string(),
            poll_timeout_ms: 250,
            deserializer: "json".to_string(),
            retry_policy: "exponential_backoff".to_string(),
            persistence_adapter: "in_memory".to_string(),
            retry_limit: 3,
            retry_initial_delay_ms: 10,
            retry_delay_multiplier: 3.0,
            retry_max_delay_ms: 50,
            consumer_state_flush_interval_secs: 30,
        };

        policy.open(&config);

        assert_eq!(policy.retry_limit, 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(30));
        assert_eq!(policy.delay_for(3), Duration::from_millis(50));
    }
}
