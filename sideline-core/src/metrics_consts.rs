// All series carry a `consumer_id` label identifying the virtual consumer.

/// Counter for records dropped by the filter chain.
pub const MESSAGES_FILTERED: &str = "sideline_consumer_messages_filtered_total";

/// Counter for records reported failed and queued for retry.
pub const MESSAGES_FAILED: &str = "sideline_consumer_messages_failed_total";

/// Counter for records committed after exhausting their retry budget.
pub const RETRY_LIMIT_EXCEEDED: &str = "sideline_consumer_retry_limit_exceeded_total";

/// Counter for records whose payload could not be deserialized and whose
/// offset was committed to keep the frontier moving.
pub const POISON_PILLS: &str = "sideline_consumer_poison_pills_total";

/// Gauge for records emitted and still awaiting ack or terminal fail.
pub const IN_FLIGHT_MESSAGES: &str = "sideline_consumer_in_flight_messages";
