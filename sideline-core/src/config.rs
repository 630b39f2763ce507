use envconfig::Envconfig;

/// Engine configuration. Collaborator fields (`deserializer`,
/// `retry_policy`, `persistence_adapter`) are registry keys resolved
/// through `ComponentRegistry`; the rest are connection settings and
/// retry tunables.
#[derive(Envconfig, Clone, Debug)]
pub struct EngineConfig {
    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,

    #[envconfig(default = "events")]
    pub kafka_topic: String,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    // Start position when neither an explicit starting state nor a
    // persisted frontier exists: earliest, latest
    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String,

    // Upper bound on how long a single record pull may block
    #[envconfig(default = "250")]
    pub poll_timeout_ms: u64,

    #[envconfig(default = "json")]
    pub deserializer: String,

    #[envconfig(default = "exponential_backoff")]
    pub retry_policy: String,

    #[envconfig(default = "in_memory")]
    pub persistence_adapter: String,

    // Retries permitted per record before it is treated as poison and
    // committed anyway. Negative means unbounded.
    #[envconfig(default = "25")]
    pub retry_limit: i32,

    #[envconfig(default = "1000")]
    pub retry_initial_delay_ms: u64,

    #[envconfig(default = "2.0")]
    pub retry_delay_multiplier: f64,

    #[envconfig(default = "900000")]
    pub retry_max_delay_ms: u64,

    // Cadence at which the supervisor should call flush_state()
    #[envconfig(default = "30")]
    pub consumer_state_flush_interval_secs: u64,
}
