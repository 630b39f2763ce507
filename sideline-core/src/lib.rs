//! Engine for sidelineable consumption of a partitioned, offset-addressed
//! log. The unit of composition is the virtual consumer: one logical
//! consumer identity with its own filter chain, in-flight tracking, retry
//! policy, and optional range bounds, many of which a host multiplexes
//! side by side (one unbounded firehose, any number of bounded replays).

mod config;
mod consumer;
mod deserializer;
mod error;
mod filter;
mod persistence;
mod registry;
mod retry;
mod state;
mod stop;
mod types;
mod virtual_consumer;

// Metric names are shared with adapter crates.
pub mod metrics_consts;

// Types
pub use types::ConsumerPartition;
pub use types::Message;
pub use types::MessageId;
pub use types::Record;
pub use types::SidelineRequestId;
pub use types::Values;
pub use types::VirtualConsumerId;

// Consumer state snapshots, used as bounds and as frontier reports
pub use state::ConsumerState;
pub use state::ConsumerStateBuilder;

// Errors
pub use error::ConsumerError;
pub use error::PersistenceError;
pub use error::RegistryError;
pub use error::VirtualConsumerError;

// Capability seams
pub use consumer::LogConsumer;
pub use deserializer::{Deserializer, JsonDeserializer, Utf8StringDeserializer};
pub use persistence::{InMemoryPersistenceAdapter, PersistenceAdapter};
pub use retry::{ExponentialBackoffRetry, NeverRetry, RetryPolicy};

// Filtering
pub use filter::{FilterChain, FilterStep};

// Configuration and collaborator selection
pub use config::EngineConfig;
pub use registry::ComponentRegistry;

// Cooperative cancellation
pub use stop::{InterruptHandle, StopSignal};

// The orchestrator
pub use virtual_consumer::{VirtualConsumer, VirtualConsumerBuilder};
