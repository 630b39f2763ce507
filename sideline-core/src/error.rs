use crate::types::{ConsumerPartition, MessageId};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("persistence backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("log transport error: {0}")]
    Transport(#[from] anyhow::Error),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown retry policy {0:?}")]
    UnknownRetryPolicy(String),
    #[error("unknown deserializer {0:?}")]
    UnknownDeserializer(String),
    #[error("unknown persistence adapter {0:?}")]
    UnknownPersistenceAdapter(String),
}

/// Errors surfaced by a virtual consumer. The protocol-misuse variants are
/// fatal to the instance; transport and persistence failures bubble up from
/// the collaborators with their own retry behavior already spent.
#[derive(Debug, thiserror::Error)]
pub enum VirtualConsumerError {
    #[error("open may only be called once per virtual consumer")]
    AlreadyOpened,
    #[error("virtual consumer has not been opened")]
    NotOpened,
    #[error("virtual consumer is closed")]
    Closed,
    #[error("virtual consumer id cannot be empty")]
    EmptyConsumerId,
    #[error("no ending offset configured for partition {0}")]
    MissingEndingOffset(ConsumerPartition),
    #[error("message id {0} was issued by a different virtual consumer")]
    ForeignMessageId(MessageId),
    #[error(transparent)]
    Consumer(#[from] ConsumerError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
