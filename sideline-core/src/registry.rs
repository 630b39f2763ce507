use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::deserializer::{Deserializer, JsonDeserializer, Utf8StringDeserializer};
use crate::error::RegistryError;
use crate::persistence::{InMemoryPersistenceAdapter, PersistenceAdapter};
use crate::retry::{ExponentialBackoffRetry, NeverRetry, RetryPolicy};

type RetryPolicyFactory = Box<dyn Fn(&EngineConfig) -> Box<dyn RetryPolicy> + Send + Sync>;
type DeserializerFactory = Box<dyn Fn(&EngineConfig) -> Arc<dyn Deserializer> + Send + Sync>;
type PersistenceFactory = Box<dyn Fn(&EngineConfig) -> Arc<dyn PersistenceAdapter> + Send + Sync>;

/// Maps the configuration's collaborator keys to constructors, so the
/// implementation behind each seam can be swapped without touching the
/// engine. Ships with the in-tree implementations registered; hosts
/// register their own under new keys before resolving.
///
/// Adapters are constructed fresh on every call; a persistence adapter
/// meant to be shared across virtual consumers should be resolved once
/// and the `Arc` cloned.
pub struct ComponentRegistry {
    retry_policies: HashMap<String, RetryPolicyFactory>,
    deserializers: HashMap<String, DeserializerFactory>,
    persistence_adapters: HashMap<String, PersistenceFactory>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        let mut registry = Self {
            retry_policies: HashMap::new(),
            deserializers: HashMap::new(),
            persistence_adapters: HashMap::new(),
        };
        registry.register_retry_policy("never", |_| Box::new(NeverRetry::new()));
        registry.register_retry_policy("exponential_backoff", |_| {
            Box::new(ExponentialBackoffRetry::new())
        });
        registry.register_deserializer("json", |_| Arc::new(JsonDeserializer::new()));
        registry.register_deserializer("utf8_string", |_| Arc::new(Utf8StringDeserializer::new()));
        registry.register_persistence_adapter("in_memory", |_| {
            Arc::new(InMemoryPersistenceAdapter::new())
        });
        registry
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_retry_policy(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&EngineConfig) -> Box<dyn RetryPolicy> + Send + Sync + 'static,
    ) {
        self.retry_policies.insert(name.into(), Box::new(factory));
    }

    pub fn register_deserializer(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&EngineConfig) -> Arc<dyn Deserializer> + Send + Sync + 'static,
    ) {
        self.deserializers.insert(name.into(), Box::new(factory));
    }

    pub fn register_persistence_adapter(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&EngineConfig) -> Arc<dyn PersistenceAdapter> + Send + Sync + 'static,
    ) {
        self.persistence_adapters.insert(name.into(), Box::new(factory));
    }

    pub fn retry_policy(&self, config: &EngineConfig) -> Result<Box<dyn RetryPolicy>, RegistryError> {
        let factory = self
            .retry_policies
            .get(&config.retry_policy)
            .ok_or_else(|| RegistryError::UnknownRetryPolicy(config.retry_policy.clone()))?;
        Ok(factory(config))
    }

    pub fn deserializer(&self, config: &EngineConfig) -> Result<Arc<dyn Deserializer>, RegistryError> {
        let factory = self
            .deserializers
            .get(&config.deserializer)
            .ok_or_else(|| RegistryError::UnknownDeserializer(config.deserializer.clone()))?;
        Ok(factory(config))
    }

    pub fn persistence_adapter(
        &self,
        config: &EngineConfig,
    ) -> Result<Arc<dyn PersistenceAdapter>, RegistryError> {
        let factory = self
            .persistence_adapters
            .get(&config.persistence_adapter)
            .ok_or_else(|| {
                RegistryError::UnknownPersistenceAdapter(config.persistence_adapter.clone())
            })?;
        Ok(factory(config))
    }
}
