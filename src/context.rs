//! Shared state handed to every workflow.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::EntityCache;
use crate::config::{Config, ExecutorSettings, GovernorSettings, ProbeSettings};
use crate::error::Result;
use crate::executor::BoundedExecutor;
use crate::governor::RateGovernor;
use crate::remote::{EntityRef, RemoteClient, RemoteEntity};
use crate::storage::DataStorage;

/// One remote client, one governor, one cache and the data directory.
pub struct CleanerContext<C> {
    client: C,
    governor: RateGovernor,
    cache: Mutex<EntityCache<RemoteEntity>>,
    storage: DataStorage,
    executor: BoundedExecutor,
    probe: ProbeSettings,
}

impl<C: RemoteClient> CleanerContext<C> {
    pub fn new(client: C, storage: DataStorage, config: &Config) -> Self {
        Self::with_settings(
            client,
            storage,
            config.governor.clone(),
            config.cache_max_age,
            config.executor.clone(),
            config.probe.clone(),
        )
    }

    pub fn with_settings(
        client: C,
        storage: DataStorage,
        governor: GovernorSettings,
        cache_max_age: Duration,
        executor: ExecutorSettings,
        probe: ProbeSettings,
    ) -> Self {
        Self {
            client,
            governor: RateGovernor::new(governor),
            cache: Mutex::new(EntityCache::new(cache_max_age)),
            storage,
            executor: BoundedExecutor::new(executor),
            probe,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    pub fn storage(&self) -> &DataStorage {
        &self.storage
    }

    pub fn executor(&self) -> &BoundedExecutor {
        &self.executor
    }

    pub fn probe(&self) -> &ProbeSettings {
        &self.probe
    }

    fn cache(&self) -> MutexGuard<'_, EntityCache<RemoteEntity>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one remote operation through the governor.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.governor.run(op).await
    }

    /// Resolve an entity, consulting the cache before the remote service.
    pub async fn resolve(&self, target: &EntityRef) -> Result<RemoteEntity> {
        let key = target.cache_key();
        let cached = self.cache().get(&key);
        if let Some(entity) = cached {
            debug!(%key, "Entity cache hit");
            return Ok(entity);
        }

        let client = &self.client;
        let entity = self.call(move || client.resolve(target)).await?;
        self.cache().set(key, entity.clone());
        Ok(entity)
    }

    /// Seed the cache with an entity already known from a dialog listing.
    pub fn remember(&self, target: &EntityRef, entity: RemoteEntity) {
        self.cache().set(target.cache_key(), entity);
    }

    pub fn invalidate(&self, target: Option<&EntityRef>) {
        let key = target.map(EntityRef::cache_key);
        self.cache().invalidate(key.as_deref());
    }

    pub fn cached_entities(&self) -> usize {
        self.cache().len()
    }

    /// Tear down, handing back the client.
    pub fn shutdown(self) -> C {
        info!(
            "Shutting down (backoff delay {:.2}s, {} cached entities)",
            self.governor.delay(),
            self.cached_entities()
        );
        self.client
    }
}
