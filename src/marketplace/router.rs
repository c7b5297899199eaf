//! Routing from marketplace keys to long-lived region clients.

use crate::config::Config;
use crate::error::Error;
use crate::marketplace::client::{CatalogApi, SpApiClient};
use crate::marketplace::regions::{Marketplace, RegionKey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Shared handle to a region client.
pub type ClientHandle = Arc<dyn CatalogApi>;

/// A resolved marketplace key: the marketplace and the client serving it.
#[derive(Clone)]
pub struct Route {
    pub marketplace: Marketplace,
    pub client: ClientHandle,
}

/// Constructs region clients. Called at most once per [`RegionKey`] by the
/// router, so credential setup may happen here.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, key: RegionKey) -> anyhow::Result<ClientHandle>;
}

/// Factory for real Selling Partner API clients.
pub struct SpApiFactory {
    config: Config,
}

impl SpApiFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ClientFactory for SpApiFactory {
    async fn connect(&self, key: RegionKey) -> anyhow::Result<ClientHandle> {
        let client = SpApiClient::new(&self.config, key)?;
        Ok(Arc::new(client))
    }
}

/// Registry of region clients, created lazily and kept for the router's
/// lifetime. Handles are never replaced once built.
pub struct RegionRouter {
    factory: Arc<dyn ClientFactory>,
    clients: Mutex<HashMap<RegionKey, Arc<OnceCell<ClientHandle>>>>,
}

impl RegionRouter {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self { factory, clients: Mutex::new(HashMap::new()) }
    }

    /// Router backed by [`SpApiFactory`].
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(SpApiFactory::new(config.clone())))
    }

    /// Resolves a marketplace key to the client for its region and profile.
    pub async fn resolve(&self, marketplace_key: &str) -> Result<Route, Error> {
        let marketplace = Marketplace::lookup(marketplace_key)?;
        let client = self.client_for(marketplace.region_key()).await?;
        Ok(Route { marketplace, client })
    }

    /// Returns the cached client for `key`, building it on first use.
    ///
    /// Concurrent first calls for the same key share one construction. A
    /// failed construction is not cached; the next call tries again.
    pub async fn client_for(&self, key: RegionKey) -> Result<ClientHandle, Error> {
        let cell = {
            let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
            clients.entry(key).or_default().clone()
        };

        cell.get_or_try_init(|| async {
            info!("Creating client for region {}", key);
            self.factory.connect(key).await.map_err(|e| Error::ClientSetup {
                region: key.to_string(),
                message: format!("{:#}", e),
            })
        })
        .await
        .cloned()
        .inspect(|_| debug!("Resolved client for {}", key))
    }

    /// Number of region clients built so far.
    #[cfg(test)]
    pub fn cached(&self) -> usize {
        let clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.values().filter(|cell| cell.initialized()).count()
    }
}
