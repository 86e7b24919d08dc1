use std::sync::Arc;

use tracing::info;

use crate::{
    config::{Config, StoreBackend},
    database::RedisStore,
    error::AppError,
    id::RecordId,
    store::{MemoryStore, Store},
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn Store> = match config.store_backend {
            StoreBackend::Memory => {
                info!("Using in-memory store");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Redis => {
                info!("Connecting to Redis at {}", config.redis_url);
                Arc::new(RedisStore::connect(&config.redis_url, &config.redis_namespace).await?)
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self { config, store })
    }

    /// Reads a record key, rejecting anything the store could not have issued.
    pub fn key(&self, raw: &str) -> Result<RecordId, AppError> {
        self.store.parse_key(raw).ok_or(AppError::InvalidIdentifier)
    }
}
