use std::sync::Arc;

use crate::config::Config;
use crate::db::{create_pool as create_db_pool, DbPool};
use crate::object_store::ObjectStore;
use crate::redis::{create_pool as create_redis_pool, RedisPool};

/// Shared process context: configuration plus the infrastructure clients
/// every service crate needs. Built once at startup, cloned freely.
#[derive(Clone)]
pub struct ChatContext {
    pub config: Arc<Config>,
    pub db_pool: Arc<DbPool>,
    pub redis_pool: RedisPool,
    pub object_store: ObjectStore,
}

impl ChatContext {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = create_db_pool(&config.database).await?;
        let redis_pool = create_redis_pool(&config.redis).await?;
        let object_store = ObjectStore::new(&config.storage).await;

        Ok(ChatContext {
            config: Arc::new(config),
            db_pool,
            redis_pool,
            object_store,
        })
    }
}
