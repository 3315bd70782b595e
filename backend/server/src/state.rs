use std::sync::Arc;

use board::{
    LeggyStore, config::Config, database::RedisStore, error::Result, store::ensure_board_baseline,
};
use chrono::Utc;
use tracing::info;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn LeggyStore>,
}

impl AppState {
    pub async fn new() -> Result<Arc<Self>> {
        Self::connect(Config::load()?).await
    }

    /// Fails before touching the network when `REDIS_URL` is missing.
    pub async fn connect(config: Config) -> Result<Arc<Self>> {
        let redis_url = config.require_redis_url()?;

        info!("Connecting to Redis...");
        let store: Arc<dyn LeggyStore> = Arc::new(RedisStore::connect(redis_url).await?);

        ensure_board_baseline(store.as_ref(), Utc::now()).await?;

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn LeggyStore>) -> Arc<Self> {
        Arc::new(Self { config, store })
    }
}

#[cfg(test)]
mod tests {
    use board::BoardError;

    use super::*;

    #[tokio::test]
    async fn test_requires_redis_url() {
        let result = AppState::connect(Config::default()).await;

        assert!(matches!(result, Err(BoardError::MissingVar(key)) if key == "REDIS_URL"));
    }
}
