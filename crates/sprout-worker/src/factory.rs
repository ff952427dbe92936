//! Builds the store, event log and orchestrator from configuration

use std::sync::Arc;

use eyre::{Result, WrapErr};
use tracing::info;

use sprout_kube::{KubeClient, KubeConfig};
use sprout_store::{RedisEventLog, RedisStateStore};

use crate::config::Config;

/// Connected backends shared by the reconciler and consumer loop
pub struct Components {
    pub store: Arc<RedisStateStore>,
    pub events: Arc<RedisEventLog>,
    pub orchestrator: Arc<KubeClient>,
}

impl Components {
    /// Connect to the store and prepare the platform client
    ///
    /// # Errors
    /// Returns error if the store cannot be reached or the platform client
    /// cannot be configured
    pub async fn connect(config: &Config) -> Result<Self> {
        let settings = config.redis_settings()?;
        info!(
            host = %config.redis.host,
            port = config.redis.port,
            db = config.redis.db,
            "connecting to state store"
        );
        let conn = sprout_store::connect(&settings)
            .await
            .wrap_err("failed to connect to state store")?;

        let store = Arc::new(RedisStateStore::new(conn.clone()));
        let events = Arc::new(RedisEventLog::new(
            conn,
            config.stream.name.clone(),
            config.stream.group.clone(),
            config.stream.max_len,
        ));

        let kube = KubeConfig::infer(
            &config.kubernetes.namespace,
            &config.kubernetes.api_url,
            config.kubernetes.token.clone(),
        );
        let orchestrator =
            Arc::new(KubeClient::new(kube).wrap_err("failed to build Kubernetes client")?);

        Ok(Self {
            store,
            events,
            orchestrator,
        })
    }
}
