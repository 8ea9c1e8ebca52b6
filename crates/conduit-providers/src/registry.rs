//! Lazy, per-kind provider registry

use conduit_core::{ConduitError, ConnectionProvider, ProtocolKind, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;


/// Builds the provider for one kind on first use
pub type ProviderFactory =
    Box<dyn Fn(ProtocolKind) -> Result<Arc<dyn ConnectionProvider>> + Send + Sync>;

/// One provider instance per protocol kind, created on first access
///
/// The registry lives as long as the broker that owns it. A kind whose
/// provider cannot be built reports `ProviderUnavailable` and leaves every
/// other kind usable.
pub struct ProviderRegistry {
    factory: ProviderFactory,
    providers: Mutex<HashMap<ProtocolKind, Arc<dyn ConnectionProvider>>>,
}

impl ProviderRegistry {
    /// Registry backed by the providers compiled into this build
    pub fn with_defaults() -> Self {
        Self::with_factory(Box::new(builtin_provider))
    }

    pub fn with_factory(factory: ProviderFactory) -> Self {
        Self {
            factory,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Provider for `kind`, constructing and caching it on first use
    pub fn get(&self, kind: ProtocolKind) -> Result<Arc<dyn ConnectionProvider>> {
        let mut providers = self.providers.lock();
        if let Some(provider) = providers.get(&kind) {
            return Ok(provider.clone());
        }

        let provider = (self.factory)(kind).map_err(|e| {
            tracing::warn!(kind = %kind, error = %e, "provider failed to load");
            match e {
                ConduitError::ProviderUnavailable(_) => e,
                _ => ConduitError::ProviderUnavailable(kind),
            }
        })?;
        tracing::info!(kind = %kind, "registering connection provider");
        providers.insert(kind, provider.clone());
        Ok(provider)
    }

    /// Kinds whose provider has been constructed so far
    pub fn loaded(&self) -> Vec<ProtocolKind> {
        let mut kinds: Vec<ProtocolKind> = self.providers.lock().keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    pub fn is_loaded(&self, kind: ProtocolKind) -> bool {
        self.providers.lock().contains_key(&kind)
    }

    /// Close every live session of every loaded provider
    pub async fn shutdown(&self) {
        let providers: Vec<Arc<dyn ConnectionProvider>> =
            self.providers.lock().values().cloned().collect();
        for provider in providers {
            provider.disconnect_all().await;
        }
        tracing::info!("provider registry shut down");
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Construct the built-in provider for `kind`
///
/// Kinds whose provider crate is not compiled in are unavailable.
pub fn builtin_provider(kind: ProtocolKind) -> Result<Arc<dyn ConnectionProvider>> {
    let provider: Arc<dyn ConnectionProvider> = match kind {
        #[cfg(feature = "postgres")]
        ProtocolKind::Postgres => Arc::new(crate::postgres::PostgresProvider::new()),
        #[cfg(feature = "mysql")]
        ProtocolKind::Mysql => Arc::new(crate::mysql::MySqlProvider::new()),
        #[cfg(feature = "mysql")]
        ProtocolKind::Mariadb => Arc::new(crate::mysql::MySqlProvider::mariadb()),
        #[cfg(feature = "sqlite")]
        ProtocolKind::Sqlite => Arc::new(crate::sqlite::SqliteProvider::new()),
        #[cfg(feature = "mssql")]
        ProtocolKind::Mssql => Arc::new(crate::mssql::MssqlProvider::new()),
        #[cfg(feature = "clickhouse")]
        ProtocolKind::Clickhouse => Arc::new(crate::clickhouse::ClickHouseProvider::new()),
        #[cfg(feature = "mongodb")]
        ProtocolKind::Mongodb => Arc::new(crate::mongodb::MongoDbProvider::new()),
        #[cfg(feature = "redis")]
        ProtocolKind::Redis => Arc::new(crate::redis::RedisProvider::new()),
        #[cfg(feature = "neo4j")]
        ProtocolKind::Neo4j => Arc::new(crate::neo4j::Neo4jProvider::new()),
        #[cfg(feature = "elasticsearch")]
        ProtocolKind::Elasticsearch => {
            Arc::new(crate::elasticsearch::ElasticsearchProvider::new())
        }
        #[cfg(feature = "rabbitmq")]
        ProtocolKind::Rabbitmq => Arc::new(crate::rabbitmq::RabbitMqProvider::new()),
        #[cfg(feature = "docker")]
        ProtocolKind::Docker => Arc::new(crate::docker::DockerProvider::new()),
        #[cfg(feature = "ssh")]
        ProtocolKind::Ssh => Arc::new(crate::ssh::SshProvider::new()),
        #[cfg(feature = "ssh")]
        ProtocolKind::Sftp => Arc::new(crate::ssh::SshProvider::sftp()),
        #[cfg(feature = "ftp")]
        ProtocolKind::Ftp => Arc::new(crate::ftp::FtpProvider::new()),
        #[allow(unreachable_patterns)]
        other => return Err(ConduitError::ProviderUnavailable(other)),
    };
    Ok(provider)
}
