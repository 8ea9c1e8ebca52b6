//! Conduit Providers - protocol provider implementations
//!
//! Re-exports each provider crate enabled by feature and the lazy
//! `ProviderRegistry` that hands them out by protocol kind.

// SQL family
#[cfg(feature = "clickhouse")]
pub use conduit_provider_clickhouse as clickhouse;
#[cfg(feature = "mssql")]
pub use conduit_provider_mssql as mssql;
#[cfg(feature = "mysql")]
pub use conduit_provider_mysql as mysql;
#[cfg(feature = "postgres")]
pub use conduit_provider_postgres as postgres;
#[cfg(feature = "sqlite")]
pub use conduit_provider_sqlite as sqlite;

// Document, key-value and graph stores
#[cfg(feature = "elasticsearch")]
pub use conduit_provider_elasticsearch as elasticsearch;
#[cfg(feature = "mongodb")]
pub use conduit_provider_mongodb as mongodb;
#[cfg(feature = "neo4j")]
pub use conduit_provider_neo4j as neo4j;
#[cfg(feature = "redis")]
pub use conduit_provider_redis as redis;

// Services
#[cfg(feature = "docker")]
pub use conduit_provider_docker as docker;
#[cfg(feature = "ftp")]
pub use conduit_provider_ftp as ftp;
#[cfg(feature = "rabbitmq")]
pub use conduit_provider_rabbitmq as rabbitmq;
#[cfg(feature = "ssh")]
pub use conduit_provider_ssh as ssh;

mod registry;

pub use registry::{ProviderFactory, ProviderRegistry, builtin_provider};

/// Re-export commonly used types from conduit-core
pub use conduit_core::{
    ConduitError, ConnectionConfig, ConnectionProvider, Credential, Endpoint, ExecOutput,
    MetadataNode, ProtocolKind, Result,
};
