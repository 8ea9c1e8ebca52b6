//! Protocol kinds served by the broker

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConduitError;

/// Backend protocol a connection speaks
///
/// The kind is fixed when a connection is created and selects the provider
/// that serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Postgres,
    Mysql,
    Mariadb,
    Sqlite,
    Mssql,
    Clickhouse,
    Mongodb,
    Redis,
    Neo4j,
    Elasticsearch,
    Rabbitmq,
    Docker,
    Ssh,
    Sftp,
    Ftp,
}

impl ProtocolKind {
    /// Every kind, in a stable order
    pub const ALL: [ProtocolKind; 15] = [
        ProtocolKind::Postgres,
        ProtocolKind::Mysql,
        ProtocolKind::Mariadb,
        ProtocolKind::Sqlite,
        ProtocolKind::Mssql,
        ProtocolKind::Clickhouse,
        ProtocolKind::Mongodb,
        ProtocolKind::Redis,
        ProtocolKind::Neo4j,
        ProtocolKind::Elasticsearch,
        ProtocolKind::Rabbitmq,
        ProtocolKind::Docker,
        ProtocolKind::Ssh,
        ProtocolKind::Sftp,
        ProtocolKind::Ftp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Postgres => "postgres",
            ProtocolKind::Mysql => "mysql",
            ProtocolKind::Mariadb => "mariadb",
            ProtocolKind::Sqlite => "sqlite",
            ProtocolKind::Mssql => "mssql",
            ProtocolKind::Clickhouse => "clickhouse",
            ProtocolKind::Mongodb => "mongodb",
            ProtocolKind::Redis => "redis",
            ProtocolKind::Neo4j => "neo4j",
            ProtocolKind::Elasticsearch => "elasticsearch",
            ProtocolKind::Rabbitmq => "rabbitmq",
            ProtocolKind::Docker => "docker",
            ProtocolKind::Ssh => "ssh",
            ProtocolKind::Sftp => "sftp",
            ProtocolKind::Ftp => "ftp",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProtocolKind::Postgres => "PostgreSQL",
            ProtocolKind::Mysql => "MySQL",
            ProtocolKind::Mariadb => "MariaDB",
            ProtocolKind::Sqlite => "SQLite",
            ProtocolKind::Mssql => "SQL Server",
            ProtocolKind::Clickhouse => "ClickHouse",
            ProtocolKind::Mongodb => "MongoDB",
            ProtocolKind::Redis => "Redis",
            ProtocolKind::Neo4j => "Neo4j",
            ProtocolKind::Elasticsearch => "Elasticsearch",
            ProtocolKind::Rabbitmq => "RabbitMQ",
            ProtocolKind::Docker => "Docker",
            ProtocolKind::Ssh => "SSH",
            ProtocolKind::Sftp => "SFTP",
            ProtocolKind::Ftp => "FTP",
        }
    }

    /// Port used when a config leaves `port` empty
    pub fn default_port(&self) -> Option<u16> {
        match self {
            ProtocolKind::Postgres => Some(5432),
            ProtocolKind::Mysql | ProtocolKind::Mariadb => Some(3306),
            ProtocolKind::Sqlite => None,
            ProtocolKind::Mssql => Some(1433),
            ProtocolKind::Clickhouse => Some(8123),
            ProtocolKind::Mongodb => Some(27017),
            ProtocolKind::Redis => Some(6379),
            ProtocolKind::Neo4j => Some(7474),
            ProtocolKind::Elasticsearch => Some(9200),
            ProtocolKind::Rabbitmq => Some(5672),
            ProtocolKind::Docker => None,
            ProtocolKind::Ssh | ProtocolKind::Sftp => Some(22),
            ProtocolKind::Ftp => Some(21),
        }
    }

    /// File-based kinds take a database path and no host/port
    pub fn is_file_based(&self) -> bool {
        matches!(self, ProtocolKind::Sqlite)
    }

    /// Socket-based kinds fall back to a local endpoint when host is omitted
    pub fn allows_local_default(&self) -> bool {
        matches!(self, ProtocolKind::Docker)
    }

    pub fn is_sql(&self) -> bool {
        matches!(
            self,
            ProtocolKind::Postgres
                | ProtocolKind::Mysql
                | ProtocolKind::Mariadb
                | ProtocolKind::Sqlite
                | ProtocolKind::Mssql
                | ProtocolKind::Clickhouse
        )
    }

    /// Networked kinds that cannot run without an explicit host
    pub fn requires_host(&self) -> bool {
        !self.is_file_based() && !self.allows_local_default()
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolKind {
    type Err = ConduitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "postgresql" | "pg" => return Ok(ProtocolKind::Postgres),
            "sqlserver" => return Ok(ProtocolKind::Mssql),
            "mongo" => return Ok(ProtocolKind::Mongodb),
            "amqp" => return Ok(ProtocolKind::Rabbitmq),
            _ => {}
        }
        ProtocolKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ConduitError::Validation(format!("unknown protocol kind '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("postgres", ProtocolKind::Postgres)]
    #[case("PostgreSQL", ProtocolKind::Postgres)]
    #[case("mariadb", ProtocolKind::Mariadb)]
    #[case("sqlserver", ProtocolKind::Mssql)]
    #[case(" sftp ", ProtocolKind::Sftp)]
    fn test_parse_kind(#[case] input: &str, #[case] expected: ProtocolKind) {
        assert_eq!(input.parse::<ProtocolKind>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_kind() {
        let err = "oracle".parse::<ProtocolKind>().unwrap_err();
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn test_serde_is_lowercase() {
        let json = serde_json::to_string(&ProtocolKind::Elasticsearch).unwrap();
        assert_eq!(json, "\"elasticsearch\"");
        for kind in ProtocolKind::ALL {
            let round: ProtocolKind =
                serde_json::from_str(&format!("\"{}\"", kind.as_str())).unwrap();
            assert_eq!(round, kind);
        }
    }

    #[test]
    fn test_kind_classification() {
        assert!(ProtocolKind::Sqlite.is_file_based());
        assert!(!ProtocolKind::Sqlite.requires_host());
        assert!(!ProtocolKind::Docker.requires_host());
        assert!(ProtocolKind::Redis.requires_host());
        assert!(ProtocolKind::Clickhouse.is_sql());
        assert!(!ProtocolKind::Mongodb.is_sql());
        assert_eq!(ProtocolKind::Mariadb.default_port(), Some(3306));
        assert_eq!(ProtocolKind::Docker.default_port(), None);
    }
}
