//! Per-kind shape rules checked before any I/O

use conduit_core::{ConduitError, ConnectionConfig, ProtocolKind, Result};

fn blank(value: Option<&str>) -> bool {
    value.map(str::trim).is_none_or(str::is_empty)
}

fn invalid(config: &ConnectionConfig, message: &str) -> ConduitError {
    ConduitError::Validation(format!(
        "{} connection '{}' {}",
        config.kind.display_name(),
        config.name,
        message
    ))
}

/// Reject configs whose shape cannot work for their kind
pub fn validate_config(config: &ConnectionConfig) -> Result<()> {
    if config.name.trim().is_empty() {
        return Err(ConduitError::Validation("connection name cannot be empty".into()));
    }
    if config.port == Some(0) {
        return Err(invalid(config, "has port 0"));
    }

    if config.kind.is_file_based() {
        if blank(config.database.as_deref()) {
            return Err(invalid(config, "requires a database file path"));
        }
        if !blank(config.host.as_deref()) || config.port.is_some() {
            return Err(invalid(config, "is file based and takes no host or port"));
        }
        if config.ssh_tunnel.is_some() {
            return Err(invalid(config, "is file based and cannot use an SSH tunnel"));
        }
        return Ok(());
    }

    if config.kind.requires_host() && blank(config.host.as_deref()) {
        return Err(invalid(config, "requires a host"));
    }

    if let Some(tunnel) = &config.ssh_tunnel {
        if tunnel.host.trim().is_empty() {
            return Err(invalid(config, "has an SSH tunnel without a bastion host"));
        }
        if tunnel.username.trim().is_empty() {
            return Err(invalid(config, "has an SSH tunnel without a bastion username"));
        }
        if tunnel.port == 0 {
            return Err(invalid(config, "has an SSH tunnel on port 0"));
        }
        if config.effective_port().is_none() {
            return Err(invalid(config, "needs an explicit port to be tunnelled"));
        }
    }

    if matches!(config.kind, ProtocolKind::Ssh | ProtocolKind::Sftp)
        && blank(config.username.as_deref())
    {
        return Err(invalid(config, "requires a username"));
    }

    Ok(())
}

/// Kinds that can connect with no stored credential at all
///
/// Everything else fails fast with `MissingCredentials` when the secret
/// store has no entry.
pub fn credential_optional(kind: ProtocolKind) -> bool {
    matches!(kind, ProtocolKind::Sqlite | ProtocolKind::Docker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::SshTunnelDescriptor;
    use rstest::rstest;

    #[rstest]
    #[case(ProtocolKind::Postgres)]
    #[case(ProtocolKind::Mysql)]
    #[case(ProtocolKind::Mongodb)]
    #[case(ProtocolKind::Redis)]
    #[case(ProtocolKind::Neo4j)]
    #[case(ProtocolKind::Elasticsearch)]
    #[case(ProtocolKind::Rabbitmq)]
    #[case(ProtocolKind::Ftp)]
    fn test_networked_kinds_require_host(#[case] kind: ProtocolKind) {
        let config = ConnectionConfig::new("c", kind);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("requires a host"), "{}", err);

        let config = ConnectionConfig::new("c", kind).with_host("db.internal");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_docker_may_omit_host() {
        let config = ConnectionConfig::new("local docker", ProtocolKind::Docker);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_sqlite_rules() {
        let config = ConnectionConfig::new("file", ProtocolKind::Sqlite);
        assert!(validate_config(&config).is_err());

        let config = config.with_database("/tmp/app.db");
        assert!(validate_config(&config).is_ok());

        let with_host = config.clone().with_host("localhost");
        assert!(validate_config(&with_host).is_err());

        let with_port = config.with_port(1234);
        assert!(validate_config(&with_port).is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = ConnectionConfig::new("   ", ProtocolKind::Redis).with_host("h");
        assert!(matches!(
            validate_config(&config),
            Err(ConduitError::Validation(_))
        ));
    }

    #[test]
    fn test_ssh_requires_username() {
        let config = ConnectionConfig::new("box", ProtocolKind::Ssh).with_host("h");
        assert!(validate_config(&config).is_err());
        assert!(validate_config(&config.with_username("deploy")).is_ok());
    }

    #[test]
    fn test_tunnel_descriptor_checked() {
        let base = ConnectionConfig::new("pg", ProtocolKind::Postgres).with_host("10.0.0.5");

        let missing_user = base
            .clone()
            .with_ssh_tunnel(SshTunnelDescriptor::new("bastion", ""));
        assert!(validate_config(&missing_user).is_err());

        let ok = base.with_ssh_tunnel(SshTunnelDescriptor::new("bastion", "ops"));
        assert!(validate_config(&ok).is_ok());

        let docker = ConnectionConfig::new("d", ProtocolKind::Docker)
            .with_host("10.0.0.9")
            .with_ssh_tunnel(SshTunnelDescriptor::new("bastion", "ops"));
        assert!(validate_config(&docker)
            .unwrap_err()
            .to_string()
            .contains("explicit port"));
    }

    #[test]
    fn test_zero_port_rejected() {
        let config = ConnectionConfig::new("r", ProtocolKind::Redis)
            .with_host("h")
            .with_port(0);
        assert!(validate_config(&config).is_err());
    }
}
