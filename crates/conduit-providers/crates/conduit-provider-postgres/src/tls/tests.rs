use super::*;
use conduit_core::ProtocolKind;

#[test]
fn test_connector_without_certificates() {
    let config = ConnectionConfig::new("pg", ProtocolKind::Postgres).with_ssl(true);
    assert!(build_tls_connector(&config).is_ok());
}

#[test]
fn test_missing_ca_file_names_path() {
    let config = ConnectionConfig::new("pg", ProtocolKind::Postgres)
        .with_ssl(true)
        .with_param("sslrootcert", "/nonexistent/ca.pem");
    let err = build_tls_connector(&config).err().unwrap();
    assert!(matches!(err, ConduitError::Connect(_)));
    assert!(err.to_string().contains("/nonexistent/ca.pem"));
}

#[test]
fn test_invalid_ca_contents_rejected() {
    let dir = std::env::temp_dir().join(format!("conduit-tls-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    let ca = dir.join("ca.pem");
    fs::write(&ca, "not a certificate").unwrap();

    let config = ConnectionConfig::new("pg", ProtocolKind::Postgres)
        .with_ssl(true)
        .with_param("sslrootcert", ca.to_string_lossy());
    let err = build_tls_connector(&config).err().unwrap();
    assert!(err.to_string().contains("Invalid CA certificate"));

    fs::remove_dir_all(&dir).unwrap();
}
