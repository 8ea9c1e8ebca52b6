//! TLS connector construction for `ssl = true` connections
//!
//! Certificate files come from connection params: `sslrootcert` (CA),
//! `sslcert` and `sslkey` (client identity, PEM). Without a CA the server
//! certificate is not verified, matching libpq's `sslmode=require`.

use conduit_core::{ConduitError, ConnectionConfig, Result};
use native_tls::{Certificate, Identity, TlsConnector, TlsConnectorBuilder};
use postgres_native_tls::MakeTlsConnector;
use std::fs;

/// Build a TLS connector from the connection's certificate params
pub fn build_tls_connector(config: &ConnectionConfig) -> Result<MakeTlsConnector> {
    let mut builder = TlsConnector::builder();

    match config.param("sslrootcert").filter(|p| !p.is_empty()) {
        Some(ca_path) => apply_ca_cert(&mut builder, ca_path)?,
        None => {
            tracing::warn!("no sslrootcert configured, server certificate will not be verified");
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
    }

    if let (Some(cert_path), Some(key_path)) = (config.param("sslcert"), config.param("sslkey")) {
        let cert = read_file("client certificate", cert_path)?;
        let key = read_file("client key", key_path)?;
        let identity = Identity::from_pkcs8(&cert, &key).map_err(|e| {
            ConduitError::Connect(format!("Invalid client identity (cert + key): {}", e))
        })?;
        builder.identity(identity);
    }

    let connector = builder
        .build()
        .map_err(|e| ConduitError::Connect(format!("TLS configuration error: {}", e)))?;
    tracing::debug!("TLS connector built successfully");
    Ok(MakeTlsConnector::new(connector))
}

fn apply_ca_cert(builder: &mut TlsConnectorBuilder, path: &str) -> Result<()> {
    let pem = read_file("CA certificate", path)?;
    let cert = Certificate::from_pem(&pem)
        .map_err(|e| ConduitError::Connect(format!("Invalid CA certificate format: {}", e)))?;
    builder.add_root_certificate(cert);
    Ok(())
}

fn read_file(what: &str, path: &str) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|e| ConduitError::Connect(format!("Failed to load {} from {}: {}", what, path, e)))
}

#[cfg(test)]
mod tests;
