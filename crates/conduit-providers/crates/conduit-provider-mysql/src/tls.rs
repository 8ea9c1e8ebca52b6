//! SSL options for `ssl = true` connections

use conduit_core::{ConduitError, ConnectionConfig, Result};
use mysql_async::SslOpts;
use std::path::PathBuf;

/// SSL options for `config`, or `None` when SSL is off
///
/// With an `sslrootcert` param the server certificate is verified against
/// that CA (hostname check skipped, like `VERIFY_CA`); without one any
/// certificate is accepted, like `REQUIRED`.
pub fn ssl_opts_for(config: &ConnectionConfig) -> Result<Option<SslOpts>> {
    if !config.ssl {
        return Ok(None);
    }

    let opts = match config.param("sslrootcert").filter(|p| !p.is_empty()) {
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConduitError::Connect(format!(
                    "Failed to load CA certificate from {}: file not found",
                    path.display()
                )));
            }
            tracing::debug!(path = %path.display(), "adding CA certificate to SSL options");
            SslOpts::default()
                .with_root_certs(vec![path.into()])
                .with_danger_skip_domain_validation(true)
        }
        None => {
            tracing::warn!("no sslrootcert configured, server certificate will not be verified");
            SslOpts::default()
                .with_danger_accept_invalid_certs(true)
                .with_danger_skip_domain_validation(true)
        }
    };
    Ok(Some(opts))
}
