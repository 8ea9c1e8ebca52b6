use super::*;
use conduit_core::ProtocolKind;
use pretty_assertions::assert_eq;

fn config() -> ConnectionConfig {
    ConnectionConfig::new("engine", ProtocolKind::Docker)
}

#[test]
fn test_no_host_uses_local_defaults() {
    let config = config();
    assert_eq!(
        DockerTarget::resolve(&config, &config.direct_endpoint()).unwrap(),
        DockerTarget::LocalDefaults
    );
}

#[test]
fn test_socket_param_wins() {
    let config = config()
        .with_host("build-box")
        .with_param("socket", "/run/user/1000/docker.sock");
    assert_eq!(
        DockerTarget::resolve(&config, &Endpoint::new("build-box", 2375)).unwrap(),
        DockerTarget::Socket("/run/user/1000/docker.sock".into())
    );
}

#[test]
fn test_host_uses_endpoint() {
    let config = config().with_host("build-box").with_port(2375);
    assert_eq!(
        DockerTarget::resolve(&config, &Endpoint::local(40123)).unwrap(),
        DockerTarget::Http("tcp://127.0.0.1:40123".into())
    );
}

#[test]
fn test_host_without_port() {
    let config = config().with_host("build-box");
    let err = DockerTarget::resolve(&config, &config.direct_endpoint()).unwrap_err();
    assert!(err.to_string().contains("has a host but no port"));
}

#[test]
fn test_tls_requires_cert_paths() {
    let config = config()
        .with_host("build-box")
        .with_port(2376)
        .with_ssl(true)
        .with_param("ssl_key", "/certs/key.pem")
        .with_param("ssl_cert", "/certs/cert.pem");
    let err = DockerTarget::resolve(&config, &config.direct_endpoint()).unwrap_err();
    assert!(err.to_string().contains("'ssl_ca'"));

    let config = config.with_param("ssl_ca", "/certs/ca.pem");
    assert_eq!(
        DockerTarget::resolve(&config, &config.direct_endpoint()).unwrap(),
        DockerTarget::Ssl {
            address: "tcp://build-box:2376".into(),
            key: "/certs/key.pem".into(),
            cert: "/certs/cert.pem".into(),
            ca: "/certs/ca.pem".into(),
        }
    );
}
