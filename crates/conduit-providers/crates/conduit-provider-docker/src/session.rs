//! Docker Engine session wrapper

use bollard::container::{
    InspectContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
    RestartContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::ListImagesOptions;
use bollard::network::ListNetworksOptions;
use bollard::volume::ListVolumesOptions;
use bollard::{API_DEFAULT_VERSION, Docker};
use conduit_core::{
    ConduitError, ConnectionConfig, Endpoint, ExecOutput, MetadataNode, NodeKind, Result,
};
use futures::TryStreamExt;
use serde_json::{Value as Json, json};

use crate::command::DockerCommand;
use crate::target::DockerTarget;

/// Per-request timeout handed to bollard, in seconds
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// One Engine API client
pub struct DockerSession {
    docker: Docker,
}

impl DockerSession {
    /// Build the client for the resolved target and `ping` the daemon
    #[tracing::instrument(skip(config, endpoint), fields(connection = %config.name))]
    pub async fn connect(config: &ConnectionConfig, endpoint: &Endpoint) -> Result<Self> {
        let target = DockerTarget::resolve(config, endpoint)?;
        tracing::debug!(?target, "resolved Docker target");
        let docker = match &target {
            DockerTarget::LocalDefaults => Docker::connect_with_local_defaults(),
            DockerTarget::Socket(path) => {
                Docker::connect_with_socket(path, REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            DockerTarget::Http(address) => {
                Docker::connect_with_http(address, REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            DockerTarget::Ssl {
                address,
                key,
                cert,
                ca,
            } => Docker::connect_with_ssl(
                address,
                key,
                cert,
                ca,
                REQUEST_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            ),
        }
        .map_err(|e| ConduitError::Connect(format!("Failed to create Docker client: {}", e)))?;

        docker
            .ping()
            .await
            .map_err(|e| ConduitError::Connect(format!("Failed to reach Docker daemon: {}", e)))?;

        tracing::info!("Docker connection established");
        Ok(Self { docker })
    }

    /// Run one vocabulary command
    pub async fn run(&self, input: &str) -> Result<ExecOutput> {
        let command = DockerCommand::parse(input)?;
        tracing::debug!(?command, "Docker command");
        let docker = &self.docker;

        let output = match command {
            DockerCommand::Containers => ExecOutput::Documents(to_documents(
                docker
                    .list_containers(Some(ListContainersOptions::<String> {
                        all: true,
                        ..Default::default()
                    }))
                    .await
                    .map_err(exec_error)?,
            )?),
            DockerCommand::Images => ExecOutput::Documents(to_documents(
                docker
                    .list_images(Some(ListImagesOptions::<String>::default()))
                    .await
                    .map_err(exec_error)?,
            )?),
            DockerCommand::Volumes => ExecOutput::Documents(to_documents(
                docker
                    .list_volumes(None::<ListVolumesOptions<String>>)
                    .await
                    .map_err(exec_error)?
                    .volumes
                    .unwrap_or_default(),
            )?),
            DockerCommand::Networks => ExecOutput::Documents(to_documents(
                docker
                    .list_networks(None::<ListNetworksOptions<String>>)
                    .await
                    .map_err(exec_error)?,
            )?),
            DockerCommand::Start(id) => {
                docker
                    .start_container(&id, None::<StartContainerOptions<String>>)
                    .await
                    .map_err(exec_error)?;
                action(&id, "started")
            }
            DockerCommand::Stop(id) => {
                docker
                    .stop_container(&id, None::<StopContainerOptions>)
                    .await
                    .map_err(exec_error)?;
                action(&id, "stopped")
            }
            DockerCommand::Restart(id) => {
                docker
                    .restart_container(&id, None::<RestartContainerOptions>)
                    .await
                    .map_err(exec_error)?;
                action(&id, "restarted")
            }
            DockerCommand::Remove(id) => {
                docker
                    .remove_container(&id, None::<RemoveContainerOptions>)
                    .await
                    .map_err(exec_error)?;
                action(&id, "removed")
            }
            DockerCommand::Logs { container, tail } => {
                let options = LogsOptions::<String> {
                    stdout: true,
                    stderr: true,
                    tail: tail.to_string(),
                    ..Default::default()
                };
                let chunks: Vec<String> = docker
                    .logs(&container, Some(options))
                    .map_ok(|chunk| chunk.to_string())
                    .try_collect()
                    .await
                    .map_err(exec_error)?;
                ExecOutput::Text(chunks.concat())
            }
            DockerCommand::Inspect(id) => ExecOutput::Json(serde_json::to_value(
                docker
                    .inspect_container(&id, None::<InspectContainerOptions>)
                    .await
                    .map_err(exec_error)?,
            )?),
            DockerCommand::Version => {
                ExecOutput::Json(serde_json::to_value(docker.version().await.map_err(exec_error)?)?)
            }
        };
        Ok(output)
    }

    /// Containers, images, volumes and networks as four categories
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let docker = &self.docker;

        let containers = docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(exec_error)?
            .into_iter()
            .filter_map(|c| {
                c.names
                    .and_then(|names| names.into_iter().next())
                    .map(|name| name.trim_start_matches('/').to_string())
                    .or(c.id.map(|id| short_id(&id)))
            });

        let images = docker
            .list_images(Some(ListImagesOptions::<String>::default()))
            .await
            .map_err(exec_error)?
            .into_iter()
            .map(|image| {
                image
                    .repo_tags
                    .into_iter()
                    .find(|tag| tag != "<none>:<none>")
                    .unwrap_or_else(|| short_id(&image.id))
            });

        let volumes = docker
            .list_volumes(None::<ListVolumesOptions<String>>)
            .await
            .map_err(exec_error)?
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.name);

        let networks = docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await
            .map_err(exec_error)?
            .into_iter()
            .filter_map(|n| n.name);

        Ok(vec![
            category("Containers", NodeKind::Container, containers),
            category("Images", NodeKind::Image, images),
            category("Volumes", NodeKind::Volume, volumes),
            category("Networks", NodeKind::Network, networks),
        ])
    }
}

fn category(name: &str, kind: NodeKind, items: impl Iterator<Item = String>) -> MetadataNode {
    let mut names: Vec<String> = items.collect();
    names.sort();
    MetadataNode::branch(
        name,
        NodeKind::Category,
        names
            .into_iter()
            .map(|n| MetadataNode::leaf(n, kind))
            .collect(),
    )
}

/// First 12 hex digits, without any `sha256:` prefix
pub(crate) fn short_id(id: &str) -> String {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.chars().take(12).collect()
}

fn action(id: &str, done: &str) -> ExecOutput {
    ExecOutput::Json(json!({ "container": id, "status": done }))
}

fn to_documents<T: serde::Serialize>(items: Vec<T>) -> Result<Vec<Json>> {
    items
        .into_iter()
        .map(|item| serde_json::to_value(item).map_err(Into::into))
        .collect()
}

fn exec_error(e: bollard::errors::Error) -> ConduitError {
    ConduitError::Exec(e.to_string())
}
