//! RabbitMQ session: one AMQP connection plus the management client

use conduit_core::{
    ConduitError, ConnectionConfig, Credential, Endpoint, ExecOutput, MetadataNode, Result,
};
use lapin::options::{
    BasicGetOptions, BasicPublishOptions, QueueDeclareOptions, QueueDeleteOptions,
    QueuePurgeOptions,
};
use lapin::types::FieldTable;
use lapin::uri::{AMQPAuthority, AMQPScheme, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use reqwest::Url;
use serde_json::json;

use crate::command::QueueCommand;
use crate::management::{DEFAULT_MANAGEMENT_PORT, ManagementApi};

const DEFAULT_VHOST: &str = "/";

/// One AMQP connection; each command runs on its own channel
///
/// A failed AMQP operation closes its channel, so channels are never reused
/// across commands.
pub struct RabbitMqSession {
    connection: Connection,
    management: ManagementApi,
}

impl RabbitMqSession {
    /// Open the AMQP connection and a probe channel
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let vhost = config
            .database
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_VHOST.to_string());

        let mut userinfo = AMQPUserInfo::default();
        if let Some(user) = credential.resolve_username(config.username.as_deref()) {
            userinfo.username = user.to_string();
        }
        if let Some(password) = credential.password.as_deref() {
            userinfo.password = password.to_string();
        }

        let management = ManagementApi::new(
            management_url(config)?,
            vhost.clone(),
            userinfo.username.clone(),
            userinfo.password.clone(),
        )?;

        let uri = AMQPUri {
            scheme: if config.ssl {
                AMQPScheme::AMQPS
            } else {
                AMQPScheme::AMQP
            },
            authority: AMQPAuthority {
                userinfo,
                host: endpoint.host.clone(),
                port: endpoint.port,
            },
            vhost,
            query: Default::default(),
        };

        let connection = Connection::connect_uri(uri, ConnectionProperties::default())
            .await
            .map_err(|e| ConduitError::Connect(format!("Failed to connect to RabbitMQ: {}", e)))?;
        let probe = connection
            .create_channel()
            .await
            .map_err(|e| ConduitError::Connect(format!("RabbitMQ channel open failed: {}", e)))?;
        close_channel(probe).await;

        tracing::info!("RabbitMQ connection established");
        Ok(Self {
            connection,
            management,
        })
    }

    /// Run one queue command on a fresh channel
    pub async fn run(&self, input: &str) -> Result<ExecOutput> {
        let command = QueueCommand::parse(input)?;
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(exec_error)?;
        let result = run_command(&channel, &command).await;
        close_channel(channel).await;
        result.map(ExecOutput::Json)
    }

    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        self.management.metadata().await
    }

    pub async fn close(&self) -> Result<()> {
        self.connection
            .close(200, "conduit disconnect")
            .await
            .map_err(|e| ConduitError::Exec(format!("RabbitMQ close failed: {}", e)))
    }
}

async fn run_command(channel: &Channel, command: &QueueCommand) -> Result<serde_json::Value> {
    let queue = command.queue();
    tracing::debug!(?command, "RabbitMQ command");
    match command {
        QueueCommand::Publish { message, .. } => {
            channel
                .basic_publish(
                    "",
                    queue,
                    BasicPublishOptions::default(),
                    message.as_bytes(),
                    BasicProperties::default(),
                )
                .await
                .map_err(exec_error)?
                .await
                .map_err(exec_error)?;
            Ok(json!({ "queue": queue, "published": true, "bytes": message.len() }))
        }
        QueueCommand::Get { .. } => {
            let options = BasicGetOptions { no_ack: true };
            let message = channel
                .basic_get(queue, options)
                .await
                .map_err(exec_error)?;
            Ok(match message {
                Some(message) => json!({
                    "queue": queue,
                    "message": String::from_utf8_lossy(&message.delivery.data),
                    "redelivered": message.delivery.redelivered,
                    "remaining": message.message_count,
                }),
                None => json!({ "queue": queue, "message": null, "remaining": 0 }),
            })
        }
        QueueCommand::Declare { .. } => {
            let options = QueueDeclareOptions {
                durable: true,
                ..Default::default()
            };
            let declared = channel
                .queue_declare(queue, options, FieldTable::default())
                .await
                .map_err(exec_error)?;
            Ok(json!({
                "queue": declared.name().as_str(),
                "messages": declared.message_count(),
                "consumers": declared.consumer_count(),
            }))
        }
        QueueCommand::Purge { .. } => {
            let purged = channel
                .queue_purge(queue, QueuePurgeOptions::default())
                .await
                .map_err(exec_error)?;
            Ok(json!({ "queue": queue, "purged": purged }))
        }
        QueueCommand::Delete { .. } => {
            let dropped = channel
                .queue_delete(queue, QueueDeleteOptions::default())
                .await
                .map_err(exec_error)?;
            Ok(json!({ "queue": queue, "deleted": true, "messagesDropped": dropped }))
        }
        QueueCommand::Count { .. } => {
            let options = QueueDeclareOptions {
                passive: true,
                ..Default::default()
            };
            let declared = channel
                .queue_declare(queue, options, FieldTable::default())
                .await
                .map_err(exec_error)?;
            Ok(json!({
                "queue": queue,
                "messages": declared.message_count(),
                "consumers": declared.consumer_count(),
            }))
        }
    }
}

/// Management API base: the configured host on `management_port` (15672)
///
/// The API is addressed directly even when AMQP runs through a tunnel.
pub(crate) fn management_url(config: &ConnectionConfig) -> Result<Url> {
    let port = match config.param("management_port") {
        Some(raw) => raw.parse::<u16>().map_err(|_| {
            ConduitError::Validation(format!("Invalid management_port '{}'", raw))
        })?,
        None => DEFAULT_MANAGEMENT_PORT,
    };
    let scheme = if config.ssl { "https" } else { "http" };
    Url::parse(&format!("{}://{}:{}/", scheme, config.effective_host(), port))
        .map_err(|e| ConduitError::Validation(format!("Invalid management URL: {}", e)))
}

async fn close_channel(channel: Channel) {
    if channel.status().connected() {
        if let Err(e) = channel.close(200, "done").await {
            tracing::debug!(error = %e, "RabbitMQ channel close failed");
        }
    }
}

fn exec_error(e: lapin::Error) -> ConduitError {
    ConduitError::Exec(e.to_string())
}
