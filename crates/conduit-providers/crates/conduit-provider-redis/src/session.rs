//! Redis session wrapper

use conduit_core::{
    ConduitError, ConnectionConfig, Credential, Endpoint, MetadataNode, NodeKind, Result,
    tokenize,
};
use redis::aio::MultiplexedConnection;
use redis::{ConnectionAddr, ConnectionInfo, ProtocolVersion, RedisConnectionInfo};
use serde_json::Value as Json;

use crate::reply_to_json;

/// Keys listed in the metadata tree
pub const METADATA_KEY_LIMIT: usize = 100;

/// One multiplexed Redis connection on a selected logical database
pub struct RedisSession {
    conn: MultiplexedConnection,
    db: i64,
}

impl RedisSession {
    /// Connect and `PING`; auth failures surface here rather than on first use
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let db = match config.database.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                ConduitError::Validation(format!(
                    "Redis database must be a number, got '{}'",
                    raw
                ))
            })?,
            None => 0,
        };

        let addr = if config.ssl {
            ConnectionAddr::TcpTls {
                host: endpoint.host.clone(),
                port: endpoint.port,
                insecure: config.param("insecure") == Some("true"),
                tls_params: None,
            }
        } else {
            ConnectionAddr::Tcp(endpoint.host.clone(), endpoint.port)
        };
        let info = ConnectionInfo {
            addr,
            redis: RedisConnectionInfo {
                db,
                username: credential
                    .resolve_username(config.username.as_deref())
                    .map(str::to_string),
                password: credential.password.clone(),
                protocol: ProtocolVersion::RESP2,
            },
        };

        let client = redis::Client::open(info)
            .map_err(|e| ConduitError::Connect(format!("Failed to create Redis client: {}", e)))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ConduitError::Connect(format!("Failed to connect to Redis: {}", e)))?;

        let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        match pong {
            Ok(reply) if reply != "PONG" => {
                tracing::warn!(reply = %reply, "unexpected PING reply");
            }
            Ok(_) => {}
            Err(e) if e.to_string().contains("NOAUTH") => {
                return Err(ConduitError::Connect(
                    "Redis requires authentication; edit the connection and provide a password"
                        .into(),
                ));
            }
            Err(e) => {
                return Err(ConduitError::Connect(format!(
                    "Redis verification failed: {}",
                    e
                )));
            }
        }

        tracing::info!(db, "Redis connection established");
        Ok(Self { conn, db })
    }

    /// Run each non-empty line as a command; the last reply wins
    pub async fn run(&self, input: &str) -> Result<Json> {
        let mut reply = Json::Null;
        let mut ran = 0;
        for line in input.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            reply = self.run_command(line).await?;
            ran += 1;
        }
        if ran == 0 {
            return Err(ConduitError::Exec("empty Redis command".into()));
        }
        Ok(reply)
    }

    async fn run_command(&self, line: &str) -> Result<Json> {
        let tokens = tokenize(line);
        let Some((name, args)) = tokens.split_first() else {
            return Err(ConduitError::Exec("empty Redis command".into()));
        };

        let mut cmd = redis::cmd(&name.to_uppercase());
        for arg in args {
            cmd.arg(arg);
        }
        let mut conn = self.conn.clone();
        let value: redis::RedisResult<redis::Value> = cmd.query_async(&mut conn).await;
        match value {
            Ok(redis::Value::ServerError(err)) => {
                Err(ConduitError::Exec(format!("{} failed: {:?}", name, err)))
            }
            Ok(value) => Ok(reply_to_json(&value)),
            Err(e) => Err(ConduitError::Exec(format!("{} failed: {}", name, e))),
        }
    }

    /// The selected database with up to [`METADATA_KEY_LIMIT`] keys
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let page: redis::RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("COUNT")
                .arg(METADATA_KEY_LIMIT)
                .query_async(&mut conn)
                .await;
            let (next, batch) = page.map_err(|e| ConduitError::Exec(e.to_string()))?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 || keys.len() >= METADATA_KEY_LIMIT {
                break;
            }
        }
        keys.truncate(METADATA_KEY_LIMIT);
        keys.sort();

        let children = keys
            .into_iter()
            .map(|k| MetadataNode::leaf(k, NodeKind::Key))
            .collect();
        Ok(vec![MetadataNode::branch(
            format!("db{}", self.db),
            NodeKind::Database,
            children,
        )])
    }
}
