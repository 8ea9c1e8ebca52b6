//! Neo4j session over the HTTP transactional API

use conduit_core::cypher_script::split_cypher_statements;
use conduit_core::{
    CONNECT_TIMEOUT, ConduitError, ConnectionConfig, Credential, Endpoint, GraphResult,
    MetadataNode, NodeKind, Result,
};
use reqwest::StatusCode;

use crate::transaction::{CommitRequest, CommitResponse, into_graph_result};

const DEFAULT_DATABASE: &str = "neo4j";

/// HTTP client bound to one server and database
pub struct Neo4jSession {
    http: reqwest::Client,
    base_url: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
}

impl std::fmt::Debug for Neo4jSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jSession")
            .field("base_url", &self.base_url)
            .field("database", &self.database)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Neo4jSession {
    /// Build the client and commit `RETURN 1`
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ConduitError::Connect(format!("Failed to build HTTP client: {}", e)))?;

        let scheme = if config.ssl { "https" } else { "http" };
        let session = Self {
            http,
            base_url: format!("{}://{}", scheme, endpoint.address()),
            database: config
                .database
                .clone()
                .filter(|db| !db.is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            username: credential
                .resolve_username(config.username.as_deref())
                .map(str::to_string),
            password: credential.password.clone(),
        };

        session
            .commit(&session.database, vec!["RETURN 1".to_string()])
            .await
            .map_err(|e| ConduitError::Connect(format!("Failed to connect to Neo4j: {}", e)))?;

        tracing::info!(database = %session.database, "Neo4j connection established");
        Ok(session)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Run a Cypher script as one transaction
    ///
    /// `target` overrides the connection's database for this call.
    pub async fn run_script(&self, script: &str, target: Option<&str>) -> Result<GraphResult> {
        let statements = split_cypher_statements(script);
        if statements.is_empty() {
            return Err(ConduitError::Exec("No Cypher statements to run".into()));
        }
        let database = target.filter(|t| !t.is_empty()).unwrap_or(&self.database);
        let response = self.commit(database, statements).await?;
        let graph = into_graph_result(response);
        tracing::debug!(
            records = graph.records.len(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Cypher script executed"
        );
        Ok(graph)
    }

    /// Labels, relationship types and property keys
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let categories = [
            ("Labels", "CALL db.labels()", NodeKind::Label),
            ("Relationship Types", "CALL db.relationshipTypes()", NodeKind::Relationship),
            ("Property Keys", "CALL db.propertyKeys()", NodeKind::PropertyKey),
        ];

        let mut nodes = Vec::with_capacity(categories.len());
        for (category, statement, kind) in categories {
            let response = self.commit(&self.database, vec![statement.to_string()]).await?;
            let mut names = response.first_column();
            names.sort();
            let children = names
                .into_iter()
                .map(|name| MetadataNode::leaf(name, kind))
                .collect();
            nodes.push(MetadataNode::branch(category, NodeKind::Category, children));
        }
        Ok(nodes)
    }

    async fn commit(&self, database: &str, statements: Vec<String>) -> Result<CommitResponse> {
        let count = statements.len();
        let url = format!("{}/db/{}/tx/commit", self.base_url, database);
        let mut request = self.http.post(&url).json(&CommitRequest::new(statements));
        if let Some(user) = self.username.as_deref() {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConduitError::Exec(format!("Neo4j request failed: {}", e)))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ConduitError::Exec(
                "Neo4j rejected the credentials (401 Unauthorized)".into(),
            ));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ConduitError::Exec(format!("Failed to read Neo4j response: {}", e)))?;
        let parsed: CommitResponse = serde_json::from_str(&body).map_err(|e| {
            ConduitError::Exec(format!(
                "Unexpected Neo4j response (HTTP {}): {}",
                status.as_u16(),
                e
            ))
        })?;
        parsed.check(count)?;
        if !status.is_success() {
            return Err(ConduitError::Exec(format!("Neo4j returned HTTP {}", status.as_u16())));
        }
        Ok(parsed)
    }
}
