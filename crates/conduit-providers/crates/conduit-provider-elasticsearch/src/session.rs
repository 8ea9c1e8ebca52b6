//! Elasticsearch session over the REST API

use conduit_core::{
    CONNECT_TIMEOUT, ConduitError, ConnectionConfig, Credential, Endpoint, ExecOutput,
    MetadataNode, NodeKind, Result, parse_command,
};
use reqwest::{Method, Url};
use serde_json::Value as Json;

use crate::request::{COMMANDS, RequestPlan, ResponseShape, error_reason, extract_hits, plan_request};

/// HTTP client bound to one cluster
pub struct ElasticsearchSession {
    http: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchSession {
    /// Build the client and read the cluster banner at `/`
    #[tracing::instrument(skip(config, credential, endpoint), fields(host = %endpoint.host, port = endpoint.port))]
    pub async fn connect(
        config: &ConnectionConfig,
        credential: &Credential,
        endpoint: &Endpoint,
    ) -> Result<Self> {
        let scheme = if config.ssl { "https" } else { "http" };
        let base_url = Url::parse(&format!("{}://{}/", scheme, endpoint.address()))
            .map_err(|e| ConduitError::Validation(format!("Invalid Elasticsearch address: {}", e)))?;
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ConduitError::Connect(format!("Failed to build HTTP client: {}", e)))?;

        let session = Self {
            http,
            base_url,
            username: credential
                .resolve_username(config.username.as_deref())
                .map(str::to_string),
            password: credential.password.clone(),
        };

        let banner = session
            .send(&RequestPlan {
                method: Method::GET,
                segments: Vec::new(),
                query: Vec::new(),
                body: None,
                shape: ResponseShape::Json,
            })
            .await
            .map_err(|e| ConduitError::Connect(format!("Failed to connect to Elasticsearch: {}", e)))?;
        let version = banner
            .pointer("/version/number")
            .and_then(Json::as_str)
            .unwrap_or("unknown");
        tracing::info!(version, "Elasticsearch connection established");
        Ok(session)
    }

    /// Run one vocabulary command
    pub async fn run(&self, input: &str) -> Result<ExecOutput> {
        let cmd = parse_command(input, COMMANDS)?;
        let plan = plan_request(&cmd)?;
        tracing::debug!(command = %cmd.name, method = %plan.method, "Elasticsearch request");
        let body = self.send(&plan).await?;
        Ok(match plan.shape {
            ResponseShape::Json => ExecOutput::Json(body),
            ResponseShape::Hits => ExecOutput::Documents(extract_hits(body)),
        })
    }

    /// Non-hidden indices, sorted
    pub async fn metadata(&self) -> Result<Vec<MetadataNode>> {
        let body = self.run_json("indices").await?;
        let mut names: Vec<String> = body
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.get("index").and_then(Json::as_str))
                    .filter(|name| !name.starts_with('.'))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| MetadataNode::leaf(name, NodeKind::Index))
            .collect())
    }

    async fn run_json(&self, input: &str) -> Result<Json> {
        let plan = plan_request(&parse_command(input, COMMANDS)?)?;
        self.send(&plan).await
    }

    async fn send(&self, plan: &RequestPlan) -> Result<Json> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ConduitError::Validation("Elasticsearch URL cannot be a base".into()))?;
            segments.pop_if_empty();
            segments.extend(&plan.segments);
        }
        if !plan.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&plan.query);
        }

        let mut request = self.http.request(plan.method.clone(), url);
        if let Some(user) = self.username.as_deref() {
            request = request.basic_auth(user, self.password.as_deref());
        }
        if let Some(body) = &plan.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConduitError::Exec(format!("Elasticsearch request failed: {}", e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ConduitError::Exec(format!("Failed to read Elasticsearch response: {}", e)))?;
        let body: Json = if text.trim().is_empty() {
            Json::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Json::String(text))
        };

        if !status.is_success() {
            let reason = error_reason(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(ConduitError::Exec(format!(
                "Elasticsearch returned HTTP {}: {}",
                status.as_u16(),
                reason
            )));
        }
        Ok(body)
    }
}
