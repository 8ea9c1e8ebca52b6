//! Command vocabulary to REST request translation

use conduit_core::{Command, ConduitError, Result};
use reqwest::Method;
use serde_json::{Value as Json, json};


pub const COMMANDS: &[&str] = &[
    "indices", "health", "get", "search", "count", "index", "delete", "mapping",
];

/// How a response body is handed back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// The body as-is
    Json,
    /// `hits.hits` as a document list
    Hits,
}

/// One HTTP request derived from a command
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub method: Method,
    /// Path segments, encoded when the URL is built
    pub segments: Vec<String>,
    pub query: Vec<(&'static str, &'static str)>,
    pub body: Option<Json>,
    pub shape: ResponseShape,
}

impl RequestPlan {
    fn new(method: Method, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
            body: None,
            shape: ResponseShape::Json,
        }
    }

    fn with_query(mut self, key: &'static str, value: &'static str) -> Self {
        self.query.push((key, value));
        self
    }

    fn with_body(mut self, body: Json) -> Self {
        self.body = Some(body);
        self
    }
}

/// Translate a parsed command into its REST call
pub fn plan_request(cmd: &Command) -> Result<RequestPlan> {
    let plan = match cmd.name.as_str() {
        "indices" => {
            RequestPlan::new(Method::GET, &["_cat", "indices"]).with_query("format", "json")
        }
        "health" => RequestPlan::new(Method::GET, &["_cluster", "health"]),
        "get" => {
            let index = cmd.arg(0, "index")?;
            let id = cmd.arg(1, "document id")?;
            RequestPlan::new(Method::GET, &[index, "_doc", id])
        }
        "search" => {
            let index = cmd.arg(0, "index")?;
            let body = match cmd.rest(1) {
                Some(text) => parse_body(text)?,
                None => json!({ "query": { "match_all": {} } }),
            };
            let mut plan = RequestPlan::new(Method::POST, &[index, "_search"]).with_body(body);
            plan.shape = ResponseShape::Hits;
            plan
        }
        "count" => RequestPlan::new(Method::GET, &[cmd.arg(0, "index")?, "_count"]),
        "index" => {
            let index = cmd.arg(0, "index")?;
            let text = cmd
                .rest(1)
                .ok_or_else(|| ConduitError::Exec("'index' requires a JSON document".into()))?;
            RequestPlan::new(Method::POST, &[index, "_doc"])
                .with_query("refresh", "wait_for")
                .with_body(parse_body(text)?)
        }
        "delete" => {
            let index = cmd.arg(0, "index")?;
            let id = cmd.arg(1, "document id")?;
            RequestPlan::new(Method::DELETE, &[index, "_doc", id])
        }
        "mapping" => RequestPlan::new(Method::GET, &[cmd.arg(0, "index")?, "_mapping"]),
        other => return Err(ConduitError::unknown_command(other, COMMANDS)),
    };
    Ok(plan)
}

fn parse_body(text: &str) -> Result<Json> {
    let body: Json = serde_json::from_str(text)
        .map_err(|e| ConduitError::Exec(format!("Invalid JSON body: {}", e)))?;
    if !body.is_object() {
        return Err(ConduitError::Exec("JSON body must be an object".into()));
    }
    Ok(body)
}

/// Readable reason from an Elasticsearch error body
pub(crate) fn error_reason(body: &Json) -> Option<String> {
    match body.get("error")? {
        Json::String(s) => Some(s.clone()),
        error => {
            let reason = error.get("reason").and_then(Json::as_str)?;
            match error.get("type").and_then(Json::as_str) {
                Some(kind) => Some(format!("{}: {}", kind, reason)),
                None => Some(reason.to_string()),
            }
        }
    }
}

/// `hits.hits` of a search response
pub(crate) fn extract_hits(body: Json) -> Vec<Json> {
    match body {
        Json::Object(mut map) => map
            .remove("hits")
            .and_then(|mut hits| hits.get_mut("hits").map(Json::take))
            .and_then(|hits| match hits {
                Json::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}
