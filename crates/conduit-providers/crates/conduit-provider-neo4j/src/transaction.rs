//! Transactional endpoint request/response shapes

use conduit_core::cypher_script::extract_graph;
use conduit_core::{ConduitError, GraphResult, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

#[cfg(test)]
mod tests;

#[derive(Debug, Serialize)]
pub struct CommitRequest {
    pub statements: Vec<StatementRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRequest {
    pub statement: String,
    pub result_data_contents: Vec<&'static str>,
}

impl CommitRequest {
    /// Request rows and graph shapes for every statement
    pub fn new(statements: impl IntoIterator<Item = String>) -> Self {
        Self {
            statements: statements
                .into_iter()
                .map(|statement| StatementRequest {
                    statement,
                    result_data_contents: vec!["row", "graph"],
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub errors: Vec<ServerError>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<DataRow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DataRow {
    #[serde(default)]
    pub row: Vec<Json>,
    #[serde(default)]
    pub graph: Option<Json>,
}

#[derive(Debug, Deserialize)]
pub struct ServerError {
    pub code: String,
    pub message: String,
}

impl CommitResponse {
    /// Fail with the first server error, naming the statement it hit
    ///
    /// Results only cover statements that succeeded, so the failing one is
    /// the next after them.
    pub fn check(&self, statement_count: usize) -> Result<()> {
        let Some(error) = self.errors.first() else {
            return Ok(());
        };
        let failed = (self.results.len() + 1).min(statement_count.max(1));
        Err(ConduitError::Exec(format!(
            "statement {} of {} failed: {}: {}",
            failed, statement_count, error.code, error.message
        )))
    }

    /// Column values of the first row of the first result
    pub fn first_column(&self) -> Vec<String> {
        self.results
            .first()
            .map(|r| {
                r.data
                    .iter()
                    .filter_map(|d| d.row.first().and_then(|v| v.as_str()).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Flatten every statement's rows into records and extract the graph
pub fn into_graph_result(response: CommitResponse) -> GraphResult {
    let mut records = Vec::new();
    let mut graphs = Vec::new();
    for result in response.results {
        for data in result.data {
            let mut record = Map::new();
            for (column, value) in result.columns.iter().zip(data.row) {
                record.insert(column.clone(), value);
            }
            records.push(Json::Object(record));
            if let Some(graph) = data.graph {
                graphs.push(graph);
            }
        }
    }

    let mut graph = extract_graph(graphs.iter());
    graph.records = records;
    graph
}
