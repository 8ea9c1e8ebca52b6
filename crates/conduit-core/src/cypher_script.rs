//! Cypher statement splitting and graph extraction

use serde_json::Value as Json;
use std::collections::HashSet;

use crate::{GraphEdge, GraphNode, GraphResult};

/// Strip `//` line comments outside string literals
fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let chars: Vec<char> = line.chars().collect();
        let mut cut = chars.len();
        for (i, &c) in chars.iter().enumerate() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '\'' | '"' | '`' => quote = Some(c),
                '/' if chars.get(i + 1) == Some(&'/') => {
                    cut = i;
                    break;
                }
                _ => {}
            }
        }
        out.extend(&chars[..cut]);
        out.push('\n');
    }
    out
}

/// Split a Cypher script into statements
///
/// Line comments are removed first, then the text is split on `;` outside
/// quotes. Blank statements are dropped.
pub fn split_cypher_statements(text: &str) -> Vec<String> {
    let cleaned = strip_line_comments(text);
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in cleaned.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            ';' => {
                if !current.trim().is_empty() {
                    statements.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }
    statements
}

fn identity(value: &serde_json::Map<String, Json>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn properties(value: &serde_json::Map<String, Json>) -> Json {
    value
        .get("properties")
        .cloned()
        .unwrap_or_else(|| Json::Object(Default::default()))
}

/// Node shape: a label set plus an identity
fn as_node(value: &serde_json::Map<String, Json>) -> Option<GraphNode> {
    let labels = value.get("labels")?.as_array()?;
    let id = identity(value, &["elementId", "id"])?;
    Some(GraphNode {
        id,
        labels: labels
            .iter()
            .filter_map(|l| l.as_str().map(str::to_string))
            .collect(),
        properties: properties(value),
    })
}

/// Edge shape: a type plus start and end identities
fn as_edge(value: &serde_json::Map<String, Json>) -> Option<GraphEdge> {
    let edge_type = value.get("type")?.as_str()?.to_string();
    let start_id = identity(value, &["startNodeElementId", "startNode", "start"])?;
    let end_id = identity(value, &["endNodeElementId", "endNode", "end"])?;
    let id = identity(value, &["elementId", "id"])
        .unwrap_or_else(|| format!("{}-{}-{}", start_id, edge_type, end_id));
    Some(GraphEdge {
        id,
        edge_type,
        start_id,
        end_id,
        properties: properties(value),
    })
}

fn collect(value: &Json, graph: &mut GraphResult, seen: &mut HashSet<String>) {
    match value {
        Json::Array(items) => {
            for item in items {
                collect(item, graph, seen);
            }
        }
        Json::Object(map) => {
            if let Some(node) = as_node(map) {
                if seen.insert(format!("n:{}", node.id)) {
                    graph.nodes.push(node);
                }
                return;
            }
            if let Some(edge) = as_edge(map) {
                if seen.insert(format!("e:{}", edge.id)) {
                    graph.edges.push(edge);
                }
                return;
            }
            for nested in map.values() {
                collect(nested, graph, seen);
            }
        }
        _ => {}
    }
}

/// Build the node/edge view of a set of result values
///
/// Walks arrays and objects recursively; nodes and edges are deduplicated
/// by identity. `records` is left untouched for the caller to fill.
pub fn extract_graph<'a>(values: impl IntoIterator<Item = &'a Json>) -> GraphResult {
    let mut graph = GraphResult::default();
    let mut seen = HashSet::new();
    for value in values {
        collect(value, &mut graph, &mut seen);
    }
    graph
}
