//! Rendering of broker results for the terminal

use comfy_table::{Table, presets::UTF8_FULL};
use conduit_connection::ConnectionMetadata;
use conduit_core::{ConnectionConfig, ExecOutput, MetadataNode, QueryResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One saved connection as listed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRow<'a> {
    #[serde(flatten)]
    pub config: &'a ConnectionConfig,
    pub favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub has_credentials: bool,
}

impl<'a> ConnectionRow<'a> {
    pub fn new(
        config: &'a ConnectionConfig,
        metadata: Option<ConnectionMetadata>,
        group: Option<String>,
        has_credentials: bool,
    ) -> Self {
        Self {
            config,
            favorite: metadata.is_some_and(|m| m.favorite),
            group,
            has_credentials,
        }
    }
}

pub fn connections_table(rows: &[ConnectionRow<'_>]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["", "Name", "Type", "Target", "Group", "Id"]);
    for row in rows {
        table.add_row(vec![
            if row.favorite { "*" } else { "" }.to_string(),
            row.config.name.clone(),
            row.config.kind.display_name().to_string(),
            row.config.summary(),
            row.group.clone().unwrap_or_default(),
            row.config.id.to_string(),
        ]);
    }
    table
}

pub fn rows_table(result: &QueryResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(result.columns.iter().map(|c| c.name.clone()));
    for row in &result.rows {
        table.add_row(row.values.iter().map(ToString::to_string));
    }
    table
}

/// Human-readable rendering of one execution result
pub fn render_exec(output: &ExecOutput) -> anyhow::Result<String> {
    Ok(match output {
        ExecOutput::Rows(result) if result.columns.is_empty() => {
            format!("{} row(s) affected", result.affected_rows)
        }
        ExecOutput::Rows(result) => {
            format!("{}\n{} row(s)", rows_table(result), result.rows.len())
        }
        ExecOutput::Documents(docs) => {
            let mut text = docs
                .iter()
                .map(serde_json::to_string_pretty)
                .collect::<Result<Vec<_>, _>>()?
                .join("\n");
            text.push_str(&format!("\n{} document(s)", docs.len()));
            text
        }
        ExecOutput::Graph(graph) => format!(
            "{}\n{} record(s), {} node(s), {} relationship(s)",
            serde_json::to_string_pretty(&graph.records)?,
            graph.records.len(),
            graph.nodes.len(),
            graph.edges.len()
        ),
        ExecOutput::Json(value) => serde_json::to_string_pretty(value)?,
        ExecOutput::Text(text) => text.clone(),
        ExecOutput::Affected(n) => format!("{} item(s) affected", n),
    })
}

/// Indented tree of metadata nodes
pub fn render_tree(nodes: &[MetadataNode]) -> String {
    fn walk(nodes: &[MetadataNode], depth: usize, out: &mut String) {
        for node in nodes {
            let kind = serde_json::to_value(node.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            out.push_str(&format!("{}{} [{}]\n", "  ".repeat(depth), node.name, kind));
            if let Some(children) = &node.children {
                walk(children, depth + 1, out);
            }
        }
    }

    let mut out = String::new();
    walk(nodes, 0, &mut out);
    out
}
