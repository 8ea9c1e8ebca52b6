//! Subcommands and their handlers

use anyhow::{Context, bail};
use clap::{Args, Subcommand, ValueEnum};
use conduit_connection::{
    CollisionAction, ConnectionRegistry, ConnectionUpdate, ExportDocument, QueryHistory,
};
use conduit_core::{
    ConnectionConfig, Credential, DEFAULT_SSH_PORT, ProtocolKind, SshTunnelDescriptor,
};
use std::collections::BTreeMap;
use std::io::{BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::output::{
    ConnectionRow, OutputFormat, connections_table, print_json, render_exec, render_tree,
};

#[derive(Subcommand)]
pub enum Command {
    /// List saved connections
    List {
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },
    /// Save a new connection
    Add(AddArgs),
    /// Change a saved connection
    Edit(EditArgs),
    /// Delete a saved connection and its credential
    Remove { connection: String },
    /// Copy a saved connection, credential included
    Duplicate { connection: String },
    /// Open and close a session without keeping it
    Test { connection: String },
    /// Connect and run one query or command
    Query(QueryArgs),
    /// Show the databases, tables, keys or queues behind a connection
    Metadata {
        connection: String,
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },
    /// Write saved connections as a JSON export document
    Export {
        /// Include base64-encoded passwords; treat the file as a secret
        #[arg(long)]
        include_passwords: bool,
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Read connections from an export document
    Import {
        file: PathBuf,
        /// What to do when a name is already taken
        #[arg(long, value_enum, default_value = "skip")]
        on_conflict: ConflictPolicy,
    },
    /// Manage connection groups
    #[command(subcommand)]
    Group(GroupCommand),
    /// Mark a connection as favorite
    Favorite {
        connection: String,
        /// Clear the mark instead
        #[arg(long)]
        off: bool,
    },
    /// Supported protocol kinds
    Kinds,
}

#[derive(Subcommand)]
pub enum GroupCommand {
    List,
    Create { name: String },
    Rename { group: String, name: String },
    /// Delete a group; members become ungrouped
    Delete { group: String },
    /// Put a connection in a group, or ungroup it when no group is given
    Assign {
        connection: String,
        group: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictPolicy {
    Skip,
    Overwrite,
    /// Prompt on the terminal for each clash
    Ask,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(long)]
    name: String,
    #[arg(long = "type", value_name = "KIND")]
    kind: ProtocolKind,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    database: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    ssl: bool,
    /// Protocol-specific parameter, repeatable
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,
    #[command(flatten)]
    tunnel: TunnelArgs,
    #[command(flatten)]
    secret: SecretArgs,
}

#[derive(Args)]
pub struct EditArgs {
    connection: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    database: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    ssl: Option<bool>,
    /// Replace all parameters, repeatable
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,
    #[command(flatten)]
    tunnel: TunnelArgs,
    /// Remove the SSH tunnel
    #[arg(long, conflicts_with = "ssh_host")]
    no_tunnel: bool,
    #[command(flatten)]
    secret: SecretArgs,
}

#[derive(Args)]
pub struct TunnelArgs {
    /// SSH bastion to tunnel through
    #[arg(long, requires = "ssh_user")]
    ssh_host: Option<String>,
    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    ssh_port: u16,
    #[arg(long)]
    ssh_user: Option<String>,
}

impl TunnelArgs {
    fn descriptor(&self) -> Option<SshTunnelDescriptor> {
        let host = self.ssh_host.as_ref()?;
        let mut tunnel = SshTunnelDescriptor::new(host, self.ssh_user.clone().unwrap_or_default());
        tunnel.port = self.ssh_port;
        Some(tunnel)
    }
}

/// Secrets are read from the environment, stdin or key files, never from argv
#[derive(Args)]
pub struct SecretArgs {
    /// Environment variable holding the password
    #[arg(long, value_name = "VAR")]
    password_env: Option<String>,
    /// Read the password from the first line of stdin
    #[arg(long, conflicts_with = "password_env")]
    password_stdin: bool,
    /// PEM private key file (ssh and sftp kinds)
    #[arg(long, value_name = "FILE")]
    private_key: Option<PathBuf>,
    /// Environment variable holding the key passphrase
    #[arg(long, value_name = "VAR")]
    passphrase_env: Option<String>,
    /// Environment variable holding the SSH bastion password
    #[arg(long, value_name = "VAR")]
    ssh_password_env: Option<String>,
    /// PEM private key file for the SSH bastion
    #[arg(long, value_name = "FILE")]
    ssh_private_key: Option<PathBuf>,
}

impl SecretArgs {
    fn is_empty(&self) -> bool {
        self.password_env.is_none()
            && !self.password_stdin
            && self.private_key.is_none()
            && self.ssh_password_env.is_none()
            && self.ssh_private_key.is_none()
    }

    /// Credential assembled from the given sources, `None` when nothing was given
    fn credential(&self) -> anyhow::Result<Option<Credential>> {
        if self.is_empty() {
            return Ok(None);
        }
        let passphrase = self.passphrase_env.as_deref().map(env_secret).transpose()?;

        let mut credential = match &self.private_key {
            Some(path) => Credential::private_key(read_key(path)?, passphrase.clone()),
            None => Credential::default(),
        };
        if let Some(var) = &self.password_env {
            credential.password = Some(env_secret(var)?);
        } else if self.password_stdin {
            credential.password = Some(read_stdin_line()?);
        }
        if let Some(var) = &self.ssh_password_env {
            credential = credential.with_ssh_password(env_secret(var)?);
        }
        if let Some(path) = &self.ssh_private_key {
            credential = credential.with_ssh_private_key(read_key(path)?, passphrase);
        }
        Ok(Some(credential))
    }
}

#[derive(Args)]
pub struct QueryArgs {
    connection: String,
    /// Database, schema, bucket or keyspace to run against
    #[arg(long)]
    target: Option<String>,
    /// Read the query from a file
    #[arg(short, long, value_name = "FILE", conflicts_with = "text")]
    file: Option<PathBuf>,
    /// Query text; read from stdin when neither this nor --file is given
    text: Option<String>,
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,
}

impl QueryArgs {
    fn query_text(&self) -> anyhow::Result<String> {
        let text = match (&self.text, &self.file) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
            (None, None) => {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            }
        };
        if text.trim().is_empty() {
            bail!("nothing to run");
        }
        Ok(text)
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("parameter key is empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

fn env_secret(var: &str) -> anyhow::Result<String> {
    std::env::var(var).with_context(|| format!("environment variable {} is not set", var))
}

fn read_key(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read key {}", path.display()))
}

fn read_stdin_line() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Look a connection up by id first, then by name
fn resolve_connection(registry: &ConnectionRegistry, key: &str) -> anyhow::Result<ConnectionConfig> {
    if let Ok(id) = Uuid::parse_str(key)
        && let Some(config) = registry.get_connection(id)
    {
        return Ok(config);
    }
    registry
        .find_by_name(key)
        .with_context(|| format!("no saved connection named '{}'", key))
}

fn resolve_group(registry: &ConnectionRegistry, key: &str) -> anyhow::Result<Uuid> {
    let groups = registry.list_groups();
    let id = Uuid::parse_str(key).ok();
    groups
        .iter()
        .find(|g| Some(g.id) == id || g.name.eq_ignore_ascii_case(key.trim()))
        .map(|g| g.id)
        .with_context(|| format!("no group named '{}'", key))
}

fn ask_overwrite(name: &str) -> anyhow::Result<bool> {
    let mut stderr = std::io::stderr();
    write!(stderr, "'{}' already exists, overwrite? [y/N] ", name)?;
    stderr.flush()?;
    let answer = read_stdin_line()?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

pub async fn run(
    registry: &ConnectionRegistry,
    history: &QueryHistory,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::List { output } => list(registry, output).await,
        Command::Add(args) => add(registry, args).await,
        Command::Edit(args) => edit(registry, args).await,
        Command::Remove { connection } => {
            let config = resolve_connection(registry, &connection)?;
            registry.delete_connection(config.id).await?;
            println!("Removed '{}'", config.name);
            Ok(())
        }
        Command::Duplicate { connection } => {
            let config = resolve_connection(registry, &connection)?;
            let copy = registry.duplicate_connection(config.id).await?;
            println!("Saved '{}' ({})", copy.name, copy.id);
            Ok(())
        }
        Command::Test { connection } => {
            let config = resolve_connection(registry, &connection)?;
            registry.test_saved_connection(config.id).await?;
            println!("'{}' is reachable", config.name);
            Ok(())
        }
        Command::Query(args) => query(registry, history, args).await,
        Command::Metadata { connection, output } => {
            let config = resolve_connection(registry, &connection)?;
            registry.connect(config.id).await?;
            let tree = registry.get_metadata(config.id).await;
            registry.disconnect(config.id).await?;
            let tree = tree?;
            match output {
                OutputFormat::Json => print_json(&tree),
                OutputFormat::Table => {
                    print!("{}", render_tree(&tree));
                    Ok(())
                }
            }
        }
        Command::Export {
            include_passwords,
            out,
        } => {
            if include_passwords {
                tracing::warn!("export includes passwords");
                eprintln!("warning: the export contains passwords; store it as a secret");
            }
            let json = registry.export_connections(include_passwords).await?.to_json()?;
            match out {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{}", json),
            }
            Ok(())
        }
        Command::Import { file, on_conflict } => import(registry, &file, on_conflict).await,
        Command::Group(command) => group(registry, command).await,
        Command::Favorite { connection, off } => {
            let config = resolve_connection(registry, &connection)?;
            registry.set_favorite(config.id, !off).await?;
            Ok(())
        }
        Command::Kinds => {
            for kind in ProtocolKind::ALL {
                let port = kind
                    .default_port()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<14} {:<22} {}", kind.as_str(), kind.display_name(), port);
            }
            Ok(())
        }
    }
}

async fn list(registry: &ConnectionRegistry, output: OutputFormat) -> anyhow::Result<()> {
    let configs = registry.list_connections();
    let groups = registry.list_groups();

    let mut rows = Vec::with_capacity(configs.len());
    for config in &configs {
        let metadata = registry.metadata(config.id);
        let group = metadata
            .as_ref()
            .and_then(|m| m.group_id)
            .and_then(|gid| groups.iter().find(|g| g.id == gid))
            .map(|g| g.name.clone());
        let has_credentials = registry.has_credentials(config.id).await?;
        rows.push(ConnectionRow::new(config, metadata, group, has_credentials));
    }

    match output {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            println!("{}", connections_table(&rows));
            Ok(())
        }
    }
}

async fn add(registry: &ConnectionRegistry, args: AddArgs) -> anyhow::Result<()> {
    let mut config = ConnectionConfig::new(args.name, args.kind).with_ssl(args.ssl);
    config.host = args.host;
    config.port = args.port;
    config.database = args.database;
    config.username = args.username;
    config.ssh_tunnel = args.tunnel.descriptor();
    config.params = args.params.into_iter().collect();

    let credential = args.secret.credential()?;
    let id = registry.add_connection(config, credential).await?;
    println!("{}", id);
    Ok(())
}

async fn edit(registry: &ConnectionRegistry, args: EditArgs) -> anyhow::Result<()> {
    let config = resolve_connection(registry, &args.connection)?;
    let ssh_tunnel = if args.no_tunnel {
        Some(None)
    } else {
        args.tunnel.descriptor().map(Some)
    };
    let update = ConnectionUpdate {
        name: args.name,
        host: args.host.map(Some),
        port: args.port.map(Some),
        database: args.database.map(Some),
        username: args.username.map(Some),
        ssl: args.ssl,
        ssh_tunnel,
        params: (!args.params.is_empty())
            .then(|| args.params.into_iter().collect::<BTreeMap<_, _>>()),
    };

    let credential = args.secret.credential()?;
    let updated = registry.update_connection(config.id, update, credential).await?;
    println!("Updated '{}'", updated.name);
    Ok(())
}

async fn query(
    registry: &ConnectionRegistry,
    history: &QueryHistory,
    args: QueryArgs,
) -> anyhow::Result<()> {
    let config = resolve_connection(registry, &args.connection)?;
    let text = args.query_text()?;

    registry.connect(config.id).await?;
    let result = registry
        .execute_query(config.id, args.target.as_deref(), &text)
        .await;
    registry.disconnect(config.id).await?;
    let output = result?;

    match args.output {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Table => println!("{}", render_exec(&output)?),
    }
    if let Some(entry) = history.recent().first()
        && std::io::stderr().is_terminal()
    {
        eprintln!("({} ms)", entry.duration_ms);
    }
    Ok(())
}

async fn import(
    registry: &ConnectionRegistry,
    file: &Path,
    policy: ConflictPolicy,
) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let doc = ExportDocument::from_json(&json)?;

    let mut prompt_error = None;
    let summary = registry
        .import_connections(doc, |incoming, _existing| match policy {
            ConflictPolicy::Skip => CollisionAction::Skip,
            ConflictPolicy::Overwrite => CollisionAction::Overwrite,
            ConflictPolicy::Ask => match ask_overwrite(&incoming.name) {
                Ok(true) => CollisionAction::Overwrite,
                Ok(false) => CollisionAction::Skip,
                Err(e) => {
                    prompt_error.get_or_insert(e);
                    CollisionAction::Skip
                }
            },
        })
        .await?;
    if let Some(e) = prompt_error {
        return Err(e.context("import prompt failed; clashing names were skipped"));
    }

    println!(
        "Imported {}, overwrote {}, skipped {}",
        summary.imported, summary.overwritten, summary.skipped
    );
    Ok(())
}

async fn group(registry: &ConnectionRegistry, command: GroupCommand) -> anyhow::Result<()> {
    match command {
        GroupCommand::List => {
            for group in registry.list_groups() {
                let members = registry.connections_in_group(group.id).len();
                println!("{}  {} ({} connections)", group.id, group.name, members);
            }
        }
        GroupCommand::Create { name } => {
            let group = registry.create_group(&name).await?;
            println!("{}", group.id);
        }
        GroupCommand::Rename { group, name } => {
            let id = resolve_group(registry, &group)?;
            registry.rename_group(id, &name).await?;
        }
        GroupCommand::Delete { group } => {
            let id = resolve_group(registry, &group)?;
            registry.delete_group(id).await?;
        }
        GroupCommand::Assign { connection, group } => {
            let config = resolve_connection(registry, &connection)?;
            let group_id = group.map(|g| resolve_group(registry, &g)).transpose()?;
            registry.assign_group(config.id, group_id).await?;
        }
    }
    Ok(())
}
