//! SFTP command vocabulary and entry rendering

use conduit_core::{ConduitError, Result, parse_command};
use serde_json::{Value as Json, json};
use ssh2::FileStat;


pub const COMMANDS: &[&str] = &[
    "list", "stat", "read", "mkdir", "rmdir", "remove", "rename", "pwd",
];

/// Largest file `read` returns, in bytes
pub const READ_LIMIT: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SftpCommand {
    List(String),
    Stat(String),
    Read(String),
    Mkdir(String),
    Rmdir(String),
    Remove(String),
    Rename { from: String, to: String },
    Pwd,
}

impl SftpCommand {
    pub fn parse(input: &str) -> Result<Self> {
        let cmd = parse_command(input, COMMANDS)?;
        let path = || cmd.arg(0, "path").map(str::to_string);
        Ok(match cmd.name.as_str() {
            "list" => SftpCommand::List(cmd.opt_arg(0).unwrap_or(".").to_string()),
            "stat" => SftpCommand::Stat(path()?),
            "read" => SftpCommand::Read(path()?),
            "mkdir" => SftpCommand::Mkdir(path()?),
            "rmdir" => SftpCommand::Rmdir(path()?),
            "remove" => SftpCommand::Remove(path()?),
            "rename" => SftpCommand::Rename {
                from: path()?,
                to: cmd.arg(1, "destination path")?.to_string(),
            },
            "pwd" => SftpCommand::Pwd,
            other => return Err(ConduitError::unknown_command(other, COMMANDS)),
        })
    }
}

pub(crate) fn entry_type(stat: &FileStat) -> &'static str {
    let file_type = stat.file_type();
    if file_type.is_dir() {
        "dir"
    } else if file_type.is_symlink() {
        "symlink"
    } else if file_type.is_file() {
        "file"
    } else {
        "other"
    }
}

/// One directory entry or stat result as JSON
pub(crate) fn entry_json(name: &str, stat: &FileStat) -> Json {
    json!({
        "name": name,
        "type": entry_type(stat),
        "size": stat.size,
        "permissions": stat.perm.map(|p| format!("{:o}", p & 0o7777)),
        "modified": stat.mtime,
    })
}
