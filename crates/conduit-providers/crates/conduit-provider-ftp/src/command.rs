//! FTP command vocabulary and listing rendering

use conduit_core::{ConduitError, Result, parse_command};
use serde_json::{Value as Json, json};
use std::str::FromStr;
use suppaftp::list::File;

#[cfg(test)]
mod tests;

pub const COMMANDS: &[&str] = &[
    "list", "pwd", "cd", "mkdir", "rmdir", "remove", "rename", "size", "read",
];

/// Largest file `read` returns, in bytes
pub const READ_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtpCommand {
    List(Option<String>),
    Pwd,
    Cd(String),
    Mkdir(String),
    Rmdir(String),
    Remove(String),
    Rename { from: String, to: String },
    Size(String),
    Read(String),
}

impl FtpCommand {
    pub fn parse(input: &str) -> Result<Self> {
        let cmd = parse_command(input, COMMANDS)?;
        let path = || cmd.arg(0, "path").map(str::to_string);
        Ok(match cmd.name.as_str() {
            "list" => FtpCommand::List(cmd.opt_arg(0).map(str::to_string)),
            "pwd" => FtpCommand::Pwd,
            "cd" => FtpCommand::Cd(path()?),
            "mkdir" => FtpCommand::Mkdir(path()?),
            "rmdir" => FtpCommand::Rmdir(path()?),
            "remove" => FtpCommand::Remove(path()?),
            "rename" => FtpCommand::Rename {
                from: path()?,
                to: cmd.arg(1, "destination path")?.to_string(),
            },
            "size" => FtpCommand::Size(path()?),
            "read" => FtpCommand::Read(path()?),
            other => return Err(ConduitError::unknown_command(other, COMMANDS)),
        })
    }
}

/// Parsed `LIST` line, or the raw text when the format is not recognised
pub(crate) fn listing_entry(line: &str) -> Json {
    match File::from_str(line) {
        Ok(file) => {
            let kind = if file.is_directory() {
                "dir"
            } else if file.is_symlink() {
                "symlink"
            } else {
                "file"
            };
            let modified: chrono::DateTime<chrono::Utc> = file.modified().into();
            json!({
                "name": file.name(),
                "type": kind,
                "size": file.size(),
                "modified": modified.to_rfc3339(),
            })
        }
        Err(_) => json!({ "raw": line }),
    }
}

pub(crate) fn name_and_is_dir(line: &str) -> Option<(String, bool)> {
    File::from_str(line)
        .ok()
        .map(|file| (file.name().to_string(), file.is_directory()))
}
