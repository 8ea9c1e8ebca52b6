//! Engine command vocabulary

use conduit_core::{ConduitError, Result, parse_command};

#[cfg(test)]
mod tests;

pub const COMMANDS: &[&str] = &[
    "containers", "images", "volumes", "networks", "start", "stop", "restart", "logs", "inspect",
    "remove", "version",
];

pub const DEFAULT_LOG_TAIL: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerCommand {
    Containers,
    Images,
    Volumes,
    Networks,
    Start(String),
    Stop(String),
    Restart(String),
    Logs { container: String, tail: usize },
    Inspect(String),
    Remove(String),
    Version,
}

impl DockerCommand {
    pub fn parse(input: &str) -> Result<Self> {
        let cmd = parse_command(input, COMMANDS)?;
        let container = || cmd.arg(0, "container").map(str::to_string);
        Ok(match cmd.name.as_str() {
            "containers" => DockerCommand::Containers,
            "images" => DockerCommand::Images,
            "volumes" => DockerCommand::Volumes,
            "networks" => DockerCommand::Networks,
            "start" => DockerCommand::Start(container()?),
            "stop" => DockerCommand::Stop(container()?),
            "restart" => DockerCommand::Restart(container()?),
            "logs" => {
                let tail = match cmd.opt_arg(1) {
                    Some(raw) => raw.parse().map_err(|_| {
                        ConduitError::Exec(format!("'logs' tail must be a number, got '{}'", raw))
                    })?,
                    None => DEFAULT_LOG_TAIL,
                };
                DockerCommand::Logs {
                    container: container()?,
                    tail,
                }
            }
            "inspect" => DockerCommand::Inspect(container()?),
            "remove" => DockerCommand::Remove(container()?),
            "version" => DockerCommand::Version,
            other => return Err(ConduitError::unknown_command(other, COMMANDS)),
        })
    }
}
