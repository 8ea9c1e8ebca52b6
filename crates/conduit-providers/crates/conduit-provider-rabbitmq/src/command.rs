//! Queue command vocabulary

use conduit_core::{ConduitError, Result, parse_command};

#[cfg(test)]
mod tests;

pub const COMMANDS: &[&str] = &["publish", "get", "declare", "purge", "delete", "count"];

/// One queue operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCommand {
    /// Publish through the default exchange, routed by queue name
    Publish { queue: String, message: String },
    /// Fetch and acknowledge one message
    Get { queue: String },
    Declare { queue: String },
    Purge { queue: String },
    Delete { queue: String },
    /// Passive declare; fails when the queue does not exist
    Count { queue: String },
}

impl QueueCommand {
    pub fn parse(input: &str) -> Result<Self> {
        let cmd = parse_command(input, COMMANDS)?;
        let queue = cmd.arg(0, "queue")?.to_string();
        Ok(match cmd.name.as_str() {
            "publish" => {
                let message = cmd
                    .text(1)
                    .ok_or_else(|| ConduitError::Exec("'publish' requires a message".into()))?;
                QueueCommand::Publish { queue, message }
            }
            "get" => QueueCommand::Get { queue },
            "declare" => QueueCommand::Declare { queue },
            "purge" => QueueCommand::Purge { queue },
            "delete" => QueueCommand::Delete { queue },
            "count" => QueueCommand::Count { queue },
            other => return Err(ConduitError::unknown_command(other, COMMANDS)),
        })
    }

    pub fn queue(&self) -> &str {
        match self {
            QueueCommand::Publish { queue, .. }
            | QueueCommand::Get { queue }
            | QueueCommand::Declare { queue }
            | QueueCommand::Purge { queue }
            | QueueCommand::Delete { queue }
            | QueueCommand::Count { queue } => queue,
        }
    }
}
