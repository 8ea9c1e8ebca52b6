//! RabbitMQ provider for Conduit
//!
//! Queue commands travel over AMQP 0-9-1; the queue and exchange listing
//! comes from the management plugin's HTTP API.

mod command;
mod management;
mod provider;
mod session;

#[cfg(test)]
mod provider_tests;

pub use command::{COMMANDS, QueueCommand};
pub use management::ManagementApi;
pub use provider::RabbitMqProvider;
pub use session::RabbitMqSession;
