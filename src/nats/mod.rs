pub mod client;
pub mod messages;

pub use client::{NatsClient, NatsNotifier};
pub use messages::{EventMessage, StatusMessage};
