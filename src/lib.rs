//! notify-relay: real-time notification relay.
//!
//! Consumes notification events from an AMQP topic exchange, persists them
//! through a repository, and fans them out to attached browser sessions over
//! Server-Sent Events. Broker unavailability is a recoverable background
//! condition, never a boot failure.

pub mod api;
pub mod broker;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod storage;
pub mod stream;

pub use config::Config;
pub use error::{AppError, Result};
pub use service::NotificationService;
