//! Message broker module
//!
//! Maintains connectivity to an AMQP topic broker and delivers decoded
//! messages to registered handlers. Broker unavailability is treated as a
//! recoverable background condition: connect failures never propagate to the
//! caller, and reconnection runs with bounded backoff until the attempt cap
//! is reached.
//!
//! Components:
//! - **client**: connection lifecycle, topology declaration, consume/publish
//! - **events**: lifecycle signals (connected/disconnected/error) as a
//!   broadcast channel, subscribed before the first connection attempt
//! - **pattern**: topic routing-pattern parsing and matching
//! - **error**: broker error taxonomy
//! - **metrics**: Prometheus counters for consumption and reconnects

pub mod client;
pub mod error;
pub mod events;
pub mod metrics;
pub mod pattern;

pub use client::{BrokerClient, BrokerStatus};
pub use error::{BrokerError, BrokerResult};
pub use events::BrokerEvent;
pub use pattern::RoutingPattern;
