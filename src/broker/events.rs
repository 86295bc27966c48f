//! Broker lifecycle signals
//!
//! The connection lifecycle is observed through a broadcast channel rather
//! than a one-shot future: a connection can drop and come back arbitrarily
//! many times, and every (re)connect must re-establish topology and
//! consumption. Subscribers must register before the first connection attempt
//! or they can miss a connect that succeeds in the background.

/// A broker lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// Connection and channel established (initial connect or reconnect)
    Connected,
    /// Connection lost; a reconnect is being scheduled if attempts remain
    Disconnected,
    /// Connection-level error surfaced by the transport
    Error(String),
}
