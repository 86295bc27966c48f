//! Error types for broker operations

use crate::error::AppError;

/// Result type for broker operations
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur during broker operations
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// No connection or channel is currently open
    #[error("Broker not connected")]
    NotConnected,

    /// Underlying AMQP protocol error
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// Consumer registration failed
    #[error("Consume failed: {0}")]
    Consume(String),

    /// Invalid routing pattern
    #[error("Invalid routing pattern: {0}")]
    InvalidPattern(String),
}

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        AppError::Broker(err.to_string())
    }
}
