//! Error types for Harken core

use thiserror::Error;

use crate::proto::ProtocolError;

/// Result type alias for Harken operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Harken core
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or incomplete frame on a session
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Socket setup or connection failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Failure inside a managed service's start routine
    #[error("service start error: {0}")]
    ServiceStart(String),

    /// The task queue was polled while empty (expected, non-fatal)
    #[error("task queue is empty")]
    QueueEmpty,

    /// Task could not be dispatched to its handler
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Inference engine failure
    #[error("inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
