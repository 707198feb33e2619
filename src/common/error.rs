//! Error types for clusterd

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Repository Errors ===
    #[error("Volume not found: {0}")]
    NotFound(String),

    #[error("Failed to serialize record for {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to deserialize record at {key}: {source}")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    // === Brick location Errors ===
    #[error("Host {host} is not part of volume {volume}")]
    UnknownHost { volume: String, host: String },

    #[error("Brick {host}:{path} is not part of volume {volume}")]
    UnknownBrickPath {
        volume: String,
        host: String,
        path: String,
    },

    // === Coordination store Errors ===
    #[error("Coordination store error: {0}")]
    StoreTransport(String),

    // === Supervisor Errors ===
    #[error("Coordination store at {url} not healthy after {timeout:?}")]
    HealthCheckTimeout { url: String, timeout: Duration },

    #[error("Process control failed: {0}")]
    ProcessControl(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Is this a retryable error?
    ///
    /// The repository never retries on its own; this is for callers that do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreTransport(_))
    }

    /// Is this one of the two brick-location failures?
    pub fn is_brick_location(&self) -> bool {
        matches!(self, Error::UnknownHost { .. } | Error::UnknownBrickPath { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::StoreTransport(e.to_string())
    }
}
