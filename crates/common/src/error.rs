//! Common error types for the IPVS workspace.

use std::fmt;

/// A specialized Result type for IPVS operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for IPVS operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or kernel error, passed through from the transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Netlink framing error raised by the transport.
    #[error("Netlink error: {0}")]
    Netlink(String),

    /// A query returned no messages.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A mutating command was not acknowledged.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Malformed attribute stream.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Payload could not be built.
    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new netlink error.
    pub fn netlink(msg: impl fmt::Display) -> Self {
        Error::Netlink(msg.to_string())
    }

    /// Create a new not-found error.
    pub fn not_found(msg: impl fmt::Display) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new invalid-response error.
    pub fn invalid_response(msg: impl fmt::Display) -> Self {
        Error::InvalidResponse(msg.to_string())
    }

    /// Create a new decode error.
    pub fn decode(msg: impl fmt::Display) -> Self {
        Error::Decode(msg.to_string())
    }

    /// Create a new encode error.
    pub fn encode(msg: impl fmt::Display) -> Self {
        Error::Encode(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Returns true if the error reports a query with no results.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Returns true if the error came from a malformed attribute stream.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }
}
