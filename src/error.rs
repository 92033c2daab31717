//! Error types for Ridelink

use thiserror::Error;

/// Errors that can occur while parsing, transforming, or relaying events
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Wire payload too large: {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Link is not ready (current state: {0})")]
    LinkNotReady(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
