//! # Error Types
//!
//! This module defines the error type used throughout the kvgen library.
//!
//! Every variant maps onto one class of failure the editor can recover from:
//! nothing here is fatal to the process, callers report the message and
//! return control to the user.

use thiserror::Error;

/// Main error type for kvgen operations
#[derive(Debug, Error)]
pub enum KvError {
    /// Invalid user input (missing file, unknown id, bad argument)
    #[error("Invalid input: {0}")]
    Input(String),

    /// A product lookup returned no rows
    #[error("No product found for code '{0}'")]
    ProductNotFound(String),

    /// Remote service unreachable or answered with a non-2xx status
    #[error("Network error: {0}")]
    Network(String),

    /// Image could not be fetched or decoded
    #[error("Asset error: {0}")]
    Asset(String),

    /// Rasterization or encoding failed with every strategy
    #[error("Export error: {0}")]
    Export(String),

    /// Persisted state is corrupt or could not be written
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for KvError {
    fn from(e: reqwest::Error) -> Self {
        KvError::Network(e.to_string())
    }
}

impl From<image::ImageError> for KvError {
    fn from(e: image::ImageError) -> Self {
        KvError::Asset(e.to_string())
    }
}
