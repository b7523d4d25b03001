//! Error types for setup paths (config, GPU, audio feed).
//!
//! Per-frame code never returns these; it skips the effect instead.

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Audio feed error: {0}")]
    Audio(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
