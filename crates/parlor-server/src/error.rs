//! Server-level errors.

use thiserror::Error;

/// Errors from binding and running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Socket-level failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document or an override was invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}
