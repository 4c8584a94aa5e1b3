//! CLI error type.

use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("style error: {0}")]
    Style(#[from] tilescape::style::StyleError),

    #[error("runtime error: {0}")]
    Runtime(String),
}
