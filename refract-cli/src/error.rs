//! Centralized CLI error handling with user-friendly messages.

use std::fmt;

/// Errors surfaced to the terminal.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or conflicting configuration.
    Config(String),
    /// Failure while running the server.
    Serve(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(message) => write!(f, "configuration error: {message}"),
            CliError::Serve(message) => write!(f, "server error: {message}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<refract::error::Error> for CliError {
    fn from(err: refract::error::Error) -> Self {
        CliError::Serve(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Serve(err.to_string())
    }
}
