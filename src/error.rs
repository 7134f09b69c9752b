use std::{io, str::Utf8Error};

use thiserror::Error;

/// Startup failures. Any of these stops the process before it binds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ANTHROPIC_API_KEY not set")]
    MissingApiKey,

    #[error("invalid PORT value: {value:?}")]
    InvalidPort { value: String },
}

/// Failures of the remote completion call.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request to completion API failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("completion API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("completion API returned no text content")]
    EmptyCompletion,

    #[error("failed to start completion runtime: {0}")]
    Runtime(#[source] io::Error),

    /// Free-form failure, used by substitute completers.
    #[error("{0}")]
    Other(String),
}

/// The completion text could not be split into headers and body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("Invalid HTTP format")]
    MissingSeparator,
}

/// Transport failures on the client connection. These never produce a
/// response; the connection is logged and closed.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("request is not valid UTF-8: {0}")]
    Decode(#[from] Utf8Error),
}

/// Failures of the listener loop itself.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("no address found for {0}")]
    NoAddress(String),

    #[error("{0}")]
    Io(#[from] io::Error),
}
