//! Error types, one enum per concern.

use thiserror::Error;

use crate::options::UiMode;

/// Startup configuration problems. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },

    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Login rejections. The user is simply asked again.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Please enter your name.")]
    EmptyName,

    #[error("The class passphrase is incorrect.")]
    WrongPassphrase,
}

/// Failures talking to the completion service, blocking or streaming.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("the service returned no content")]
    EmptyResponse,

    #[error("stream error: {0}")]
    Stream(String),

    #[error("stream ended before the completion signal")]
    Truncated,
}

/// Failures writing an audit row.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("insert rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Other(String),
}

/// Submissions the controller refuses before any work is done.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("Please log in first.")]
    NotAuthenticated,

    #[error("This action is only available in {} mode.", .expected.display_name())]
    WrongMode { expected: UiMode },

    #[error("Please enter some text first.")]
    EmptyInput,
}
