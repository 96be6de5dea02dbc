use std::path::PathBuf;

use thiserror::Error as ThisError;

use crate::provider::Provider;

/// Failure of one completion request. Always recoverable through retry.
#[derive(Debug, ThisError)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Http(#[source] reqwest::Error),

    #[error("request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response contained no choice to show")]
    NoChoice,

    #[error("{} API key not configured", .0.display_name())]
    MissingApiKey(Provider),

    #[error("request cancelled")]
    Cancelled,

    #[error("request task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Http(err)
        }
    }
}

/// Why a submit or retry was not started. Callers ignore these silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum SubmitRejected {
    #[error("a request is already in flight")]
    Busy,

    #[error("prompt is empty")]
    EmptyInput,

    #[error("no failed request to retry")]
    NothingToRetry,
}

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown provider '{0}' (available: {})", Provider::names())]
    UnknownProvider(String),

    #[error("no provider selected; pass --provider or set \"provider\" in the config file (available: {})", Provider::names())]
    NoProvider,

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
