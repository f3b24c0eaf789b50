use crate::info::QueryState;
use thiserror::Error;

/// Errors raised by the query client layers.
#[derive(Debug, Error)]
pub enum QuarryError {
    /// Storage has no entry for the key. Caching layers recover from this
    /// locally by falling back to the wrapped service.
    #[error("Key not found in storage: {key}")]
    NotFound { key: String },

    /// The query reached a terminal state other than SUCCEEDED.
    #[error("{}", describe_failure(.state, .reason))]
    QueryFailed {
        execution_id: String,
        state: QueryState,
        reason: Option<String>,
    },

    /// Waiting for the query was cancelled by the caller.
    #[error("Interrupted while waiting for query {execution_id}")]
    Interrupted { execution_id: String },

    #[error("Cannot decode {type_tag} value {value:?}: {message}")]
    Decode {
        type_tag: String,
        value: String,
        message: String,
    },

    /// Column names, column types and rows disagree in length.
    #[error("Inconsistent result shape: {0}")]
    Shape(String),

    #[error("Storage error at {uri}: {source}")]
    Storage {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache entry {key}: {message}")]
    CorruptCache { key: String, message: String },

    #[error("Unsupported storage URI: {0}")]
    UnsupportedStorage(String),

    #[error("Remote service error: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("Cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl QuarryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, QuarryError::NotFound { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, QuarryError::Interrupted { .. })
    }

    pub(crate) fn decode(
        type_tag: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        QuarryError::Decode {
            type_tag: type_tag.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    pub(crate) fn storage(uri: impl Into<String>, source: std::io::Error) -> Self {
        QuarryError::Storage {
            uri: uri.into(),
            source,
        }
    }
}

impl From<anyhow::Error> for QuarryError {
    fn from(err: anyhow::Error) -> Self {
        QuarryError::Transport(err)
    }
}

fn describe_failure(state: &QueryState, reason: &Option<String>) -> String {
    let verb = state.as_str().to_lowercase();
    match reason {
        Some(reason) => format!("query {}: {}", verb, reason),
        None => format!("query {}", verb),
    }
}

pub type Result<T> = std::result::Result<T, QuarryError>;
