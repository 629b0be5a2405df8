//! Error type shared by every pipeline stage

#[derive(Debug)]
pub enum PipelineError {
    Database(rusqlite::Error),
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Http(reqwest::Error),
    /// Reading source answered, but not with something usable
    Source(String),
    InvalidTimestamp(String),
    InvalidKey(String),
    /// A per-station task panicked or was cancelled
    Task(String),
    Config(String),
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Database(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err)
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Http(err)
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        PipelineError::Task(err.to_string())
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Database(e) => write!(f, "Database error: {}", e),
            PipelineError::Io(e) => write!(f, "IO error: {}", e),
            PipelineError::Serialization(e) => write!(f, "Serialization error: {}", e),
            PipelineError::Http(e) => write!(f, "HTTP error: {}", e),
            PipelineError::Source(msg) => write!(f, "Reading source error: {}", msg),
            PipelineError::InvalidTimestamp(ts) => write!(f, "Invalid timestamp: {}", ts),
            PipelineError::InvalidKey(key) => write!(f, "Invalid blob key: {}", key),
            PipelineError::Task(msg) => write!(f, "Task failed: {}", msg),
            PipelineError::Config(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Database(e) => Some(e),
            PipelineError::Io(e) => Some(e),
            PipelineError::Serialization(e) => Some(e),
            PipelineError::Http(e) => Some(e),
            _ => None,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
