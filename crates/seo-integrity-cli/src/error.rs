//! Errors raised by the stdio worker.

#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
