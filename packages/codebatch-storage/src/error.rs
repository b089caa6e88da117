//! Error types for codebatch-storage

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store already exists at {0}")]
    StoreExists(String),

    #[error("invalid store at {path}: {reason}")]
    InvalidStore { path: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("snapshot already exists: {0}")]
    SnapshotExists(String),

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("batch already exists: {0}")]
    BatchExists(String),

    #[error("batch not found: {0}")]
    BatchNotFound(String),

    #[error("task not found: {task_id} in batch {batch_id}")]
    TaskNotFound { batch_id: String, task_id: String },

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path escapes root: {0}")]
    PathEscape(String),

    #[error("cannot reset shard {shard_id} of task {task_id}: status is {status}, not failed")]
    ShardRetryIllegal {
        task_id: String,
        shard_id: String,
        status: String,
    },

    #[error("dependencies not complete for shard {shard_id} of task {task_id}: {missing:?}")]
    DependenciesNotComplete {
        task_id: String,
        shard_id: String,
        missing: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
