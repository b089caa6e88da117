use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("storage error: {0}")]
    Storage(#[from] codebatch_storage::StorageError),

    #[error("pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("gate not found: {gate}{suggestion}", suggestion = .suggestion.as_ref().map(|s| format!(" (did you mean \"{s}\"?)")).unwrap_or_default())]
    GateNotFound {
        gate: String,
        suggestion: Option<String>,
    },

    #[error("gate '{gate}' requires: {}", .missing.join(", "))]
    GateMissingInputs { gate: String, missing: Vec<String> },

    #[error("unknown or empty gate bundle: {0}")]
    BundleNotFound(String),

    #[error("batch already exists: {0}")]
    BatchExists(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("DAG cycle detected among tasks: {0:?}")]
    DagCycleDetected(Vec<String>),

    #[error("missing dependency {dependency} for task {task_id}")]
    MissingDependency { task_id: String, dependency: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    pub fn serialization<E: std::fmt::Display>(e: E) -> Self {
        Self::Serialization(e.to_string())
    }

    pub fn parse<E: std::fmt::Display>(e: E) -> Self {
        Self::Parse(e.to_string())
    }

    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }
}

/// Classification used only by the gate runner's own retry/alerting
/// policy; the shard runner never retries automatically and has no use
/// for this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    Transient,
    Permanent,
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "transient" => Ok(ErrorCategory::Transient),
            "permanent" => Ok(ErrorCategory::Permanent),
            "infrastructure" => Ok(ErrorCategory::Infrastructure),
            _ => Err(OrchestratorError::parse(format!("invalid error category: {s}"))),
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
