//! Gate result types: the structured output format for a single gate run
//! and for a bundle of them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use codebatch_storage::layout;

/// A gate's enforcement status. `ENFORCED` gates block `release`; `HARNESS`
/// gates have working checks that have not yet been promoted; `PLACEHOLDER`
/// gates are registered but never invoked (a bundle run counts them as
/// skipped without calling their entrypoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    Enforced,
    Harness,
    Placeholder,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStatus::Enforced => "ENFORCED",
            GateStatus::Harness => "HARNESS",
            GateStatus::Placeholder => "PLACEHOLDER",
        }
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single failure within a gate run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateFailure {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl GateFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Default::default() }
    }

    pub fn expected_actual(message: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: Some(expected.into()),
            actual: Some(actual.into()),
            ..Default::default()
        }
    }
}

/// Context handed to every gate entrypoint. Carries the inputs the gate
/// needs plus the run id used to namespace its artifact directory.
#[derive(Debug, Clone)]
pub struct GateContext {
    pub store_root: PathBuf,
    pub batch_id: Option<String>,
    pub snapshot_id: Option<String>,
    pub task_ids: Option<Vec<String>>,
    pub run_id: String,
}

impl GateContext {
    pub fn new(store_root: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            store_root: store_root.into(),
            batch_id: None,
            snapshot_id: None,
            task_ids: None,
            run_id: run_id.into(),
        }
    }

    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn with_snapshot(mut self, snapshot_id: impl Into<String>) -> Self {
        self.snapshot_id = Some(snapshot_id.into());
        self
    }

    pub fn with_tasks(mut self, task_ids: Vec<String>) -> Self {
        self.task_ids = Some(task_ids);
        self
    }

    /// `indexes/gate_artifacts/<gate_id>/<run_id>/`, created if absent.
    pub fn artifact_dir(&self, gate_id: &str) -> std::io::Result<PathBuf> {
        let dir = layout::gate_artifacts_dir(&self.store_root, gate_id, &self.run_id);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn write_artifact(&self, gate_id: &str, name: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.artifact_dir(gate_id)?.join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn write_artifact_json(&self, gate_id: &str, name: &str, data: &Value) -> std::io::Result<PathBuf> {
        let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| "null".to_string());
        self.write_artifact(gate_id, name, &pretty)
    }
}

/// Runtime environment stamped onto every `GateResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateEnvironment {
    pub os: String,
    pub rustc_target: String,
    pub codebatch_version: String,
}

impl Default for GateEnvironment {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            rustc_target: std::env::consts::ARCH.to_string(),
            codebatch_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Result of executing a single gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: String,
    pub status: GateStatus,
    pub passed: bool,
    pub duration_ms: u64,
    pub details: HashMap<String, Value>,
    pub artifacts: Vec<String>,
    pub failures: Vec<GateFailure>,
    pub environment: GateEnvironment,
}

impl GateResult {
    pub fn passing(gate_id: impl Into<String>, status: GateStatus) -> Self {
        Self {
            gate_id: gate_id.into(),
            status,
            passed: true,
            duration_ms: 0,
            details: HashMap::new(),
            artifacts: Vec::new(),
            failures: Vec::new(),
            environment: GateEnvironment::default(),
        }
    }

    pub fn add_failure(&mut self, failure: GateFailure) {
        self.failures.push(failure);
        self.passed = false;
    }

    /// Record file names relative to `store_root` for every file under
    /// this run's artifact directory, if any were written.
    pub fn collect_artifacts(&mut self, store_root: &Path, gate_id: &str, run_id: &str) {
        let dir = layout::gate_artifacts_dir(store_root, gate_id, run_id);
        let Ok(entries) = std::fs::read_dir(&dir) else { return };
        let mut found = Vec::new();
        for entry in entries.flatten() {
            if entry.path().is_file() {
                if let Ok(rel) = entry.path().strip_prefix(store_root) {
                    found.push(rel.display().to_string());
                }
            }
        }
        found.sort();
        self.artifacts = found;
    }
}

/// Result of running a named bundle of gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleResult {
    pub bundle_name: String,
    pub passed: bool,
    pub total: usize,
    pub passed_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub duration_ms: u64,
    pub results: Vec<GateResult>,
}
