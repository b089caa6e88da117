//! On-disk record shapes. Every struct here round-trips through
//! `serde_json` with unknown fields preserved via a captured `extra` map,
//! per the forward-compatibility invariant.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ObjectRef;

/// `store.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub schema_name: String,
    pub schema_version: u32,
    pub producer: String,
    pub created_at: String,
}

impl StoreMeta {
    pub const SCHEMA_NAME: &'static str = "codebatch.store";
    pub const SCHEMA_VERSION: u32 = 1;
}

/// `snapshots/<id>/snapshot.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub snapshot_id: String,
    pub created_at: String,
    pub source: SnapshotSource,
    pub file_count: u64,
    pub total_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub path: String,
}

/// One line of `files.index.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub path_key: String,
    pub object: ObjectRef,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang_hint: Option<String>,
}

/// `batches/<id>/batch.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMeta {
    pub batch_id: String,
    pub snapshot_id: String,
    pub pipeline: String,
    pub status: BatchStatus,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// One entry of `plan.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub task_id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub config: Value,
}

/// `tasks/<task_id>/task.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMeta {
    pub task_id: String,
    pub batch_id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub sharding: Sharding,
    pub inputs: TaskInputs,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sharding {
    pub strategy: String,
    pub shard_count: u32,
    pub shard_ids: Vec<String>,
}

impl Sharding {
    pub fn hash_prefix_256() -> Self {
        Self {
            strategy: "hash_prefix".to_string(),
            shard_count: 256,
            shard_ids: crate::ids::all_shard_ids(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInputs {
    pub snapshot: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<String>,
}

/// `tasks/<task_id>/shards/<hh>/state.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardState {
    pub shard_id: String,
    pub task_id: String,
    pub batch_id: String,
    pub status: ShardStatus,
    pub attempt: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ShardStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ShardError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardStatus {
    Ready,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardStats {
    pub files_processed: u64,
    pub outputs_written: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardError {
    pub code: String,
    pub message: String,
}

impl ShardState {
    pub fn new_ready(batch_id: &str, task_id: &str, shard_id: &str) -> Self {
        Self {
            shard_id: shard_id.to_string(),
            task_id: task_id.to_string(),
            batch_id: batch_id.to_string(),
            status: ShardStatus::Ready,
            attempt: 0,
            started_at: None,
            completed_at: None,
            stats: None,
            error: None,
        }
    }
}

/// One line of `outputs.index.jsonl`. Kind-specific fields live in `extra`
/// so unrecognized kinds round-trip opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    pub schema_version: u32,
    pub snapshot_id: String,
    pub batch_id: String,
    pub task_id: String,
    pub shard_id: String,
    pub path: String,
    pub kind: String,
    pub ts: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl OutputRecord {
    pub const SCHEMA_VERSION: u32 = 1;

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn severity(&self) -> Option<&str> {
        self.get("severity").and_then(Value::as_str)
    }

    pub fn code(&self) -> Option<&str> {
        self.get("code").and_then(Value::as_str)
    }
}

/// Recognized output kinds. `kind` on the wire stays an open string; this
/// enum exists for callers that want to match on the closed set the query
/// engine and cache treat specially.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputKind {
    Ast,
    Diagnostic,
    Metric,
    Symbol,
    Edge,
    Other(String),
}

impl OutputKind {
    pub fn as_str(&self) -> &str {
        match self {
            OutputKind::Ast => "ast",
            OutputKind::Diagnostic => "diagnostic",
            OutputKind::Metric => "metric",
            OutputKind::Symbol => "symbol",
            OutputKind::Edge => "edge",
            OutputKind::Other(s) => s,
        }
    }

    pub fn parse(kind: &str) -> Self {
        match kind {
            "ast" => OutputKind::Ast,
            "diagnostic" => OutputKind::Diagnostic,
            "metric" => OutputKind::Metric,
            "symbol" => OutputKind::Symbol,
            "edge" => OutputKind::Edge,
            other => OutputKind::Other(other.to_string()),
        }
    }
}

/// A single chunk entry inside a chunk manifest blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEntry {
    pub object: ObjectRef,
    pub size: u64,
    pub index: u32,
}

/// Manifest blob referenced by an output record with `format="json+chunks"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub kind: String,
    pub format: String,
    pub chunks: Vec<ChunkEntry>,
    pub total_bytes: u64,
    pub chunk_size: u64,
}

/// `indexes/lmdb/cache_meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub cache_schema_version: u32,
    pub snapshot_id: String,
    pub batch_id: String,
    pub tasks_indexed: Vec<String>,
    pub source_fingerprint: String,
    pub built_at: String,
    pub producer: String,
}

impl CacheMeta {
    pub const SCHEMA_VERSION: u32 = 1;
}

/// An append-only observability event. Never read by any query path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event: String,
    pub ts: String,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}
