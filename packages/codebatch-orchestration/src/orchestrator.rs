//! C7: the workflow orchestrator. Sequences shard runs across a batch's
//! tasks in dependency order, driving `codebatch_storage::shard::run_shard`
//! (synchronous) from async code via `spawn_blocking`.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use codebatch_storage::layout;
use codebatch_storage::schema::{BatchMeta, BatchStatus, FileRecord, PlanEntry, ShardStatus, TaskMeta};
use codebatch_storage::shard::ShardExecutor;
use codebatch_storage::BlobStore;
use futures::future::join_all;
use tracing::{info, warn};

use crate::error::{OrchestratorError, Result};

/// Aggregated outcome of one `run`/`resume` call.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub shards_completed: u64,
    pub shards_failed: u64,
    pub success: bool,
}

pub struct Orchestrator {
    store_root: PathBuf,
    blobs: BlobStore,
    executors: HashMap<String, Arc<dyn ShardExecutor>>,
}

impl Orchestrator {
    pub fn new(store_root: impl Into<PathBuf>, executors: HashMap<String, Arc<dyn ShardExecutor>>) -> Self {
        let store_root = store_root.into();
        let blobs = BlobStore::new(layout::objects_root(&store_root));
        Self { store_root, blobs, executors }
    }

    /// `run(batch_id, task_filter)` iterates `plan.json` tasks in order,
    /// and within each task iterates only shards that own snapshot files,
    /// skipping shards already done or whose deps aren't done yet.
    /// `resume` is this with no filter — idempotent since `run_shard`'s own
    /// first step is a no-op on `done`.
    pub async fn run(&self, batch_id: &str, task_filter: Option<&[String]>) -> Result<PipelineResult> {
        let batch_meta = read_batch_meta(&self.store_root, batch_id)?;
        let plan = read_plan(&self.store_root, batch_id)?;
        let owned_shards = shard_ids_owning_files(&self.store_root, &batch_meta.snapshot_id)?;

        let mut result = PipelineResult::default();

        for task in &plan {
            if let Some(filter) = task_filter {
                if !filter.contains(&task.task_id) {
                    continue;
                }
            }

            let executor = self
                .executors
                .get(&task.task_type)
                .cloned()
                .ok_or_else(|| OrchestratorError::PipelineNotFound(task.task_type.clone()))?;

            let task_meta = read_task_meta(&self.store_root, batch_id, &task.task_id)?;

            let mut handles = Vec::new();
            for shard_id in &owned_shards {
                let state = read_shard_state(&self.store_root, batch_id, &task.task_id, shard_id)?;
                if state.status == ShardStatus::Done {
                    continue;
                }
                if !dependencies_done(&self.store_root, batch_id, &task_meta, shard_id)? {
                    info!(task = %task.task_id, shard = %shard_id, "skipping shard: dependencies not yet done");
                    continue;
                }

                let store_root = self.store_root.clone();
                let blobs = self.blobs.clone();
                let batch_id = batch_id.to_string();
                let task_id = task.task_id.clone();
                let shard_id = shard_id.clone();
                let executor = executor.clone();
                handles.push(tokio::task::spawn_blocking(move || {
                    codebatch_storage::shard::run_shard(&store_root, &blobs, &batch_id, &task_id, &shard_id, executor.as_ref())
                }));
            }

            let mut task_shards_failed = 0u64;
            for joined in join_all(handles).await {
                match joined {
                    Ok(Ok(_)) => result.shards_completed += 1,
                    Ok(Err(e)) => {
                        warn!(task = %task.task_id, error = %e, "shard failed");
                        result.shards_failed += 1;
                        task_shards_failed += 1;
                    }
                    Err(join_err) => {
                        warn!(task = %task.task_id, error = %join_err, "shard runner task panicked");
                        result.shards_failed += 1;
                        task_shards_failed += 1;
                    }
                }
            }

            if task_shards_failed == 0 {
                result.tasks_completed += 1;
            } else {
                result.tasks_failed += 1;
            }
        }

        result.success = result.tasks_failed == 0 && result.shards_failed == 0;

        let mut updated = batch_meta;
        updated.status = if result.success { BatchStatus::Done } else { BatchStatus::Failed };
        codebatch_storage::atomic::write_atomic(
            &layout::batch_json(&self.store_root, batch_id),
            &serde_json::to_vec(&updated)?,
        )?;

        Ok(result)
    }

    pub async fn resume(&self, batch_id: &str) -> Result<PipelineResult> {
        self.run(batch_id, None).await
    }
}

fn read_batch_meta(store_root: &Path, batch_id: &str) -> Result<BatchMeta> {
    let path = layout::batch_json(store_root, batch_id);
    let bytes = std::fs::read(&path)
        .map_err(|_| OrchestratorError::Storage(codebatch_storage::StorageError::BatchNotFound(batch_id.to_string())))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn read_plan(store_root: &Path, batch_id: &str) -> Result<Vec<PlanEntry>> {
    let path = layout::plan_json(store_root, batch_id);
    let bytes = std::fs::read(&path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn read_task_meta(store_root: &Path, batch_id: &str, task_id: &str) -> Result<TaskMeta> {
    let path = layout::task_json(store_root, batch_id, task_id);
    let bytes = std::fs::read(&path).map_err(|_| {
        OrchestratorError::Storage(codebatch_storage::StorageError::TaskNotFound {
            batch_id: batch_id.to_string(),
            task_id: task_id.to_string(),
        })
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn read_shard_state(
    store_root: &Path,
    batch_id: &str,
    task_id: &str,
    shard_id: &str,
) -> Result<codebatch_storage::schema::ShardState> {
    let path = layout::shard_state_json(store_root, batch_id, task_id, shard_id);
    let bytes = std::fs::read(&path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn dependencies_done(store_root: &Path, batch_id: &str, task_meta: &TaskMeta, shard_id: &str) -> Result<bool> {
    for dep in &task_meta.inputs.tasks {
        let dep_state = read_shard_state(store_root, batch_id, dep, shard_id)?;
        if dep_state.status != ShardStatus::Done {
            return Ok(false);
        }
    }
    Ok(true)
}

/// The set of shard ids that own at least one snapshot file, in ascending
/// lexicographic order (a `BTreeSet<String>` over two-hex-char ids sorts
/// correctly since they are fixed-width).
fn shard_ids_owning_files(store_root: &Path, snapshot_id: &str) -> Result<BTreeSet<String>> {
    let path = layout::files_index_jsonl(store_root, snapshot_id);
    let content = std::fs::read_to_string(&path)?;
    let mut out = BTreeSet::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let rec: FileRecord = serde_json::from_str(line)?;
        out.insert(rec.object.shard_prefix().to_string());
    }
    Ok(out)
}
