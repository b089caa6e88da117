//! C5: the batch planner. Materializes a registered pipeline into a
//! batch/task/shard skeleton — `init_batch` is the only entry point and it
//! is atomic only at the granularity of each file it writes; a crash
//! mid-plan leaves a partially-materialized batch directory that a second
//! `init_batch` with the same id will refuse to touch (`BatchExists`).

use codebatch_storage::atomic::write_atomic;
use codebatch_storage::error::StorageError;
use codebatch_storage::ids::now_rfc3339;
use codebatch_storage::layout;
use codebatch_storage::schema::{BatchMeta, BatchStatus, Sharding, TaskInputs, TaskMeta, ShardState};
use serde_json::Value;
use std::path::Path;

use crate::error::{OrchestratorError, Result};
use crate::pipeline;

/// Plan a new batch. Returns the batch id (either the caller-supplied one
/// or a freshly generated `batch-YYYYMMDD-HHMMSS-<rand8>`).
pub fn init_batch(
    store_root: &Path,
    snapshot_id: &str,
    pipeline_name: &str,
    batch_id: Option<String>,
    metadata: Option<Value>,
) -> Result<String> {
    let snapshot_json = layout::snapshot_json(store_root, snapshot_id);
    if !snapshot_json.is_file() {
        return Err(OrchestratorError::Storage(StorageError::SnapshotNotFound(
            snapshot_id.to_string(),
        )));
    }

    let pipeline = pipeline::lookup(pipeline_name)?;

    let batch_id = batch_id.unwrap_or_else(codebatch_storage::ids::new_batch_id);
    let batch_dir = layout::batch_dir(store_root, &batch_id);
    if batch_dir.exists() {
        return Err(OrchestratorError::BatchExists(batch_id));
    }

    let batch_meta = BatchMeta {
        batch_id: batch_id.clone(),
        snapshot_id: snapshot_id.to_string(),
        pipeline: pipeline.name.clone(),
        status: BatchStatus::Pending,
        created_at: now_rfc3339(),
        metadata,
    };
    write_atomic(
        &layout::batch_json(store_root, &batch_id),
        &serde_json::to_vec(&batch_meta)?,
    )?;
    write_atomic(
        &layout::plan_json(store_root, &batch_id),
        &serde_json::to_vec(&pipeline.tasks)?,
    )?;

    let shard_ids = codebatch_storage::ids::all_shard_ids();
    for task in &pipeline.tasks {
        let task_meta = TaskMeta {
            task_id: task.task_id.clone(),
            batch_id: batch_id.clone(),
            task_type: task.task_type.clone(),
            sharding: Sharding::hash_prefix_256(),
            inputs: TaskInputs {
                snapshot: true,
                tasks: task.depends_on.clone(),
            },
            config: task.config.clone(),
        };
        write_atomic(
            &layout::task_json(store_root, &batch_id, &task.task_id),
            &serde_json::to_vec(&task_meta)?,
        )?;

        for shard_id in &shard_ids {
            let state = ShardState::new_ready(&batch_id, &task.task_id, shard_id);
            write_atomic(
                &layout::shard_state_json(store_root, &batch_id, &task.task_id, shard_id),
                &serde_json::to_vec(&state)?,
            )?;
            write_atomic(
                &layout::shard_outputs_jsonl(store_root, &batch_id, &task.task_id, shard_id),
                b"",
            )?;
        }
    }

    Ok(batch_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebatch_storage::schema::ShardStatus;
    use codebatch_storage::BlobStore;
    use tempfile::tempdir;

    fn setup_with_snapshot() -> (tempfile::TempDir, std::path::PathBuf, String) {
        let outer = tempdir().unwrap();
        let root = outer.path().join("store");
        let source = outer.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("a.py"), b"print('hi')\n").unwrap();
        codebatch_storage::store_root::init(&root, "test", false).unwrap();
        let blobs = BlobStore::new(layout::objects_root(&root));
        let snapshot_id = codebatch_storage::snapshot::build(
            &source,
            &layout::snapshots_root(&root),
            &blobs,
            None,
            None,
        )
        .unwrap();
        (outer, root, snapshot_id)
    }

    #[test]
    fn test_init_batch_parse_pipeline_creates_single_task() {
        let (_outer, root, snapshot_id) = setup_with_snapshot();
        let batch_id = init_batch(&root, &snapshot_id, "parse", None, None).unwrap();
        assert!(layout::batch_json(&root, &batch_id).is_file());
        assert!(layout::task_json(&root, &batch_id, "01_parse").is_file());
        assert!(!layout::task_dir(&root, &batch_id, "02_analyze").exists());
    }

    #[test]
    fn test_init_batch_creates_256_shards_per_task() {
        let (_outer, root, snapshot_id) = setup_with_snapshot();
        let batch_id = init_batch(&root, &snapshot_id, "parse", None, None).unwrap();
        for shard_id in codebatch_storage::ids::all_shard_ids() {
            let state_path = layout::shard_state_json(&root, &batch_id, "01_parse", &shard_id);
            assert!(state_path.is_file(), "missing shard {shard_id}");
            let state: ShardState = serde_json::from_slice(&std::fs::read(&state_path).unwrap()).unwrap();
            assert_eq!(state.status, ShardStatus::Ready);
            assert_eq!(state.attempt, 0);
        }
    }

    #[test]
    fn test_init_batch_full_pipeline_creates_four_tasks() {
        let (_outer, root, snapshot_id) = setup_with_snapshot();
        let batch_id = init_batch(&root, &snapshot_id, "full", None, None).unwrap();
        for task_id in ["01_parse", "02_analyze", "03_symbols", "04_lint"] {
            assert!(layout::task_json(&root, &batch_id, task_id).is_file());
        }
    }

    #[test]
    fn test_init_batch_rejects_duplicate_id() {
        let (_outer, root, snapshot_id) = setup_with_snapshot();
        let batch_id = init_batch(&root, &snapshot_id, "parse", Some("batch-fixed".to_string()), None).unwrap();
        let err = init_batch(&root, &snapshot_id, "parse", Some(batch_id), None).unwrap_err();
        assert!(matches!(err, OrchestratorError::BatchExists(_)));
    }

    #[test]
    fn test_init_batch_rejects_unknown_snapshot() {
        let (_outer, root, _snapshot_id) = setup_with_snapshot();
        let err = init_batch(&root, "snap-does-not-exist", "parse", None, None).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Storage(StorageError::SnapshotNotFound(_))
        ));
    }

    #[test]
    fn test_init_batch_rejects_unknown_pipeline() {
        let (_outer, root, snapshot_id) = setup_with_snapshot();
        let err = init_batch(&root, &snapshot_id, "no-such-pipeline", None, None).unwrap_err();
        assert!(matches!(err, OrchestratorError::PipelineNotFound(_)));
    }

    #[test]
    fn test_init_batch_plan_json_preserves_task_order() {
        let (_outer, root, snapshot_id) = setup_with_snapshot();
        let batch_id = init_batch(&root, &snapshot_id, "full", None, None).unwrap();
        let plan: Vec<codebatch_storage::schema::PlanEntry> =
            serde_json::from_slice(&std::fs::read(layout::plan_json(&root, &batch_id)).unwrap()).unwrap();
        assert_eq!(plan[0].task_id, "01_parse");
    }
}
