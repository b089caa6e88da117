//! Path helpers for the on-disk store layout (§6). Centralizing these
//! keeps every component agreeing on where a given record lives.

use std::path::{Path, PathBuf};

pub fn objects_root(store_root: &Path) -> PathBuf {
    store_root.join("objects").join("sha256")
}

pub fn snapshots_root(store_root: &Path) -> PathBuf {
    store_root.join("snapshots")
}

pub fn snapshot_dir(store_root: &Path, snapshot_id: &str) -> PathBuf {
    snapshots_root(store_root).join(snapshot_id)
}

pub fn snapshot_json(store_root: &Path, snapshot_id: &str) -> PathBuf {
    snapshot_dir(store_root, snapshot_id).join("snapshot.json")
}

pub fn files_index_jsonl(store_root: &Path, snapshot_id: &str) -> PathBuf {
    snapshot_dir(store_root, snapshot_id).join("files.index.jsonl")
}

pub fn batches_root(store_root: &Path) -> PathBuf {
    store_root.join("batches")
}

pub fn batch_dir(store_root: &Path, batch_id: &str) -> PathBuf {
    batches_root(store_root).join(batch_id)
}

pub fn batch_json(store_root: &Path, batch_id: &str) -> PathBuf {
    batch_dir(store_root, batch_id).join("batch.json")
}

pub fn plan_json(store_root: &Path, batch_id: &str) -> PathBuf {
    batch_dir(store_root, batch_id).join("plan.json")
}

pub fn batch_events_jsonl(store_root: &Path, batch_id: &str) -> PathBuf {
    batch_dir(store_root, batch_id).join("events.jsonl")
}

pub fn task_dir(store_root: &Path, batch_id: &str, task_id: &str) -> PathBuf {
    batch_dir(store_root, batch_id).join("tasks").join(task_id)
}

pub fn task_json(store_root: &Path, batch_id: &str, task_id: &str) -> PathBuf {
    task_dir(store_root, batch_id, task_id).join("task.json")
}

pub fn task_events_jsonl(store_root: &Path, batch_id: &str, task_id: &str) -> PathBuf {
    task_dir(store_root, batch_id, task_id).join("events.jsonl")
}

pub fn shard_dir(store_root: &Path, batch_id: &str, task_id: &str, shard_id: &str) -> PathBuf {
    task_dir(store_root, batch_id, task_id)
        .join("shards")
        .join(shard_id)
}

pub fn shard_state_json(
    store_root: &Path,
    batch_id: &str,
    task_id: &str,
    shard_id: &str,
) -> PathBuf {
    shard_dir(store_root, batch_id, task_id, shard_id).join("state.json")
}

pub fn shard_outputs_jsonl(
    store_root: &Path,
    batch_id: &str,
    task_id: &str,
    shard_id: &str,
) -> PathBuf {
    shard_dir(store_root, batch_id, task_id, shard_id).join("outputs.index.jsonl")
}

pub fn indexes_root(store_root: &Path) -> PathBuf {
    store_root.join("indexes")
}

pub fn lmdb_dir(store_root: &Path) -> PathBuf {
    indexes_root(store_root).join("lmdb")
}

pub fn cache_meta_json(store_root: &Path) -> PathBuf {
    lmdb_dir(store_root).join("cache_meta.json")
}

pub fn gate_artifacts_dir(store_root: &Path, gate_id: &str, run_id: &str) -> PathBuf {
    indexes_root(store_root)
        .join("gate_artifacts")
        .join(gate_id)
        .join(run_id)
}
