//! C9: the acceleration cache. A derived, rebuildable secondary index over
//! the authoritative `files.index.jsonl`/`outputs.index.jsonl` sources,
//! stored in an embedded ordered key-value environment (LMDB via `heed`)
//! under `indexes/lmdb/`.
//!
//! Every key is a sequence of UTF-8 segments joined by the ASCII Unit
//! Separator (0x1F), prefixed with the `v1` key-schema tag. Values are
//! msgpack-encoded. Nothing here is ever truth: deleting `indexes/` must
//! never change a query result, only its latency.

use std::collections::HashMap;
use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::atomic::write_atomic;
use crate::error::Result;
use crate::ids::{all_shard_ids, now_rfc3339};
use crate::layout;
use crate::schema::{CacheMeta, FileRecord, OutputRecord};

const US: u8 = 0x1f;
const KEY_SCHEMA: &str = "v1";
const DEFAULT_MAP_SIZE: usize = 1 << 30; // 1 GiB, virtual address space only.

fn key(parts: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(KEY_SCHEMA.as_bytes());
    for part in parts {
        out.push(US);
        out.extend_from_slice(part.as_bytes());
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    lang: Option<String>,
    size: u64,
    path_key: String,
    obj_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OutputEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    extras: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiagEntry {
    message: String,
}

pub struct Cache {
    env: Env,
    meta: Database<Bytes, Bytes>,
    files_by_path: Database<Bytes, Bytes>,
    outputs_by_kind: Database<Bytes, Bytes>,
    diags_by_sev: Database<Bytes, Bytes>,
    diags_by_code: Database<Bytes, Bytes>,
    stats: Database<Bytes, Bytes>,
}

impl Cache {
    /// Open (creating if absent) the cache environment at `store_root`.
    pub fn open(store_root: &Path) -> Result<Self> {
        let dir = layout::lmdb_dir(store_root);
        std::fs::create_dir_all(&dir)?;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(DEFAULT_MAP_SIZE)
                .max_dbs(6)
                .open(&dir)
        }
        .map_err(cache_io_err)?;

        let mut wtxn = env.write_txn().map_err(cache_io_err)?;
        let meta = env
            .create_database(&mut wtxn, Some("meta"))
            .map_err(cache_io_err)?;
        let files_by_path = env
            .create_database(&mut wtxn, Some("files_by_path"))
            .map_err(cache_io_err)?;
        let outputs_by_kind = env
            .create_database(&mut wtxn, Some("outputs_by_kind"))
            .map_err(cache_io_err)?;
        let diags_by_sev = env
            .create_database(&mut wtxn, Some("diags_by_sev"))
            .map_err(cache_io_err)?;
        let diags_by_code = env
            .create_database(&mut wtxn, Some("diags_by_code"))
            .map_err(cache_io_err)?;
        let stats = env
            .create_database(&mut wtxn, Some("stats"))
            .map_err(cache_io_err)?;
        wtxn.commit().map_err(cache_io_err)?;

        Ok(Self {
            env,
            meta,
            files_by_path,
            outputs_by_kind,
            diags_by_sev,
            diags_by_code,
            stats,
        })
    }
}

fn cache_io_err(e: impl std::fmt::Display) -> crate::error::StorageError {
    crate::error::StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

/// SHA-256 over the ordered stream of authoritative source bytes this
/// cache depends on (§4.9): the snapshot's file index, then every task's
/// shard outputs in sorted `(task_id, shard_id)` order.
pub fn source_fingerprint(
    store_root: &Path,
    snapshot_id: &str,
    batch_id: &str,
    task_ids: &[String],
) -> Result<String> {
    let mut hasher = Sha256::new();
    let files_bytes = std::fs::read(layout::files_index_jsonl(store_root, snapshot_id))?;
    hasher.update(format!("snapshot:{snapshot_id}:").as_bytes());
    hasher.update(Sha256::digest(&files_bytes));

    let mut sorted_tasks = task_ids.to_vec();
    sorted_tasks.sort();
    for task_id in &sorted_tasks {
        for shard_id in all_shard_ids() {
            let path = layout::shard_outputs_jsonl(store_root, batch_id, task_id, &shard_id);
            let bytes = std::fs::read(&path).unwrap_or_default();
            hasher.update(format!("outputs:{task_id}:{shard_id}:").as_bytes());
            hasher.update(Sha256::digest(&bytes));
        }
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn is_cache_valid(
    meta: &CacheMeta,
    store_root: &Path,
    snapshot_id: &str,
    batch_id: &str,
    task_ids: &[String],
) -> bool {
    if meta.cache_schema_version != CacheMeta::SCHEMA_VERSION {
        return false;
    }
    if meta.snapshot_id != snapshot_id || meta.batch_id != batch_id {
        return false;
    }
    let mut want: Vec<String> = task_ids.to_vec();
    want.sort();
    let mut have = meta.tasks_indexed.clone();
    have.sort();
    if want != have {
        return false;
    }
    match source_fingerprint(store_root, snapshot_id, batch_id, task_ids) {
        Ok(fp) => fp == meta.source_fingerprint,
        Err(_) => false,
    }
}

pub fn load_cache_meta(store_root: &Path) -> Option<CacheMeta> {
    let path = layout::cache_meta_json(store_root);
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Rebuild (or incrementally build, if the environment is empty) the
/// cache for `batch_id`. Deletes and recreates `indexes/lmdb` first when
/// `rebuild` is set; callers must ensure no reader holds the environment
/// open across a `rebuild=true` call.
pub fn build_index(store_root: &Path, batch_id: &str, rebuild: bool) -> Result<()> {
    if rebuild {
        let dir = layout::lmdb_dir(store_root);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
    }

    let batch_bytes = std::fs::read(layout::batch_json(store_root, batch_id))?;
    let batch_meta: crate::schema::BatchMeta = serde_json::from_slice(&batch_bytes)?;
    let plan_bytes = std::fs::read(layout::plan_json(store_root, batch_id))?;
    let plan: Vec<crate::schema::PlanEntry> = serde_json::from_slice(&plan_bytes)?;
    let task_ids: Vec<String> = plan.iter().map(|p| p.task_id.clone()).collect();
    let snapshot_id = batch_meta.snapshot_id.clone();

    let cache = Cache::open(store_root)?;
    let mut wtxn = cache.env.write_txn().map_err(cache_io_err)?;

    let files = load_files_index(store_root, &snapshot_id)?;
    let mut lang_of: HashMap<String, String> = HashMap::new();
    for rec in &files {
        let lang = rec.lang_hint.clone();
        lang_of.insert(
            rec.path.clone(),
            lang.clone().unwrap_or_else(|| "unknown".to_string()),
        );
        let entry = FileEntry {
            lang,
            size: rec.size,
            path_key: rec.path_key.clone(),
            obj_prefix: rec.object.shard_prefix().to_string(),
        };
        let k = key(&["files_by_path", &snapshot_id, &rec.path]);
        cache
            .files_by_path
            .put(&mut wtxn, &k, &rmp_serde::to_vec_named(&entry)?)
            .map_err(cache_io_err)?;
    }

    let mut counters: HashMap<Vec<u8>, u64> = HashMap::new();
    let mut bump = |parts: &[&str], counters: &mut HashMap<Vec<u8>, u64>| {
        *counters.entry(key(parts)).or_default() += 1;
    };

    for task_id in &task_ids {
        for shard_id in all_shard_ids() {
            let outputs = crate::shard::get_outputs(store_root, batch_id, task_id, &shard_id)?;
            for rec in outputs {
                let out_key = key(&[
                    "outputs_by_kind",
                    &snapshot_id,
                    batch_id,
                    task_id,
                    &rec.kind,
                    &rec.path,
                ]);
                let entry = OutputEntry {
                    object: rec.get("object").and_then(|v| v.as_str()).map(str::to_string),
                    format: rec.get("format").and_then(|v| v.as_str()).map(str::to_string),
                    extras: rec.extra.clone(),
                };
                cache
                    .outputs_by_kind
                    .put(&mut wtxn, &out_key, &rmp_serde::to_vec_named(&entry)?)
                    .map_err(cache_io_err)?;

                bump(&["stats", &snapshot_id, batch_id, task_id, "count", "kind", &rec.kind], &mut counters);
                let lang = lang_of.get(&rec.path).cloned().unwrap_or_else(|| "unknown".to_string());
                bump(&["stats", &snapshot_id, batch_id, task_id, "count", "lang", &lang], &mut counters);

                if rec.kind == "diagnostic" {
                    if let (Some(sev), Some(code)) = (rec.severity(), rec.code()) {
                        let line = rec.get("line").and_then(|v| v.as_i64()).unwrap_or(0).to_string();
                        let col = rec.get("col").and_then(|v| v.as_i64()).unwrap_or(0).to_string();
                        let message = rec
                            .get("message")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let diag = DiagEntry { message };
                        let diag_bytes = rmp_serde::to_vec_named(&diag)?;

                        let sev_key = key(&[
                            "diags_by_sev", &snapshot_id, batch_id, task_id, sev, code, &rec.path, &line, &col,
                        ]);
                        cache.diags_by_sev.put(&mut wtxn, &sev_key, &diag_bytes).map_err(cache_io_err)?;

                        let code_key = key(&[
                            "diags_by_code", &snapshot_id, batch_id, task_id, code, sev, &rec.path, &line, &col,
                        ]);
                        cache.diags_by_code.put(&mut wtxn, &code_key, &diag_bytes).map_err(cache_io_err)?;

                        bump(&["stats", &snapshot_id, batch_id, task_id, "count", "severity", sev], &mut counters);
                        bump(&["stats", &snapshot_id, batch_id, task_id, "count", "code", code], &mut counters);
                    }
                }
            }
        }
    }

    for (k, count) in &counters {
        cache
            .stats
            .put(&mut wtxn, k, &count.to_be_bytes())
            .map_err(cache_io_err)?;
    }

    wtxn.commit().map_err(cache_io_err)?;

    let fingerprint = source_fingerprint(store_root, &snapshot_id, batch_id, &task_ids)?;
    let meta = CacheMeta {
        cache_schema_version: CacheMeta::SCHEMA_VERSION,
        snapshot_id: snapshot_id.clone(),
        batch_id: batch_id.to_string(),
        tasks_indexed: {
            let mut t = task_ids.clone();
            t.sort();
            t
        },
        source_fingerprint: fingerprint.clone(),
        built_at: now_rfc3339(),
        producer: "codebatch-storage".to_string(),
    };
    write_atomic(&layout::cache_meta_json(store_root), &serde_json::to_vec(&meta)?)?;

    let mut wtxn = cache.env.write_txn().map_err(cache_io_err)?;
    let meta_key = key(&["meta"]);
    cache
        .meta
        .put(&mut wtxn, &meta_key, &serde_json::to_vec(&meta)?)
        .map_err(cache_io_err)?;
    wtxn.commit().map_err(cache_io_err)?;

    info!(batch_id, tasks = task_ids.len(), "cache built");
    Ok(())
}

fn load_files_index(store_root: &Path, snapshot_id: &str) -> Result<Vec<FileRecord>> {
    let content = std::fs::read_to_string(layout::files_index_jsonl(store_root, snapshot_id))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| Ok(serde_json::from_str(l)?))
        .collect()
}

/// Read `group="kind"|"severity"|"code"|"lang"` stats counters for a task
/// directly from the cache, if present and valid. Returns `None` to signal
/// "fall back to scanning" - callers must never surface `CacheStale`.
pub fn try_stats(
    store_root: &Path,
    batch_id: &str,
    task_id: &str,
    group: &str,
    snapshot_id: &str,
    task_ids: &[String],
) -> Option<HashMap<String, u64>> {
    let meta = load_cache_meta(store_root)?;
    if !is_cache_valid(&meta, store_root, snapshot_id, batch_id, task_ids) {
        return None;
    }
    let cache = Cache::open(store_root).ok()?;
    let rtxn = cache.env.read_txn().ok()?;
    let prefix = key(&["stats", snapshot_id, batch_id, task_id, "count", group]);
    let mut out = HashMap::new();
    let iter = cache.stats.prefix_iter(&rtxn, &prefix).ok()?;
    for entry in iter {
        let (k, v) = entry.ok()?;
        let value_part = k.rsplit(|b| *b == US).next()?;
        let value_str = std::str::from_utf8(value_part).ok()?.to_string();
        let count = u64::from_be_bytes(v.try_into().ok()?);
        out.insert(value_str, count);
    }
    Some(out)
}

/// Read every `kind`-matching output for `task_id` directly from
/// `outputs_by_kind`, if the cache is present and valid. Returns `None` to
/// signal "fall back to scanning" - never surfaces staleness to the caller.
/// Entries come back sorted by path, matching `query::query_outputs`'s
/// effective order once both sides are compared as sets (shard interleaving
/// order is not part of the query contract).
pub fn try_outputs(
    store_root: &Path,
    batch_id: &str,
    task_id: &str,
    kind: &str,
    snapshot_id: &str,
    task_ids: &[String],
) -> Option<Vec<(String, Option<String>, Option<String>, HashMap<String, serde_json::Value>)>> {
    let meta = load_cache_meta(store_root)?;
    if !is_cache_valid(&meta, store_root, snapshot_id, batch_id, task_ids) {
        return None;
    }
    let cache = Cache::open(store_root).ok()?;
    let rtxn = cache.env.read_txn().ok()?;
    let prefix = key(&["outputs_by_kind", snapshot_id, batch_id, task_id, kind]);
    let mut out = Vec::new();
    let iter = cache.outputs_by_kind.prefix_iter(&rtxn, &prefix).ok()?;
    for entry in iter {
        let (k, v) = entry.ok()?;
        let path_part = k.rsplit(|b| *b == US).next()?;
        let path = std::str::from_utf8(path_part).ok()?.to_string();
        let entry: OutputEntry = rmp_serde::from_slice(v).ok()?;
        out.push((path, entry.object, entry.format, entry.extras));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Some(out)
}

/// Read every diagnostic for `task_id` at `severity`, directly from
/// `diags_by_sev`. Returns `(path, code, message)` tuples sorted by the key
/// order the cache stores them in (path, then line, then col).
pub fn try_diagnostics(
    store_root: &Path,
    batch_id: &str,
    task_id: &str,
    severity: &str,
    snapshot_id: &str,
    task_ids: &[String],
) -> Option<Vec<(String, String, String)>> {
    let meta = load_cache_meta(store_root)?;
    if !is_cache_valid(&meta, store_root, snapshot_id, batch_id, task_ids) {
        return None;
    }
    let cache = Cache::open(store_root).ok()?;
    let rtxn = cache.env.read_txn().ok()?;
    let prefix = key(&["diags_by_sev", snapshot_id, batch_id, task_id, severity]);
    let mut out = Vec::new();
    let iter = cache.diags_by_sev.prefix_iter(&rtxn, &prefix).ok()?;
    for entry in iter {
        let (k, v) = entry.ok()?;
        let parts: Vec<&[u8]> = k.split(|b| *b == US).collect();
        // v1 \x1f diags_by_sev \x1f snapshot \x1f batch \x1f task \x1f sev \x1f code \x1f path \x1f line \x1f col
        if parts.len() < 10 {
            continue;
        }
        let code = std::str::from_utf8(parts[6]).ok()?.to_string();
        let path = std::str::from_utf8(parts[7]).ok()?.to_string();
        let diag: DiagEntry = rmp_serde::from_slice(v).ok()?;
        out.push((path, code, diag.message));
    }
    out.sort();
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ObjectRef;
    use crate::schema::{BatchMeta, BatchStatus, PlanEntry};
    use std::collections::HashMap as Map;
    use tempfile::tempdir;

    fn seed(store_root: &Path) {
        std::fs::create_dir_all(layout::snapshot_dir(store_root, "snap-1")).unwrap();
        let files = vec![FileRecord {
            path: "a.py".to_string(),
            path_key: "a.py".to_string(),
            object: ObjectRef::parse(&"a".repeat(64)).unwrap(),
            size: 5,
            lang_hint: Some("python".to_string()),
        }];
        let body: String = files.iter().map(|f| format!("{}\n", serde_json::to_string(f).unwrap())).collect();
        std::fs::write(layout::files_index_jsonl(store_root, "snap-1"), body).unwrap();

        std::fs::create_dir_all(layout::batch_dir(store_root, "batch-1")).unwrap();
        let batch = BatchMeta {
            batch_id: "batch-1".to_string(),
            snapshot_id: "snap-1".to_string(),
            pipeline: "lint".to_string(),
            status: BatchStatus::Done,
            created_at: now_rfc3339(),
            metadata: None,
        };
        std::fs::write(layout::batch_json(store_root, "batch-1"), serde_json::to_vec(&batch).unwrap()).unwrap();
        let plan = vec![PlanEntry {
            task_id: "04_lint".to_string(),
            task_type: "lint".to_string(),
            depends_on: vec![],
            config: serde_json::json!({}),
        }];
        std::fs::write(layout::plan_json(store_root, "batch-1"), serde_json::to_vec(&plan).unwrap()).unwrap();

        let mut extra = Map::new();
        extra.insert("severity".to_string(), serde_json::Value::from("error"));
        extra.insert("code".to_string(), serde_json::Value::from("E001"));
        extra.insert("message".to_string(), serde_json::Value::from("boom"));
        let rec = OutputRecord {
            schema_version: 1,
            snapshot_id: "snap-1".to_string(),
            batch_id: "batch-1".to_string(),
            task_id: "04_lint".to_string(),
            shard_id: "00".to_string(),
            path: "a.py".to_string(),
            kind: "diagnostic".to_string(),
            ts: now_rfc3339(),
            extra,
        };
        std::fs::create_dir_all(layout::shard_dir(store_root, "batch-1", "04_lint", "00")).unwrap();
        crate::atomic::write_atomic(
            &layout::shard_outputs_jsonl(store_root, "batch-1", "04_lint", "00"),
            format!("{}\n", serde_json::to_string(&rec).unwrap()).as_bytes(),
        )
        .unwrap();
    }

    #[test]
    fn test_build_index_and_validity() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        build_index(dir.path(), "batch-1", false).unwrap();
        let meta = load_cache_meta(dir.path()).unwrap();
        assert_eq!(meta.snapshot_id, "snap-1");
        assert!(is_cache_valid(&meta, dir.path(), "snap-1", "batch-1", &["04_lint".to_string()]));
    }

    #[test]
    fn test_cache_invalid_after_output_changes() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        build_index(dir.path(), "batch-1", false).unwrap();
        let meta = load_cache_meta(dir.path()).unwrap();

        // Mutate the authoritative output after the cache was built.
        crate::atomic::write_atomic(
            &layout::shard_outputs_jsonl(dir.path(), "batch-1", "04_lint", "00"),
            b"",
        )
        .unwrap();
        assert!(!is_cache_valid(&meta, dir.path(), "snap-1", "batch-1", &["04_lint".to_string()]));
    }

    #[test]
    fn test_try_stats_matches_scan() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        build_index(dir.path(), "batch-1", false).unwrap();
        let cached = try_stats(dir.path(), "batch-1", "04_lint", "severity", "snap-1", &["04_lint".to_string()])
            .unwrap();
        let scanned = crate::query::query_stats(dir.path(), "batch-1", "04_lint", crate::query::GroupBy::Severity)
            .unwrap();
        assert_eq!(cached, scanned);
    }

    #[test]
    fn test_try_stats_none_when_cache_missing() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        let result = try_stats(dir.path(), "batch-1", "04_lint", "severity", "snap-1", &["04_lint".to_string()]);
        assert!(result.is_none());
    }

    #[test]
    fn test_try_outputs_matches_scan() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        build_index(dir.path(), "batch-1", false).unwrap();
        let mut cached = try_outputs(dir.path(), "batch-1", "04_lint", "diagnostic", "snap-1", &["04_lint".to_string()])
            .unwrap();
        cached.sort_by(|a, b| a.0.cmp(&b.0));
        let mut scanned: Vec<String> =
            crate::query::query_outputs(dir.path(), "batch-1", "04_lint", Some("diagnostic"), None)
                .unwrap()
                .into_iter()
                .map(|r| r.path)
                .collect();
        scanned.sort();
        let cached_paths: Vec<String> = cached.into_iter().map(|(p, _, _, _)| p).collect();
        assert_eq!(cached_paths, scanned);
    }

    #[test]
    fn test_try_diagnostics_matches_scan() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        build_index(dir.path(), "batch-1", false).unwrap();
        let cached = try_diagnostics(dir.path(), "batch-1", "04_lint", "error", "snap-1", &["04_lint".to_string()])
            .unwrap();
        let scanned = crate::query::query_diagnostics(dir.path(), "batch-1", "04_lint", Some("error"), None, None)
            .unwrap();
        assert_eq!(cached.len(), scanned.len());
        assert_eq!(cached[0].0, "a.py");
        assert_eq!(cached[0].1, "E001");
    }

    #[test]
    fn test_try_outputs_none_when_cache_missing() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        let result = try_outputs(dir.path(), "batch-1", "04_lint", "diagnostic", "snap-1", &["04_lint".to_string()]);
        assert!(result.is_none());
    }

    #[test]
    fn test_rebuild_after_deletion_succeeds() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        build_index(dir.path(), "batch-1", false).unwrap();
        std::fs::remove_dir_all(layout::indexes_root(dir.path())).unwrap();
        build_index(dir.path(), "batch-1", false).unwrap();
        assert!(load_cache_meta(dir.path()).is_some());
    }
}
