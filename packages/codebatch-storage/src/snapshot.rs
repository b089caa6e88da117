//! C3: snapshot builder. Walks a source directory, canonicalizes paths,
//! ingests file contents into the blob store, and writes an immutable
//! sorted file index.

use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::atomic::write_atomic;
use crate::blob_store::BlobStore;
use crate::error::Result;
use crate::ids::{new_snapshot_id, now_rfc3339};
use crate::lang;
use crate::path as pathmod;
use crate::schema::{FileRecord, SnapshotMeta, SnapshotSource};

/// Build a snapshot from `source_dir`, writing it under
/// `snapshots_root/<snapshot_id>/`. Returns the snapshot id.
pub fn build(
    source_dir: &Path,
    snapshots_root: &Path,
    blobs: &BlobStore,
    snapshot_id: Option<String>,
    metadata: Option<Value>,
) -> Result<String> {
    let snapshot_id = snapshot_id.unwrap_or_else(new_snapshot_id);
    let snapshot_dir = snapshots_root.join(&snapshot_id);
    std::fs::create_dir_all(&snapshot_dir)?;

    let mut records = Vec::new();
    walk(source_dir, source_dir, blobs, &mut records);
    records.sort_by(|a, b| a.path_key.cmp(&b.path_key));

    let total_bytes: u64 = records.iter().map(|r| r.size).sum();
    let file_count = records.len() as u64;

    let index_path = snapshot_dir.join("files.index.jsonl");
    let mut body = String::new();
    for rec in &records {
        body.push_str(&serde_json::to_string(rec)?);
        body.push('\n');
    }
    write_atomic(&index_path, body.as_bytes())?;

    let meta = SnapshotMeta {
        snapshot_id: snapshot_id.clone(),
        created_at: now_rfc3339(),
        source: SnapshotSource {
            source_type: "directory".to_string(),
            path: source_dir.display().to_string(),
        },
        file_count,
        total_bytes,
        metadata,
    };
    write_atomic(&snapshot_dir.join("snapshot.json"), &serde_json::to_vec(&meta)?)?;

    info!(snapshot_id = %snapshot_id, file_count, total_bytes, "snapshot built");
    Ok(snapshot_id)
}

fn walk(root: &Path, dir: &Path, blobs: &BlobStore, out: &mut Vec<FileRecord>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with('.') {
            continue;
        }
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };
        if file_type.is_dir() {
            walk(root, &path, blobs, out);
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        if let Some(rec) = ingest_file(root, &path, blobs) {
            out.push(rec);
        }
    }
}

fn ingest_file(root: &Path, path: &Path, blobs: &BlobStore) -> Option<FileRecord> {
    let relative = path.strip_prefix(root).ok()?;
    let relative_str = relative.to_string_lossy().to_string();

    let canonical = match pathmod::canonicalize(&relative_str, None) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %relative_str, error = %e, "skipping invalid path");
            return None;
        }
    };

    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %relative_str, error = %e, "skipping unreadable file");
            return None;
        }
    };

    let object = match blobs.put(&bytes) {
        Ok(o) => o,
        Err(e) => {
            warn!(path = %relative_str, error = %e, "skipping file that failed to ingest");
            return None;
        }
    };

    Some(FileRecord {
        path_key: pathmod::path_key(&canonical),
        lang_hint: lang::hint_for_path(&canonical).map(str::to_string),
        size: bytes.len() as u64,
        path: canonical,
        object,
    })
}
