//! C4: store root manager. Initializes and validates the top-level store
//! directory layout.

use std::path::Path;

use tracing::info;

use crate::atomic::write_atomic;
use crate::error::{Result, StorageError};
use crate::ids::now_rfc3339;
use crate::schema::StoreMeta;

const ALLOWED_TOP_LEVEL: &[&str] = &["store.json", "objects", "snapshots", "batches", "indexes"];

/// Initialize a new store at `root`. Fails if `store.json` already exists,
/// or if `root` exists and is non-empty, unless `allow_reinit` is set.
pub fn init(root: &Path, producer: &str, allow_reinit: bool) -> Result<StoreMeta> {
    let store_json = root.join("store.json");
    if store_json.exists() {
        return Err(StorageError::StoreExists(root.display().to_string()));
    }
    if !allow_reinit && root.exists() {
        let has_entries = std::fs::read_dir(root)?.next().is_some();
        if has_entries {
            return Err(StorageError::StoreExists(root.display().to_string()));
        }
    }

    std::fs::create_dir_all(root.join("objects").join("sha256"))?;
    std::fs::create_dir_all(root.join("snapshots"))?;
    std::fs::create_dir_all(root.join("batches"))?;

    let meta = StoreMeta {
        schema_name: StoreMeta::SCHEMA_NAME.to_string(),
        schema_version: StoreMeta::SCHEMA_VERSION,
        producer: producer.to_string(),
        created_at: now_rfc3339(),
    };
    write_atomic(&store_json, &serde_json::to_vec(&meta)?)?;

    info!(root = %root.display(), "store initialized");
    Ok(meta)
}

/// Load and validate an existing store's metadata.
pub fn load(root: &Path) -> Result<StoreMeta> {
    if !root.is_dir() {
        return Err(StorageError::InvalidStore {
            path: root.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }
    let store_json = root.join("store.json");
    let bytes = std::fs::read(&store_json).map_err(|_| StorageError::InvalidStore {
        path: root.display().to_string(),
        reason: "missing store.json".to_string(),
    })?;
    let meta: StoreMeta = serde_json::from_slice(&bytes).map_err(|e| StorageError::InvalidStore {
        path: root.display().to_string(),
        reason: format!("invalid store.json: {e}"),
    })?;
    if meta.schema_name != StoreMeta::SCHEMA_NAME {
        return Err(StorageError::InvalidStore {
            path: root.display().to_string(),
            reason: format!("unexpected schema_name: {}", meta.schema_name),
        });
    }
    Ok(meta)
}

pub fn is_valid(root: &Path) -> bool {
    load(root).is_ok()
}

/// List any top-level entries under `root` that are not part of the
/// allowed store layout. Used by the store-layout gate.
pub fn unexpected_top_level_entries(root: &Path) -> Result<Vec<String>> {
    let mut unexpected = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".tmp") {
            continue;
        }
        if !ALLOWED_TOP_LEVEL.contains(&name.as_str()) {
            unexpected.push(name);
        }
    }
    unexpected.sort();
    Ok(unexpected)
}
