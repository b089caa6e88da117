//! Atomic commit primitive: write-tmp-then-rename-replace.
//!
//! This is the only mutation primitive used anywhere state.json or
//! outputs.index.jsonl are written. `rename` on most platforms already
//! replaces the destination, but we go through `fs::rename` after ensuring
//! the parent directory exists; callers that need true replace-over-existing
//! behavior on platforms where plain rename can fail across filesystems are
//! expected to keep tmp and target on the same volume (always true here,
//! since both live under the same store root).

use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Write `bytes` to `path` atomically: write to `path.tmp`, fsync, then
/// rename-replace over `path`. On any error the temp file is unlinked.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(path);
    let result = (|| -> Result<()> {
        let mut f = std::fs::File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

/// Write a JSON-serializable value atomically as compact JSON.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    write_atomic(path, &bytes)
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    std::path::PathBuf::from(os)
}
