//! C2: content-addressed blob store (CAS).
//!
//! Blobs live at `objects/sha256/<aa>/<bb>/<full-hex>`. Immutable once
//! written; never overwritten, never deleted by the core.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::ids::ObjectRef;

#[derive(Debug, Clone)]
pub struct BlobStore {
    objects_root: PathBuf,
}

impl BlobStore {
    /// `objects_root` is the store's `objects/sha256` directory.
    pub fn new(objects_root: impl Into<PathBuf>) -> Self {
        Self {
            objects_root: objects_root.into(),
        }
    }

    pub fn path_of(&self, object: &ObjectRef) -> Option<PathBuf> {
        let path = self.blob_path(object);
        path.exists().then_some(path)
    }

    fn blob_path(&self, object: &ObjectRef) -> PathBuf {
        self.objects_root
            .join(object.shard_prefix())
            .join(object.second_prefix())
            .join(object.hex())
    }

    pub fn has(&self, object: &ObjectRef) -> bool {
        self.blob_path(object).exists()
    }

    /// Store `bytes`, returning its content address. If a blob with the
    /// same hash already exists, the write is skipped and the existing
    /// ref returned - concurrent puts of identical content are always safe
    /// because the final rename is idempotent (destination exists -> no-op
    /// semantically, since the bytes are by definition identical).
    pub fn put(&self, bytes: &[u8]) -> Result<ObjectRef> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest: [u8; 32] = hasher.finalize().into();
        let object = ObjectRef::from_digest(&digest);

        let dest = self.blob_path(&object);
        if dest.exists() {
            debug!(object = %object, "blob already present, skipping write");
            return Ok(object);
        }
        let dir = dest.parent().expect("blob path always has a parent");
        std::fs::create_dir_all(dir)?;

        let tmp = dir.join(format!("{}.tmp.{}", object.hex(), std::process::id()));
        let write_result = (|| -> Result<()> {
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()?;
            Ok(())
        })();
        if let Err(e) = write_result {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        match std::fs::rename(&tmp, &dest) {
            Ok(()) => Ok(object),
            Err(e) => {
                let _ = std::fs::remove_file(&tmp);
                if dest.exists() {
                    // Lost a race with another writer of identical content.
                    Ok(object)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    pub fn get(&self, object: &ObjectRef) -> Result<Vec<u8>> {
        let path = self.blob_path(object);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::ObjectNotFound(object.as_str().to_string())
            } else {
                e.into()
            }
        })
    }
}

pub fn objects_root(store_root: &Path) -> PathBuf {
    store_root.join("objects").join("sha256")
}
