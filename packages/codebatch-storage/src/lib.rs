//! codebatch-storage: the storage and execution substrate of a
//! deterministic, content-addressed batch execution engine for code
//! analysis.
//!
//! Covers, leaves first: the path canonicalizer, the content-addressed
//! blob store, the snapshot builder, the store root manager, the
//! per-shard state machine (the central and highest-risk component), the
//! scan-only query engine, and the LMDB-backed acceleration cache. Batch
//! planning, workflow orchestration, concrete task executors, and the
//! gate runtime live one layer up in `codebatch-orchestration`, which
//! drives this crate's synchronous, filesystem-facing API from an async
//! context via blocking task offload.

pub mod atomic;
pub mod blob_store;
pub mod cache;
pub mod error;
pub mod events;
pub mod ids;
pub mod lang;
pub mod layout;
pub mod path;
pub mod query;
pub mod schema;
pub mod shard;
pub mod snapshot;
pub mod store_root;

pub use blob_store::BlobStore;
pub use error::{Result, StorageError};
pub use ids::ObjectRef;
pub use shard::{reset_shard, run_shard, RunnerHandle, ShardExecutor};
