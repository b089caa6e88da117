//! C5/C7/C11: the batch planner, workflow orchestrator, and task executors
//! layered on top of `codebatch-storage`'s shard runner. This crate owns
//! nothing durable itself - every file it writes goes through
//! `codebatch_storage::atomic` - it only sequences calls into the storage
//! crate's `run_shard`/`reset_shard` primitives.

pub mod dag;
pub mod error;
pub mod executor;
pub mod gates;
pub mod orchestrator;
pub mod pipeline;
pub mod planner;

pub use dag::{parallel_layers, topological_order};
pub use error::{ErrorCategory, OrchestratorError, Result};
pub use executor::default_registry;
pub use gates::{GateContext, GateResult, GateRunner, GateStatus};
pub use orchestrator::{Orchestrator, PipelineResult};
pub use pipeline::{lookup, registered_names, Pipeline};
pub use planner::init_batch;
