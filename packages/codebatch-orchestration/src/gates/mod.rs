//! C10: the gate runtime. Named, independently runnable invariant checks
//! over a store, grouped into bundles, with a registry supporting
//! id-or-alias lookup and "did you mean" suggestions.

pub mod checks;
pub mod registry;
pub mod result;
pub mod runner;

pub use checks::default_registry;
pub use registry::{GateDefinition, GateRegistry};
pub use result::{BundleResult, GateContext, GateEnvironment, GateFailure, GateResult, GateStatus};
pub use runner::GateRunner;
