//! The gate runner: executes a single gate or a named bundle, timing each
//! run and converting anything that escapes a gate's entrypoint - an
//! `Err`-shaped bug or an outright panic - into a failed `GateResult`
//! instead of letting it take the process down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

use super::registry::GateRegistry;
use super::result::{BundleResult, GateContext, GateFailure, GateResult, GateStatus};

pub struct GateRunner {
    store_root: PathBuf,
    registry: GateRegistry,
}

impl GateRunner {
    pub fn new(store_root: impl Into<PathBuf>, registry: GateRegistry) -> Self {
        Self { store_root: store_root.into(), registry }
    }

    pub fn registry(&self) -> &GateRegistry {
        &self.registry
    }

    /// Run one gate by id or alias. Errors only for a lookup/validation
    /// failure that happens before the gate body is ever invoked; once
    /// invoked, the gate always produces a `GateResult`, pass or fail.
    pub fn run(
        &self,
        gate_id_or_alias: &str,
        batch_id: Option<&str>,
        snapshot_id: Option<&str>,
        task_ids: Option<&[String]>,
    ) -> Result<GateResult> {
        let gate = self.registry.get(gate_id_or_alias).ok_or_else(|| {
            let suggestions = self.registry.suggest_similar(gate_id_or_alias, 3);
            OrchestratorError::GateNotFound {
                gate: gate_id_or_alias.to_string(),
                suggestion: suggestions.into_iter().next(),
            }
        })?;

        let run_id = Uuid::new_v4().to_string()[..8].to_string();
        let mut ctx = GateContext::new(self.store_root.clone(), run_id.clone());
        if let Some(b) = batch_id {
            ctx = ctx.with_batch(b);
        }
        if let Some(s) = snapshot_id {
            ctx = ctx.with_snapshot(s);
        }
        if let Some(t) = task_ids {
            ctx = ctx.with_tasks(t.to_vec());
        }

        let missing = self.registry.validate_inputs(gate, &ctx);
        if !missing.is_empty() {
            return Err(OrchestratorError::GateMissingInputs { gate: gate.gate_id.clone(), missing });
        }

        let entrypoint = gate.entrypoint.clone();
        let start = Instant::now();
        let mut result = match catch_unwind(AssertUnwindSafe(|| (entrypoint)(&ctx))) {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic);
                let mut result = GateResult::passing(gate.gate_id.clone(), gate.status);
                result.add_failure(GateFailure::new(format!("gate execution error: {message}")));
                result
            }
        };
        result.duration_ms = start.elapsed().as_millis() as u64;
        result.status = gate.status;
        result.collect_artifacts(&self.store_root, &gate.gate_id, &run_id);

        Ok(result)
    }

    /// Run every gate in bundle `bundle_name`. `PLACEHOLDER` gates are
    /// never invoked and count as skipped; a gate whose required inputs
    /// are missing for this call is also skipped rather than failing the
    /// whole bundle. The bundle passes iff no `ENFORCED` gate in it failed.
    ///
    /// With `fail_fast` unset, gates are independent checks over the same
    /// store and run concurrently across `rayon`'s thread pool; with it
    /// set, gates run one at a time so the bundle can stop at the first
    /// failure instead of paying for runs whose result is discarded.
    pub fn run_bundle(
        &self,
        bundle_name: &str,
        batch_id: Option<&str>,
        snapshot_id: Option<&str>,
        task_ids: Option<&[String]>,
        fail_fast: bool,
    ) -> Result<BundleResult> {
        let gates = self.registry.bundle_gates(bundle_name);
        if gates.is_empty() {
            return Err(OrchestratorError::BundleNotFound(bundle_name.to_string()));
        }

        let start = Instant::now();
        let runnable: Vec<_> = gates.iter().filter(|g| g.status != GateStatus::Placeholder).collect();
        let mut skipped_count = gates.len() - runnable.len();

        let mut results = Vec::new();
        if fail_fast {
            for gate in &runnable {
                match self.run(&gate.gate_id, batch_id, snapshot_id, task_ids) {
                    Ok(result) => {
                        let stop = !result.passed;
                        results.push(result);
                        if stop {
                            break;
                        }
                    }
                    Err(OrchestratorError::GateMissingInputs { .. }) => skipped_count += 1,
                    Err(e) => return Err(e),
                }
            }
        } else {
            let outcomes: Vec<Result<Option<GateResult>>> = runnable
                .par_iter()
                .map(|gate| match self.run(&gate.gate_id, batch_id, snapshot_id, task_ids) {
                    Ok(result) => Ok(Some(result)),
                    Err(OrchestratorError::GateMissingInputs { .. }) => Ok(None),
                    Err(e) => Err(e),
                })
                .collect();
            for outcome in outcomes {
                match outcome? {
                    Some(result) => results.push(result),
                    None => skipped_count += 1,
                }
            }
        }

        let passed_count = results.iter().filter(|r| r.passed).count();
        let failed_count = results.iter().filter(|r| !r.passed).count();
        let enforced_failures = results
            .iter()
            .filter(|r| !r.passed && r.status == GateStatus::Enforced)
            .count();

        Ok(BundleResult {
            bundle_name: bundle_name.to_string(),
            passed: enforced_failures == 0,
            total: gates.len(),
            passed_count,
            failed_count,
            skipped_count,
            duration_ms: start.elapsed().as_millis() as u64,
            results,
        })
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
