//! The gate registry: the single source of truth for which gates exist,
//! their status/tags/aliases, and id-or-alias lookup with "did you mean"
//! suggestions for the CLI.

use std::collections::HashMap;
use std::sync::Arc;

use strsim::normalized_levenshtein;

use super::result::{GateContext, GateResult, GateStatus};

/// A registered gate: its metadata plus the function that executes it.
/// The entrypoint never returns `Result` - it is expected to report its
/// own failures via `GateResult::add_failure`; `GateRunner` is what
/// guards against it panicking or otherwise misbehaving.
#[derive(Clone)]
pub struct GateDefinition {
    pub gate_id: String,
    pub title: String,
    pub description: String,
    pub status: GateStatus,
    pub required_inputs: Vec<String>,
    pub tags: Vec<String>,
    pub aliases: Vec<String>,
    pub entrypoint: Arc<dyn Fn(&GateContext) -> GateResult + Send + Sync>,
}

impl std::fmt::Debug for GateDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateDefinition")
            .field("gate_id", &self.gate_id)
            .field("status", &self.status)
            .field("tags", &self.tags)
            .finish()
    }
}

#[derive(Default)]
pub struct GateRegistry {
    gates: HashMap<String, GateDefinition>,
    aliases: HashMap<String, String>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gate. Panics on a duplicate gate id or alias - this is a
    /// programmer error in `default_registry`, not a runtime condition.
    pub fn register(&mut self, def: GateDefinition) {
        if self.gates.contains_key(&def.gate_id) {
            panic!("gate already registered: {}", def.gate_id);
        }
        for alias in &def.aliases {
            if self.aliases.contains_key(alias) {
                panic!("gate alias already registered: {alias}");
            }
        }
        for alias in &def.aliases {
            self.aliases.insert(alias.clone(), def.gate_id.clone());
        }
        self.gates.insert(def.gate_id.clone(), def);
    }

    pub fn get(&self, gate_id_or_alias: &str) -> Option<&GateDefinition> {
        if let Some(gate) = self.gates.get(gate_id_or_alias) {
            return Some(gate);
        }
        let canonical = self.aliases.get(gate_id_or_alias)?;
        self.gates.get(canonical)
    }

    pub fn list_all(&self) -> Vec<&GateDefinition> {
        let mut out: Vec<&GateDefinition> = self.gates.values().collect();
        out.sort_by(|a, b| a.gate_id.cmp(&b.gate_id));
        out
    }

    pub fn list_by_status(&self, status: GateStatus) -> Vec<&GateDefinition> {
        let mut out: Vec<&GateDefinition> = self.gates.values().filter(|g| g.status == status).collect();
        out.sort_by(|a, b| a.gate_id.cmp(&b.gate_id));
        out
    }

    pub fn list_by_tag(&self, tag: &str) -> Vec<&GateDefinition> {
        let mut out: Vec<&GateDefinition> =
            self.gates.values().filter(|g| g.tags.iter().any(|t| t == tag)).collect();
        out.sort_by(|a, b| a.gate_id.cmp(&b.gate_id));
        out
    }

    /// Gates belonging to bundle `name`: `phase1`/`phase2`/`phase3` filter
    /// by tag, `release` is every `ENFORCED` gate, `all` is everything.
    pub fn bundle_gates(&self, name: &str) -> Vec<&GateDefinition> {
        match name {
            "phase1" | "phase2" | "phase3" => self.list_by_tag(name),
            "release" => self.list_by_status(GateStatus::Enforced),
            "all" => self.list_all(),
            _ => Vec::new(),
        }
    }

    /// Suggest gate ids/aliases similar to `unknown_id`, most similar
    /// first, using normalized Damerau-Levenshtein-style string similarity
    /// (`strsim`) with the same 0.4 cutoff the original tool used.
    pub fn suggest_similar(&self, unknown_id: &str, limit: usize) -> Vec<String> {
        let mut candidates: Vec<String> = self.gates.keys().cloned().chain(self.aliases.keys().cloned()).collect();
        candidates.sort();
        candidates.dedup();

        let mut scored: Vec<(f64, String)> = candidates
            .into_iter()
            .map(|c| (normalized_levenshtein(unknown_id, &c), c))
            .filter(|(score, _)| *score >= 0.4)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap().then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().take(limit).map(|(_, c)| c).collect()
    }

    /// Missing required inputs for `gate` given `ctx`, e.g. `["batch"]` if
    /// the gate declares `batch` required but `ctx.batch_id` is `None`.
    pub fn validate_inputs(&self, gate: &GateDefinition, ctx: &GateContext) -> Vec<String> {
        let mut missing = Vec::new();
        for input in &gate.required_inputs {
            let present = match input.as_str() {
                "store" => true,
                "batch" => ctx.batch_id.is_some(),
                "snapshot" => ctx.snapshot_id.is_some(),
                "tasks" => ctx.task_ids.is_some(),
                _ => true,
            };
            if !present {
                missing.push(input.clone());
            }
        }
        missing
    }
}
