//! The concrete ENFORCED gate bodies plus the registry that ships them.
//! Each gate is grounded directly in an invariant already enforced or
//! exposed by `codebatch-storage`: this module never re-implements store
//! semantics, it only re-checks them from the outside.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use codebatch_storage::ids::all_shard_ids;
use codebatch_storage::schema::{BatchMeta, PlanEntry, ShardState, ShardStatus, TaskMeta};
use codebatch_storage::{cache, layout, path, query, shard, BlobStore};

use super::registry::{GateDefinition, GateRegistry};
use super::result::{GateContext, GateFailure, GateResult, GateStatus};

pub const STORE_LAYOUT: &str = "store-layout";
pub const EVENTS_INDEPENDENCE: &str = "events-independence";
pub const CACHE_EQUIVALENCE: &str = "cache-equivalence";
pub const CACHE_DELETION_EQUIVALENCE: &str = "cache-deletion-equivalence";
pub const DETERMINISTIC_REBUILD: &str = "deterministic-rebuild";
pub const RETRY_DETERMINISM: &str = "retry-determinism";
pub const TRUTH_STORE_GUARD: &str = "truth-store-guard";
pub const LANG_JOIN_CONSISTENCY: &str = "lang-join-consistency";
pub const CASE_COLLISION_FREE: &str = "case-collision-free";

/// The registry shipped by this crate: every gate `GateRunner` needs to
/// know about, registered once at startup.
pub fn default_registry() -> GateRegistry {
    let mut reg = GateRegistry::new();
    reg.register(GateDefinition {
        gate_id: STORE_LAYOUT.to_string(),
        title: "Store layout".to_string(),
        description: "Only the allowed top-level entries exist under the store root, and shard \
            directories contain only state.json and outputs.index.jsonl (plus tolerated .tmp files)."
            .to_string(),
        status: GateStatus::Enforced,
        required_inputs: vec!["store".to_string()],
        tags: vec!["phase1".to_string(), "layout".to_string()],
        aliases: vec!["layout".to_string()],
        entrypoint: Arc::new(check_store_layout),
    });
    reg.register(GateDefinition {
        gate_id: TRUTH_STORE_GUARD.to_string(),
        title: "Truth-store guard at runtime".to_string(),
        description: "Every path under the store root is under objects/, snapshots/, batches/, \
            indexes/, or is the top-level store.json file."
            .to_string(),
        status: GateStatus::Enforced,
        required_inputs: vec!["store".to_string()],
        tags: vec!["phase1".to_string(), "layout".to_string()],
        aliases: vec!["truth-guard".to_string()],
        entrypoint: Arc::new(check_truth_store_guard),
    });
    reg.register(GateDefinition {
        gate_id: EVENTS_INDEPENDENCE.to_string(),
        title: "Events independence".to_string(),
        description: "Deleting every events.jsonl under a batch does not change any query's \
            canonicalized result."
            .to_string(),
        status: GateStatus::Enforced,
        required_inputs: vec!["store".to_string(), "batch".to_string()],
        tags: vec!["phase2".to_string(), "events".to_string()],
        aliases: vec!["events".to_string()],
        entrypoint: Arc::new(check_events_independence),
    });
    reg.register(GateDefinition {
        gate_id: RETRY_DETERMINISM.to_string(),
        title: "Retry determinism".to_string(),
        description: "Running a shard to done, resetting it to ready, and rerunning it produces \
            the same outputs (modulo timestamps) and the same record count."
            .to_string(),
        status: GateStatus::Enforced,
        required_inputs: vec!["store".to_string(), "batch".to_string()],
        tags: vec!["phase2".to_string(), "shard".to_string()],
        aliases: vec!["retry".to_string()],
        entrypoint: Arc::new(check_retry_determinism),
    });
    reg.register(GateDefinition {
        gate_id: CACHE_EQUIVALENCE.to_string(),
        title: "Cache equivalence".to_string(),
        description: "For every query the cache supports, scanning the JSONL sources and reading \
            the cache produce the same result set."
            .to_string(),
        status: GateStatus::Enforced,
        required_inputs: vec!["store".to_string(), "batch".to_string()],
        tags: vec!["phase3".to_string(), "cache".to_string()],
        aliases: vec!["cache-eq".to_string()],
        entrypoint: Arc::new(check_cache_equivalence),
    });
    reg.register(GateDefinition {
        gate_id: CACHE_DELETION_EQUIVALENCE.to_string(),
        title: "Cache deletion equivalence".to_string(),
        description: "After building the cache and then deleting indexes/, the next query \
            returns the same result the cache reported before deletion."
            .to_string(),
        status: GateStatus::Enforced,
        required_inputs: vec!["store".to_string(), "batch".to_string()],
        tags: vec!["phase3".to_string(), "cache".to_string()],
        aliases: vec!["cache-del-eq".to_string()],
        entrypoint: Arc::new(check_cache_deletion_equivalence),
    });
    reg.register(GateDefinition {
        gate_id: DETERMINISTIC_REBUILD.to_string(),
        title: "Deterministic rebuild".to_string(),
        description: "Rebuilding the cache from scratch twice in a row produces identical query \
            results both times."
            .to_string(),
        status: GateStatus::Enforced,
        required_inputs: vec!["store".to_string(), "batch".to_string()],
        tags: vec!["phase3".to_string(), "cache".to_string()],
        aliases: vec!["rebuild".to_string()],
        entrypoint: Arc::new(check_deterministic_rebuild),
    });
    reg.register(GateDefinition {
        gate_id: LANG_JOIN_CONSISTENCY.to_string(),
        title: "Lang join consistency".to_string(),
        description: "query_stats(group_by=lang) and the cache's own path->lang join agree for \
            every file the task touched. Has a passing test suite; not yet promoted to ENFORCED."
            .to_string(),
        status: GateStatus::Harness,
        required_inputs: vec!["store".to_string(), "batch".to_string()],
        tags: vec!["phase3".to_string(), "cache".to_string()],
        aliases: vec![],
        entrypoint: Arc::new(check_lang_join_consistency),
    });
    reg.register(GateDefinition {
        gate_id: CASE_COLLISION_FREE.to_string(),
        title: "Case-collision-free snapshot".to_string(),
        description: "No two files in the snapshot share a case-insensitive path. Not promoted \
            to ENFORCED: whether a colliding snapshot should hard-fail the build or only be \
            flagged is an open question (see DESIGN.md)."
            .to_string(),
        status: GateStatus::Placeholder,
        required_inputs: vec!["store".to_string(), "snapshot".to_string()],
        tags: vec!["phase1".to_string(), "snapshot".to_string()],
        aliases: vec![],
        entrypoint: Arc::new(check_case_collision_free),
    });
    reg
}

fn plan_task_ids(store_root: &Path, batch_id: &str) -> Option<Vec<String>> {
    let bytes = std::fs::read(layout::plan_json(store_root, batch_id)).ok()?;
    let plan: Vec<PlanEntry> = serde_json::from_slice(&bytes).ok()?;
    Some(plan.into_iter().map(|p| p.task_id).collect())
}

fn resolve_task_ids(ctx: &GateContext) -> Option<Vec<String>> {
    if let Some(ids) = &ctx.task_ids {
        return Some(ids.clone());
    }
    plan_task_ids(&ctx.store_root, ctx.batch_id.as_ref()?)
}

fn read_batch_meta(store_root: &Path, batch_id: &str) -> Option<BatchMeta> {
    let bytes = std::fs::read(layout::batch_json(store_root, batch_id)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn check_store_layout(ctx: &GateContext) -> GateResult {
    let mut result = GateResult::passing(STORE_LAYOUT, GateStatus::Enforced);

    let unexpected = match codebatch_storage::store_root::unexpected_top_level_entries(&ctx.store_root) {
        Ok(u) => u,
        Err(e) => {
            result.add_failure(GateFailure::new(format!("could not list store root: {e}")));
            return result;
        }
    };
    for name in &unexpected {
        result.add_failure(GateFailure::expected_actual(
            "unexpected top-level store entry",
            "one of store.json, objects, snapshots, batches, indexes",
            name,
        ));
    }

    const ALLOWED_SHARD_ENTRIES: [&str; 2] = ["state.json", "outputs.index.jsonl"];
    let batches_root = layout::batches_root(&ctx.store_root);
    if let Ok(batch_dirs) = std::fs::read_dir(&batches_root) {
        for batch_entry in batch_dirs.flatten() {
            let batch_id = batch_entry.file_name().to_string_lossy().to_string();
            let tasks_dir = batch_entry.path().join("tasks");
            let Ok(task_dirs) = std::fs::read_dir(&tasks_dir) else { continue };
            for task_entry in task_dirs.flatten() {
                let task_id = task_entry.file_name().to_string_lossy().to_string();
                let shards_dir = task_entry.path().join("shards");
                let Ok(shard_dirs) = std::fs::read_dir(&shards_dir) else { continue };
                for shard_entry in shard_dirs.flatten() {
                    let shard_id = shard_entry.file_name().to_string_lossy().to_string();
                    let Ok(files) = std::fs::read_dir(shard_entry.path()) else { continue };
                    for file in files.flatten() {
                        let name = file.file_name().to_string_lossy().to_string();
                        if name.ends_with(".tmp") {
                            continue;
                        }
                        if !ALLOWED_SHARD_ENTRIES.contains(&name.as_str()) {
                            result.add_failure(GateFailure::expected_actual(
                                format!("unexpected entry in shard dir {batch_id}/{task_id}/{shard_id}"),
                                "state.json or outputs.index.jsonl",
                                name,
                            ));
                        }
                    }
                }
            }
        }
    }

    result
        .details
        .insert("unexpected_top_level".to_string(), serde_json::json!(unexpected));
    result
}

fn check_truth_store_guard(ctx: &GateContext) -> GateResult {
    let mut result = GateResult::passing(TRUTH_STORE_GUARD, GateStatus::Enforced);
    match codebatch_storage::store_root::unexpected_top_level_entries(&ctx.store_root) {
        Ok(unexpected) => {
            for name in &unexpected {
                result.add_failure(GateFailure::expected_actual(
                    "path created outside the truth-store layout",
                    "objects/, snapshots/, batches/, indexes/, or store.json",
                    name,
                ));
            }
        }
        Err(e) => result.add_failure(GateFailure::new(format!("could not list store root: {e}"))),
    }
    result
}

/// Strip the fields that legitimately vary run-to-run (`ts`) before
/// comparing two output snapshots for equality.
fn canonical_outputs(mut outputs: Vec<codebatch_storage::schema::OutputRecord>) -> Vec<String> {
    outputs.sort_by(|a, b| (&a.path, &a.kind).cmp(&(&b.path, &b.kind)));
    outputs
        .into_iter()
        .map(|mut r| {
            r.ts = String::new();
            serde_json::to_string(&r).unwrap_or_default()
        })
        .collect()
}

fn check_events_independence(ctx: &GateContext) -> GateResult {
    let mut result = GateResult::passing(EVENTS_INDEPENDENCE, GateStatus::Enforced);
    let batch_id = ctx.batch_id.clone().unwrap_or_default();
    let Some(task_ids) = resolve_task_ids(ctx) else {
        result.add_failure(GateFailure::new("could not resolve task list from plan.json"));
        return result;
    };

    let mut before = Vec::new();
    for task_id in &task_ids {
        match query::query_outputs(&ctx.store_root, &batch_id, task_id, None, None) {
            Ok(outputs) => before.push((task_id.clone(), canonical_outputs(outputs))),
            Err(e) => {
                result.add_failure(GateFailure::new(format!("query_outputs({task_id}) failed before deletion: {e}")));
                return result;
            }
        }
    }

    let batch_events = layout::batch_events_jsonl(&ctx.store_root, &batch_id);
    let _ = std::fs::remove_file(&batch_events);
    for task_id in &task_ids {
        let _ = std::fs::remove_file(layout::task_events_jsonl(&ctx.store_root, &batch_id, task_id));
    }

    for (task_id, before_outputs) in &before {
        match query::query_outputs(&ctx.store_root, &batch_id, task_id, None, None) {
            Ok(outputs) => {
                let after_outputs = canonical_outputs(outputs);
                if &after_outputs != before_outputs {
                    result.add_failure(GateFailure::new(format!(
                        "query_outputs({task_id}) changed after deleting events.jsonl"
                    )));
                }
            }
            Err(e) => result.add_failure(GateFailure::new(format!(
                "query_outputs({task_id}) failed after deletion: {e}"
            ))),
        }
    }

    result
}

fn check_retry_determinism(ctx: &GateContext) -> GateResult {
    let mut result = GateResult::passing(RETRY_DETERMINISM, GateStatus::Enforced);
    let batch_id = ctx.batch_id.clone().unwrap_or_default();
    let Some(task_ids) = resolve_task_ids(ctx) else {
        result.add_failure(GateFailure::new("could not resolve task list from plan.json"));
        return result;
    };

    let registry = crate::executor::default_registry();
    let blobs = BlobStore::new(layout::objects_root(&ctx.store_root));

    for task_id in &task_ids {
        let Some(task_bytes) = std::fs::read(layout::task_json(&ctx.store_root, &batch_id, task_id)).ok() else {
            result.add_failure(GateFailure::new(format!("could not read task.json for {task_id}")));
            continue;
        };
        let Ok(task_meta) = serde_json::from_slice::<TaskMeta>(&task_bytes) else {
            result.add_failure(GateFailure::new(format!("could not parse task.json for {task_id}")));
            continue;
        };
        let Some(executor) = registry.get(&task_meta.task_type).cloned() else {
            result.add_failure(GateFailure::new(format!("no executor registered for task type {}", task_meta.task_type)));
            continue;
        };

        let target_shard = all_shard_ids().into_iter().find(|shard_id| {
            let path = layout::shard_state_json(&ctx.store_root, &batch_id, task_id, shard_id);
            std::fs::read(&path)
                .ok()
                .and_then(|b| serde_json::from_slice::<ShardState>(&b).ok())
                .map(|s| s.status == ShardStatus::Done)
                .unwrap_or(false)
        });

        let Some(shard_id) = target_shard else {
            result.add_failure(GateFailure::new(format!("task {task_id} has no done shard to retry")));
            continue;
        };

        let before = match shard::get_outputs(&ctx.store_root, &batch_id, task_id, &shard_id) {
            Ok(o) => canonical_outputs(o),
            Err(e) => {
                result.add_failure(GateFailure::new(format!("reading outputs for {task_id}/{shard_id} failed: {e}")));
                continue;
            }
        };

        let state_path = layout::shard_state_json(&ctx.store_root, &batch_id, task_id, &shard_id);
        let Ok(state_bytes) = std::fs::read(&state_path) else {
            result.add_failure(GateFailure::new(format!("could not re-read shard state for {task_id}/{shard_id}")));
            continue;
        };
        let Ok(mut state) = serde_json::from_slice::<ShardState>(&state_bytes) else {
            result.add_failure(GateFailure::new(format!("could not parse shard state for {task_id}/{shard_id}")));
            continue;
        };
        state.status = ShardStatus::Failed;
        if codebatch_storage::atomic::write_atomic(&state_path, &serde_json::to_vec(&state).unwrap_or_default())
            .is_err()
        {
            result.add_failure(GateFailure::new(format!("could not force shard {task_id}/{shard_id} to failed")));
            continue;
        }

        if shard::reset_shard(&ctx.store_root, &batch_id, task_id, &shard_id).is_err() {
            result.add_failure(GateFailure::new(format!("reset_shard failed for {task_id}/{shard_id}")));
            continue;
        }
        if shard::run_shard(&ctx.store_root, &blobs, &batch_id, task_id, &shard_id, executor.as_ref()).is_err() {
            result.add_failure(GateFailure::new(format!("rerun failed for {task_id}/{shard_id}")));
            continue;
        }

        let after = match shard::get_outputs(&ctx.store_root, &batch_id, task_id, &shard_id) {
            Ok(o) => canonical_outputs(o),
            Err(e) => {
                result.add_failure(GateFailure::new(format!("reading outputs after rerun for {task_id}/{shard_id} failed: {e}")));
                continue;
            }
        };

        if before.len() != after.len() {
            result.add_failure(GateFailure::expected_actual(
                format!("record count changed across retry for {task_id}/{shard_id}"),
                before.len().to_string(),
                after.len().to_string(),
            ));
        } else if before != after {
            result.add_failure(GateFailure::new(format!(
                "output content changed across retry for {task_id}/{shard_id}"
            )));
        }
    }

    result
}

fn group_key(group: query::GroupBy) -> &'static str {
    match group {
        query::GroupBy::Kind => "kind",
        query::GroupBy::Severity => "severity",
        query::GroupBy::Code => "code",
        query::GroupBy::Lang => "lang",
    }
}

fn check_cache_equivalence(ctx: &GateContext) -> GateResult {
    let mut result = GateResult::passing(CACHE_EQUIVALENCE, GateStatus::Enforced);
    let batch_id = ctx.batch_id.clone().unwrap_or_default();
    let Some(task_ids) = resolve_task_ids(ctx) else {
        result.add_failure(GateFailure::new("could not resolve task list from plan.json"));
        return result;
    };
    let Some(batch_meta) = read_batch_meta(&ctx.store_root, &batch_id) else {
        result.add_failure(GateFailure::new("could not read batch.json"));
        return result;
    };

    if let Err(e) = cache::build_index(&ctx.store_root, &batch_id, false) {
        result.add_failure(GateFailure::new(format!("building cache failed: {e}")));
        return result;
    }

    for task_id in &task_ids {
        let scanned = match query::query_outputs(&ctx.store_root, &batch_id, task_id, None, None) {
            Ok(o) => o,
            Err(e) => {
                result.add_failure(GateFailure::new(format!("scan query_outputs({task_id}) failed: {e}")));
                continue;
            }
        };
        let kinds: BTreeSet<String> = scanned.iter().map(|r| r.kind.clone()).collect();
        for kind in &kinds {
            let mut scanned_paths: Vec<String> =
                scanned.iter().filter(|r| &r.kind == kind).map(|r| r.path.clone()).collect();
            scanned_paths.sort();

            match cache::try_outputs(&ctx.store_root, &batch_id, task_id, kind, &batch_meta.snapshot_id, &task_ids) {
                Some(cached) => {
                    let mut cached_paths: Vec<String> = cached.into_iter().map(|(p, _, _, _)| p).collect();
                    cached_paths.sort();
                    if cached_paths != scanned_paths {
                        result.add_failure(GateFailure::new(format!(
                            "cache/scan disagree for task {task_id} kind {kind}"
                        )));
                    }
                }
                None => {
                    result.add_failure(GateFailure::new(format!(
                        "cache unavailable for task {task_id} kind {kind} after build_index"
                    )));
                }
            }
        }

        for group in [query::GroupBy::Kind, query::GroupBy::Severity, query::GroupBy::Code] {
            let Ok(scanned_stats) = query::query_stats(&ctx.store_root, &batch_id, task_id, group) else {
                continue;
            };
            match cache::try_stats(
                &ctx.store_root,
                &batch_id,
                task_id,
                group_key(group),
                &batch_meta.snapshot_id,
                &task_ids,
            ) {
                Some(cached_stats) => {
                    if cached_stats != scanned_stats {
                        result.add_failure(GateFailure::new(format!(
                            "stats disagree for task {task_id} group {}",
                            group_key(group)
                        )));
                    }
                }
                None => result.add_failure(GateFailure::new(format!(
                    "cached stats unavailable for task {task_id} group {}",
                    group_key(group)
                ))),
            }
        }
    }

    result
}

fn check_cache_deletion_equivalence(ctx: &GateContext) -> GateResult {
    let mut result = GateResult::passing(CACHE_DELETION_EQUIVALENCE, GateStatus::Enforced);
    let batch_id = ctx.batch_id.clone().unwrap_or_default();
    let Some(task_ids) = resolve_task_ids(ctx) else {
        result.add_failure(GateFailure::new("could not resolve task list from plan.json"));
        return result;
    };
    let Some(batch_meta) = read_batch_meta(&ctx.store_root, &batch_id) else {
        result.add_failure(GateFailure::new("could not read batch.json"));
        return result;
    };

    if let Err(e) = cache::build_index(&ctx.store_root, &batch_id, false) {
        result.add_failure(GateFailure::new(format!("building cache failed: {e}")));
        return result;
    }

    let mut cached_before = Vec::new();
    for task_id in &task_ids {
        match cache::try_stats(&ctx.store_root, &batch_id, task_id, "kind", &batch_meta.snapshot_id, &task_ids) {
            Some(stats) => cached_before.push((task_id.clone(), stats)),
            None => {
                result.add_failure(GateFailure::new(format!("cache unavailable for task {task_id} before deletion")));
                return result;
            }
        }
    }

    let indexes_dir = layout::indexes_root(&ctx.store_root);
    if indexes_dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(&indexes_dir) {
            result.add_failure(GateFailure::new(format!("could not delete indexes/: {e}")));
            return result;
        }
    }

    for (task_id, before_stats) in &cached_before {
        match query::query_stats(&ctx.store_root, &batch_id, task_id, query::GroupBy::Kind) {
            Ok(after_stats) => {
                if &after_stats != before_stats {
                    result.add_failure(GateFailure::new(format!(
                        "scan after indexes/ deletion disagrees with cache for task {task_id}"
                    )));
                }
            }
            Err(e) => result.add_failure(GateFailure::new(format!("scan after deletion failed for {task_id}: {e}"))),
        }
    }

    result
}

fn check_deterministic_rebuild(ctx: &GateContext) -> GateResult {
    let mut result = GateResult::passing(DETERMINISTIC_REBUILD, GateStatus::Enforced);
    let batch_id = ctx.batch_id.clone().unwrap_or_default();
    let Some(task_ids) = resolve_task_ids(ctx) else {
        result.add_failure(GateFailure::new("could not resolve task list from plan.json"));
        return result;
    };
    let Some(batch_meta) = read_batch_meta(&ctx.store_root, &batch_id) else {
        result.add_failure(GateFailure::new("could not read batch.json"));
        return result;
    };

    if let Err(e) = cache::build_index(&ctx.store_root, &batch_id, true) {
        result.add_failure(GateFailure::new(format!("first rebuild failed: {e}")));
        return result;
    }
    let mut first = Vec::new();
    for task_id in &task_ids {
        match cache::try_stats(&ctx.store_root, &batch_id, task_id, "kind", &batch_meta.snapshot_id, &task_ids) {
            Some(stats) => first.push((task_id.clone(), stats)),
            None => {
                result.add_failure(GateFailure::new(format!("cache unavailable for task {task_id} after first rebuild")));
                return result;
            }
        }
    }

    if let Err(e) = cache::build_index(&ctx.store_root, &batch_id, true) {
        result.add_failure(GateFailure::new(format!("second rebuild failed: {e}")));
        return result;
    }
    for (task_id, first_stats) in &first {
        match cache::try_stats(&ctx.store_root, &batch_id, task_id, "kind", &batch_meta.snapshot_id, &task_ids) {
            Some(second_stats) => {
                if &second_stats != first_stats {
                    result.add_failure(GateFailure::new(format!(
                        "rebuild is not deterministic for task {task_id}"
                    )));
                }
            }
            None => result.add_failure(GateFailure::new(format!("cache unavailable for task {task_id} after second rebuild"))),
        }
    }

    result
}

fn check_lang_join_consistency(ctx: &GateContext) -> GateResult {
    let mut result = GateResult::passing(LANG_JOIN_CONSISTENCY, GateStatus::Harness);
    let batch_id = ctx.batch_id.clone().unwrap_or_default();
    let Some(task_ids) = resolve_task_ids(ctx) else {
        result.add_failure(GateFailure::new("could not resolve task list from plan.json"));
        return result;
    };

    for task_id in &task_ids {
        let Ok(scanned) = query::query_stats(&ctx.store_root, &batch_id, task_id, query::GroupBy::Lang) else {
            result.add_failure(GateFailure::new(format!("query_stats(lang) failed for {task_id}")));
            continue;
        };
        let total: u64 = scanned.values().sum();
        let Ok(by_kind) = query::query_stats(&ctx.store_root, &batch_id, task_id, query::GroupBy::Kind) else {
            continue;
        };
        let kind_total: u64 = by_kind.values().sum();
        if total != kind_total {
            result.add_failure(GateFailure::new(format!(
                "lang-grouped total ({total}) disagrees with kind-grouped total ({kind_total}) for {task_id}"
            )));
        }
    }
    result
}


fn check_case_collision_free(ctx: &GateContext) -> GateResult {
    let mut result = GateResult::passing(CASE_COLLISION_FREE, GateStatus::Placeholder);
    let Some(snapshot_id) = &ctx.snapshot_id else {
        result.add_failure(GateFailure::new("no snapshot_id provided"));
        return result;
    };
    let path = layout::files_index_jsonl(&ctx.store_root, snapshot_id);
    let Ok(content) = std::fs::read_to_string(&path) else {
        result.add_failure(GateFailure::new(format!("could not read files.index.jsonl for {snapshot_id}")));
        return result;
    };
    let mut paths = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(rec) = serde_json::from_str::<codebatch_storage::schema::FileRecord>(line) {
            paths.push(rec.path);
        }
    }
    let collisions = path::detect_case_collisions(&paths);
    for (a, b) in &collisions {
        result.add_failure(GateFailure::expected_actual("case-insensitive path collision", a, b));
    }
    result
}
