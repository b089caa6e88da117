//! C8: the query engine. Answers semantic questions by scanning
//! `files.index.jsonl` and `outputs.index.jsonl` files directly.
//!
//! Events independence is a hard invariant: nothing in this module opens
//! an `events.jsonl` file, ever.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::Result;
use crate::ids::all_shard_ids;
use crate::layout;
use crate::schema::{FileRecord, OutputRecord};
use crate::shard::get_outputs;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSummary {
    pub by_kind: HashMap<String, u64>,
    pub by_severity: HashMap<String, u64>,
    pub files_with_outputs: u64,
    pub files_with_errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Kind,
    Severity,
    Code,
    Lang,
}

fn batch_snapshot_id(store_root: &Path, batch_id: &str) -> Result<String> {
    let bytes = std::fs::read(layout::batch_json(store_root, batch_id))?;
    let meta: crate::schema::BatchMeta = serde_json::from_slice(&bytes)?;
    Ok(meta.snapshot_id)
}

fn load_files_index(store_root: &Path, snapshot_id: &str) -> Result<Vec<FileRecord>> {
    let path = layout::files_index_jsonl(store_root, snapshot_id);
    let content = std::fs::read_to_string(&path)?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| Ok(serde_json::from_str(l)?))
        .collect()
}

/// Build the `path -> lang` map used by `query_stats(group_by=lang)`. Built
/// explicitly from the snapshot index rather than re-derived from an
/// output record's own path extension, so it agrees with the cache's join.
fn lang_map(store_root: &Path, snapshot_id: &str) -> Result<HashMap<String, String>> {
    Ok(load_files_index(store_root, snapshot_id)?
        .into_iter()
        .map(|r| (r.path, r.lang_hint.unwrap_or_else(|| "unknown".to_string())))
        .collect())
}

/// Iterate every shard's outputs for `task_id`, in ascending shard order,
/// preserving in-shard file order.
fn scan_task_outputs(store_root: &Path, batch_id: &str, task_id: &str) -> Result<Vec<OutputRecord>> {
    let mut out = Vec::new();
    for shard_id in all_shard_ids() {
        out.extend(get_outputs(store_root, batch_id, task_id, &shard_id)?);
    }
    Ok(out)
}

pub fn query_outputs(
    store_root: &Path,
    batch_id: &str,
    task_id: &str,
    kind: Option<&str>,
    path_substring: Option<&str>,
) -> Result<Vec<OutputRecord>> {
    Ok(scan_task_outputs(store_root, batch_id, task_id)?
        .into_iter()
        .filter(|r| kind.map_or(true, |k| r.kind == k))
        .filter(|r| path_substring.map_or(true, |s| r.path.contains(s)))
        .collect())
}

pub fn query_diagnostics(
    store_root: &Path,
    batch_id: &str,
    task_id: &str,
    severity: Option<&str>,
    code: Option<&str>,
    path_substring: Option<&str>,
) -> Result<Vec<OutputRecord>> {
    Ok(scan_task_outputs(store_root, batch_id, task_id)?
        .into_iter()
        .filter(|r| r.kind == "diagnostic")
        .filter(|r| severity.map_or(true, |s| r.severity() == Some(s)))
        .filter(|r| code.map_or(true, |c| r.code() == Some(c)))
        .filter(|r| path_substring.map_or(true, |s| r.path.contains(s)))
        .collect())
}

/// Paths that produced any `kind=diagnostic` with `severity=error`, sorted.
pub fn query_failed_files(store_root: &Path, batch_id: &str, task_id: &str) -> Result<Vec<String>> {
    let mut paths: HashSet<String> = scan_task_outputs(store_root, batch_id, task_id)?
        .into_iter()
        .filter(|r| r.kind == "diagnostic" && r.severity() == Some("error"))
        .map(|r| r.path)
        .collect();
    let mut out: Vec<String> = paths.drain().collect();
    out.sort();
    Ok(out)
}

/// Deduplicated, sorted paths that produced a record of `kind`.
pub fn query_files_with_outputs(
    store_root: &Path,
    batch_id: &str,
    task_id: &str,
    kind: &str,
) -> Result<Vec<String>> {
    let mut paths: HashSet<String> = scan_task_outputs(store_root, batch_id, task_id)?
        .into_iter()
        .filter(|r| r.kind == kind)
        .map(|r| r.path)
        .collect();
    let mut out: Vec<String> = paths.drain().collect();
    out.sort();
    Ok(out)
}

pub fn query_stats(
    store_root: &Path,
    batch_id: &str,
    task_id: &str,
    group_by: GroupBy,
) -> Result<HashMap<String, u64>> {
    let outputs = scan_task_outputs(store_root, batch_id, task_id)?;
    let mut counts: HashMap<String, u64> = HashMap::new();

    match group_by {
        GroupBy::Kind => {
            for r in &outputs {
                *counts.entry(r.kind.clone()).or_default() += 1;
            }
        }
        GroupBy::Severity => {
            for r in outputs.iter().filter(|r| r.kind == "diagnostic") {
                if let Some(sev) = r.severity() {
                    *counts.entry(sev.to_string()).or_default() += 1;
                }
            }
        }
        GroupBy::Code => {
            for r in outputs.iter().filter(|r| r.kind == "diagnostic") {
                if let Some(code) = r.code() {
                    *counts.entry(code.to_string()).or_default() += 1;
                }
            }
        }
        GroupBy::Lang => {
            let snapshot_id = batch_snapshot_id(store_root, batch_id)?;
            let langs = lang_map(store_root, &snapshot_id)?;
            for r in &outputs {
                let lang = langs
                    .get(&r.path)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                *counts.entry(lang).or_default() += 1;
            }
        }
    }
    Ok(counts)
}

pub fn task_summary(store_root: &Path, batch_id: &str, task_id: &str) -> Result<TaskSummary> {
    let outputs = scan_task_outputs(store_root, batch_id, task_id)?;
    let mut summary = TaskSummary::default();
    let mut with_outputs: HashSet<&str> = HashSet::new();
    let mut with_errors: HashSet<&str> = HashSet::new();

    for r in &outputs {
        *summary.by_kind.entry(r.kind.clone()).or_default() += 1;
        with_outputs.insert(&r.path);
        if r.kind == "diagnostic" {
            if let Some(sev) = r.severity() {
                *summary.by_severity.entry(sev.to_string()).or_default() += 1;
                if sev == "error" {
                    with_errors.insert(&r.path);
                }
            }
        }
    }
    summary.files_with_outputs = with_outputs.len() as u64;
    summary.files_with_errors = with_errors.len() as u64;
    Ok(summary)
}
