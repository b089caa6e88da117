//! C11: concrete `ShardExecutor` implementations for the four shipped task
//! types. None of these ship a real language grammar (out of scope); they
//! share a small line-oriented scanner that is good enough to exercise the
//! full output-record vocabulary end to end.

use std::collections::HashMap;
use std::sync::Arc;

use codebatch_storage::schema::{ChunkEntry, ChunkManifest, FileRecord, OutputRecord};
use codebatch_storage::shard::{RunnerHandle, ShardExecutor};
use codebatch_storage::Result as StorageResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Registry of executors keyed by task **type**, not task id.
pub fn default_registry() -> HashMap<String, Arc<dyn ShardExecutor>> {
    let mut m: HashMap<String, Arc<dyn ShardExecutor>> = HashMap::new();
    m.insert("parse".to_string(), Arc::new(ParseExecutor::default()));
    m.insert("analyze".to_string(), Arc::new(AnalyzeExecutor));
    m.insert("symbols".to_string(), Arc::new(SymbolsExecutor));
    m.insert("lint".to_string(), Arc::new(LintExecutor));
    m
}

fn blank_record(path: &str, kind: &str) -> OutputRecord {
    OutputRecord {
        schema_version: 0,
        snapshot_id: String::new(),
        batch_id: String::new(),
        task_id: String::new(),
        shard_id: String::new(),
        path: path.to_string(),
        kind: kind.to_string(),
        ts: String::new(),
        extra: HashMap::new(),
    }
}

// ---- shared toy scanner -----------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamedLine {
    name: String,
    line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ImportRef {
    module: String,
    names: Vec<String>,
    line: u32,
}

/// The envelope stored as the `parse` task's `kind=ast` blob payload.
/// Downstream tasks decode this instead of re-reading raw source.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AstEnvelope {
    line_count: u64,
    byte_count: u64,
    functions: Vec<NamedLine>,
    classes: Vec<NamedLine>,
    variables: Vec<NamedLine>,
    imports: Vec<ImportRef>,
    control_flow_keywords: u32,
    long_lines: Vec<u32>,
    has_docstring: bool,
}

fn scan_source(content: &str) -> AstEnvelope {
    let mut functions = Vec::new();
    let mut classes = Vec::new();
    let mut variables = Vec::new();
    let mut imports = Vec::new();
    let mut control_flow_keywords = 0u32;
    let mut long_lines = Vec::new();
    let mut has_docstring = false;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        let line = raw_line.trim();

        if raw_line.len() > 100 {
            long_lines.push(line_no);
        }
        if line.contains("\"\"\"") || line.contains("'''") {
            has_docstring = true;
        }

        if let Some(rest) = line.strip_prefix("def ").or_else(|| line.strip_prefix("function ")) {
            let name = rest.split(['(', ' ']).next().unwrap_or("").to_string();
            if !name.is_empty() {
                functions.push(NamedLine { name, line: line_no });
            }
        } else if let Some(rest) = line.strip_prefix("class ") {
            let name = rest.split(['(', ':', ' ']).next().unwrap_or("").to_string();
            if !name.is_empty() {
                classes.push(NamedLine { name, line: line_no });
            }
        } else if let Some(rest) = line.strip_prefix("import ") {
            let module = rest.split([' ', ',']).next().unwrap_or("").to_string();
            imports.push(ImportRef { module, names: Vec::new(), line: line_no });
        } else if let Some(rest) = line.strip_prefix("from ") {
            let mut parts = rest.splitn(2, " import ");
            let module = parts.next().unwrap_or("").trim().to_string();
            let names = parts
                .next()
                .map(|n| n.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default();
            imports.push(ImportRef { module, names, line: line_no });
        } else if !line.is_empty()
            && !line.starts_with('#')
            && line.contains('=')
            && !line.contains("==")
            && line.chars().next().map_or(false, |c| c.is_alphabetic() || c == '_')
        {
            let name = line.split('=').next().unwrap_or("").trim().to_string();
            if name.split_whitespace().count() == 1 && !name.is_empty() {
                variables.push(NamedLine { name, line: line_no });
            }
        }

        for kw in ["if ", "elif ", "for ", "while ", "except", "case "] {
            if line.starts_with(kw) {
                control_flow_keywords += 1;
            }
        }
    }

    AstEnvelope {
        line_count: content.lines().count() as u64,
        byte_count: content.len() as u64,
        functions,
        classes,
        variables,
        imports,
        control_flow_keywords,
        long_lines,
        has_docstring,
    }
}

/// Decode the AST envelope referenced by a prior `01_parse` output record,
/// transparently reassembling chunked payloads.
fn load_ast_envelope(handle: &RunnerHandle<'_>, record: &OutputRecord) -> Result<AstEnvelope, String> {
    let object_str = record.get("object").and_then(Value::as_str).ok_or("missing object ref")?;
    let object = codebatch_storage::ObjectRef::parse(object_str).map_err(|e| e.to_string())?;
    let bytes = handle.get(&object).map_err(|e| e.to_string())?;

    let payload = if record.get("format").and_then(Value::as_str) == Some("json+chunks") {
        let manifest: ChunkManifest = serde_json::from_slice(&bytes).map_err(|e| e.to_string())?;
        let mut full = Vec::with_capacity(manifest.total_bytes as usize);
        for chunk in &manifest.chunks {
            let chunk_bytes = handle.get(&chunk.object).map_err(|e| e.to_string())?;
            full.extend_from_slice(&chunk_bytes);
        }
        full
    } else {
        bytes
    };

    serde_json::from_slice(&payload).map_err(|e| e.to_string())
}

// ---- parse ---------------------------------------------------------------

const CHUNK_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024;
const CHUNK_SIZE_BYTES: usize = 4 * 1024 * 1024;

pub struct ParseExecutor {
    chunk_threshold: u64,
}

impl Default for ParseExecutor {
    fn default() -> Self {
        Self { chunk_threshold: CHUNK_THRESHOLD_BYTES }
    }
}

impl ShardExecutor for ParseExecutor {
    fn run(
        &self,
        _config: &Value,
        shard_files: &[FileRecord],
        handle: &RunnerHandle<'_>,
    ) -> StorageResult<Vec<OutputRecord>> {
        let mut out = Vec::with_capacity(shard_files.len());
        for file in shard_files {
            let content = handle.get(&file.object)?;
            let text = String::from_utf8_lossy(&content);
            let envelope = scan_source(&text);
            let payload = serde_json::to_vec(&envelope)?;

            let mut rec = blank_record(&file.path, "ast");
            if payload.len() as u64 > self.chunk_threshold {
                let mut chunks = Vec::new();
                for (index, chunk_bytes) in payload.chunks(CHUNK_SIZE_BYTES).enumerate() {
                    let object = handle.put(chunk_bytes)?;
                    chunks.push(ChunkEntry {
                        object,
                        size: chunk_bytes.len() as u64,
                        index: index as u32,
                    });
                }
                let manifest = ChunkManifest {
                    kind: "ast".to_string(),
                    format: "json+chunks".to_string(),
                    chunks,
                    total_bytes: payload.len() as u64,
                    chunk_size: CHUNK_SIZE_BYTES as u64,
                };
                let manifest_object = handle.put(&serde_json::to_vec(&manifest)?)?;
                rec.extra.insert("object".to_string(), json!(manifest_object.as_str()));
                rec.extra.insert("format".to_string(), json!("json+chunks"));
            } else {
                let object = handle.put(&payload)?;
                rec.extra.insert("object".to_string(), json!(object.as_str()));
                rec.extra.insert("format".to_string(), json!("json"));
            }
            out.push(rec);
        }
        Ok(out)
    }
}

// ---- analyze ---------------------------------------------------------------

pub struct AnalyzeExecutor;

impl ShardExecutor for AnalyzeExecutor {
    fn run(
        &self,
        _config: &Value,
        shard_files: &[FileRecord],
        handle: &RunnerHandle<'_>,
    ) -> StorageResult<Vec<OutputRecord>> {
        let prior = handle.iter_prior_outputs("01_parse", Some("ast"))?;
        let by_path: HashMap<&str, &OutputRecord> =
            prior.iter().map(|r| (r.path.as_str(), r)).collect();

        let mut out = Vec::new();
        for file in shard_files {
            let Some(prior_rec) = by_path.get(file.path.as_str()) else {
                let mut rec = blank_record(&file.path, "metric");
                rec.extra.insert("metric".to_string(), json!("error"));
                rec.extra.insert("value".to_string(), json!("no prior parse output"));
                out.push(rec);
                continue;
            };

            let envelope = match load_ast_envelope(handle, prior_rec) {
                Ok(e) => e,
                Err(message) => {
                    let mut rec = blank_record(&file.path, "metric");
                    rec.extra.insert("metric".to_string(), json!("error"));
                    rec.extra.insert("value".to_string(), json!(message));
                    out.push(rec);
                    continue;
                }
            };

            let complexity = envelope.control_flow_keywords + 1;
            let metrics: &[(&str, Value)] = &[
                ("loc", json!(envelope.line_count)),
                ("bytes", json!(envelope.byte_count)),
                ("function_count", json!(envelope.functions.len() as u64)),
                ("class_count", json!(envelope.classes.len() as u64)),
                ("import_count", json!(envelope.imports.len() as u64)),
                ("complexity", json!(complexity)),
                ("max_complexity", json!(complexity)),
                ("lang", json!(file.lang_hint.clone().unwrap_or_else(|| "unknown".to_string()))),
            ];
            for (metric, value) in metrics {
                let mut rec = blank_record(&file.path, "metric");
                rec.extra.insert("metric".to_string(), json!(metric));
                rec.extra.insert("value".to_string(), value.clone());
                out.push(rec);
            }
        }
        Ok(out)
    }
}

// ---- symbols ---------------------------------------------------------------

pub struct SymbolsExecutor;

impl ShardExecutor for SymbolsExecutor {
    fn run(
        &self,
        _config: &Value,
        shard_files: &[FileRecord],
        handle: &RunnerHandle<'_>,
    ) -> StorageResult<Vec<OutputRecord>> {
        let prior = handle.iter_prior_outputs("01_parse", Some("ast"))?;
        let by_path: HashMap<&str, &OutputRecord> =
            prior.iter().map(|r| (r.path.as_str(), r)).collect();

        let mut out = Vec::new();
        for file in shard_files {
            let Some(prior_rec) = by_path.get(file.path.as_str()) else {
                continue;
            };
            let envelope = match load_ast_envelope(handle, prior_rec) {
                Ok(e) => e,
                Err(_) => continue,
            };

            let mut module = blank_record(&file.path, "symbol");
            module.extra.insert("name".to_string(), json!(file.path));
            module.extra.insert("symbol_type".to_string(), json!("module"));
            module.extra.insert("line".to_string(), json!(1));
            module.extra.insert("col".to_string(), json!(0));
            module.extra.insert("scope".to_string(), json!(""));
            out.push(module);

            for f in &envelope.functions {
                let mut rec = blank_record(&file.path, "symbol");
                rec.extra.insert("name".to_string(), json!(f.name));
                rec.extra.insert("symbol_type".to_string(), json!("function"));
                rec.extra.insert("line".to_string(), json!(f.line));
                rec.extra.insert("col".to_string(), json!(0));
                rec.extra.insert("scope".to_string(), json!(file.path));
                out.push(rec);
            }
            for c in &envelope.classes {
                let mut rec = blank_record(&file.path, "symbol");
                rec.extra.insert("name".to_string(), json!(c.name));
                rec.extra.insert("symbol_type".to_string(), json!("class"));
                rec.extra.insert("line".to_string(), json!(c.line));
                rec.extra.insert("col".to_string(), json!(0));
                rec.extra.insert("scope".to_string(), json!(file.path));
                out.push(rec);
            }
            for v in &envelope.variables {
                let mut rec = blank_record(&file.path, "symbol");
                rec.extra.insert("name".to_string(), json!(v.name));
                rec.extra.insert("symbol_type".to_string(), json!("variable"));
                rec.extra.insert("line".to_string(), json!(v.line));
                rec.extra.insert("col".to_string(), json!(0));
                rec.extra.insert("scope".to_string(), json!(file.path));
                out.push(rec);
            }

            for imp in &envelope.imports {
                if imp.module.is_empty() {
                    let mut rec = blank_record(&file.path, "diagnostic");
                    rec.extra.insert("severity".to_string(), json!("warning"));
                    rec.extra.insert("code".to_string(), json!("unresolved-import"));
                    rec.extra.insert("message".to_string(), json!("could not resolve import target"));
                    rec.extra.insert("line".to_string(), json!(imp.line));
                    rec.extra.insert("col".to_string(), json!(0));
                    out.push(rec);
                    continue;
                }
                let mut rec = blank_record(&file.path, "edge");
                rec.extra.insert("edge_type".to_string(), json!("imports"));
                rec.extra.insert("target".to_string(), json!(imp.module));
                rec.extra.insert("line".to_string(), json!(imp.line));
                out.push(rec);
            }
        }
        Ok(out)
    }
}

// ---- lint ---------------------------------------------------------------

pub struct LintExecutor;

const MAX_CONTROL_FLOW_BEFORE_HIGH_COMPLEXITY: u32 = 10;

impl ShardExecutor for LintExecutor {
    fn run(
        &self,
        _config: &Value,
        shard_files: &[FileRecord],
        handle: &RunnerHandle<'_>,
    ) -> StorageResult<Vec<OutputRecord>> {
        let mut out = Vec::new();
        for file in shard_files {
            let content = handle.get(&file.object)?;
            let text = String::from_utf8_lossy(&content);
            let envelope = scan_source(&text);

            for line in &envelope.long_lines {
                let mut rec = blank_record(&file.path, "diagnostic");
                rec.extra.insert("severity".to_string(), json!("warning"));
                rec.extra.insert("code".to_string(), json!("line-too-long"));
                rec.extra.insert("message".to_string(), json!("line exceeds 100 characters"));
                rec.extra.insert("line".to_string(), json!(line));
                rec.extra.insert("col".to_string(), json!(100));
                out.push(rec);
            }

            if !envelope.imports.is_empty() {
                for imp in &envelope.imports {
                    let referenced = !imp.module.is_empty()
                        && text.matches(imp.module.as_str()).count() > 1;
                    if !referenced {
                        let mut rec = blank_record(&file.path, "diagnostic");
                        rec.extra.insert("severity".to_string(), json!("warning"));
                        rec.extra.insert("code".to_string(), json!("unused-import"));
                        rec.extra.insert(
                            "message".to_string(),
                            json!(format!("import '{}' appears unused", imp.module)),
                        );
                        rec.extra.insert("line".to_string(), json!(imp.line));
                        rec.extra.insert("col".to_string(), json!(0));
                        out.push(rec);
                    }
                }
            }

            if (!envelope.functions.is_empty() || !envelope.classes.is_empty()) && !envelope.has_docstring {
                let mut rec = blank_record(&file.path, "diagnostic");
                rec.extra.insert("severity".to_string(), json!("info"));
                rec.extra.insert("code".to_string(), json!("missing-docstring"));
                rec.extra.insert("message".to_string(), json!("file defines functions or classes but has no docstring"));
                rec.extra.insert("line".to_string(), json!(1));
                rec.extra.insert("col".to_string(), json!(0));
                out.push(rec);
            }

            if envelope.control_flow_keywords > MAX_CONTROL_FLOW_BEFORE_HIGH_COMPLEXITY {
                let mut rec = blank_record(&file.path, "diagnostic");
                rec.extra.insert("severity".to_string(), json!("error"));
                rec.extra.insert("code".to_string(), json!("high-complexity"));
                rec.extra.insert(
                    "message".to_string(),
                    json!(format!("{} control-flow branches exceeds threshold", envelope.control_flow_keywords)),
                );
                rec.extra.insert("line".to_string(), json!(1));
                rec.extra.insert("col".to_string(), json!(0));
                out.push(rec);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebatch_storage::layout;
    use codebatch_storage::shard::run_shard;
    use codebatch_storage::schema::{BatchMeta, BatchStatus, Sharding, TaskInputs, TaskMeta};
    use codebatch_storage::BlobStore;
    use tempfile::tempdir;

    struct Fixture {
        _dir: tempfile::TempDir,
        store_root: std::path::PathBuf,
        blobs: BlobStore,
    }

    fn write_task(store_root: &std::path::Path, batch_id: &str, task_id: &str, task_type: &str, deps: &[&str]) {
        std::fs::create_dir_all(layout::task_dir(store_root, batch_id, task_id)).unwrap();
        let meta = TaskMeta {
            task_id: task_id.to_string(),
            batch_id: batch_id.to_string(),
            task_type: task_type.to_string(),
            sharding: Sharding::hash_prefix_256(),
            inputs: TaskInputs { snapshot: true, tasks: deps.iter().map(|s| s.to_string()).collect() },
            config: json!({}),
        };
        std::fs::write(layout::task_json(store_root, batch_id, task_id), serde_json::to_vec(&meta).unwrap()).unwrap();
        std::fs::create_dir_all(layout::shard_dir(store_root, batch_id, task_id, "00")).unwrap();
        let state = codebatch_storage::schema::ShardState::new_ready(batch_id, task_id, "00");
        std::fs::write(layout::shard_state_json(store_root, batch_id, task_id, "00"), serde_json::to_vec(&state).unwrap()).unwrap();
    }

    fn setup(content: &str) -> (Fixture, FileRecord) {
        let dir = tempdir().unwrap();
        let store_root = dir.path().to_path_buf();
        let blobs = BlobStore::new(layout::objects_root(&store_root));
        let object = blobs.put(content.as_bytes()).unwrap();
        let file = FileRecord {
            path: "a.py".to_string(),
            path_key: "a.py".to_string(),
            object: object.clone(),
            size: content.len() as u64,
            lang_hint: Some("python".to_string()),
        };
        let snapshot_id = "snap-test";
        std::fs::create_dir_all(layout::snapshot_dir(&store_root, snapshot_id)).unwrap();
        std::fs::write(
            layout::files_index_jsonl(&store_root, snapshot_id),
            format!("{}\n", serde_json::to_string(&file).unwrap()),
        )
        .unwrap();

        let batch_id = "batch-test";
        std::fs::create_dir_all(layout::batch_dir(&store_root, batch_id)).unwrap();
        let batch_meta = BatchMeta {
            batch_id: batch_id.to_string(),
            snapshot_id: snapshot_id.to_string(),
            pipeline: "full".to_string(),
            status: BatchStatus::Running,
            created_at: codebatch_storage::ids::now_rfc3339(),
            metadata: None,
        };
        std::fs::write(layout::batch_json(&store_root, batch_id), serde_json::to_vec(&batch_meta).unwrap()).unwrap();

        write_task(&store_root, batch_id, "01_parse", "parse", &[]);
        write_task(&store_root, batch_id, "02_analyze", "analyze", &["01_parse"]);
        write_task(&store_root, batch_id, "03_symbols", "symbols", &["01_parse"]);
        write_task(&store_root, batch_id, "04_lint", "lint", &["01_parse"]);

        (Fixture { _dir: dir, store_root, blobs }, file)
    }

    const SAMPLE: &str = "import os\nfrom collections import OrderedDict\n\ndef add(a, b):\n    if a:\n        return a + b\n    return b\n\nclass Widget:\n    pass\n";

    #[test]
    fn test_parse_executor_emits_single_json_blob_under_threshold() {
        let (fx, _file) = setup(SAMPLE);
        let state = run_shard(&fx.store_root, &fx.blobs, "batch-test", "01_parse", "00", &ParseExecutor::default()).unwrap();
        assert_eq!(state.status, codebatch_storage::schema::ShardStatus::Done);
        let outputs = codebatch_storage::shard::get_outputs(&fx.store_root, "batch-test", "01_parse", "00").unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].kind, "ast");
        assert_eq!(outputs[0].get("format").unwrap(), "json");
    }

    #[test]
    fn test_parse_executor_chunks_above_threshold() {
        // A threshold far below any real envelope's size forces the chunked
        // path without needing a multi-megabyte fixture.
        let (fx, _file) = setup(SAMPLE);
        let executor = ParseExecutor { chunk_threshold: 10 };
        run_shard(&fx.store_root, &fx.blobs, "batch-test", "01_parse", "00", &executor).unwrap();
        let outputs = codebatch_storage::shard::get_outputs(&fx.store_root, "batch-test", "01_parse", "00").unwrap();
        assert_eq!(outputs[0].get("format").unwrap(), "json+chunks");
    }

    #[test]
    fn test_analyze_executor_reads_prior_parse_output() {
        let (fx, _file) = setup(SAMPLE);
        run_shard(&fx.store_root, &fx.blobs, "batch-test", "01_parse", "00", &ParseExecutor::default()).unwrap();
        run_shard(&fx.store_root, &fx.blobs, "batch-test", "02_analyze", "00", &AnalyzeExecutor).unwrap();
        let outputs = codebatch_storage::shard::get_outputs(&fx.store_root, "batch-test", "02_analyze", "00").unwrap();
        let metrics: HashMap<&str, &Value> = outputs
            .iter()
            .map(|r| (r.get("metric").and_then(Value::as_str).unwrap(), r.get("value").unwrap()))
            .collect();
        assert_eq!(metrics["function_count"], &json!(1));
        assert_eq!(metrics["class_count"], &json!(1));
        assert_eq!(metrics["import_count"], &json!(2));
        assert_eq!(metrics["lang"], &json!("python"));
    }

    #[test]
    fn test_analyze_executor_emits_error_metric_without_prior_output() {
        let (fx, _file) = setup(SAMPLE);
        run_shard(&fx.store_root, &fx.blobs, "batch-test", "02_analyze", "00", &AnalyzeExecutor).unwrap();
        let outputs = codebatch_storage::shard::get_outputs(&fx.store_root, "batch-test", "02_analyze", "00").unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].get("metric").unwrap(), "error");
    }

    #[test]
    fn test_symbols_executor_emits_module_function_class_and_import_edge() {
        let (fx, _file) = setup(SAMPLE);
        run_shard(&fx.store_root, &fx.blobs, "batch-test", "01_parse", "00", &ParseExecutor::default()).unwrap();
        run_shard(&fx.store_root, &fx.blobs, "batch-test", "03_symbols", "00", &SymbolsExecutor).unwrap();
        let outputs = codebatch_storage::shard::get_outputs(&fx.store_root, "batch-test", "03_symbols", "00").unwrap();
        let symbol_types: Vec<&str> = outputs
            .iter()
            .filter(|r| r.kind == "symbol")
            .map(|r| r.get("symbol_type").and_then(Value::as_str).unwrap())
            .collect();
        assert!(symbol_types.contains(&"module"));
        assert!(symbol_types.contains(&"function"));
        assert!(symbol_types.contains(&"class"));
        let edges: Vec<_> = outputs.iter().filter(|r| r.kind == "edge").collect();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].get("edge_type").unwrap(), "imports");
    }

    #[test]
    fn test_lint_executor_flags_missing_docstring() {
        let (fx, _file) = setup(SAMPLE);
        run_shard(&fx.store_root, &fx.blobs, "batch-test", "04_lint", "00", &LintExecutor).unwrap();
        let outputs = codebatch_storage::shard::get_outputs(&fx.store_root, "batch-test", "04_lint", "00").unwrap();
        let codes: Vec<&str> = outputs.iter().map(|r| r.get("code").and_then(Value::as_str).unwrap()).collect();
        assert!(codes.contains(&"missing-docstring"));
    }

    #[test]
    fn test_lint_executor_flags_line_too_long() {
        let long_line = format!("x = \"{}\"\n", "a".repeat(120));
        let (fx, _file) = setup(&long_line);
        run_shard(&fx.store_root, &fx.blobs, "batch-test", "04_lint", "00", &LintExecutor).unwrap();
        let outputs = codebatch_storage::shard::get_outputs(&fx.store_root, "batch-test", "04_lint", "00").unwrap();
        assert!(outputs.iter().any(|r| r.get("code").and_then(Value::as_str) == Some("line-too-long")));
    }

    #[test]
    fn test_default_registry_has_all_four_task_types() {
        let registry = default_registry();
        for t in ["parse", "analyze", "symbols", "lint"] {
            assert!(registry.contains_key(t));
        }
    }
}
