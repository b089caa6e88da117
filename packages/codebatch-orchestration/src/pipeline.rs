//! The pipeline registry: the fixed catalog of named pipelines a batch can
//! be planned against. Each entry is a `plan.json`-shaped task list, already
//! in topological order, resolved by name at `init_batch` time.

use codebatch_storage::schema::PlanEntry;
use serde_json::json;

use crate::error::{OrchestratorError, Result};

/// A registered pipeline: a name plus its ordered task list.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    pub tasks: Vec<PlanEntry>,
}

fn parse_task() -> PlanEntry {
    PlanEntry {
        task_id: "01_parse".to_string(),
        task_type: "parse".to_string(),
        depends_on: vec![],
        config: json!({
            "languages": ["python", "javascript", "typescript"],
            "emit_ast": true,
            "emit_diagnostics": true,
        }),
    }
}

fn analyze_task() -> PlanEntry {
    PlanEntry {
        task_id: "02_analyze".to_string(),
        task_type: "analyze".to_string(),
        depends_on: vec!["01_parse".to_string()],
        config: json!({}),
    }
}

fn symbols_task() -> PlanEntry {
    PlanEntry {
        task_id: "03_symbols".to_string(),
        task_type: "symbols".to_string(),
        depends_on: vec!["01_parse".to_string()],
        config: json!({}),
    }
}

fn lint_task() -> PlanEntry {
    PlanEntry {
        task_id: "04_lint".to_string(),
        task_type: "lint".to_string(),
        depends_on: vec!["01_parse".to_string()],
        config: json!({}),
    }
}

/// Look up a pipeline by name. Returns `PipelineNotFound` for anything not
/// in the fixed catalog below.
pub fn lookup(name: &str) -> Result<Pipeline> {
    let tasks = match name {
        "parse" => vec![parse_task()],
        "analyze" => vec![parse_task(), analyze_task()],
        "symbols" => vec![parse_task(), symbols_task()],
        "lint" => vec![parse_task(), lint_task()],
        "full" => vec![parse_task(), analyze_task(), symbols_task(), lint_task()],
        other => return Err(OrchestratorError::PipelineNotFound(other.to_string())),
    };
    Ok(Pipeline { name: name.to_string(), tasks })
}

/// Names of every registered pipeline, for `--help`-style listing and for
/// gates that need to enumerate the full catalog.
pub fn registered_names() -> Vec<&'static str> {
    vec!["parse", "analyze", "symbols", "lint", "full"]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::topological_order;

    #[test]
    fn test_parse_pipeline_single_task() {
        let p = lookup("parse").unwrap();
        assert_eq!(p.tasks.len(), 1);
        assert_eq!(p.tasks[0].task_id, "01_parse");
        assert!(p.tasks[0].depends_on.is_empty());
    }

    #[test]
    fn test_analyze_pipeline_depends_on_parse() {
        let p = lookup("analyze").unwrap();
        assert_eq!(p.tasks.len(), 2);
        assert_eq!(p.tasks[1].task_id, "02_analyze");
        assert_eq!(p.tasks[1].depends_on, vec!["01_parse".to_string()]);
    }

    #[test]
    fn test_full_pipeline_has_four_tasks_in_topological_order() {
        let p = lookup("full").unwrap();
        assert_eq!(p.tasks.len(), 4);
        let order = topological_order(&p.tasks).unwrap();
        assert_eq!(order[0], "01_parse");
        assert!(order[1..].contains(&"02_analyze".to_string()));
        assert!(order[1..].contains(&"03_symbols".to_string()));
        assert!(order[1..].contains(&"04_lint".to_string()));
    }

    #[test]
    fn test_unknown_pipeline_rejected() {
        let err = lookup("nonexistent").unwrap_err();
        assert!(matches!(err, OrchestratorError::PipelineNotFound(_)));
    }

    #[test]
    fn test_registered_names_lists_all_five() {
        let names = registered_names();
        assert_eq!(names.len(), 5);
        for p in ["parse", "analyze", "symbols", "lint", "full"] {
            assert!(names.contains(&p));
        }
    }
}
