//! Topological ordering and parallel-group derivation over a pipeline's
//! task list, on `petgraph::graph::DiGraph` + `petgraph::algo::toposort`.
//! `plan.json` already stores tasks in topological order (the registry
//! only ever emits valid orderings), but pipeline authors and the
//! orchestrator both need to verify that invariant and derive which tasks
//! may run concurrently once the ordering is fixed.

use std::collections::HashMap;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use codebatch_storage::schema::PlanEntry;

use crate::error::{OrchestratorError, Result};

/// Build the dependency graph: an edge `dep -> task` means `dep` must
/// complete before `task` starts, mirroring a dependency-before-dependent
/// edge direction.
fn build_graph(entries: &[PlanEntry]) -> Result<(DiGraph<String, ()>, HashMap<String, NodeIndex>)> {
    let mut graph = DiGraph::new();
    let mut node_of: HashMap<String, NodeIndex> = HashMap::new();
    for entry in entries {
        let idx = graph.add_node(entry.task_id.clone());
        node_of.insert(entry.task_id.clone(), idx);
    }
    for entry in entries {
        let to_idx = node_of[&entry.task_id];
        for dep in &entry.depends_on {
            let Some(&dep_idx) = node_of.get(dep) else {
                return Err(OrchestratorError::MissingDependency {
                    task_id: entry.task_id.clone(),
                    dependency: dep.clone(),
                });
            };
            graph.add_edge(dep_idx, to_idx, ());
        }
    }
    Ok((graph, node_of))
}

/// Every task id that participates in a cycle (any strongly-connected
/// component with more than one member), used as the stuck-task list on
/// `DagCycleDetected`.
fn cyclic_task_ids(graph: &DiGraph<String, ()>) -> Vec<String> {
    tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .flat_map(|scc| scc.into_iter().map(|idx| graph[idx].clone()))
        .collect()
}

/// Group `entries` into layers where every task in layer `i` depends only
/// on tasks in layers `< i`. Layer order is deterministic: task ids within
/// a layer are sorted lexicographically.
pub fn parallel_layers(entries: &[PlanEntry]) -> Result<Vec<Vec<String>>> {
    let (graph, _) = build_graph(entries)?;

    if toposort(&graph, None).is_err() {
        return Err(OrchestratorError::DagCycleDetected(cyclic_task_ids(&graph)));
    }

    let mut completed: Vec<bool> = vec![false; graph.node_count()];
    let mut layers = Vec::new();
    let mut remaining = graph.node_count();

    while remaining > 0 {
        let mut frontier: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|idx| !completed[idx.index()])
            .filter(|idx| {
                graph
                    .neighbors_directed(*idx, Direction::Incoming)
                    .all(|dep| completed[dep.index()])
            })
            .collect();
        frontier.sort_by(|a, b| graph[*a].cmp(&graph[*b]));

        for idx in &frontier {
            completed[idx.index()] = true;
        }
        remaining -= frontier.len();
        layers.push(frontier.into_iter().map(|idx| graph[idx].clone()).collect());
    }

    Ok(layers)
}

/// Flatten `parallel_layers` back into the single topological ordering
/// `plan.json` is expected to already be stored in.
pub fn topological_order(entries: &[PlanEntry]) -> Result<Vec<String>> {
    Ok(parallel_layers(entries)?.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(task_id: &str, task_type: &str, deps: &[&str]) -> PlanEntry {
        PlanEntry {
            task_id: task_id.to_string(),
            task_type: task_type.to_string(),
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            config: json!({}),
        }
    }

    #[test]
    fn test_single_task_no_deps() {
        let entries = vec![entry("01_parse", "parse", &[])];
        let layers = parallel_layers(&entries).unwrap();
        assert_eq!(layers, vec![vec!["01_parse".to_string()]]);
    }

    #[test]
    fn test_linear_chain() {
        let entries = vec![
            entry("01_parse", "parse", &[]),
            entry("02_analyze", "analyze", &["01_parse"]),
        ];
        let layers = parallel_layers(&entries).unwrap();
        assert_eq!(
            layers,
            vec![vec!["01_parse".to_string()], vec!["02_analyze".to_string()]]
        );
    }

    #[test]
    fn test_full_pipeline_fans_out_after_parse() {
        let entries = vec![
            entry("01_parse", "parse", &[]),
            entry("02_analyze", "analyze", &["01_parse"]),
            entry("03_symbols", "symbols", &["01_parse"]),
            entry("04_lint", "lint", &["01_parse"]),
        ];
        let layers = parallel_layers(&entries).unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0], vec!["01_parse".to_string()]);
        assert_eq!(
            layers[1],
            vec!["02_analyze".to_string(), "03_symbols".to_string(), "04_lint".to_string()]
        );
    }

    #[test]
    fn test_missing_dependency_detected() {
        let entries = vec![entry("02_analyze", "analyze", &["01_parse"])];
        let err = parallel_layers(&entries).unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingDependency { .. }));
    }

    #[test]
    fn test_cycle_detected() {
        let entries = vec![entry("a", "t", &["b"]), entry("b", "t", &["a"])];
        let err = parallel_layers(&entries).unwrap_err();
        match err {
            OrchestratorError::DagCycleDetected(stuck) => {
                assert_eq!(stuck.len(), 2);
                assert!(stuck.contains(&"a".to_string()));
                assert!(stuck.contains(&"b".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_topological_order_flattens() {
        let entries = vec![
            entry("01_parse", "parse", &[]),
            entry("02_analyze", "analyze", &["01_parse"]),
        ];
        let order = topological_order(&entries).unwrap();
        assert_eq!(order, vec!["01_parse".to_string(), "02_analyze".to_string()]);
    }
}
