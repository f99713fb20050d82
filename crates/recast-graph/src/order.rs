//! Deterministic build ordering.
//!
//! Projects are placed in batches: each pass places every project whose
//! needs are all already placed, sorted by name. When a pass places
//! nothing the remainder is diagnosed with `petgraph` so the error can
//! name the cycles and the references to projects that do not exist.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::graph::NodeIndex;
use recast_common::error::{RecastError, Result};
use recast_common::types::Project;

/// Orders projects so that every project follows everything it needs.
///
/// # Errors
///
/// Returns [`RecastError::Config`] if two projects share a name and
/// [`RecastError::Ordering`] if some projects can never be satisfied.
pub fn order(projects: Vec<Project>) -> Result<Vec<Project>> {
    let mut seen = HashSet::new();
    for project in &projects {
        if !seen.insert(project.name.as_str()) {
            return Err(RecastError::Config {
                message: format!("duplicate project name: {}", project.name),
            });
        }
    }
    let known: BTreeSet<String> = projects.iter().map(|p| p.name.clone()).collect();

    let mut ordered: Vec<Project> = Vec::with_capacity(projects.len());
    let mut placed: HashSet<String> = HashSet::new();
    let mut remaining = projects;

    while !remaining.is_empty() {
        let (mut batch, rest): (Vec<Project>, Vec<Project>) = remaining
            .into_iter()
            .partition(|p| p.needed.iter().all(|n| placed.contains(n)));

        if batch.is_empty() {
            return Err(stuck(&rest, &ordered, &known));
        }

        batch.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!(
            batch = ?batch.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            "placed batch"
        );
        placed.extend(batch.iter().map(|p| p.name.clone()));
        ordered.extend(batch);
        remaining = rest;
    }

    Ok(ordered)
}

fn stuck(pending: &[Project], ordered: &[Project], known: &BTreeSet<String>) -> RecastError {
    let mut graph = DependencyGraph::new();
    for project in pending {
        let _ = graph.add_project(&project.name);
    }
    let mut unknown = BTreeSet::new();
    for project in pending {
        for need in &project.needed {
            if graph.contains(need) {
                graph.add_dependency(&project.name, need);
            } else if !known.contains(need) {
                let _ = unknown.insert(need.clone());
            }
        }
    }

    let mut detail = String::new();
    let cycles = graph.cycles();
    if !cycles.is_empty() {
        detail.push_str(&format!(", cycles: {cycles:?}"));
    }
    if !unknown.is_empty() {
        detail.push_str(&format!(", unknown: {unknown:?}"));
    }

    let mut pending: Vec<String> = pending.iter().map(|p| p.name.clone()).collect();
    pending.sort();
    RecastError::Ordering {
        pending,
        placed: ordered.iter().map(|p| p.name.clone()).collect(),
        detail,
    }
}

/// Directed graph of project names; edges point from a dependency to its dependent.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: petgraph::Graph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a project node; adding the same name twice is a no-op.
    pub fn add_project(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        let _ = self.index.insert(name.to_string(), idx);
        idx
    }

    /// Whether a project of this name is in the graph.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Records that `dependent` needs `dependency`.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        let from = self.add_project(dependency);
        let to = self.add_project(dependent);
        let _ = self.graph.update_edge(from, to, ());
    }

    /// Returns every cycle as a sorted list of names, sorted by first name.
    ///
    /// A project that needs itself counts as a cycle of one.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut names: Vec<String> = scc
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).cloned())
                    .collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(name: &str, needed: &[&str]) -> Project {
        Project::new(name, needed.iter().map(ToString::to_string).collect())
    }

    fn names(projects: &[Project]) -> Vec<&str> {
        projects.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn empty_input_orders_to_empty() {
        assert!(order(Vec::new()).expect("order").is_empty());
    }

    #[test]
    fn ties_are_broken_alphabetically_regardless_of_input_order() {
        let inputs = [
            vec![project("A", &[]), project("B", &["A"]), project("C", &["A"])],
            vec![project("C", &["A"]), project("B", &["A"]), project("A", &[])],
            vec![project("B", &["A"]), project("A", &[]), project("C", &["A"])],
        ];
        for input in inputs {
            let ordered = order(input).expect("order");
            assert_eq!(names(&ordered), vec!["A", "B", "C"]);
        }
    }

    #[test]
    fn batches_follow_rank_not_depth_first() {
        let ordered = order(vec![
            project("app", &["golang"]),
            project("golang", &["base"]),
            project("base", &[]),
            project("alpine", &[]),
            project("zeta", &["base"]),
        ])
        .expect("order");
        assert_eq!(names(&ordered), vec!["alpine", "base", "golang", "zeta", "app"]);
    }

    #[test]
    fn dependencies_are_preserved_on_output() {
        let ordered = order(vec![project("b", &["a"]), project("a", &[])]).expect("order");
        assert_eq!(ordered[1].needed, vec!["a"]);
    }

    #[test]
    fn cycle_names_both_projects_as_pending() {
        let err = order(vec![project("X", &["Y"]), project("Y", &["X"])]).expect_err("cycle");
        match err {
            RecastError::Ordering {
                pending,
                placed,
                detail,
            } => {
                assert_eq!(pending, vec!["X", "Y"]);
                assert!(placed.is_empty());
                assert!(detail.contains(r#"cycles: [["X", "Y"]]"#), "got: {detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cycle_reports_what_was_placed() {
        let err = order(vec![
            project("base", &[]),
            project("x", &["base", "y"]),
            project("y", &["x"]),
        ])
        .expect_err("cycle");
        let message = err.to_string();
        assert!(message.contains("is there a loop?"), "got: {message}");
        assert!(message.contains(r#"placed: ["base"]"#), "got: {message}");
        assert!(message.contains(r#"pending: ["x", "y"]"#), "got: {message}");
    }

    #[test]
    fn dangling_reference_is_reported_as_unknown() {
        let err = order(vec![project("app", &["ghost"])]).expect_err("dangling");
        let message = err.to_string();
        assert!(message.contains(r#"unknown: {"ghost"}"#), "got: {message}");
        assert!(!message.contains("cycles"), "got: {message}");
    }

    #[test]
    fn self_reference_is_a_cycle_of_one() {
        let err = order(vec![project("loop", &["loop"])]).expect_err("self");
        assert!(err.to_string().contains(r#"cycles: [["loop"]]"#), "got: {err}");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = order(vec![project("a", &[]), project("a", &[])]).expect_err("duplicate");
        assert!(matches!(err, RecastError::Config { .. }));
    }

    #[test]
    fn graph_without_cycles_reports_none() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("app", "base");
        graph.add_dependency("tool", "base");
        assert!(graph.cycles().is_empty());
        assert!(graph.contains("base"));
    }
}
