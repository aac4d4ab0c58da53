//! Dependency graph construction and level partitioning.
//!
//! The graph builder accumulates every structural problem before failing;
//! the partitioner assigns each node the smallest level strictly greater
//! than all of its predecessors' levels, which doubles as cycle
//! detection: a cycle leaves nodes unassigned.

use std::collections::{HashMap, VecDeque};

use lattice_core::Limits;

use crate::error::{ValidationIssue, WorkflowError};
use crate::payload::{Node, WorkflowPayload};

/// Adjacency view of a validated workflow payload.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: HashMap<String, Node>,
    /// source → targets, in edge-declaration order; multi-edges repeat.
    adjacency: HashMap<String, Vec<String>>,
    /// target → sources, in edge-declaration order; multi-edges repeat.
    reverse: HashMap<String, Vec<String>>,
    in_degree: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Build the graph, accumulating every structural problem.
    ///
    /// Checks: non-empty workflow, `max_nodes` / `max_edges`, non-empty and
    /// unique node ids, per-node configuration size (`max_input_size`),
    /// self-loops, and edge endpoints.
    pub fn from_payload(payload: &WorkflowPayload, limits: &Limits) -> Result<Self, WorkflowError> {
        let mut issues = Vec::new();

        if payload.nodes.is_empty() {
            issues.push(ValidationIssue::new("nodes", "workflow has no nodes"));
        }
        if payload.nodes.len() > limits.max_nodes {
            issues.push(ValidationIssue::new(
                "nodes",
                format!(
                    "{} nodes exceed max_nodes {}",
                    payload.nodes.len(),
                    limits.max_nodes
                ),
            ));
        }
        if payload.edges.len() > limits.max_edges {
            issues.push(ValidationIssue::new(
                "edges",
                format!(
                    "{} edges exceed max_edges {}",
                    payload.edges.len(),
                    limits.max_edges
                ),
            ));
        }

        let mut nodes: HashMap<String, Node> = HashMap::with_capacity(payload.nodes.len());
        for (index, node) in payload.nodes.iter().enumerate() {
            let field = format!("nodes[{index}].id");
            if node.id.is_empty() {
                issues.push(ValidationIssue::new(field, "node id is empty"));
                continue;
            }
            if nodes.contains_key(&node.id) {
                issues.push(ValidationIssue::for_node(field, &node.id, "duplicate node id"));
                continue;
            }
            let data_bytes = serde_json::to_vec(&node.data).map(|b| b.len()).unwrap_or(0);
            if data_bytes > limits.max_input_size {
                issues.push(ValidationIssue::for_node(
                    format!("nodes[{index}].data"),
                    &node.id,
                    format!(
                        "configuration of {data_bytes} bytes exceeds max_input_size {}",
                        limits.max_input_size
                    ),
                ));
            }
            nodes.insert(node.id.clone(), node.clone());
        }

        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        let mut reverse: HashMap<String, Vec<String>> = HashMap::new();
        let mut in_degree: HashMap<String, usize> = HashMap::new();
        for id in nodes.keys() {
            adjacency.entry(id.clone()).or_default();
            reverse.entry(id.clone()).or_default();
            in_degree.entry(id.clone()).or_insert(0);
        }

        for (index, edge) in payload.edges.iter().enumerate() {
            let mut ok = true;
            if !nodes.contains_key(&edge.source) {
                issues.push(ValidationIssue::new(
                    format!("edges[{index}].source"),
                    format!("edge source `{}` not found", edge.source),
                ));
                ok = false;
            }
            if !nodes.contains_key(&edge.target) {
                issues.push(ValidationIssue::new(
                    format!("edges[{index}].target"),
                    format!("edge target `{}` not found", edge.target),
                ));
                ok = false;
            }
            if edge.source == edge.target {
                issues.push(ValidationIssue::for_node(
                    format!("edges[{index}]"),
                    &edge.source,
                    "self-loop is not allowed",
                ));
                ok = false;
            }
            if ok {
                if let Some(targets) = adjacency.get_mut(&edge.source) {
                    targets.push(edge.target.clone());
                }
                if let Some(sources) = reverse.get_mut(&edge.target) {
                    sources.push(edge.source.clone());
                }
                *in_degree.entry(edge.target.clone()).or_insert(0) += 1;
            }
        }

        if !issues.is_empty() {
            return Err(WorkflowError::Validation(issues));
        }

        Ok(Self {
            nodes,
            adjacency,
            reverse,
            in_degree,
        })
    }

    /// Partition into parallel levels.
    ///
    /// `level(v) = 0` for roots, otherwise `1 + max(level(u))` over all
    /// predecessors. Within each level the ids are sorted, which makes the
    /// partition -- and everything scheduled from it -- deterministic.
    pub fn compute_levels(&self) -> Result<Vec<Vec<String>>, WorkflowError> {
        let mut remaining = self.in_degree.clone();
        let mut level_of: HashMap<&str, usize> = HashMap::with_capacity(self.nodes.len());
        let mut queue: VecDeque<&str> = {
            let mut roots: Vec<&str> = self
                .in_degree
                .iter()
                .filter(|(id, _)| remaining.get(id.as_str()).copied() == Some(0))
                .map(|(id, _)| id.as_str())
                .collect();
            roots.sort_unstable();
            roots.into_iter().collect()
        };

        while let Some(id) = queue.pop_front() {
            let level = self
                .predecessors(id)
                .iter()
                .filter_map(|pred| level_of.get(pred.as_str()))
                .max()
                .map_or(0, |max| max + 1);
            level_of.insert(id, level);

            for target in self.successors(id) {
                let degree = remaining
                    .get_mut(target.as_str())
                    .expect("edge target exists in in-degree map");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(target);
                }
            }
        }

        if level_of.len() < self.nodes.len() {
            let mut stuck: Vec<String> = self
                .nodes
                .keys()
                .filter(|id| !level_of.contains_key(id.as_str()))
                .cloned()
                .collect();
            stuck.sort_unstable();
            tracing::debug!(nodes = ?stuck, "level partition left nodes unassigned");
            return Err(WorkflowError::Cycle { nodes: stuck });
        }

        let depth = level_of.values().max().map_or(0, |max| max + 1);
        let mut levels: Vec<Vec<String>> = vec![Vec::new(); depth];
        for (id, level) in &level_of {
            levels[*level].push((*id).to_owned());
        }
        for level in &mut levels {
            level.sort_unstable();
        }
        Ok(levels)
    }

    /// Node lookup by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Predecessors of `id`, in edge-declaration order (multi-edges repeat).
    #[must_use]
    pub fn predecessors(&self, id: &str) -> &[String] {
        self.reverse.get(id).map_or(&[], Vec::as_slice)
    }

    /// Successors of `id`, in edge-declaration order.
    #[must_use]
    pub fn successors(&self, id: &str) -> &[String] {
        self.adjacency.get(id).map_or(&[], Vec::as_slice)
    }

    /// Nodes with no incoming edges, sorted by id.
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| id.clone())
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Nodes with no outgoing edges, sorted by id. The first of these
    /// supplies the execution's final output.
    #[must_use]
    pub fn terminal_nodes(&self) -> Vec<String> {
        let mut terminals: Vec<String> = self
            .adjacency
            .iter()
            .filter(|(_, targets)| targets.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        terminals.sort_unstable();
        terminals
    }
}
