// Dependency Graph (DAG)
// Edges derived from dataset upstreams; validation and execution ordering

use crate::dataset::DatasetRegistry;

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::fmt;

/// Error type for graph validation
#[derive(Debug, Clone)]
pub struct GraphError {
    pub message: String,
    pub kind: GraphErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphErrorKind {
    /// Circular dependency detected
    CyclicDependency,
    /// Edge pointing at a dataset that is not in the graph
    DanglingEdge,
    /// Request for a dataset the graph does not contain
    UnknownNode,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph validation error: {}", self.message)
    }
}

impl std::error::Error for GraphError {}

impl GraphError {
    pub fn cyclic(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::CyclicDependency,
        }
    }

    pub fn dangling(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GraphErrorKind::DanglingEdge,
        }
    }

    pub fn unknown_node(name: &str) -> Self {
        Self {
            message: format!("dataset '{}' is not part of the graph", name),
            kind: GraphErrorKind::UnknownNode,
        }
    }
}

/// Immutable dependency graph over dataset names
///
/// Node indices follow registration order; ties in the topological order are
/// broken by that index so the order is deterministic.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    names: Vec<String>,
    indices: HashMap<String, usize>,
    /// upstream indices per node, in declaration order
    upstreams: Vec<Vec<usize>>,
    /// downstream indices per node, ascending
    downstreams: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Build the graph for a registry and validate it
    pub fn build(registry: &DatasetRegistry) -> Result<Self, GraphError> {
        let nodes = registry
            .nodes()
            .iter()
            .map(|n| (n.name.clone(), n.upstreams.clone()))
            .collect();
        Self::from_edges(nodes)
    }

    /// Build from `(name, upstream names)` pairs in registration order
    pub fn from_edges(nodes: Vec<(String, Vec<String>)>) -> Result<Self, GraphError> {
        let indices: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();

        let mut upstreams = vec![Vec::new(); nodes.len()];
        let mut downstreams = vec![Vec::new(); nodes.len()];

        for (i, (name, deps)) in nodes.iter().enumerate() {
            for dep in deps {
                let &d = indices.get(dep).ok_or_else(|| {
                    GraphError::dangling(format!(
                        "dataset '{}' depends on missing dataset '{}'",
                        name, dep
                    ))
                })?;
                upstreams[i].push(d);
                if !downstreams[d].contains(&i) {
                    downstreams[d].push(i);
                }
            }
        }
        for list in &mut downstreams {
            list.sort_unstable();
        }

        let mut graph = Self {
            names: nodes.into_iter().map(|(name, _)| name).collect(),
            indices,
            upstreams,
            downstreams,
            order: Vec::new(),
        };
        graph.order = graph.topological_sort()?;
        Ok(graph)
    }

    /// Kahn's algorithm, always releasing the lowest-index ready node first
    fn topological_sort(&self) -> Result<Vec<usize>, GraphError> {
        let mut in_degree: Vec<usize> = self
            .upstreams
            .iter()
            .map(|deps| deps.iter().collect::<BTreeSet<_>>().len())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &next in &self.downstreams[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() != self.names.len() {
            let stuck = in_degree
                .iter()
                .enumerate()
                .filter(|(_, &deg)| deg > 0)
                .map(|(i, _)| self.names[i].as_str())
                .collect::<Vec<_>>();
            return Err(GraphError::cyclic(format!(
                "circular dependency detected among datasets: {}",
                stuck.join(", ")
            )));
        }

        Ok(order)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Dataset names in execution order
    pub fn execution_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.names[i].as_str()).collect()
    }

    pub fn upstreams_of(&self, name: &str) -> Result<Vec<&str>, GraphError> {
        let idx = self.index_of(name)?;
        Ok(self.upstreams[idx]
            .iter()
            .map(|&i| self.names[i].as_str())
            .collect())
    }

    pub fn downstreams_of(&self, name: &str) -> Result<Vec<&str>, GraphError> {
        let idx = self.index_of(name)?;
        Ok(self.downstreams[idx]
            .iter()
            .map(|&i| self.names[i].as_str())
            .collect())
    }

    /// Group datasets by depth; every dataset depends only on earlier levels
    pub fn execution_levels(&self) -> Vec<Vec<&str>> {
        let mut depth = vec![0usize; self.names.len()];
        let mut levels: Vec<Vec<&str>> = Vec::new();

        for &node in &self.order {
            let level = self.upstreams[node]
                .iter()
                .map(|&u| depth[u] + 1)
                .max()
                .unwrap_or(0);
            depth[node] = level;

            if level >= levels.len() {
                levels.resize(level + 1, Vec::new());
            }
            levels[level].push(self.names[node].as_str());
        }

        levels
    }

    /// Execution-ordered closure of the targets and all of their ancestors
    pub fn plan_for(&self, targets: &[&str]) -> Result<Vec<&str>, GraphError> {
        let mut selected = vec![false; self.names.len()];
        let mut stack = targets
            .iter()
            .map(|t| self.index_of(t))
            .collect::<Result<Vec<_>, _>>()?;

        while let Some(node) = stack.pop() {
            if selected[node] {
                continue;
            }
            selected[node] = true;
            stack.extend(self.upstreams[node].iter().copied());
        }

        Ok(self
            .order
            .iter()
            .filter(|&&i| selected[i])
            .map(|&i| self.names[i].as_str())
            .collect())
    }

    /// Re-check acyclicity; a failure indicates a registry bug
    pub fn validate(&self) -> Result<(), GraphError> {
        self.topological_sort().map(|_| ())
    }

    fn index_of(&self, name: &str) -> Result<usize, GraphError> {
        self.indices
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::unknown_node(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        pairs.iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    fn fraud_shape() -> DependencyGraph {
        DependencyGraph::from_edges(edges(&[
            ("raw", &[]),
            ("fact", &["raw"]),
            ("users", &["raw"]),
            ("user_metrics", &["fact"]),
            ("merchant_risk", &["fact"]),
            ("features", &["fact", "user_metrics", "merchant_risk"]),
        ]))
        .unwrap()
    }

    #[test]
    fn test_order_respects_dependencies() {
        let graph = fraud_shape();
        let order = graph.execution_order();
        let pos = |n: &str| order.iter().position(|o| *o == n).unwrap();

        for name in &order {
            for up in graph.upstreams_of(name).unwrap() {
                assert!(pos(up) < pos(name), "{} must run before {}", up, name);
            }
        }
        assert_eq!(
            order,
            vec!["raw", "fact", "users", "user_metrics", "merchant_risk", "features"]
        );
    }

    #[test]
    fn test_ties_broken_by_registration_order() {
        let graph = DependencyGraph::from_edges(edges(&[
            ("b", &[]),
            ("a", &[]),
            ("c", &["a"]),
        ]))
        .unwrap();
        assert_eq!(graph.execution_order(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_execution_levels() {
        let graph = fraud_shape();
        let levels = graph.execution_levels();
        assert_eq!(levels.len(), 4);
        assert_eq!(levels[0], vec!["raw"]);
        assert_eq!(levels[1], vec!["fact", "users"]);
        assert_eq!(levels[2], vec!["user_metrics", "merchant_risk"]);
        assert_eq!(levels[3], vec!["features"]);
    }

    #[test]
    fn test_downstreams() {
        let graph = fraud_shape();
        assert_eq!(
            graph.downstreams_of("fact").unwrap(),
            vec!["user_metrics", "merchant_risk", "features"]
        );
        assert!(graph.downstreams_of("features").unwrap().is_empty());
    }

    #[test]
    fn test_plan_includes_ancestors_only() {
        let graph = fraud_shape();
        let plan = graph.plan_for(&["user_metrics"]).unwrap();
        assert_eq!(plan, vec!["raw", "fact", "user_metrics"]);

        let err = graph.plan_for(&["nope"]).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::UnknownNode);
    }

    #[test]
    fn test_cycle_detected() {
        let err = DependencyGraph::from_edges(edges(&[
            ("a", &["c"]),
            ("b", &["a"]),
            ("c", &["b"]),
        ]))
        .unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::CyclicDependency);
    }

    #[test]
    fn test_dangling_edge() {
        let err = DependencyGraph::from_edges(edges(&[("a", &["ghost"])])).unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::DanglingEdge);
    }

    #[test]
    fn test_repeated_upstream_counts_once() {
        let graph = DependencyGraph::from_edges(edges(&[
            ("a", &[]),
            ("self_join", &["a", "a"]),
        ]))
        .unwrap();
        assert_eq!(graph.execution_order(), vec!["a", "self_join"]);
        assert!(graph.validate().is_ok());
    }
}
