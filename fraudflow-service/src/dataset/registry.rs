// Dataset Registry
// Ordered, fail-fast registration of dataset nodes

use super::node::{DatasetNode, DatasetSpec};
use crate::error::{ServiceError, ServiceResult};
use crate::graph::{DependencyGraph, GraphError};
use crate::layer::{self, ExecutionMode, Tier};
use crate::transform::Transform;

use std::collections::HashMap;
use std::sync::Arc;

/// All registered datasets, in registration order
///
/// Upstreams must already be registered, so registration order is a valid
/// topological order and cycles cannot be expressed.
#[derive(Debug, Default, Clone)]
pub struct DatasetRegistry {
    nodes: Vec<DatasetNode>,
    index: HashMap<String, usize>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset. `mode: None` selects the tier default.
    pub fn register<I, S>(
        &mut self,
        name: impl Into<String>,
        tier: Tier,
        upstreams: I,
        transform: impl Transform + 'static,
        mode: Option<ExecutionMode>,
    ) -> ServiceResult<&DatasetNode>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = DatasetSpec::new(name, tier)
            .upstreams(upstreams)
            .shared_transform(Arc::new(transform));
        spec.mode = mode;
        self.register_spec(spec)
    }

    /// Register a dataset from a `DatasetSpec`; on error the registry is unchanged
    pub fn register_spec(&mut self, spec: DatasetSpec) -> ServiceResult<&DatasetNode> {
        if self.index.contains_key(&spec.name) {
            return Err(ServiceError::DuplicateName(spec.name));
        }

        if let Some(missing) = spec.upstreams.iter().find(|u| !self.index.contains_key(*u)) {
            return Err(ServiceError::UnknownUpstream {
                node: spec.name.clone(),
                upstream: missing.clone(),
            });
        }

        layer::check_upstreams(&spec.name, spec.tier, &spec.upstreams)?;

        let node = DatasetNode {
            mode: layer::classify(spec.tier, spec.mode),
            name: spec.name,
            tier: spec.tier,
            upstreams: spec.upstreams,
            comment: spec.comment,
            transform: spec.transform,
        };

        tracing::debug!(dataset = %node.name, tier = %node.tier, mode = %node.mode, "registered dataset");

        let idx = self.nodes.len();
        self.index.insert(node.name.clone(), idx);
        self.nodes.push(node);
        Ok(&self.nodes[idx])
    }

    pub fn get(&self, name: &str) -> Option<&DatasetNode> {
        self.index.get(name).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Position of a dataset in registration order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn nodes(&self) -> &[DatasetNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dataset names in execution order, which is registration order
    pub fn execution_order(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn upstreams_of(&self, name: &str) -> ServiceResult<&[String]> {
        self.lookup(name).map(|n| n.upstreams.as_slice())
    }

    pub fn mode_for(&self, name: &str) -> ServiceResult<ExecutionMode> {
        self.lookup(name).map(|n| n.mode)
    }

    pub fn tier_of(&self, name: &str) -> ServiceResult<Tier> {
        self.lookup(name).map(|n| n.tier)
    }

    /// Build and validate the dependency graph
    pub fn graph(&self) -> Result<DependencyGraph, GraphError> {
        DependencyGraph::build(self)
    }

    fn lookup(&self, name: &str) -> ServiceResult<&DatasetNode> {
        self.get(name)
            .ok_or_else(|| ServiceError::UnknownDataset(name.to_string()))
    }
}
