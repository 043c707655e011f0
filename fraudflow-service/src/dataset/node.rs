// Dataset Nodes
// A named computation: tier, upstream inputs, transform and execution mode

use crate::layer::{ExecutionMode, Tier};
use crate::transform::{Passthrough, Transform};

use std::fmt;
use std::sync::Arc;

/// A registered dataset
#[derive(Clone)]
pub struct DatasetNode {
    /// Unique dataset name
    pub name: String,
    /// Quality tier
    pub tier: Tier,
    /// Upstream dataset names, in the order the transform receives them
    pub upstreams: Vec<String>,
    /// Effective execution mode (tier default unless overridden)
    pub mode: ExecutionMode,
    /// Human readable description
    pub comment: Option<String>,
    /// The computation producing this dataset
    pub transform: Arc<dyn Transform>,
}

impl DatasetNode {
    /// Whether the node reads more than one upstream
    pub fn is_fan_in(&self) -> bool {
        self.upstreams.len() > 1
    }
}

impl fmt::Debug for DatasetNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetNode")
            .field("name", &self.name)
            .field("tier", &self.tier)
            .field("upstreams", &self.upstreams)
            .field("mode", &self.mode)
            .field("transform", &self.transform.describe())
            .finish()
    }
}

/// Registration request for a dataset
pub struct DatasetSpec {
    pub name: String,
    pub tier: Tier,
    pub upstreams: Vec<String>,
    pub mode: Option<ExecutionMode>,
    pub comment: Option<String>,
    pub transform: Arc<dyn Transform>,
}

impl DatasetSpec {
    /// A dataset with no upstreams and a passthrough transform
    pub fn new(name: impl Into<String>, tier: Tier) -> Self {
        Self {
            name: name.into(),
            tier,
            upstreams: Vec::new(),
            mode: None,
            comment: None,
            transform: Arc::new(Passthrough),
        }
    }

    pub fn upstreams<I, S>(mut self, upstreams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.upstreams = upstreams.into_iter().map(Into::into).collect();
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Arc::new(transform);
        self
    }

    pub fn shared_transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = transform;
        self
    }
}
