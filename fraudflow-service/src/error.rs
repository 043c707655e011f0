// Service Error Types
// Registration, graph and run-time failures of the dataset DAG

use crate::definition::DefinitionError;
use crate::execution::store::StoreError;
use crate::graph::GraphError;
use crate::ingest::SourceError;
use crate::layer::Tier;
use crate::transform::TransformError;

use thiserror::Error;

/// Errors surfaced by registration and by `Engine::run`
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A schema field was redefined with a different type or nullability
    #[error("schema conflict on field '{field}': defined as {existing}, cannot redefine as {requested}")]
    SchemaConflict {
        field: String,
        existing: String,
        requested: String,
    },

    #[error("dataset '{0}' is already registered")]
    DuplicateName(String),

    /// Upstream names must refer to datasets registered earlier
    #[error("dataset '{node}' references unknown upstream '{upstream}'")]
    UnknownUpstream { node: String, upstream: String },

    #[error("dataset '{node}' has tier {tier} but {reason}")]
    TierModeMismatch {
        node: String,
        tier: Tier,
        reason: &'static str,
    },

    /// Internal invariant violation in the dependency graph
    #[error(transparent)]
    GraphValidation(#[from] GraphError),

    #[error("dataset '{node}' cannot run: upstream '{upstream}' has not been materialized")]
    UpstreamNotMaterialized { node: String, upstream: String },

    #[error("dataset '{node}' failed: {source}")]
    Transform {
        node: String,
        #[source]
        source: TransformError,
    },

    /// A raw dataset produced a row that does not match the record schema
    #[error("dataset '{node}' produced row {row} that does not conform to the record schema")]
    SchemaViolation { node: String, row: usize },

    #[error("dataset '{node}' could not read its source: {source}")]
    Source {
        node: String,
        #[source]
        source: SourceError,
    },

    #[error("dataset '{node}' could not be persisted: {source}")]
    Store {
        node: String,
        #[source]
        source: StoreError,
    },

    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),

    #[error("{0}")]
    Definition(#[from] DefinitionError),
}

impl ServiceError {
    /// Name of the dataset the failure is scoped to, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            ServiceError::DuplicateName(node) | ServiceError::UnknownDataset(node) => Some(node),
            ServiceError::UnknownUpstream { node, .. }
            | ServiceError::TierModeMismatch { node, .. }
            | ServiceError::UpstreamNotMaterialized { node, .. }
            | ServiceError::Transform { node, .. }
            | ServiceError::SchemaViolation { node, .. }
            | ServiceError::Source { node, .. }
            | ServiceError::Store { node, .. } => Some(node),
            ServiceError::SchemaConflict { .. }
            | ServiceError::GraphValidation(_)
            | ServiceError::Definition(_) => None,
        }
    }

    /// Whether the error was raised while registering datasets or schema fields
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            ServiceError::SchemaConflict { .. }
                | ServiceError::DuplicateName(_)
                | ServiceError::UnknownUpstream { .. }
                | ServiceError::TierModeMismatch { .. }
        )
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
