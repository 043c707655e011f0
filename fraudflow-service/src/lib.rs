// Fraudflow Service Library
// Layered transformation DAG engine for streaming fraud analytics

pub mod catalog;
pub mod dataset;
pub mod definition;
pub mod error;
pub mod execution;
pub mod graph;
pub mod ingest;
pub mod layer;
pub mod schema;
pub mod table;
pub mod transform;
pub mod utils;

// Re-export commonly used types
pub use error::{ServiceError, ServiceResult};

// Re-export registration types
pub use dataset::{DatasetNode, DatasetRegistry, DatasetSpec};
pub use graph::{DependencyGraph, GraphError, GraphErrorKind};
pub use layer::{ExecutionMode, Tier};
pub use schema::{FieldDef, FieldType, SchemaRegistry};

// Re-export data types
pub use table::{Row, Table, Value};
pub use transform::{Transform, TransformError};

// Re-export execution types
pub use execution::{
    AbortHandle, Engine, ExecutionEvent, MaterializedStore, NodeReport, NodeStatus,
    ProgressReceiver, ProgressSender, RunReport,
};

// Re-export ingestion and definition types
pub use definition::{DefinitionError, DefinitionParser, PipelineDefinition};
pub use ingest::{ChannelSource, JsonLinesSource, RecordSource, SourceError, SourceOffsets};
