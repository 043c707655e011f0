// Definition Module
// YAML pipeline definitions: models, parsing and error reporting

pub mod error;
pub mod models;
pub mod parser;

pub use error::{DefinitionError, DefinitionErrorKind, DefinitionResult, ValidationError};
pub use models::{
    DatasetDefinition, FieldDefinition, PipelineDefinition, SourceDefinition, TransformSpec,
};
pub use parser::DefinitionParser;
