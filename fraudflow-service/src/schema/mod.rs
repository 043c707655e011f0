// Schema Module
// Record schema definition, validation and ingestion coercion

pub mod record;
pub mod registry;

pub use registry::{parse_timestamp, FieldDef, FieldType, SchemaRegistry};
