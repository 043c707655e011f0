// Ingestion
// Record sources feeding raw datasets with rows not yet observed

pub mod channel;
pub mod files;

pub use channel::{ChannelSource, RecordSender};
pub use files::JsonLinesSource;

use crate::schema::{FieldType, SchemaRegistry};
use crate::table::Table;

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Source-defined position keys mapped to records consumed
pub type SourceOffsets = BTreeMap<String, usize>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON at {location}: {source}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a JSON object at {location}")]
    NotAnObject { location: String },

    #[error("field '{field}' expects {expected}, found {found}")]
    Coercion {
        field: String,
        expected: FieldType,
        found: String,
    },
}

impl SourceError {
    /// Attach a location to errors that carry one
    pub(crate) fn at(self, location: impl Into<String>) -> Self {
        match self {
            SourceError::NotAnObject { .. } => SourceError::NotAnObject {
                location: location.into(),
            },
            other => other,
        }
    }
}

/// Supplier of new records for a raw dataset
///
/// `fetch` returns every record not yet acknowledged, coerced to the record
/// schema. Calling it again before `acknowledge` returns the same records plus
/// any that arrived since. The engine acknowledges only after the raw dataset
/// has committed, so an interrupted run re-delivers its batch.
pub trait RecordSource: Send {
    /// Short description for logs and plans
    fn describe(&self) -> String;

    fn fetch(&mut self, schema: &SchemaRegistry) -> Result<Table, SourceError>;

    /// Mark everything returned by the last `fetch` as consumed
    fn acknowledge(&mut self);

    /// Position reached once the last `fetch` is acknowledged
    ///
    /// The engine stores it alongside the raw dataset so a later process can
    /// resume. Sources without a durable position return `None`.
    fn pending_offsets(&self) -> Option<SourceOffsets> {
        None
    }

    /// Resume from a position saved by an earlier run
    fn restore(&mut self, _offsets: &SourceOffsets) {}
}

/// Coerce records into a table with the schema's canonical columns
pub(crate) fn coerce_all<'a, I>(schema: &SchemaRegistry, records: I) -> Result<Table, SourceError>
where
    I: IntoIterator<Item = (String, &'a serde_json::Value)>,
{
    let rows = records
        .into_iter()
        .map(|(location, record)| schema.coerce(record).map_err(|e| e.at(location)))
        .collect::<Result<Vec<_>, _>>()?;
    // coerce yields one value per schema field
    Ok(Table::from_rows_unchecked(schema.column_names(), rows))
}
