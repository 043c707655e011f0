// Schema Registry
// Canonical record shape enforced at the raw-layer boundary

use crate::error::{ServiceError, ServiceResult};
use crate::ingest::SourceError;
use crate::table::{Row, Table, Value};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Semantic type of a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Double,
    Boolean,
    Timestamp,
}

impl FieldType {
    /// Whether a non-null value has this type
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldType::String, Value::String(_))
                | (FieldType::Integer, Value::Int(_))
                | (FieldType::Double, Value::Float(_))
                | (FieldType::Boolean, Value::Bool(_))
                | (FieldType::Timestamp, Value::Timestamp(_))
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Double => "double",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// Definition of one field of the canonical record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

impl fmt::Display for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "{} (nullable)", self.field_type)
        } else {
            write!(f, "{} (not null)", self.field_type)
        }
    }
}

/// Ordered set of field definitions
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a field. Redefining with the same type and nullability is a no-op;
    /// any difference is a `SchemaConflict`.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        field_type: FieldType,
        nullable: bool,
    ) -> ServiceResult<()> {
        let requested = FieldDef {
            name: name.into(),
            field_type,
            nullable,
        };

        if let Some(&idx) = self.index.get(&requested.name) {
            let existing = &self.fields[idx];
            if *existing == requested {
                return Ok(());
            }
            return Err(ServiceError::SchemaConflict {
                field: requested.name.clone(),
                existing: existing.to_string(),
                requested: requested.to_string(),
            });
        }

        self.index.insert(requested.name.clone(), self.fields.len());
        self.fields.push(requested);
        Ok(())
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.index.get(name).map(|&idx| &self.fields[idx])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in definition order
    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// An empty table with the canonical columns
    pub fn empty_table(&self) -> Table {
        Table::new(self.column_names())
    }

    /// Check a row against the schema
    ///
    /// Every defined field must hold a value of its type, or be null/absent when
    /// nullable. Columns the schema does not define make the row non-conforming.
    pub fn validate(&self, columns: &[String], row: &[Value]) -> bool {
        if columns.len() != row.len() {
            return false;
        }
        if columns.iter().any(|c| !self.index.contains_key(c)) {
            return false;
        }

        self.fields.iter().all(|field| {
            match columns.iter().position(|c| *c == field.name) {
                Some(idx) if row[idx].is_null() => field.nullable,
                Some(idx) => field.field_type.accepts(&row[idx]),
                None => field.nullable,
            }
        })
    }

    /// Index of the first row of the table that does not conform
    pub fn first_violation(&self, table: &Table) -> Option<usize> {
        table
            .rows()
            .iter()
            .position(|row| !self.validate(table.columns(), row))
    }

    /// Convert an ingested JSON object into a row in canonical column order
    ///
    /// Missing fields become null. Integers widen into double fields and
    /// timestamps are parsed from RFC 3339 or `YYYY-MM-DD[ HH:MM:SS]` strings.
    pub fn coerce(&self, record: &serde_json::Value) -> Result<Row, SourceError> {
        let object = record.as_object().ok_or_else(|| SourceError::NotAnObject {
            location: "record".to_string(),
        })?;

        for key in object.keys() {
            if !self.index.contains_key(key) {
                tracing::debug!(field = %key, "ignoring field not defined by the record schema");
            }
        }

        self.fields
            .iter()
            .map(|field| match object.get(&field.name) {
                None | Some(serde_json::Value::Null) => Ok(Value::Null),
                Some(raw) => coerce_value(field, raw),
            })
            .collect()
    }
}

fn coerce_value(field: &FieldDef, raw: &serde_json::Value) -> Result<Value, SourceError> {
    let coerced = match field.field_type {
        FieldType::String => raw.as_str().map(Value::from),
        FieldType::Integer => raw.as_i64().map(Value::Int),
        FieldType::Double => raw.as_f64().map(Value::Float),
        FieldType::Boolean => match raw {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => None,
            },
            _ => None,
        },
        FieldType::Timestamp => raw.as_str().and_then(parse_timestamp).map(Value::Timestamp),
    };

    coerced.ok_or_else(|| SourceError::Coercion {
        field: field.name.clone(),
        expected: field.field_type,
        found: raw.to_string(),
    })
}

/// Parse a timestamp string into UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
