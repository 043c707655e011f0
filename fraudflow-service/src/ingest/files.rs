// File Source
// Directory of JSON transaction files, consumed incrementally per file

use super::{coerce_all, RecordSource, SourceError, SourceOffsets};
use crate::schema::SchemaRegistry;
use crate::table::Table;
use crate::utils::wildcard_match;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads JSON files under a directory whose names match a `*` pattern
///
/// A file holds either one JSON array of records or one record per line.
/// Per-file record offsets track what has been delivered, so files may grow
/// between fetches and only the new records are returned.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    root: PathBuf,
    pattern: String,
    committed: BTreeMap<PathBuf, usize>,
    staged: BTreeMap<PathBuf, usize>,
}

impl JsonLinesSource {
    pub fn new(root: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            pattern: pattern.into(),
            committed: BTreeMap::new(),
            staged: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Acknowledged record count per file
    pub fn offsets(&self) -> &BTreeMap<PathBuf, usize> {
        &self.committed
    }

    /// Offset key for a file: its path relative to the root
    fn offset_key(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    /// Matching files below the root, sorted by path
    fn matching_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        let mut files = Vec::new();
        let mut dirs = vec![self.root.clone()];

        while let Some(dir) = dirs.pop() {
            let entries = fs::read_dir(&dir).map_err(|source| SourceError::Io {
                path: dir.clone(),
                source,
            })?;
            for entry in entries {
                let path = entry
                    .map_err(|source| SourceError::Io {
                        path: dir.clone(),
                        source,
                    })?
                    .path();
                if path.is_dir() {
                    dirs.push(path);
                } else if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| wildcard_match(&self.pattern, n))
                {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Parse a file as a JSON array, or as one JSON document per non-empty line
fn read_records(path: &Path) -> Result<Vec<(String, serde_json::Value)>, SourceError> {
    let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim_start().starts_with('[') {
        let records: Vec<serde_json::Value> =
            serde_json::from_str(&content).map_err(|source| SourceError::Json {
                location: path.display().to_string(),
                source,
            })?;
        return Ok(records
            .into_iter()
            .enumerate()
            .map(|(i, r)| (format!("{}[{}]", path.display(), i), r))
            .collect());
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let location = format!("{}:{}", path.display(), i + 1);
            match serde_json::from_str(line) {
                Ok(record) => Ok((location, record)),
                Err(source) => Err(SourceError::Json { location, source }),
            }
        })
        .collect()
}

impl RecordSource for JsonLinesSource {
    fn describe(&self) -> String {
        format!("{} ({})", self.root.display(), self.pattern)
    }

    fn fetch(&mut self, schema: &SchemaRegistry) -> Result<Table, SourceError> {
        let mut fresh = Vec::new();
        let mut staged = BTreeMap::new();

        for path in self.matching_files()? {
            let records = read_records(&path)?;
            let consumed = self.committed.get(&path).copied().unwrap_or(0);
            if records.len() < consumed {
                tracing::warn!(
                    file = %path.display(),
                    consumed,
                    records = records.len(),
                    "file shrank since last read; re-reading from the start"
                );
            }
            let start = if records.len() < consumed { 0 } else { consumed };

            staged.insert(path, records.len());
            fresh.extend(records.into_iter().skip(start));
        }

        tracing::debug!(
            root = %self.root.display(),
            files = staged.len(),
            records = fresh.len(),
            "fetched records"
        );

        let table = coerce_all(schema, fresh.iter().map(|(loc, r)| (loc.clone(), r)))?;
        self.staged = staged;
        Ok(table)
    }

    fn acknowledge(&mut self) {
        let staged = std::mem::take(&mut self.staged);
        self.committed.extend(staged);
    }

    fn pending_offsets(&self) -> Option<SourceOffsets> {
        let offsets = self
            .committed
            .iter()
            .chain(self.staged.iter())
            .map(|(path, count)| (self.offset_key(path), *count))
            .collect();
        Some(offsets)
    }

    fn restore(&mut self, offsets: &SourceOffsets) {
        self.committed = offsets
            .iter()
            .map(|(key, count)| (self.root.join(key), *count))
            .collect();
        self.staged.clear();
        tracing::debug!(
            root = %self.root.display(),
            files = self.committed.len(),
            "restored file offsets"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use crate::table::Value;

    fn schema() -> SchemaRegistry {
        let mut schema = SchemaRegistry::new();
        schema.define("TransactionID", FieldType::String, false).unwrap();
        schema.define("TransactionAmount", FieldType::Double, true).unwrap();
        schema
    }

    #[test]
    fn test_reads_lines_and_arrays_recursively() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("2024").join("01");
        fs::create_dir_all(&nested).unwrap();

        fs::write(
            temp.path().join("transactions_a.json"),
            "{\"TransactionID\": \"t1\", \"TransactionAmount\": 10}\n\n{\"TransactionID\": \"t2\"}\n",
        )
        .unwrap();
        fs::write(
            nested.join("transactions_b.json"),
            r#"[{"TransactionID": "t3", "TransactionAmount": 2.5}]"#,
        )
        .unwrap();
        fs::write(temp.path().join("users.json"), r#"{"TransactionID": "ignored"}"#).unwrap();

        let mut source = JsonLinesSource::new(temp.path(), "transactions_*.json");
        let table = source.fetch(&schema()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.value(0, "TransactionAmount"), Some(&Value::Float(10.0)));
        assert!(table
            .column_values("TransactionID")
            .unwrap()
            .contains(&&Value::from("t3")));
    }

    #[test]
    fn test_only_new_records_after_acknowledge() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("transactions_live.json");
        fs::write(&file, "{\"TransactionID\": \"t1\"}\n").unwrap();

        let mut source = JsonLinesSource::new(temp.path(), "transactions_*.json");
        assert_eq!(source.fetch(&schema()).unwrap().len(), 1);
        // not acknowledged: delivered again
        assert_eq!(source.fetch(&schema()).unwrap().len(), 1);
        source.acknowledge();
        assert!(source.fetch(&schema()).unwrap().is_empty());

        fs::write(&file, "{\"TransactionID\": \"t1\"}\n{\"TransactionID\": \"t2\"}\n").unwrap();
        let table = source.fetch(&schema()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "TransactionID"), Some(&Value::from("t2")));
        source.acknowledge();
        assert_eq!(source.offsets().get(&file), Some(&2));
    }

    #[test]
    fn test_restored_offsets_skip_consumed_records() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("2024");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("transactions_a.json");
        fs::write(&file, "{\"TransactionID\": \"t1\"}\n{\"TransactionID\": \"t2\"}\n").unwrap();

        let mut first = JsonLinesSource::new(temp.path(), "transactions_*.json");
        assert_eq!(first.fetch(&schema()).unwrap().len(), 2);
        let offsets = first.pending_offsets().unwrap();
        assert_eq!(offsets.get("2024/transactions_a.json"), Some(&2));

        fs::write(
            &file,
            "{\"TransactionID\": \"t1\"}\n{\"TransactionID\": \"t2\"}\n{\"TransactionID\": \"t3\"}\n",
        )
        .unwrap();

        let mut second = JsonLinesSource::new(temp.path(), "transactions_*.json");
        second.restore(&offsets);
        let table = second.fetch(&schema()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "TransactionID"), Some(&Value::from("t3")));
    }

    #[test]
    fn test_malformed_line_reports_location() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join("transactions_bad.json"),
            "{\"TransactionID\": \"t1\"}\n{oops\n",
        )
        .unwrap();

        let mut source = JsonLinesSource::new(temp.path(), "transactions_*.json");
        let err = source.fetch(&schema()).unwrap_err();
        match err {
            SourceError::Json { location, .. } => assert!(location.ends_with(":2")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_root() {
        let mut source = JsonLinesSource::new("/nonexistent/fraudflow/input", "*.json");
        assert!(matches!(source.fetch(&schema()), Err(SourceError::Io { .. })));
    }
}
