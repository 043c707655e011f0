// Materialized Store
// Per-dataset outputs, append deduplication and JSON snapshot persistence

use crate::layer::{ExecutionMode, Tier};
use crate::table::{Row, Table};
use crate::utils::encode_file_stem;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SNAPSHOT_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An append batch whose columns differ from the stored output
    #[error("columns [{}] do not match stored columns [{}]", found.join(", "), expected.join(", "))]
    ColumnMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// The committed output of one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializedOutput {
    pub name: String,
    pub tier: Tier,
    pub mode: ExecutionMode,
    /// Bumped whenever the table content changes
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub table: Table,
    /// Upstream name -> number of upstream rows already consumed
    #[serde(default)]
    pub checkpoints: BTreeMap<String, usize>,
    /// Read position of the record source feeding a raw dataset
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_offsets: BTreeMap<String, usize>,
    #[serde(skip)]
    seen: HashSet<Row>,
}

impl MaterializedOutput {
    fn new(name: &str, tier: Tier, mode: ExecutionMode, columns: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            tier,
            mode,
            version: 0,
            updated_at: None,
            table: Table::new(columns),
            checkpoints: BTreeMap::new(),
            source_offsets: BTreeMap::new(),
            seen: HashSet::new(),
        }
    }

    /// Rows appended at or after `offset`
    pub fn rows_since(&self, offset: usize) -> Table {
        self.table.slice_from(offset)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn checkpoint(&self, upstream: &str) -> usize {
        self.checkpoints.get(upstream).copied().unwrap_or(0)
    }

    fn rebuild_seen(&mut self) {
        self.seen = self.table.rows().iter().cloned().collect();
    }

    /// Append rows not seen before, including duplicates within the batch
    fn append_distinct(&mut self, batch: Table) -> Result<usize, StoreError> {
        if batch.columns() != self.table.columns() {
            if !self.table.is_empty() {
                return Err(StoreError::ColumnMismatch {
                    expected: self.table.columns().to_vec(),
                    found: batch.columns().to_vec(),
                });
            }
            self.table = batch.empty_like();
        }

        let mut written = 0;
        for row in batch.into_rows() {
            if self.seen.insert(row.clone()) {
                // arity already checked by the batch table
                if self.table.push_row(row).is_ok() {
                    written += 1;
                }
            }
        }
        Ok(written)
    }
}

/// Counts reported back from a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitStats {
    pub rows_written: usize,
    pub total_rows: usize,
    pub version: u64,
}

/// A node's computed output plus the upstream offsets it consumed
#[derive(Debug, Clone)]
pub struct Commit {
    pub tier: Tier,
    pub mode: ExecutionMode,
    pub table: Table,
    pub checkpoints: BTreeMap<String, usize>,
    /// Source position reached once this commit lands; `None` keeps the stored one
    pub source_offsets: Option<BTreeMap<String, usize>>,
}

/// Materialized outputs keyed by dataset name
///
/// In-memory by default; when opened on a directory each commit also rewrites
/// that dataset's snapshot file through a temporary file and a rename, so the
/// output and its checkpoints change together.
#[derive(Debug, Default)]
pub struct MaterializedStore {
    outputs: HashMap<String, MaterializedOutput>,
    dir: Option<PathBuf>,
}

impl MaterializedStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a persistent store, loading every snapshot found in `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut outputs = HashMap::new();
        for entry in entries {
            let path = entry
                .map_err(|source| StoreError::Io {
                    path: dir.clone(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }

            let mut output = read_snapshot(&path)?;
            if output.mode.is_append() {
                output.rebuild_seen();
            }
            tracing::debug!(
                dataset = %output.name,
                rows = output.len(),
                version = output.version,
                "loaded snapshot"
            );
            outputs.insert(output.name.clone(), output);
        }

        tracing::info!(dir = %dir.display(), datasets = outputs.len(), "opened state directory");
        Ok(Self {
            outputs,
            dir: Some(dir),
        })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.dir.is_some()
    }

    pub fn get(&self, name: &str) -> Option<&MaterializedOutput> {
        self.outputs.get(name)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.outputs.get(name).map(|o| &o.table)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    /// Stored outputs, sorted by name
    pub fn outputs(&self) -> Vec<&MaterializedOutput> {
        let mut outputs: Vec<_> = self.outputs.values().collect();
        outputs.sort_by(|a, b| a.name.cmp(&b.name));
        outputs
    }

    /// Apply a node's output according to its mode
    ///
    /// Append outputs keep every previously stored row and add only rows not
    /// seen before. Recompute outputs are replaced wholesale. Nothing changes
    /// in memory unless the snapshot write succeeds.
    pub fn commit(&mut self, name: &str, commit: Commit) -> Result<CommitStats, StoreError> {
        let Commit {
            tier,
            mode,
            table,
            checkpoints,
            source_offsets,
        } = commit;

        let mut output = match self.outputs.get(name) {
            Some(existing) => existing.clone(),
            None => MaterializedOutput::new(name, tier, mode, table.columns().to_vec()),
        };

        let rows_written = match mode {
            ExecutionMode::AppendOnlyStream => {
                if !output.mode.is_append() || output.seen.len() != output.table.len() {
                    output.rebuild_seen();
                }
                output.append_distinct(table)?
            }
            ExecutionMode::FullRecompute => {
                let written = table.len();
                if output.table != table || output.version == 0 {
                    output.table = table;
                    output.version += 1;
                    output.updated_at = Some(Utc::now());
                }
                output.seen.clear();
                written
            }
        };

        if mode.is_append() && rows_written > 0 || output.version == 0 {
            output.version += 1;
            output.updated_at = Some(Utc::now());
        }

        output.tier = tier;
        output.mode = mode;
        output.checkpoints = checkpoints;
        if let Some(offsets) = source_offsets {
            output.source_offsets = offsets;
        }

        if let Some(dir) = &self.dir {
            write_snapshot(dir, &output)?;
        }

        let stats = CommitStats {
            rows_written,
            total_rows: output.len(),
            version: output.version,
        };
        self.outputs.insert(name.to_string(), output);
        Ok(stats)
    }
}

fn snapshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", encode_file_stem(name), SNAPSHOT_EXTENSION))
}

fn read_snapshot(path: &Path) -> Result<MaterializedOutput, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_snapshot(dir: &Path, output: &MaterializedOutput) -> Result<(), StoreError> {
    let path = snapshot_path(dir, &output.name);
    let tmp = path.with_extension("json.tmp");

    let content = serde_json::to_vec(output).map_err(|source| StoreError::Json {
        path: path.clone(),
        source,
    })?;
    fs::write(&tmp, content).map_err(|source| StoreError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
        path: path.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn batch(ids: &[&str]) -> Table {
        Table::from_rows(
            vec!["TransactionID".to_string()],
            ids.iter().map(|id| vec![Value::from(*id)]).collect(),
        )
        .unwrap()
    }

    fn append(table: Table) -> Commit {
        Commit {
            tier: Tier::Conformed,
            mode: ExecutionMode::AppendOnlyStream,
            table,
            checkpoints: BTreeMap::new(),
            source_offsets: None,
        }
    }

    fn recompute(table: Table) -> Commit {
        Commit {
            tier: Tier::Aggregated,
            mode: ExecutionMode::FullRecompute,
            table,
            checkpoints: BTreeMap::new(),
            source_offsets: None,
        }
    }

    #[test]
    fn test_append_deduplicates_within_and_across_batches() {
        let mut store = MaterializedStore::in_memory();

        let stats = store.commit("fact", append(batch(&["t1", "t1", "t2"]))).unwrap();
        assert_eq!(stats.rows_written, 2);
        assert_eq!(stats.total_rows, 2);
        assert_eq!(stats.version, 1);

        let stats = store.commit("fact", append(batch(&["t2", "t3"]))).unwrap();
        assert_eq!(stats.rows_written, 1);
        assert_eq!(stats.total_rows, 3);
        assert_eq!(stats.version, 2);

        let stats = store.commit("fact", append(batch(&["t3"]))).unwrap();
        assert_eq!(stats.rows_written, 0);
        assert_eq!(stats.version, 2);

        assert_eq!(store.get("fact").unwrap().rows_since(2), batch(&["t3"]));
    }

    #[test]
    fn test_recompute_replaces() {
        let mut store = MaterializedStore::in_memory();
        store.commit("metrics", recompute(batch(&["a", "b"]))).unwrap();
        let stats = store.commit("metrics", recompute(batch(&["c"]))).unwrap();
        assert_eq!(stats.total_rows, 1);
        assert_eq!(stats.version, 2);
        assert_eq!(store.table("metrics").unwrap(), &batch(&["c"]));

        let stats = store.commit("metrics", recompute(batch(&["c"]))).unwrap();
        assert_eq!(stats.version, 2, "identical output keeps its version");
    }

    #[test]
    fn test_first_commit_of_empty_output_is_versioned() {
        let mut store = MaterializedStore::in_memory();
        let stats = store.commit("fact", append(batch(&[]))).unwrap();
        assert_eq!(stats.version, 1);
        assert!(store.contains("fact"));
    }

    #[test]
    fn test_column_mismatch_leaves_output_untouched() {
        let mut store = MaterializedStore::in_memory();
        store.commit("fact", append(batch(&["t1"]))).unwrap();

        let other = Table::from_rows(vec!["UserID".to_string()], vec![vec![Value::from("u1")]])
            .unwrap();
        let err = store.commit("fact", append(other)).unwrap_err();
        assert!(matches!(err, StoreError::ColumnMismatch { .. }));
        assert_eq!(store.table("fact").unwrap(), &batch(&["t1"]));
    }

    #[test]
    fn test_snapshots_round_trip_through_directory() {
        let temp = tempfile::tempdir().unwrap();

        {
            let mut store = MaterializedStore::open(temp.path()).unwrap();
            let mut commit = append(batch(&["t1", "t2"]));
            commit.checkpoints.insert("raw".to_string(), 5);
            store.commit("si_transactions_fact", commit).unwrap();
        }

        let mut store = MaterializedStore::open(temp.path()).unwrap();
        let output = store.get("si_transactions_fact").unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output.checkpoint("raw"), 5);
        assert_eq!(output.checkpoint("other"), 0);

        // dedup index survives the reload
        let stats = store
            .commit("si_transactions_fact", append(batch(&["t2", "t3"])))
            .unwrap();
        assert_eq!(stats.rows_written, 1);

        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_similar_names_keep_separate_snapshots() {
        let temp = tempfile::tempdir().unwrap();

        {
            let mut store = MaterializedStore::open(temp.path()).unwrap();
            store.commit("gold.metrics", recompute(batch(&["a"]))).unwrap();
            store.commit("gold_metrics", recompute(batch(&["b", "c"]))).unwrap();
        }

        let store = MaterializedStore::open(temp.path()).unwrap();
        assert_eq!(store.table("gold.metrics").unwrap(), &batch(&["a"]));
        assert_eq!(store.table("gold_metrics").unwrap(), &batch(&["b", "c"]));
    }

    #[test]
    fn test_source_offsets_persist_with_output() {
        let temp = tempfile::tempdir().unwrap();
        let offsets = BTreeMap::from([("transactions_a.json".to_string(), 3)]);

        {
            let mut store = MaterializedStore::open(temp.path()).unwrap();
            let mut commit = append(batch(&["t1", "t2", "t3"]));
            commit.source_offsets = Some(offsets.clone());
            store.commit("raw", commit).unwrap();

            // a commit without offsets keeps the stored position
            store.commit("raw", append(batch(&["t3"]))).unwrap();
        }

        let store = MaterializedStore::open(temp.path()).unwrap();
        assert_eq!(store.get("raw").unwrap().source_offsets, offsets);
    }

    #[test]
    fn test_corrupt_snapshot_reported() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("broken.json"), "{not json").unwrap();
        let err = MaterializedStore::open(temp.path()).unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }
}
