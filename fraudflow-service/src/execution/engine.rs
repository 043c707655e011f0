// Execution Engine
// Runs datasets in dependency order and merges their outputs per mode

use super::events::{EventSender, ExecutionEvent, ProgressSender};
use super::store::{Commit, MaterializedOutput, MaterializedStore};
use crate::dataset::{DatasetNode, DatasetRegistry};
use crate::error::{ServiceError, ServiceResult};
use crate::graph::DependencyGraph;
use crate::ingest::RecordSource;
use crate::layer::{ExecutionMode, Tier};
use crate::schema::SchemaRegistry;
use crate::table::Table;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation flag, checked between datasets
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the current run stop before its next dataset
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Output committed in this run
    Materialized,
    /// Not executed because the run was aborted first
    Skipped,
}

/// Outcome of one dataset within a run
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub name: String,
    pub tier: Tier,
    pub mode: ExecutionMode,
    pub status: NodeStatus,
    /// Rows handed to the transform
    pub rows_in: usize,
    /// Rows added (append) or produced (recompute)
    pub rows_written: usize,
    /// Rows in the stored output afterwards
    pub total_rows: usize,
    pub duration: Duration,
}

/// Outcome of `Engine::run`
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub aborted: bool,
    pub nodes: Vec<NodeReport>,
    pub duration: Duration,
}

impl RunReport {
    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn materialized(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Materialized)
            .count()
    }
}

/// Owns the schema, the dataset registry and the materialized outputs
///
/// One engine per pipeline. `run` takes `&mut self`, so runs never overlap.
pub struct Engine {
    schema: SchemaRegistry,
    registry: DatasetRegistry,
    graph: DependencyGraph,
    store: MaterializedStore,
    sources: HashMap<String, Box<dyn RecordSource>>,
    progress: Option<ProgressSender>,
    abort: AbortHandle,
}

impl Engine {
    /// Create an engine with an in-memory store
    pub fn new(schema: SchemaRegistry, registry: DatasetRegistry) -> ServiceResult<Self> {
        let graph = registry.graph()?;
        Ok(Self {
            schema,
            registry,
            graph,
            store: MaterializedStore::in_memory(),
            sources: HashMap::new(),
            progress: None,
            abort: AbortHandle::new(),
        })
    }

    pub fn with_store(mut self, store: MaterializedStore) -> Self {
        self.store = store;
        for (dataset, source) in self.sources.iter_mut() {
            restore_offsets(&self.store, dataset, source.as_mut());
        }
        self
    }

    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Share an existing abort handle, e.g. one captured by a signal handler
    pub fn with_abort_handle(mut self, handle: AbortHandle) -> Self {
        self.abort = handle;
        self
    }

    /// Feed a raw dataset from a record source
    ///
    /// The source resumes from the offsets stored with the dataset's last
    /// commit, if any.
    pub fn attach_source(
        &mut self,
        dataset: &str,
        mut source: impl RecordSource + 'static,
    ) -> ServiceResult<()> {
        let tier = self.registry.tier_of(dataset)?;
        if tier != Tier::Raw {
            return Err(ServiceError::TierModeMismatch {
                node: dataset.to_string(),
                tier,
                reason: "only raw datasets read from a record source",
            });
        }
        tracing::info!(dataset, source = %source.describe(), "attached record source");
        restore_offsets(&self.store, dataset, &mut source);
        self.sources.insert(dataset.to_string(), Box::new(source));
        Ok(())
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn store(&self) -> &MaterializedStore {
        &self.store
    }

    /// Current materialized output of a dataset
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.store.table(name)
    }

    pub fn output(&self, name: &str) -> Option<&MaterializedOutput> {
        self.store.get(name)
    }

    /// Execute every dataset once, in execution order
    pub fn run(&mut self) -> ServiceResult<RunReport> {
        let plan = self.owned(self.graph.execution_order());
        self.execute(plan)
    }

    /// Execute the given datasets and everything they depend on
    pub fn run_selected(&mut self, targets: &[&str]) -> ServiceResult<RunReport> {
        self.check_known(targets)?;
        let plan = self.graph.plan_for(targets)?;
        let plan = self.owned(plan);
        self.execute(plan)
    }

    /// Execute exactly the given datasets, in execution order
    ///
    /// Upstreams are not run first; one without a materialized output fails
    /// the run with `UpstreamNotMaterialized`.
    pub fn run_nodes(&mut self, names: &[&str]) -> ServiceResult<RunReport> {
        self.check_known(names)?;
        let plan = self
            .graph
            .execution_order()
            .into_iter()
            .filter(|n| names.contains(n))
            .collect();
        let plan = self.owned(plan);
        self.execute(plan)
    }

    fn check_known(&self, names: &[&str]) -> ServiceResult<()> {
        match names.iter().find(|n| !self.registry.contains(n)) {
            Some(missing) => Err(ServiceError::UnknownDataset(missing.to_string())),
            None => Ok(()),
        }
    }

    fn owned(&self, names: Vec<&str>) -> Vec<String> {
        names.into_iter().map(str::to_string).collect()
    }

    fn execute(&mut self, plan: Vec<String>) -> ServiceResult<RunReport> {
        let result = self.execute_plan(plan);
        // an abort requested before or during a run ends with that run
        self.abort.reset();
        result
    }

    fn execute_plan(&mut self, plan: Vec<String>) -> ServiceResult<RunReport> {
        let start = Instant::now();

        tracing::info!(datasets = plan.len(), "starting run");
        self.progress.send_event(ExecutionEvent::run_started(plan.len()));

        let mut report = RunReport::default();

        for (index, name) in plan.iter().enumerate() {
            let node = match self.registry.get(name) {
                Some(node) => node.clone(),
                None => return Err(ServiceError::UnknownDataset(name.clone())),
            };

            if self.abort.is_aborted() {
                report.aborted = true;
                report.nodes.push(self.skipped(&node));
                self.progress
                    .send_event(ExecutionEvent::node_skipped(name, "run aborted"));
                continue;
            }

            self.progress.send_event(ExecutionEvent::node_started(
                name, node.tier, node.mode, index,
            ));

            match self.execute_node(&node) {
                Ok(node_report) => {
                    self.progress.send_event(ExecutionEvent::node_completed(
                        name,
                        node_report.rows_in,
                        node_report.rows_written,
                        node_report.total_rows,
                        node_report.duration,
                    ));
                    report.nodes.push(node_report);
                }
                Err(e) => {
                    tracing::error!(dataset = %name, error = %e, "dataset failed");
                    self.progress
                        .send_event(ExecutionEvent::node_failed(name, e.to_string()));
                    self.progress.send_event(ExecutionEvent::run_completed(
                        false,
                        false,
                        start.elapsed(),
                    ));
                    return Err(e);
                }
            }
        }

        report.duration = start.elapsed();
        if report.aborted {
            tracing::warn!(
                materialized = report.materialized(),
                skipped = report.nodes.len() - report.materialized(),
                "run aborted"
            );
        } else {
            tracing::info!(duration_ms = report.duration.as_millis() as u64, "run completed");
        }
        self.progress.send_event(ExecutionEvent::run_completed(
            true,
            report.aborted,
            report.duration,
        ));

        Ok(report)
    }

    fn skipped(&self, node: &DatasetNode) -> NodeReport {
        NodeReport {
            name: node.name.clone(),
            tier: node.tier,
            mode: node.mode,
            status: NodeStatus::Skipped,
            rows_in: 0,
            rows_written: 0,
            total_rows: self.store.get(&node.name).map_or(0, |o| o.len()),
            duration: Duration::ZERO,
        }
    }

    /// Resolve inputs, transform, validate and commit one dataset
    fn execute_node(&mut self, node: &DatasetNode) -> ServiceResult<NodeReport> {
        let start = Instant::now();

        let (inputs, checkpoints) = if node.tier == Tier::Raw {
            (vec![self.fetch_source(node)?], BTreeMap::new())
        } else {
            self.resolve_inputs(node)?
        };
        let rows_in: usize = inputs.iter().map(Table::len).sum();

        let output = node
            .transform
            .apply(&inputs)
            .map_err(|source| ServiceError::Transform {
                node: node.name.clone(),
                source,
            })?;

        if node.tier == Tier::Raw {
            if let Some(row) = self.schema.first_violation(&output) {
                return Err(ServiceError::SchemaViolation {
                    node: node.name.clone(),
                    row,
                });
            }
        }

        let commit = Commit {
            tier: node.tier,
            mode: node.mode,
            table: output,
            checkpoints,
            source_offsets: self
                .sources
                .get(&node.name)
                .and_then(|source| source.pending_offsets()),
        };
        let stats = self
            .store
            .commit(&node.name, commit)
            .map_err(|source| ServiceError::Store {
                node: node.name.clone(),
                source,
            })?;

        if let Some(source) = self.sources.get_mut(&node.name) {
            source.acknowledge();
        }

        let duration = start.elapsed();
        tracing::info!(
            dataset = %node.name,
            tier = %node.tier,
            mode = %node.mode,
            rows_in,
            rows_written = stats.rows_written,
            total_rows = stats.total_rows,
            version = stats.version,
            "materialized dataset"
        );

        Ok(NodeReport {
            name: node.name.clone(),
            tier: node.tier,
            mode: node.mode,
            status: NodeStatus::Materialized,
            rows_in,
            rows_written: stats.rows_written,
            total_rows: stats.total_rows,
            duration,
        })
    }

    /// New records for a raw dataset; an empty canonical table without a source
    fn fetch_source(&mut self, node: &DatasetNode) -> ServiceResult<Table> {
        match self.sources.get_mut(&node.name) {
            Some(source) => source
                .fetch(&self.schema)
                .map_err(|source| ServiceError::Source {
                    node: node.name.clone(),
                    source,
                }),
            None => {
                tracing::debug!(dataset = %node.name, "no record source attached");
                Ok(self.schema.empty_table())
            }
        }
    }

    /// Upstream tables in declaration order, plus the checkpoints to commit
    ///
    /// An append dataset reads append upstreams from its last checkpoint on
    /// each of them. Everything else reads complete snapshots.
    fn resolve_inputs(
        &self,
        node: &DatasetNode,
    ) -> ServiceResult<(Vec<Table>, BTreeMap<String, usize>)> {
        let previous = self.store.get(&node.name);
        let mut inputs = Vec::with_capacity(node.upstreams.len());
        let mut checkpoints = BTreeMap::new();

        for upstream in &node.upstreams {
            let output = self.store.get(upstream).ok_or_else(|| {
                ServiceError::UpstreamNotMaterialized {
                    node: node.name.clone(),
                    upstream: upstream.clone(),
                }
            })?;

            if node.mode.is_append() && output.mode.is_append() {
                let mut offset = previous.map_or(0, |p| p.checkpoint(upstream));
                if offset > output.len() {
                    tracing::warn!(
                        dataset = %node.name,
                        upstream = %upstream,
                        offset,
                        rows = output.len(),
                        "checkpoint beyond upstream output; reading from the start"
                    );
                    offset = 0;
                }
                inputs.push(output.rows_since(offset));
                checkpoints.insert(upstream.clone(), output.len());
            } else {
                inputs.push(output.table.clone());
            }
        }

        Ok((inputs, checkpoints))
    }
}

/// Resume a source from the offsets stored with its raw dataset
fn restore_offsets(store: &MaterializedStore, dataset: &str, source: &mut dyn RecordSource) {
    let Some(output) = store.get(dataset) else {
        return;
    };
    if output.source_offsets.is_empty() {
        return;
    }
    tracing::info!(
        dataset,
        positions = output.source_offsets.len(),
        "resuming record source from stored offsets"
    );
    source.restore(&output.source_offsets);
}
