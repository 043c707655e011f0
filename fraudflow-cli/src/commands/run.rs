use crate::commands::{LoadedPipeline, PipelineArgs};
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use fraudflow_service::execution::events::{progress_channel, LogLevel};
use fraudflow_service::{
    AbortHandle, Engine, ExecutionEvent, JsonLinesSource, MaterializedStore, NodeStatus, RunReport,
    Tier,
};

const DEFAULT_PATTERN: &str = "*.json";

/// Run the pipeline once over any new input
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Directory of JSON transaction files (overrides the definition's source)
    #[arg(long, short = 'i', value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// File name pattern for input files, `*` matches any run of characters
    #[arg(long, value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Run only these datasets and their ancestors (can be repeated)
    #[arg(long = "select", short = 's', value_name = "NAME")]
    pub select: Vec<String>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let pipeline = LoadedPipeline::load(args.pipeline.config.as_deref())?;
    let state_dir = pipeline.state_dir(args.pipeline.state_dir.as_deref());

    output::status("Loading", &format!("state from {}", state_dir.display()));
    let store = MaterializedStore::open(&state_dir)?;
    output::info(&format!(
        "Pipeline '{}': {} datasets, {} previously materialized",
        pipeline.name,
        pipeline.registry.len(),
        store.outputs().len()
    ));

    let source = input_source(&args, &pipeline);
    let (tx, mut rx) = progress_channel();
    let abort = AbortHandle::new();

    let mut engine = Engine::new(pipeline.schema, pipeline.registry)?
        .with_store(store)
        .with_progress(tx)
        .with_abort_handle(abort.clone());

    match source {
        Some((dataset, source)) => {
            output::status(
                "Reading",
                &format!("{} into '{}'", source.root().display(), dataset),
            );
            engine.attach_source(&dataset, source)?;
        }
        None => output::warning("No input source configured, raw datasets receive no records"),
    }

    // Stop between datasets on Ctrl-C; committed outputs stay consistent
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            output::warning("Interrupted, stopping after the current dataset");
            abort.abort();
        }
    });

    let targets = args.select;
    let run_handle = tokio::task::spawn_blocking(move || {
        if targets.is_empty() {
            engine.run()
        } else {
            let names: Vec<&str> = targets.iter().map(String::as_str).collect();
            engine.run_selected(&names)
        }
    });

    // Render events in the foreground until the engine drops its sender
    let mut total = 0;
    while let Some(event) = rx.recv().await {
        render(&event, &mut total);
    }

    match run_handle.await? {
        Ok(report) => finish(&report),
        Err(e) => {
            output::error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Pick the raw dataset and directory to read records from
fn input_source(args: &RunArgs, pipeline: &LoadedPipeline) -> Option<(String, JsonLinesSource)> {
    let configured = pipeline.definition.as_ref().and_then(|d| d.source.as_ref());

    let root = match (&args.input, configured) {
        (Some(dir), _) => dir.clone(),
        (None, Some(source)) => pipeline.resolve(&source.path),
        (None, None) => return None,
    };

    let dataset = match configured {
        Some(source) => source.dataset.clone(),
        None => pipeline
            .registry
            .nodes()
            .iter()
            .find(|node| node.tier == Tier::Raw)?
            .name
            .clone(),
    };

    let pattern = args
        .pattern
        .clone()
        .or_else(|| configured.map(|s| s.pattern.clone()))
        .unwrap_or_else(|| DEFAULT_PATTERN.to_string());

    Some((dataset, JsonLinesSource::new(root, pattern)))
}

fn render(event: &ExecutionEvent, total: &mut usize) {
    match event {
        ExecutionEvent::RunStarted { total_nodes } => {
            *total = *total_nodes;
            println!();
            output::header(&format!("Running {} datasets", total_nodes));
        }

        ExecutionEvent::NodeStarted {
            name,
            tier,
            mode,
            index,
        } => {
            output::status(
                "Running",
                &format!("[{}/{}] {} ({}, {})", index + 1, total, name, tier, mode),
            );
        }

        ExecutionEvent::NodeCompleted {
            rows_in,
            rows_written,
            total_rows,
            duration,
            ..
        } => {
            output::dim_success(&format!(
                "             {} in, {} written, {} total ({})",
                rows_in,
                rows_written,
                total_rows,
                output::seconds(*duration)
            ));
        }

        ExecutionEvent::NodeSkipped { name, reason } => {
            output::warning(&format!("'{}' skipped: {}", name, reason));
        }

        ExecutionEvent::NodeFailed { name, message } => {
            output::failure(&format!("'{}' failed: {}", name, message));
        }

        ExecutionEvent::Log {
            level,
            message,
            node,
        } => {
            let message = match node {
                Some(node) => format!("[{}] {}", node, message),
                None => message.clone(),
            };
            match level {
                LogLevel::Error => output::error(&message),
                LogLevel::Warning => output::warning(&message),
                _ => output::dim(&format!("             {}", message)),
            }
        }

        ExecutionEvent::RunCompleted {
            success,
            aborted,
            duration,
        } => {
            println!();
            if *aborted {
                output::warning(&format!("Run aborted after {}", output::seconds(*duration)));
            } else if *success {
                output::success(&format!(
                    "Run completed successfully in {}",
                    output::seconds(*duration)
                ));
            } else {
                output::failure(&format!("Run failed after {}", output::seconds(*duration)));
            }
        }
    }
}

fn finish(report: &RunReport) -> Result<()> {
    let skipped = report
        .nodes
        .iter()
        .filter(|n| n.status == NodeStatus::Skipped)
        .count();
    output::info(&format!(
        "{} materialized, {} skipped",
        report.materialized(),
        skipped
    ));

    if report.aborted {
        std::process::exit(1);
    }
    Ok(())
}
