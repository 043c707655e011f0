use crate::commands::{open_state, PipelineArgs};
use crate::output;

use clap::Args;
use color_eyre::Result;

/// Print rows of a materialized dataset, one JSON object per line
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Dataset name
    pub dataset: String,

    /// Maximum number of rows to print
    #[arg(long, short = 'n', default_value_t = 20)]
    pub limit: usize,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

pub fn execute(args: ShowArgs) -> Result<()> {
    let (pipeline, store) = open_state(&args.pipeline)?;

    if !pipeline.registry.contains(&args.dataset) {
        color_eyre::eyre::bail!(
            "Unknown dataset '{}' in pipeline '{}'",
            args.dataset,
            pipeline.name
        );
    }

    let Some(stored) = store.get(&args.dataset) else {
        color_eyre::eyre::bail!("Dataset '{}' has not been materialized yet", args.dataset);
    };

    let shown = stored.len().min(args.limit);
    for row in 0..shown {
        if let Some(object) = stored.table.row_to_json(row) {
            println!("{}", serde_json::to_string(&object)?);
        }
    }

    output::dim(&format!(
        "  {} of {} row(s), version {}",
        shown,
        stored.len(),
        stored.version
    ));

    Ok(())
}
