use crate::commands::{open_state, PipelineArgs};
use crate::output;

use clap::Args;
use color_eyre::Result;

/// List datasets with their materialized row counts and versions
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

pub fn execute(args: ListArgs) -> Result<()> {
    let (pipeline, store) = open_state(&args.pipeline)?;

    if let Some(dir) = store.dir() {
        output::status("Datasets", &format!("in {}", dir.display()));
    }

    let width = pipeline
        .registry
        .nodes()
        .iter()
        .map(|n| n.name.len())
        .max()
        .unwrap_or(0);

    let mut materialized = 0;
    for node in pipeline.registry.nodes() {
        match store.get(&node.name) {
            Some(stored) => {
                materialized += 1;
                let updated = stored
                    .updated_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "  {:<width$}  {:<10} {:<9} {:>8} rows  v{:<4} {}",
                    node.name,
                    node.tier.as_str(),
                    node.mode.to_string(),
                    stored.len(),
                    stored.version,
                    updated,
                    width = width
                );
            }
            None => {
                println!(
                    "  {:<width$}  {:<10} {:<9} {:>8}",
                    node.name,
                    node.tier.as_str(),
                    node.mode.to_string(),
                    "-",
                    width = width
                );
            }
        }
    }

    println!();
    output::dim(&format!(
        "  {} of {} dataset(s) materialized",
        materialized,
        pipeline.registry.len()
    ));

    Ok(())
}
