use crate::commands::LoadedPipeline;
use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

/// Print the execution plan
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Pipeline definition file (default: built-in fraud detection catalog)
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only plan these datasets and their ancestors (can be repeated)
    #[arg(long = "select", short = 's', value_name = "NAME")]
    pub select: Vec<String>,
}

pub fn execute(args: PlanArgs) -> Result<()> {
    let pipeline = LoadedPipeline::load(args.config.as_deref())?;
    let graph = pipeline.registry.graph()?;

    let targets: Vec<&str> = args.select.iter().map(String::as_str).collect();
    let included: Vec<&str> = if targets.is_empty() {
        graph.execution_order()
    } else {
        graph.plan_for(&targets)?
    };

    output::header(&format!(
        "Pipeline '{}' ({} of {} datasets)",
        pipeline.name,
        included.len(),
        graph.len()
    ));

    let mut level_number = 0;
    for level in graph.execution_levels() {
        let level: Vec<&str> = level
            .into_iter()
            .filter(|name| included.contains(name))
            .collect();
        if level.is_empty() {
            continue;
        }

        level_number += 1;
        output::level_header(level_number, level.len());

        for name in level {
            let Some(node) = pipeline.registry.get(name) else {
                continue;
            };
            println!("    {} ({}, {})", node.name, node.tier, node.mode);
            if !node.upstreams.is_empty() {
                output::dim(&format!("      <- {}", node.upstreams.join(", ")));
            }
            output::dim(&format!("      {}", node.transform.describe()));
        }
    }

    Ok(())
}
