use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use fraudflow_service::DefinitionParser;

/// Validate a pipeline definition file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the pipeline YAML file
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: PathBuf,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let path = &args.config;

    if !path.exists() {
        color_eyre::eyre::bail!("Pipeline definition not found: {}", path.display());
    }

    // Step 1: YAML syntax and structure
    output::status("Validating", &format!("{}", path.display()));

    let definition = match DefinitionParser::parse_file(path) {
        Ok(definition) => definition,
        Err(e) => {
            eprint!("{}", e);
            std::process::exit(1);
        }
    };

    output::check("YAML syntax valid");

    let fields = match &definition.schema {
        Some(fields) => fields.len().to_string(),
        None => "built-in".to_string(),
    };
    let datasets = match &definition.datasets {
        Some(datasets) => datasets.len().to_string(),
        None => "built-in".to_string(),
    };
    output::check(&format!(
        "Structure: {} schema fields, {} datasets",
        fields, datasets
    ));

    // Step 2: semantic checks, all problems at once
    match DefinitionParser::validate(&definition) {
        Ok(()) => output::check("Semantic validation passed"),
        Err(errors) => {
            output::error(&format!("{} validation error(s):", errors.len()));
            for error in &errors {
                output::error(&format!("  - [{}] {}", error.path, error.message));
                if let Some(suggestion) = &error.suggestion {
                    output::info(&format!("    help: {}", suggestion));
                }
            }
            std::process::exit(1);
        }
    }

    // Step 3: registration and dependency graph
    let (_, registry) = DefinitionParser::build(&definition)?;
    let graph = registry.graph()?;
    output::check(&format!(
        "Dependency graph: {} datasets in {} levels",
        graph.len(),
        graph.execution_levels().len()
    ));

    println!();
    output::success(&format!("Pipeline '{}' is valid", definition.name));

    Ok(())
}
