pub mod list;
pub mod plan;
pub mod run;
pub mod show;
pub mod validate;

use std::path::{Path, PathBuf};

use clap::Args;
use color_eyre::Result;

use fraudflow_service::catalog;
use fraudflow_service::utils::resolve_state_dir;
use fraudflow_service::{
    DatasetRegistry, DefinitionParser, MaterializedStore, PipelineDefinition, SchemaRegistry,
};

/// Name shown when running the built-in catalog
const BUILTIN_NAME: &str = "fraud-detection";

/// Options shared by commands that read a pipeline and its state
#[derive(Args, Debug)]
pub struct PipelineArgs {
    /// Pipeline definition file (default: built-in fraud detection catalog)
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding dataset snapshots
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,
}

/// A pipeline ready to hand to the engine
pub struct LoadedPipeline {
    pub name: String,
    pub definition: Option<PipelineDefinition>,
    /// Directory of the definition file, for resolving relative paths
    pub base_dir: Option<PathBuf>,
    pub schema: SchemaRegistry,
    pub registry: DatasetRegistry,
}

impl LoadedPipeline {
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let Some(path) = config else {
            return Ok(Self {
                name: BUILTIN_NAME.to_string(),
                definition: None,
                base_dir: None,
                schema: SchemaRegistry::transactions(),
                registry: catalog::fraud_detection()?,
            });
        };

        if !path.exists() {
            color_eyre::eyre::bail!("Pipeline definition not found: {}", path.display());
        }

        let definition = DefinitionParser::load(path)?;
        let (schema, registry) = DefinitionParser::build(&definition)?;
        tracing::debug!(
            path = %path.display(),
            pipeline = %definition.name,
            datasets = registry.len(),
            "loaded pipeline definition"
        );

        Ok(Self {
            name: definition.name.clone(),
            base_dir: path.parent().map(Path::to_path_buf),
            definition: Some(definition),
            schema,
            registry,
        })
    }

    /// State directory: the flag, then the definition, then the default
    pub fn state_dir(&self, explicit: Option<&Path>) -> PathBuf {
        let configured = self
            .definition
            .as_ref()
            .and_then(|d| d.state_dir.as_deref());
        resolve_state_dir(explicit, configured, self.base_dir.as_deref())
    }

    /// Resolve a path from the definition against the definition's directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Load the pipeline and open its state directory
pub fn open_state(args: &PipelineArgs) -> Result<(LoadedPipeline, MaterializedStore)> {
    let pipeline = LoadedPipeline::load(args.config.as_deref())?;
    let state_dir = pipeline.state_dir(args.state_dir.as_deref());
    tracing::debug!(state_dir = %state_dir.display(), "opening state directory");
    let store = MaterializedStore::open(state_dir)?;
    Ok((pipeline, store))
}
