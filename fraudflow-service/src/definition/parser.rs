// Pipeline Definition Parser
// Parses YAML pipeline definitions and builds schema and dataset registries

use super::error::{DefinitionError, DefinitionResult, ValidationError};
use super::models::{DatasetDefinition, PipelineDefinition};
use crate::catalog;
use crate::dataset::{DatasetRegistry, DatasetSpec};
use crate::error::ServiceResult;
use crate::layer::Tier;
use crate::schema::SchemaRegistry;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// YAML pipeline definition parser
pub struct DefinitionParser;

impl DefinitionParser {
    /// Parse a definition from a YAML string
    pub fn parse(content: &str) -> DefinitionResult<PipelineDefinition> {
        serde_yaml::from_str(content).map_err(|e| DefinitionError::from_yaml_error(&e, content))
    }

    /// Parse a definition from a file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> DefinitionResult<PipelineDefinition> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DefinitionError::io(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::parse(&content)
    }

    /// Parse and validate a definition file
    pub fn load<P: AsRef<Path>>(path: P) -> DefinitionResult<PipelineDefinition> {
        let definition = Self::parse_file(path)?;
        Self::validate(&definition).map_err(|errors| DefinitionError::validation(&errors))?;
        Ok(definition)
    }

    /// Check a parsed definition for semantic problems, reporting all of them
    pub fn validate(definition: &PipelineDefinition) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(fields) = &definition.schema {
            let mut seen = HashMap::new();
            for (i, field) in fields.iter().enumerate() {
                if let Some(previous) = seen.insert(field.name.as_str(), field) {
                    if previous.field_type != field.field_type
                        || previous.nullable != field.nullable
                    {
                        errors.push(ValidationError::new(
                            format!("field '{}' is defined twice with different types", field.name),
                            format!("schema[{}]", i),
                        ));
                    }
                }
            }
        }

        let known: HashMap<String, Tier> = match &definition.datasets {
            Some(datasets) => Self::validate_datasets(datasets, &mut errors),
            None => catalog::fraud_detection()
                .map(|registry| {
                    registry
                        .nodes()
                        .iter()
                        .map(|n| (n.name.clone(), n.tier))
                        .collect()
                })
                .unwrap_or_default(),
        };

        if let Some(source) = &definition.source {
            match known.get(&source.dataset) {
                Some(Tier::Raw) => {}
                Some(tier) => errors.push(ValidationError::new(
                    format!(
                        "source feeds '{}', which has tier {}",
                        source.dataset, tier
                    ),
                    "source.dataset",
                ).with_suggestion("only raw datasets read from a source")),
                None => errors.push(ValidationError::new(
                    format!("source feeds unknown dataset '{}'", source.dataset),
                    "source.dataset",
                )),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Returns the tier of every dataset declared
    fn validate_datasets(
        datasets: &[DatasetDefinition],
        errors: &mut Vec<ValidationError>,
    ) -> HashMap<String, Tier> {
        let positions: HashMap<&str, usize> = datasets
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str(), i))
            .collect();
        let mut declared: HashMap<String, Tier> = HashMap::new();

        for (i, dataset) in datasets.iter().enumerate() {
            let path = format!("datasets[{}]", i);

            if declared.contains_key(&dataset.name) {
                errors.push(ValidationError::new(
                    format!("dataset '{}' is declared more than once", dataset.name),
                    &path,
                ));
            }

            for upstream in &dataset.upstreams {
                if declared.contains_key(upstream) {
                    continue;
                }
                let error = ValidationError::new(
                    format!("unknown upstream '{}'", upstream),
                    format!("{}.upstreams", path),
                );
                let error = match positions.get(upstream.as_str()) {
                    Some(&later) if later > i => error.with_suggestion(format!(
                        "declare '{}' before '{}'",
                        upstream, dataset.name
                    )),
                    _ => error,
                };
                errors.push(error);
            }

            match (dataset.tier, dataset.upstreams.is_empty()) {
                (Tier::Raw, false) => errors.push(ValidationError::new(
                    "raw datasets cannot have upstreams",
                    format!("{}.upstreams", path),
                )),
                (Tier::Aggregated | Tier::Derived, true) => errors.push(ValidationError::new(
                    format!("{} datasets need at least one upstream", dataset.tier),
                    format!("{}.upstreams", path),
                )),
                _ => {}
            }

            declared.insert(dataset.name.clone(), dataset.tier);
        }

        declared
    }

    /// Build the schema and dataset registries a definition describes
    pub fn build(definition: &PipelineDefinition) -> ServiceResult<(SchemaRegistry, DatasetRegistry)> {
        let schema = match &definition.schema {
            Some(fields) => {
                let mut schema = SchemaRegistry::new();
                for field in fields {
                    schema.define(field.name.clone(), field.field_type, field.nullable)?;
                }
                schema
            }
            None => SchemaRegistry::transactions(),
        };

        let registry = match &definition.datasets {
            Some(datasets) => {
                let mut registry = DatasetRegistry::new();
                for dataset in datasets {
                    let mut spec = DatasetSpec::new(dataset.name.clone(), dataset.tier)
                        .upstreams(dataset.upstreams.iter().cloned())
                        .shared_transform(dataset.transform.build());
                    spec.mode = dataset.mode;
                    spec.comment = dataset.comment.clone();
                    registry.register_spec(spec)?;
                }
                registry
            }
            None => catalog::fraud_detection()?,
        };

        tracing::debug!(
            pipeline = %definition.name,
            fields = schema.len(),
            datasets = registry.len(),
            "built pipeline definition"
        );
        Ok((schema, registry))
    }
}
