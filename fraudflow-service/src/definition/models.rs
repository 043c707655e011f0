// Pipeline Definition Models
// Serde types for YAML pipeline definitions

use crate::layer::{ExecutionMode, Tier};
use crate::schema::FieldType;
use crate::transform::{Aggregate, Chain, Filter, Join, Passthrough, RiskLevel, Select, Transform};

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Root of a pipeline definition file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineDefinition {
    pub name: String,

    /// Directory for dataset snapshots, relative to the definition file
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// File source feeding a raw dataset
    #[serde(default)]
    pub source: Option<SourceDefinition>,

    /// Record schema; the transaction schema when omitted
    #[serde(default)]
    pub schema: Option<Vec<FieldDefinition>>,

    /// Datasets in registration order; the built-in catalog when omitted
    #[serde(default)]
    pub datasets: Option<Vec<DatasetDefinition>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceDefinition {
    /// Raw dataset the records feed
    pub dataset: String,
    pub path: PathBuf,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_pattern() -> String {
    "*.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetDefinition {
    pub name: String,
    pub tier: Tier,
    #[serde(default)]
    pub upstreams: Vec<String>,
    /// Overrides the tier's default mode
    #[serde(default)]
    pub mode: Option<ExecutionMode>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub transform: TransformSpec,
}

/// Declarative transform, tagged by `kind`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformSpec {
    #[default]
    Passthrough,
    Select(Select),
    Filter(Filter),
    Aggregate(Aggregate),
    Join(Join),
    RiskLevel(RiskLevel),
    /// Steps applied in sequence
    Chain { steps: Vec<TransformSpec> },
}

impl TransformSpec {
    pub fn build(&self) -> Arc<dyn Transform> {
        Arc::from(self.boxed())
    }

    fn boxed(&self) -> Box<dyn Transform> {
        match self {
            TransformSpec::Passthrough => Box::new(Passthrough),
            TransformSpec::Select(select) => Box::new(select.clone()),
            TransformSpec::Filter(filter) => Box::new(filter.clone()),
            TransformSpec::Aggregate(aggregate) => Box::new(aggregate.clone()),
            TransformSpec::Join(join) => Box::new(join.clone()),
            TransformSpec::RiskLevel(risk) => Box::new(risk.clone()),
            TransformSpec::Chain { steps } => {
                let mut chain = Chain::new();
                for step in steps {
                    chain.push(step.boxed());
                }
                Box::new(chain)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_kinds() {
        let yaml = r#"
- kind: passthrough
- kind: select
  columns: [TransactionID, { column: Location, alias: UserLocation }]
  distinct: true
- kind: filter
  predicate: { compare: { column: AnomalyScore, op: gt, value: 0.5 } }
- kind: risk_level
  score_column: AnomalyScore
  output: fraud_risk_level
- kind: chain
  steps:
    - kind: select
      columns: [AnomalyScore]
    - kind: risk_level
      score_column: AnomalyScore
      output: level
"#;
        let specs: Vec<TransformSpec> = serde_yaml::from_str(yaml).unwrap();
        let described: Vec<_> = specs.iter().map(|s| s.build().describe()).collect();
        assert_eq!(described[0], "passthrough");
        assert_eq!(described[1], "select distinct(TransactionID, UserLocation)");
        assert_eq!(described[2], "filter");
        assert!(matches!(specs[4], TransformSpec::Chain { ref steps } if steps.len() == 2));
    }

    #[test]
    fn test_dataset_defaults() {
        let yaml = "name: raw\ntier: raw\n";
        let dataset: DatasetDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(dataset.upstreams.is_empty());
        assert!(dataset.mode.is_none());
        assert!(matches!(dataset.transform, TransformSpec::Passthrough));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "name: raw\ntier: raw\nupstream: [x]\n";
        assert!(serde_yaml::from_str::<DatasetDefinition>(yaml).is_err());
    }

    #[test]
    fn test_source_default_pattern() {
        let yaml = "dataset: raw\npath: ./data\n";
        let source: SourceDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(source.pattern, "*.json");
    }
}
