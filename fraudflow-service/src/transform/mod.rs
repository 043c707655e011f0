// Transform Module
// Pure table-to-table computations attached to dataset nodes

pub mod aggregate;
pub mod join;
pub mod ops;
pub mod predicate;
pub mod risk;

pub use aggregate::{Aggregate, AggregateColumn, AggregateFunction};
pub use join::{ColumnRef, Join, JoinColumn, JoinOn};
pub use ops::{Filter, Projection, Select};
pub use predicate::{CompareOp, Literal, Predicate};
pub use risk::{alert_filter, risk_level, RiskLevel};

use crate::table::Table;

use thiserror::Error;

/// Errors raised while evaluating a transform
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransformError {
    #[error("unknown column '{column}' (available: {})", available.join(", "))]
    UnknownColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("row has {found} values but the table has {expected} columns")]
    ArityMismatch { expected: usize, found: usize },

    #[error("transform expects input #{index} but only {available} were provided")]
    MissingInput { index: usize, available: usize },

    #[error("column '{column}' expects {expected} values, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: String,
    },

    #[error("invalid join: {0}")]
    InvalidJoin(String),

    #[error("{0}")]
    Failed(String),
}

/// A pure computation from upstream tables to an output table
///
/// Inputs arrive in the order the dataset declared its upstreams. Raw datasets
/// receive a single input: the batch fetched from their record source.
pub trait Transform: Send + Sync {
    fn apply(&self, inputs: &[Table]) -> Result<Table, TransformError>;

    /// Short description used in execution plans
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

impl<F> Transform for F
where
    F: Fn(&[Table]) -> Result<Table, TransformError> + Send + Sync,
{
    fn apply(&self, inputs: &[Table]) -> Result<Table, TransformError> {
        self(inputs)
    }
}

/// Fetch an input by position
pub fn input(inputs: &[Table], index: usize) -> Result<&Table, TransformError> {
    inputs.get(index).ok_or(TransformError::MissingInput {
        index,
        available: inputs.len(),
    })
}

/// Returns its first input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transform for Passthrough {
    fn apply(&self, inputs: &[Table]) -> Result<Table, TransformError> {
        input(inputs, 0).cloned()
    }

    fn describe(&self) -> String {
        "passthrough".to_string()
    }
}

/// Sequential composition: the first step sees every input, later steps see
/// the previous step's output
#[derive(Default)]
pub struct Chain {
    steps: Vec<Box<dyn Transform>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, step: impl Transform + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn Transform>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Transform for Chain {
    fn apply(&self, inputs: &[Table]) -> Result<Table, TransformError> {
        let mut steps = self.steps.iter();
        let mut current = match steps.next() {
            Some(first) => first.apply(inputs)?,
            None => return Passthrough.apply(inputs),
        };
        for step in steps {
            current = step.apply(std::slice::from_ref(&current))?;
        }
        Ok(current)
    }

    fn describe(&self) -> String {
        self.steps
            .iter()
            .map(|s| s.describe())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn table() -> Table {
        Table::from_rows(
            vec!["id".to_string(), "score".to_string()],
            vec![
                vec![Value::from("a"), Value::Float(0.9)],
                vec![Value::from("b"), Value::Float(0.1)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_closure_transform() {
        let count_rows = |inputs: &[Table]| -> Result<Table, TransformError> {
            let mut out = Table::new(["rows"]);
            out.push_row(vec![Value::Int(input(inputs, 0)?.len() as i64)])?;
            Ok(out)
        };
        let out = count_rows.apply(&[table()]).unwrap();
        assert_eq!(out.rows()[0][0], Value::Int(2));
        assert_eq!(count_rows.describe(), "custom");
    }

    #[test]
    fn test_passthrough_requires_input() {
        assert_eq!(Passthrough.apply(&[table()]).unwrap(), table());
        assert_eq!(
            Passthrough.apply(&[]).unwrap_err(),
            TransformError::MissingInput { index: 0, available: 0 }
        );
    }

    #[test]
    fn test_chain_feeds_previous_output() {
        let chain = Chain::new()
            .then(Filter::new(Predicate::gt("score", 0.5)))
            .then(Select::columns(["id"]));
        let out = chain.apply(&[table()]).unwrap();
        assert_eq!(out.columns(), ["id".to_string()]);
        assert_eq!(out.rows(), [vec![Value::from("a")]]);
        assert_eq!(chain.describe(), "filter -> select(id)");
    }
}
