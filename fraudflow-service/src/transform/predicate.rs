// Row Predicates
// Declarative boolean conditions with SQL three-valued logic

use super::TransformError;
use crate::table::{Row, Table, Value};

use serde::Deserialize;
use std::cmp::Ordering;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// Literal operand as written in a pipeline definition
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => Value::Int(i),
            Literal::Float(f) => Value::Float(f),
            Literal::String(s) => Value::String(s),
        }
    }
}

/// A condition over the columns of one row
///
/// Comparisons involving null are unknown; a row passes a filter only when the
/// predicate is definitely true.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    IsTrue {
        column: String,
    },
    IsNull {
        column: String,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(column: impl Into<String>, op: CompareOp, value: Literal) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value,
        }
    }

    pub fn gt(column: impl Into<String>, value: f64) -> Self {
        Self::compare(column, CompareOp::Gt, Literal::Float(value))
    }

    pub fn eq(column: impl Into<String>, value: Literal) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn is_true(column: impl Into<String>) -> Self {
        Predicate::IsTrue {
            column: column.into(),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut terms) => {
                terms.push(other);
                Predicate::Or(terms)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut terms) => {
                terms.push(other);
                Predicate::And(terms)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// Resolve column names against a table's columns
    pub fn bind(&self, table: &Table) -> Result<BoundPredicate, TransformError> {
        Ok(match self {
            Predicate::Compare { column, op, value } => BoundPredicate::Compare {
                index: table.require_column(column)?,
                op: *op,
                value: value.clone().into(),
            },
            Predicate::IsTrue { column } => BoundPredicate::IsTrue(table.require_column(column)?),
            Predicate::IsNull { column } => BoundPredicate::IsNull(table.require_column(column)?),
            Predicate::And(terms) => BoundPredicate::And(
                terms.iter().map(|t| t.bind(table)).collect::<Result<_, _>>()?,
            ),
            Predicate::Or(terms) => BoundPredicate::Or(
                terms.iter().map(|t| t.bind(table)).collect::<Result<_, _>>()?,
            ),
            Predicate::Not(inner) => BoundPredicate::Not(Box::new(inner.bind(table)?)),
        })
    }
}

/// A predicate whose columns have been resolved to row positions
#[derive(Debug, Clone)]
pub enum BoundPredicate {
    Compare {
        index: usize,
        op: CompareOp,
        value: Value,
    },
    IsTrue(usize),
    IsNull(usize),
    And(Vec<BoundPredicate>),
    Or(Vec<BoundPredicate>),
    Not(Box<BoundPredicate>),
}

impl BoundPredicate {
    /// Evaluate with three-valued logic; `None` means unknown
    pub fn evaluate(&self, row: &Row) -> Option<bool> {
        match self {
            BoundPredicate::Compare { index, op, value } => {
                row[*index].compare(value).map(|ord| op.holds(ord))
            }
            BoundPredicate::IsTrue(index) => row[*index].as_bool(),
            BoundPredicate::IsNull(index) => Some(row[*index].is_null()),
            BoundPredicate::And(terms) => {
                let mut result = Some(true);
                for term in terms {
                    match term.evaluate(row) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            BoundPredicate::Or(terms) => {
                let mut result = Some(false);
                for term in terms {
                    match term.evaluate(row) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            BoundPredicate::Not(inner) => inner.evaluate(row).map(|b| !b),
        }
    }

    /// Whether the row definitely satisfies the predicate
    pub fn matches(&self, row: &Row) -> bool {
        self.evaluate(row) == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(["AnomalyScore", "IsFraud"])
    }

    #[test]
    fn test_fraud_alert_condition() {
        let predicate = Predicate::gt("AnomalyScore", 0.5).or(Predicate::is_true("IsFraud"));
        let bound = predicate.bind(&table()).unwrap();

        assert!(bound.matches(&vec![Value::Float(0.9), Value::Bool(false)]));
        assert!(bound.matches(&vec![Value::Float(0.3), Value::Bool(true)]));
        assert!(!bound.matches(&vec![Value::Float(0.3), Value::Bool(false)]));
        assert!(bound.matches(&vec![Value::Null, Value::Bool(true)]));
        assert!(!bound.matches(&vec![Value::Null, Value::Null]));
    }

    #[test]
    fn test_null_is_unknown() {
        let bound = Predicate::Not(Box::new(Predicate::gt("AnomalyScore", 0.5)))
            .bind(&table())
            .unwrap();
        assert_eq!(bound.evaluate(&vec![Value::Null, Value::Null]), None);
        assert!(!bound.matches(&vec![Value::Null, Value::Null]));
    }

    #[test]
    fn test_int_literal_compares_with_float() {
        let bound = Predicate::eq("AnomalyScore", Literal::Int(1)).bind(&table()).unwrap();
        assert!(bound.matches(&vec![Value::Float(1.0), Value::Null]));
    }

    #[test]
    fn test_unknown_column() {
        let err = Predicate::is_true("Missing").bind(&table()).unwrap_err();
        assert!(matches!(err, TransformError::UnknownColumn { .. }));
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r#"
or:
  - compare: { column: AnomalyScore, op: gt, value: 0.5 }
  - is_true: { column: IsFraud }
"#;
        let parsed: Predicate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            parsed,
            Predicate::gt("AnomalyScore", 0.5).or(Predicate::is_true("IsFraud"))
        );
    }
}
