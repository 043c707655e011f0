// Risk Level Derivation
// Threshold labelling of anomaly scores for the real-time fraud table

use super::predicate::Predicate;
use super::{input, Transform, TransformError};
use crate::table::{Table, Value};

use serde::Deserialize;

pub const HIGH_RISK: &str = "High Risk";
pub const MODERATE_RISK: &str = "Moderate Risk";
pub const LOW_RISK: &str = "Low Risk";

pub const HIGH_RISK_THRESHOLD: f64 = 0.8;
pub const MODERATE_RISK_THRESHOLD: f64 = 0.5;

/// Label a score; thresholds are checked high to low and the first match wins.
/// A missing score falls through to low risk.
pub fn risk_level(score: Option<f64>) -> &'static str {
    match score {
        Some(s) if s > HIGH_RISK_THRESHOLD => HIGH_RISK,
        Some(s) if s > MODERATE_RISK_THRESHOLD => MODERATE_RISK,
        _ => LOW_RISK,
    }
}

/// Rows worth alerting on: a score above the moderate threshold, or a fraud flag.
///
/// Flagged rows with a low score pass this filter and are labelled low risk.
pub fn alert_filter(score_column: &str, fraud_column: &str) -> Predicate {
    Predicate::gt(score_column, MODERATE_RISK_THRESHOLD).or(Predicate::is_true(fraud_column))
}

/// Append a risk label column computed from a score column
#[derive(Debug, Clone, Deserialize)]
pub struct RiskLevel {
    pub score_column: String,
    pub output: String,
}

impl RiskLevel {
    pub fn new(score_column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            score_column: score_column.into(),
            output: output.into(),
        }
    }
}

impl Transform for RiskLevel {
    fn apply(&self, inputs: &[Table]) -> Result<Table, TransformError> {
        let source = input(inputs, 0)?;
        let score_idx = source.require_column(&self.score_column)?;

        let mut output = Table::new(
            source
                .columns()
                .iter()
                .cloned()
                .chain(std::iter::once(self.output.clone())),
        );

        for row in source.rows() {
            let score = match &row[score_idx] {
                Value::Null => None,
                other => Some(other.as_f64().ok_or_else(|| TransformError::TypeMismatch {
                    column: self.score_column.clone(),
                    expected: "numeric",
                    found: other.type_name().to_string(),
                })?),
            };
            let mut labelled = row.clone();
            labelled.push(Value::from(risk_level(score)));
            output.push_row(labelled)?;
        }

        Ok(output)
    }

    fn describe(&self) -> String {
        format!("risk level of {}", self.score_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Chain, Filter};

    #[test]
    fn test_thresholds_are_exclusive() {
        assert_eq!(risk_level(Some(0.81)), HIGH_RISK);
        assert_eq!(risk_level(Some(0.8)), MODERATE_RISK);
        assert_eq!(risk_level(Some(0.5)), LOW_RISK);
        assert_eq!(risk_level(None), LOW_RISK);
    }

    #[test]
    fn test_filter_then_label() {
        let table = Table::from_rows(
            vec!["AnomalyScore".into(), "IsFraud".into()],
            vec![
                vec![Value::Float(0.9), Value::Bool(false)],
                vec![Value::Float(0.6), Value::Bool(false)],
                vec![Value::Float(0.3), Value::Bool(false)],
                vec![Value::Float(0.3), Value::Bool(true)],
            ],
        )
        .unwrap();

        let chain = Chain::new()
            .then(Filter::new(alert_filter("AnomalyScore", "IsFraud")))
            .then(RiskLevel::new("AnomalyScore", "fraud_risk_level"));
        let out = chain.apply(&[table]).unwrap();

        let labels: Vec<_> = out
            .column_values("fraud_risk_level")
            .unwrap()
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(
            labels,
            vec![Value::from(HIGH_RISK), Value::from(MODERATE_RISK), Value::from(LOW_RISK)]
        );
    }

    #[test]
    fn test_non_numeric_score() {
        let table = Table::from_rows(vec!["s".into()], vec![vec![Value::from("high")]]).unwrap();
        let err = RiskLevel::new("s", "level").apply(&[table]).unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { .. }));
    }
}
