// Grouped Aggregation
// Group-by with explicit aggregate functions and conditional variants

use super::predicate::{BoundPredicate, Predicate};
use super::{input, Transform, TransformError};
use crate::table::{Row, Table, Value};

use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Aggregate function applied per group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    /// Non-null values of the column, or all rows when no column is given
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    /// First value in upstream order, null included
    First,
}

/// One output column of an aggregation
///
/// With `when` set, only rows satisfying the predicate contribute, so a
/// conditional sum is a plain sum over the filtered subset. A conditional sum
/// over a non-empty group with no matching rows is zero rather than null.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateColumn {
    pub output: String,
    pub function: AggregateFunction,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub when: Option<Predicate>,
}

impl AggregateColumn {
    pub fn new(output: impl Into<String>, function: AggregateFunction, column: &str) -> Self {
        Self {
            output: output.into(),
            function,
            column: Some(column.to_string()),
            when: None,
        }
    }

    /// Count of every row in the group
    pub fn count_rows(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            function: AggregateFunction::Count,
            column: None,
            when: None,
        }
    }

    /// Representative value: first seen in upstream order
    pub fn first(column: &str) -> Self {
        Self::new(column, AggregateFunction::First, column)
    }

    pub fn when(mut self, predicate: Predicate) -> Self {
        self.when = Some(predicate);
        self
    }
}

/// Group rows by key columns and compute one row per distinct key
///
/// Groups are emitted in the order their key was first seen. An empty key list
/// produces exactly one global row, even for empty input.
#[derive(Debug, Clone, Deserialize)]
pub struct Aggregate {
    #[serde(default)]
    pub group_by: Vec<String>,
    pub aggregates: Vec<AggregateColumn>,
}

impl Aggregate {
    pub fn by<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_by: keys.into_iter().map(Into::into).collect(),
            aggregates: Vec::new(),
        }
    }

    pub fn global() -> Self {
        Self {
            group_by: Vec::new(),
            aggregates: Vec::new(),
        }
    }

    pub fn agg(mut self, column: AggregateColumn) -> Self {
        self.aggregates.push(column);
        self
    }
}

struct BoundAggregate {
    function: AggregateFunction,
    column: Option<usize>,
    name: String,
    when: Option<BoundPredicate>,
}

enum Accumulator {
    Count(i64),
    CountDistinct(HashSet<Value>),
    Sum {
        int_total: i64,
        float_total: f64,
        is_float: bool,
        matched: bool,
        rows: usize,
    },
    Avg {
        total: f64,
        count: usize,
    },
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
}

impl Accumulator {
    fn new(function: AggregateFunction) -> Self {
        match function {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::CountDistinct => Accumulator::CountDistinct(HashSet::new()),
            AggregateFunction::Sum => Accumulator::Sum {
                int_total: 0,
                float_total: 0.0,
                is_float: false,
                matched: false,
                rows: 0,
            },
            AggregateFunction::Avg => Accumulator::Avg { total: 0.0, count: 0 },
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
            AggregateFunction::First => Accumulator::First(None),
        }
    }

    fn update(&mut self, agg: &BoundAggregate, row: &Row) -> Result<(), TransformError> {
        let value = agg.column.map(|i| &row[i]);

        // rows and column type are tracked before the condition so that a
        // conditional sum can tell "no matches" from "no rows"
        if let Accumulator::Sum { rows, is_float, .. } = self {
            *rows += 1;
            if matches!(value, Some(Value::Float(_))) {
                *is_float = true;
            }
        }

        if let Some(when) = &agg.when {
            if !when.matches(row) {
                return Ok(());
            }
        }

        match self {
            Accumulator::Count(n) => {
                if value.map_or(true, |v| !v.is_null()) {
                    *n += 1;
                }
            }
            Accumulator::CountDistinct(set) => {
                if let Some(v) = value.filter(|v| !v.is_null()) {
                    set.insert(v.clone());
                }
            }
            Accumulator::Sum {
                int_total,
                float_total,
                matched,
                ..
            } => match value {
                Some(Value::Int(i)) => {
                    *int_total = int_total
                        .checked_add(*i)
                        .ok_or_else(|| sum_overflow(agg))?;
                    *matched = true;
                }
                Some(Value::Float(f)) => {
                    *float_total += f;
                    *matched = true;
                }
                Some(Value::Null) | None => {}
                Some(other) => return Err(numeric_mismatch(agg, other)),
            },
            Accumulator::Avg { total, count } => match value {
                Some(Value::Null) | None => {}
                Some(v) => {
                    *total += v.as_f64().ok_or_else(|| numeric_mismatch(agg, v))?;
                    *count += 1;
                }
            },
            Accumulator::Min(current) | Accumulator::Max(current) => {
                let want = if matches!(agg.function, AggregateFunction::Min) {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                };
                if let Some(v) = value.filter(|v| !v.is_null()) {
                    let replace = match current.as_ref() {
                        None => true,
                        Some(existing) => v.compare(existing) == Some(want),
                    };
                    if replace {
                        *current = Some(v.clone());
                    }
                }
            }
            Accumulator::First(current) => {
                if current.is_none() {
                    *current = Some(value.cloned().unwrap_or_default());
                }
            }
        }
        Ok(())
    }

    fn finish(self, conditional: bool) -> Value {
        match self {
            Accumulator::Count(n) => Value::Int(n),
            Accumulator::CountDistinct(set) => Value::Int(set.len() as i64),
            Accumulator::Sum {
                int_total,
                float_total,
                is_float,
                matched,
                rows,
            } => {
                if !matched && !(conditional && rows > 0) {
                    Value::Null
                } else if is_float {
                    Value::Float(int_total as f64 + float_total)
                } else {
                    Value::Int(int_total)
                }
            }
            Accumulator::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Float(total / count as f64)
                }
            }
            Accumulator::Min(v) | Accumulator::Max(v) | Accumulator::First(v) => {
                v.unwrap_or_default()
            }
        }
    }
}

fn sum_overflow(agg: &BoundAggregate) -> TransformError {
    TransformError::Failed(format!(
        "sum of '{}' overflows a 64-bit integer",
        agg.name
    ))
}

fn numeric_mismatch(agg: &BoundAggregate, found: &Value) -> TransformError {
    TransformError::TypeMismatch {
        column: agg.name.clone(),
        expected: "numeric",
        found: found.type_name().to_string(),
    }
}

impl Transform for Aggregate {
    fn apply(&self, inputs: &[Table]) -> Result<Table, TransformError> {
        let source = input(inputs, 0)?;

        let key_indices = self
            .group_by
            .iter()
            .map(|k| source.require_column(k))
            .collect::<Result<Vec<_>, _>>()?;

        let bound = self
            .aggregates
            .iter()
            .map(|a| {
                let column = match &a.column {
                    Some(name) => Some(source.require_column(name)?),
                    None if a.function == AggregateFunction::Count => None,
                    None => {
                        return Err(TransformError::Failed(format!(
                            "aggregate '{}' needs a column",
                            a.output
                        )))
                    }
                };
                let when = a.when.as_ref().map(|p| p.bind(source)).transpose()?;
                Ok(BoundAggregate {
                    function: a.function,
                    column,
                    name: a.column.clone().unwrap_or_else(|| a.output.clone()),
                    when,
                })
            })
            .collect::<Result<Vec<_>, TransformError>>()?;

        let new_group = || bound.iter().map(|s| Accumulator::new(s.function)).collect::<Vec<_>>();

        let mut group_index: HashMap<Row, usize> = HashMap::new();
        let mut groups: Vec<(Row, Vec<Accumulator>)> = Vec::new();

        if key_indices.is_empty() {
            groups.push((Vec::new(), new_group()));
        }

        for row in source.rows() {
            let key: Row = key_indices.iter().map(|&i| row[i].clone()).collect();
            let slot = match group_index.get(&key) {
                Some(&slot) => slot,
                None if key_indices.is_empty() => 0,
                None => {
                    groups.push((key.clone(), new_group()));
                    group_index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            for (acc, agg) in groups[slot].1.iter_mut().zip(&bound) {
                acc.update(agg, row)?;
            }
        }

        let mut output = Table::new(
            self.group_by
                .iter()
                .cloned()
                .chain(self.aggregates.iter().map(|a| a.output.clone())),
        );

        for (key, accumulators) in groups {
            let mut row = key;
            for (acc, agg) in accumulators.into_iter().zip(&self.aggregates) {
                row.push(acc.finish(agg.when.is_some()));
            }
            output.push_row(row)?;
        }

        Ok(output)
    }

    fn describe(&self) -> String {
        if self.group_by.is_empty() {
            format!("aggregate({} columns)", self.aggregates.len())
        } else {
            format!(
                "aggregate by {} ({} columns)",
                self.group_by.join(", "),
                self.aggregates.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::predicate::Literal;

    fn transactions() -> Table {
        let rows = vec![
            ("t1", "u1", 10.0, false, "d1"),
            ("t2", "u1", 20.0, true, "d2"),
            ("t3", "u2", 5.0, false, "d3"),
            ("t4", "u1", 30.0, false, "d1"),
        ];
        Table::from_rows(
            vec![
                "TransactionID".into(),
                "UserID".into(),
                "TransactionAmount".into(),
                "IsFraud".into(),
                "DeviceID".into(),
            ],
            rows.into_iter()
                .map(|(t, u, amount, fraud, device)| {
                    vec![
                        Value::from(t),
                        Value::from(u),
                        Value::Float(amount),
                        Value::Bool(fraud),
                        Value::from(device),
                    ]
                })
                .collect(),
        )
        .unwrap()
    }

    fn user_metrics() -> Aggregate {
        Aggregate::by(["UserID"])
            .agg(AggregateColumn::new("total_transactions", AggregateFunction::Count, "TransactionID"))
            .agg(AggregateColumn::new("avg_amount", AggregateFunction::Avg, "TransactionAmount"))
            .agg(
                AggregateColumn::new("fraud_transactions", AggregateFunction::Count, "TransactionID")
                    .when(Predicate::is_true("IsFraud")),
            )
            .agg(AggregateColumn::new("unique_devices", AggregateFunction::CountDistinct, "DeviceID"))
            .agg(AggregateColumn::new("max_amount", AggregateFunction::Max, "TransactionAmount"))
            .agg(AggregateColumn::first("DeviceID"))
    }

    #[test]
    fn test_group_by_user() {
        let out = user_metrics().apply(&[transactions()]).unwrap();
        assert_eq!(out.len(), 2);

        // u1 first seen, so it comes first
        assert_eq!(out.value(0, "UserID"), Some(&Value::from("u1")));
        assert_eq!(out.value(0, "total_transactions"), Some(&Value::Int(3)));
        assert_eq!(out.value(0, "avg_amount"), Some(&Value::Float(20.0)));
        assert_eq!(out.value(0, "fraud_transactions"), Some(&Value::Int(1)));
        assert_eq!(out.value(0, "unique_devices"), Some(&Value::Int(2)));
        assert_eq!(out.value(0, "max_amount"), Some(&Value::Float(30.0)));
        assert_eq!(out.value(0, "DeviceID"), Some(&Value::from("d1")));

        assert_eq!(out.value(1, "total_transactions"), Some(&Value::Int(1)));
        assert_eq!(out.value(1, "fraud_transactions"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_conditional_sum() {
        let agg = Aggregate::by(["UserID"]).agg(
            AggregateColumn::new("fraud_amount", AggregateFunction::Sum, "TransactionAmount")
                .when(Predicate::eq("IsFraud", Literal::Bool(true))),
        );
        let out = agg.apply(&[transactions()]).unwrap();
        assert_eq!(out.value(0, "fraud_amount"), Some(&Value::Float(20.0)));
        // no fraud for u2: zero, not null
        assert_eq!(out.value(1, "fraud_amount"), Some(&Value::Float(0.0)));
    }

    #[test]
    fn test_global_aggregate_on_empty_input() {
        let agg = Aggregate::global()
            .agg(AggregateColumn::count_rows("total"))
            .agg(AggregateColumn::new("avg", AggregateFunction::Avg, "TransactionAmount"))
            .agg(
                AggregateColumn::new("fraud_amount", AggregateFunction::Sum, "TransactionAmount")
                    .when(Predicate::is_true("IsFraud")),
            );
        let out = agg.apply(&[transactions().empty_like()]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows()[0], vec![Value::Int(0), Value::Null, Value::Null]);
    }

    #[test]
    fn test_integer_sum_overflow_is_an_error() {
        let mut table = Table::new(["v"]);
        table.push_row(vec![Value::Int(i64::MAX)]).unwrap();
        table.push_row(vec![Value::Int(1)]).unwrap();

        let err = Aggregate::global()
            .agg(AggregateColumn::new("total", AggregateFunction::Sum, "v"))
            .apply(&[table])
            .unwrap_err();
        assert!(matches!(err, TransformError::Failed(ref m) if m.contains("overflows")));
    }

    #[test]
    fn test_null_keys_form_one_group() {
        let mut table = Table::new(["k", "v"]);
        table.push_row(vec![Value::Null, Value::Int(1)]).unwrap();
        table.push_row(vec![Value::Null, Value::Int(2)]).unwrap();
        table.push_row(vec![Value::from("a"), Value::Null]).unwrap();

        let out = Aggregate::by(["k"])
            .agg(AggregateColumn::new("total", AggregateFunction::Sum, "v"))
            .apply(&[table])
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.rows()[0], vec![Value::Null, Value::Int(3)]);
        assert_eq!(out.rows()[1], vec![Value::from("a"), Value::Null]);
    }

    #[test]
    fn test_sum_rejects_strings() {
        let err = Aggregate::global()
            .agg(AggregateColumn::new("s", AggregateFunction::Sum, "UserID"))
            .apply(&[transactions()])
            .unwrap_err();
        assert!(matches!(err, TransformError::TypeMismatch { .. }));
    }

    #[test]
    fn test_aggregate_from_yaml() {
        let yaml = r#"
group_by: [UserID]
aggregates:
  - { output: total, function: count, column: TransactionID }
  - output: fraud
    function: count
    column: TransactionID
    when: { is_true: { column: IsFraud } }
"#;
        let agg: Aggregate = serde_yaml::from_str(yaml).unwrap();
        let out = agg.apply(&[transactions()]).unwrap();
        assert_eq!(out.columns().len(), 3);
        assert_eq!(out.value(0, "fraud"), Some(&Value::Int(1)));
    }
}
