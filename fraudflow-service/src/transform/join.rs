// Inner Joins
// Fan-in transform joining several inputs on declared key pairs

use super::{input, Transform, TransformError};
use crate::table::{Table, Value};

use serde::Deserialize;
use std::collections::HashMap;

/// A column of a specific input
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnRef {
    pub input: usize,
    pub column: String,
}

impl ColumnRef {
    pub fn new(input: usize, column: impl Into<String>) -> Self {
        Self {
            input,
            column: column.into(),
        }
    }
}

/// Equality condition joining `right.input` to an already joined input
#[derive(Debug, Clone, Deserialize)]
pub struct JoinOn {
    pub left: ColumnRef,
    pub right: ColumnRef,
}

/// An output column of the join
#[derive(Debug, Clone, Deserialize)]
pub struct JoinColumn {
    pub input: usize,
    pub column: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl JoinColumn {
    pub fn new(input: usize, column: impl Into<String>) -> Self {
        Self {
            input,
            column: column.into(),
            alias: None,
        }
    }

    pub fn aliased(input: usize, column: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            input,
            column: column.into(),
            alias: Some(alias.into()),
        }
    }

    fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

/// Inner join of input 0 with every other input
///
/// Each `on` entry joins one new input to the inputs joined so far. Rows
/// without a match on either side are dropped, and null keys never match.
/// Output rows follow input 0's order, then each right input's order.
#[derive(Debug, Clone, Deserialize)]
pub struct Join {
    pub on: Vec<JoinOn>,
    pub select: Vec<JoinColumn>,
}

impl Join {
    pub fn new() -> Self {
        Self {
            on: Vec::new(),
            select: Vec::new(),
        }
    }

    pub fn on(mut self, left: ColumnRef, right: ColumnRef) -> Self {
        self.on.push(JoinOn { left, right });
        self
    }

    pub fn select(mut self, column: JoinColumn) -> Self {
        self.select.push(column);
        self
    }
}

impl Default for Join {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for Join {
    fn apply(&self, inputs: &[Table]) -> Result<Table, TransformError> {
        let base = input(inputs, 0)?;

        // position of each joined input inside a candidate tuple
        let mut slots: HashMap<usize, usize> = HashMap::from([(0, 0)]);
        let mut tuples: Vec<Vec<usize>> = (0..base.len()).map(|i| vec![i]).collect();

        for condition in &self.on {
            let (left, right) = (&condition.left, &condition.right);
            let left_slot = *slots.get(&left.input).ok_or_else(|| {
                TransformError::InvalidJoin(format!(
                    "input #{} is referenced before it is joined",
                    left.input
                ))
            })?;
            if slots.contains_key(&right.input) {
                return Err(TransformError::InvalidJoin(format!(
                    "input #{} is joined twice",
                    right.input
                )));
            }

            let left_table = input(inputs, left.input)?;
            let right_table = input(inputs, right.input)?;
            let left_col = left_table.require_column(&left.column)?;
            let right_col = right_table.require_column(&right.column)?;

            let mut index: HashMap<&Value, Vec<usize>> = HashMap::new();
            for (i, row) in right_table.rows().iter().enumerate() {
                let key = &row[right_col];
                if !key.is_null() {
                    index.entry(key).or_default().push(i);
                }
            }

            let mut joined = Vec::new();
            for tuple in &tuples {
                let key = &left_table.rows()[tuple[left_slot]][left_col];
                if key.is_null() {
                    continue;
                }
                if let Some(matches) = index.get(key) {
                    for &m in matches {
                        let mut extended = tuple.clone();
                        extended.push(m);
                        joined.push(extended);
                    }
                }
            }

            slots.insert(right.input, slots.len());
            tuples = joined;
        }

        if slots.len() != inputs.len() {
            return Err(TransformError::InvalidJoin(format!(
                "{} inputs provided but only {} are joined",
                inputs.len(),
                slots.len()
            )));
        }

        let projections = self
            .select
            .iter()
            .map(|c| {
                let slot = *slots.get(&c.input).ok_or_else(|| {
                    TransformError::InvalidJoin(format!("selected input #{} is not joined", c.input))
                })?;
                Ok((slot, c.input, input(inputs, c.input)?.require_column(&c.column)?))
            })
            .collect::<Result<Vec<_>, TransformError>>()?;

        let mut output = Table::new(self.select.iter().map(|c| c.output_name().to_string()));
        for tuple in tuples {
            let row = projections
                .iter()
                .map(|&(slot, table, col)| inputs[table].rows()[tuple[slot]][col].clone())
                .collect();
            output.push_row(row)?;
        }

        Ok(output)
    }

    fn describe(&self) -> String {
        let keys = self
            .on
            .iter()
            .map(|on| format!("#{}.{} = #{}.{}", on.left.input, on.left.column, on.right.input, on.right.column))
            .collect::<Vec<_>>()
            .join(" and ");
        format!("inner join on {}", keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> Table {
        Table::from_rows(
            vec!["TransactionID".into(), "UserID".into(), "MerchantID".into()],
            vec![
                vec![Value::from("t1"), Value::from("u1"), Value::from("m1")],
                vec![Value::from("t2"), Value::from("u2"), Value::from("m1")],
                vec![Value::from("t3"), Value::Null, Value::from("m2")],
                vec![Value::from("t4"), Value::from("u1"), Value::from("m9")],
            ],
        )
        .unwrap()
    }

    fn users() -> Table {
        Table::from_rows(
            vec!["UserID".into(), "total".into()],
            vec![
                vec![Value::from("u1"), Value::Int(2)],
                vec![Value::Null, Value::Int(1)],
            ],
        )
        .unwrap()
    }

    fn merchants() -> Table {
        Table::from_rows(
            vec!["MerchantID".into(), "fraud".into()],
            vec![
                vec![Value::from("m1"), Value::Int(0)],
                vec![Value::from("m2"), Value::Int(1)],
            ],
        )
        .unwrap()
    }

    fn three_way() -> Join {
        Join::new()
            .on(ColumnRef::new(0, "UserID"), ColumnRef::new(1, "UserID"))
            .on(ColumnRef::new(0, "MerchantID"), ColumnRef::new(2, "MerchantID"))
            .select(JoinColumn::new(0, "TransactionID"))
            .select(JoinColumn::aliased(1, "total", "user_total"))
            .select(JoinColumn::aliased(2, "fraud", "merchant_fraud"))
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let out = three_way().apply(&[facts(), users(), merchants()]).unwrap();
        // t2: no user, t3: null user, t4: unknown merchant
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows()[0], vec![Value::from("t1"), Value::Int(2), Value::Int(0)]);
        assert_eq!(
            out.columns(),
            ["TransactionID".to_string(), "user_total".to_string(), "merchant_fraud".to_string()]
        );
    }

    #[test]
    fn test_duplicate_keys_multiply() {
        let mut users = users();
        users.push_row(vec![Value::from("u1"), Value::Int(7)]).unwrap();
        let join = Join::new()
            .on(ColumnRef::new(0, "UserID"), ColumnRef::new(1, "UserID"))
            .select(JoinColumn::new(0, "TransactionID"))
            .select(JoinColumn::new(1, "total"));
        let out = join.apply(&[facts(), users]).unwrap();
        // t1 and t4 each match both u1 rows
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_unjoined_input_rejected() {
        let join = Join::new()
            .on(ColumnRef::new(0, "UserID"), ColumnRef::new(1, "UserID"))
            .select(JoinColumn::new(0, "TransactionID"));
        let err = join.apply(&[facts(), users(), merchants()]).unwrap_err();
        assert!(matches!(err, TransformError::InvalidJoin(_)));
    }

    #[test]
    fn test_reference_before_join_rejected() {
        let join = Join::new()
            .on(ColumnRef::new(1, "UserID"), ColumnRef::new(2, "MerchantID"))
            .select(JoinColumn::new(0, "TransactionID"));
        let err = join.apply(&[facts(), users(), merchants()]).unwrap_err();
        assert!(matches!(err, TransformError::InvalidJoin(_)));
    }
}
