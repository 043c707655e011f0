// Row Operations
// Projection, distinct and filter transforms

use super::predicate::Predicate;
use super::{input, Transform, TransformError};
use crate::table::Table;

use serde::Deserialize;
use std::collections::HashSet;

/// A selected column, optionally renamed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ProjectionDef")]
pub struct Projection {
    pub column: String,
    pub alias: Option<String>,
}

impl Projection {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: None,
        }
    }

    pub fn aliased(column: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

/// Either `Column` or `{ column: Column, alias: Name }`
#[derive(Deserialize)]
#[serde(untagged)]
enum ProjectionDef {
    Name(String),
    Aliased { column: String, alias: Option<String> },
}

impl From<ProjectionDef> for Projection {
    fn from(def: ProjectionDef) -> Self {
        match def {
            ProjectionDef::Name(column) => Projection::new(column),
            ProjectionDef::Aliased { column, alias } => Projection { column, alias },
        }
    }
}

/// Keep (and rename) a subset of columns, optionally dropping duplicate rows
#[derive(Debug, Clone, Deserialize)]
pub struct Select {
    pub columns: Vec<Projection>,
    #[serde(default)]
    pub distinct: bool,
}

impl Select {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Projection::new).collect(),
            distinct: false,
        }
    }

    pub fn with(projections: Vec<Projection>) -> Self {
        Self {
            columns: projections,
            distinct: false,
        }
    }

    /// Keep only the first occurrence of each distinct output row
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

impl Transform for Select {
    fn apply(&self, inputs: &[Table]) -> Result<Table, TransformError> {
        let source = input(inputs, 0)?;
        let indices = self
            .columns
            .iter()
            .map(|p| source.require_column(&p.column))
            .collect::<Result<Vec<_>, _>>()?;

        let mut output = Table::new(self.columns.iter().map(|p| p.output_name().to_string()));
        let mut seen = HashSet::new();

        for row in source.rows() {
            let projected: Vec<_> = indices.iter().map(|&i| row[i].clone()).collect();
            if self.distinct && !seen.insert(projected.clone()) {
                continue;
            }
            output.push_row(projected)?;
        }

        Ok(output)
    }

    fn describe(&self) -> String {
        let names = self
            .columns
            .iter()
            .map(|p| p.output_name())
            .collect::<Vec<_>>()
            .join(", ");
        if self.distinct {
            format!("select distinct({})", names)
        } else {
            format!("select({})", names)
        }
    }
}

/// Keep rows for which the predicate is definitely true
#[derive(Debug, Clone, Deserialize)]
pub struct Filter {
    pub predicate: Predicate,
}

impl Filter {
    pub fn new(predicate: Predicate) -> Self {
        Self { predicate }
    }
}

impl Transform for Filter {
    fn apply(&self, inputs: &[Table]) -> Result<Table, TransformError> {
        let source = input(inputs, 0)?;
        let bound = self.predicate.bind(source)?;

        let mut output = source.empty_like();
        for row in source.rows().iter().filter(|row| bound.matches(row)) {
            output.push_row(row.clone())?;
        }
        Ok(output)
    }

    fn describe(&self) -> String {
        "filter".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn transactions() -> Table {
        Table::from_rows(
            vec!["TransactionID".into(), "UserID".into(), "AnomalyScore".into()],
            vec![
                vec![Value::from("t1"), Value::from("u1"), Value::Float(0.9)],
                vec![Value::from("t1"), Value::from("u1"), Value::Float(0.9)],
                vec![Value::from("t2"), Value::from("u2"), Value::Float(0.2)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_select_with_alias() {
        let select = Select::with(vec![
            Projection::new("TransactionID"),
            Projection::aliased("UserID", "Customer"),
        ]);
        let out = select.apply(&[transactions()]).unwrap();
        assert_eq!(out.columns(), ["TransactionID".to_string(), "Customer".to_string()]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_select_distinct_keeps_first() {
        let out = Select::columns(["TransactionID", "UserID"])
            .distinct()
            .apply(&[transactions()])
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.rows()[0][0], Value::from("t1"));
        assert_eq!(out.rows()[1][0], Value::from("t2"));
    }

    #[test]
    fn test_select_unknown_column() {
        let err = Select::columns(["Nope"]).apply(&[transactions()]).unwrap_err();
        assert!(matches!(err, TransformError::UnknownColumn { ref column, .. } if column == "Nope"));
    }

    #[test]
    fn test_filter_keeps_columns_on_empty_result() {
        let out = Filter::new(Predicate::gt("AnomalyScore", 0.95))
            .apply(&[transactions()])
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(out.columns().len(), 3);
    }

    #[test]
    fn test_projection_yaml_forms() {
        let select: Select = serde_yaml::from_str(
            "columns: [TransactionID, { column: UserID, alias: Customer }]\ndistinct: true",
        )
        .unwrap();
        assert!(select.distinct);
        assert_eq!(select.columns[1], Projection::aliased("UserID", "Customer"));
    }
}
