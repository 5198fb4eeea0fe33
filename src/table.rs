//! Tabular result model shared by every inspection

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// A single scalar cell value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent or SQL NULL; renders as an empty string
    #[default]
    Null,
    /// Integer value
    Integer(i64),
    /// Decimal value
    Float(f64),
    /// Text value
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One record: column name to value. Columns may be omitted.
pub type Row = BTreeMap<String, Value>;

/// Ordered-column, row-oriented record set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl TabularResult {
    /// Create an empty result with a fixed column order
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a result from already-fetched records
    pub fn from_records<I, S>(columns: I, records: Vec<Row>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut result = Self::new(columns);
        for record in records {
            result.push_row(record)?;
        }
        Ok(result)
    }

    /// Append a row. Fails if the row names a column outside the declared set.
    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if let Some(unknown) = row.keys().find(|k| !self.columns.contains(k)) {
            return Err(Error::UnknownColumn(unknown.clone()));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Declared columns, in display order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in insertion order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Display text of a cell; missing fields are empty
    pub fn cell(&self, row: usize, column: &str) -> String {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    /// All cells of a row in column order
    pub fn row_cells(&self, row: &Row) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| row.get(c).map(ToString::to_string).unwrap_or_default())
            .collect()
    }
}

/// Build a row from `(column, value)` pairs
pub fn row<I, K, V>(fields: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_undeclared_column() {
        let mut result = TabularResult::new(["name", "bytes"]);
        let err = result.push_row(row([("size", 10i64)])).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn(c) if c == "size"));
        assert!(result.is_empty());
    }

    #[test]
    fn missing_field_renders_empty() {
        let mut result = TabularResult::new(["name", "bytes"]);
        result.push_row(row([("name", "siteurl")])).unwrap();
        assert_eq!(result.cell(0, "name"), "siteurl");
        assert_eq!(result.cell(0, "bytes"), "");
        assert_eq!(result.cell(5, "name"), "");
    }

    #[test]
    fn row_cells_follow_column_order() {
        let result = TabularResult::from_records(
            ["b", "a"],
            vec![row([("a", Value::from(1i64)), ("b", Value::from("x"))])],
        )
        .unwrap();
        assert_eq!(result.row_cells(&result.rows()[0]), vec!["x", "1"]);
    }

    #[test]
    fn null_displays_as_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(2.5).to_string(), "2.5");
    }
}
