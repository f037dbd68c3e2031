use std::collections::HashMap;
use std::sync::Arc;

use super::row::{DbRow, index_columns};
use crate::types::RowValues;

/// Rows returned by a query, in cursor order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    rows: Vec<DbRow>,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Empty result set with the given columns and room for `capacity` rows.
    #[must_use]
    pub fn with_columns(column_names: Vec<String>, capacity: usize) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            rows: Vec::with_capacity(capacity),
            column_names: Arc::new(column_names),
            column_index,
        }
    }

    /// Build a result set from literal columns and rows.
    ///
    /// ```rust
    /// use pg_middleware::prelude::*;
    ///
    /// let rs = ResultSet::from_rows(
    ///     &["id", "name"],
    ///     vec![vec![RowValues::Int(1), RowValues::Text("alice".into())]],
    /// );
    /// assert_eq!(rs.len(), 1);
    /// assert_eq!(rs.rows()[0].get("name"), Some(&RowValues::Text("alice".into())));
    /// ```
    #[must_use]
    pub fn from_rows(columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        let mut result_set = Self::with_columns(
            columns.iter().map(ToString::to_string).collect(),
            rows.len(),
        );
        for values in rows {
            result_set.push_values(values);
        }
        result_set
    }

    /// Append a row whose values line up with this set's columns.
    pub fn push_values(&mut self, values: Vec<RowValues>) {
        self.rows.push(DbRow::with_index(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_index),
            values,
        ));
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn rows(&self) -> &[DbRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DbRow> {
        self.rows.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = DbRow;
    type IntoIter = std::vec::IntoIter<DbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a DbRow;
    type IntoIter = std::slice::Iter<'a, DbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
