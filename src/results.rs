use std::collections::HashMap;
use std::sync::Arc;

use crate::types::SqlValue;

/// A row from a query result.
///
/// Column names and the name-to-index map are shared across all rows of one
/// result set.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Get a value by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.index.get(column).and_then(|i| self.values.get(*i))
    }

    /// Get a value by column position.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The tabular output of one statement: zero or more rows plus the affected
/// row count reported by the driver.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    rows: Vec<Row>,
    rows_affected: u64,
    columns: Option<Arc<Vec<String>>>,
    index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            rows_affected: 0,
            columns: None,
            index: None,
        }
    }

    /// Set the column names shared by every row of this result set.
    pub fn set_columns(&mut self, columns: Vec<String>) {
        let index: HashMap<String, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        self.columns = Some(Arc::new(columns));
        self.index = Some(Arc::new(index));
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.as_ref().map_or(0, |c| c.len())
    }

    /// Append a row of values in column order. A no-op until columns are set.
    pub fn add_row_values(&mut self, values: Vec<SqlValue>) {
        if let (Some(columns), Some(index)) = (&self.columns, &self.index) {
            self.rows.push(Row {
                columns: Arc::clone(columns),
                index: Arc::clone(index),
                values,
            });
        }
    }

    pub fn set_rows_affected(&mut self, rows_affected: u64) {
        self.rows_affected = rows_affected;
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Rows affected as reported by the driver; for queries this is the
    /// number of rows returned.
    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected.max(self.rows.len() as u64)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
