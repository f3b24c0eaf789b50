//! Tabular query results.

use crate::decode::{decode_cell, Value};
use crate::error::{QuarryError, Result};
use crate::types::DataType;
use std::sync::Arc;

/// Raw results of one query: column names, column type tags and rows of
/// string-encoded cells (`None` is NULL).
///
/// Values are kept in their raw form so the results can be cached
/// losslessly; decoding happens while iterating with [`QueryResults::rows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResults {
    column_names: Vec<String>,
    column_types: Vec<String>,
    data: Vec<Vec<Option<String>>>,
}

impl QueryResults {
    /// Build results, checking that names, types and every row agree in length.
    pub fn new(
        column_names: Vec<String>,
        column_types: Vec<String>,
        data: Vec<Vec<Option<String>>>,
    ) -> Result<Self> {
        if column_names.len() != column_types.len() {
            return Err(QuarryError::Shape(format!(
                "{} column names but {} column types",
                column_names.len(),
                column_types.len()
            )));
        }
        if let Some((index, row)) = data
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != column_names.len())
        {
            return Err(QuarryError::Shape(format!(
                "row {} has {} values, expected {}",
                index,
                row.len(),
                column_names.len()
            )));
        }
        Ok(Self {
            column_names,
            column_types,
            data,
        })
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn column_types(&self) -> &[String] {
        &self.column_types
    }

    pub fn data(&self) -> &[Vec<Option<String>>] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Parsed column types, in column order.
    pub fn data_types(&self) -> Result<Vec<DataType>> {
        self.column_types.iter().map(|t| DataType::parse(t)).collect()
    }

    /// Lazily decode rows. Each call starts again from the first raw row.
    pub fn rows(&self) -> Rows<'_> {
        let (types, pending_error) = match self.data_types() {
            Ok(types) => (types, None),
            Err(e) => (Vec::new(), Some(e)),
        };
        Rows {
            names: Arc::new(self.column_names.clone()),
            types,
            pending_error,
            raw: self.data.iter(),
            failed: false,
        }
    }

    /// Decode every row, stopping at the first decode error.
    pub fn decode_all(&self) -> Result<Vec<Row>> {
        self.rows().collect()
    }
}

pub struct Rows<'a> {
    names: Arc<Vec<String>>,
    types: Vec<DataType>,
    pending_error: Option<QuarryError>,
    raw: std::slice::Iter<'a, Vec<Option<String>>>,
    failed: bool,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(e) = self.pending_error.take() {
            self.failed = true;
            return Some(Err(e));
        }
        let raw_row = self.raw.next()?;
        let values: Result<Vec<Value>> = raw_row
            .iter()
            .zip(&self.types)
            .map(|(cell, data_type)| decode_cell(cell.as_deref(), data_type))
            .collect();
        match values {
            Ok(values) => Some(Ok(Row {
                names: Arc::clone(&self.names),
                values,
            })),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// One decoded row: values paired with column names, in column order.
///
/// Column names are not guaranteed unique; [`Row::get`] returns the first
/// column with the given name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    names: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|index| &self.values[index])
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.names.iter().cloned().zip(self.values).collect()
    }
}
