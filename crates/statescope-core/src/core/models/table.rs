use nalgebra::DMatrix;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Column '{0}' not found in table")]
    MissingColumn(String),
    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("Shape mismatch: {columns} column name(s) for {data_columns} data column(s)")]
    ShapeMismatch { columns: usize, data_columns: usize },
    #[error("Row {row} has {found} value(s), expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Row count mismatch: expected {expected} row(s), found {found}")]
    RowCountMismatch { expected: usize, found: usize },
}

/// A table of named `f64` columns, one row per trajectory frame.
///
/// Row order is frame order and is preserved by every operation, so tables derived
/// from the same source stay aligned row-for-row.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    data: DMatrix<f64>,
}

impl NumericTable {
    pub fn new(columns: Vec<String>, data: DMatrix<f64>) -> Result<Self, TableError> {
        if columns.len() != data.ncols() {
            return Err(TableError::ShapeMismatch {
                columns: columns.len(),
                data_columns: data.ncols(),
            });
        }
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self {
            columns,
            index,
            data,
        })
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, TableError> {
        let n_cols = columns.len();
        for (row, values) in rows.iter().enumerate() {
            if values.len() != n_cols {
                return Err(TableError::RaggedRow {
                    row,
                    expected: n_cols,
                    found: values.len(),
                });
            }
        }
        let data = DMatrix::from_row_iterator(rows.len(), n_cols, rows.into_iter().flatten());
        Self::new(columns, data)
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>, TableError> {
        let idx = self.column_index(name)?;
        Ok(self.data.column(idx).iter().copied().collect())
    }

    /// Extracts the named columns, in the requested order, as an N×K matrix.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<DMatrix<f64>, TableError> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.data.select_columns(indices.iter()))
    }

    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, TableError> {
        let data = self.select(names)?;
        let columns = names.iter().map(|n| n.as_ref().to_string()).collect();
        Self::new(columns, data)
    }

    /// Keeps every `stride`-th row starting from the first. A stride of zero is treated as one.
    pub fn strided(&self, stride: usize) -> Self {
        let stride = stride.max(1);
        let rows: Vec<usize> = (0..self.n_rows()).step_by(stride).collect();
        self.take_rows(&rows)
    }

    /// Keeps the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            index: self.index.clone(),
            data: self.data.select_rows(rows.iter()),
        }
    }

    /// Returns a copy without the named column, or an unchanged copy if it is absent.
    pub fn without_column(&self, name: &str) -> Self {
        let Ok(drop_idx) = self.column_index(name) else {
            return self.clone();
        };
        let keep: Vec<usize> = (0..self.n_cols()).filter(|&i| i != drop_idx).collect();
        let columns: Vec<String> = keep.iter().map(|&i| self.columns[i].clone()).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            columns,
            index,
            data: self.data.select_columns(keep.iter()),
        }
    }

    pub fn row(&self, i: usize) -> Vec<f64> {
        self.data.row(i).iter().copied().collect()
    }
}
