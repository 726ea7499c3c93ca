//! The in-memory typed table handed to and returned by every backend.
//!
//! A [`Table`] is an ordered collection of named [`Column`]s of equal row
//! count. Column values live in Arrow arrays; the Arrow validity bitmap is
//! the per-row missing-value mask. On top of the values each column carries
//! the metadata the header model describes: an optional physical unit, an
//! optional description, and, for time columns, a [`TimeInfo`].
//!
//! Construction through [`Table::new`] validates that column names are
//! unique and lengths agree; backends can therefore assume a well-formed
//! table on every write path.

pub mod column;

pub use column::Column;

use std::collections::HashSet;

use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use snafu::prelude::*;
use std::sync::Arc;

use crate::metadata::TableHeader;

/// Errors that can occur while constructing or converting a table.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum TableError {
    /// Duplicate column names are not allowed.
    #[snafu(display("Duplicate column name: {column}"))]
    DuplicateColumn {
        /// The duplicate column name.
        column: String,
    },

    /// All columns of a table must have the same number of rows.
    #[snafu(display("Column {column} has {actual} rows, expected {expected}"))]
    LengthMismatch {
        /// The offending column name.
        column: String,
        /// Row count established by the first column.
        expected: usize,
        /// Row count of the offending column.
        actual: usize,
    },

    /// The column uses an Arrow data type outside the supported set.
    #[snafu(display("Unsupported column type for {column}: {datatype}"))]
    UnsupportedType {
        /// The offending column name.
        column: String,
        /// Debug rendering of the Arrow type.
        datatype: String,
    },
}

/// An ordered collection of named columns of equal length.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table from columns, validating name uniqueness and equal
    /// row counts.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut seen = HashSet::with_capacity(columns.len());
        for col in &columns {
            if !seen.insert(col.name().to_string()) {
                return DuplicateColumnSnafu { column: col.name() }.fail();
            }
            ensure!(
                col.len() == n_rows,
                LengthMismatchSnafu {
                    column: col.name(),
                    expected: n_rows,
                    actual: col.len(),
                }
            );
        }
        Ok(Table { columns, n_rows })
    }

    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Table::default()
    }

    /// Build a table from columns already known to be valid (equal
    /// lengths, unique names), e.g. derived from an existing table.
    pub(crate) fn new_unchecked(columns: Vec<Column>, n_rows: usize) -> Self {
        Table { columns, n_rows }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Borrow the columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Attach metadata from `header` to matching columns.
    ///
    /// For every column that has a header entry, the entry's unit,
    /// description, and time representation replace whatever the column
    /// currently carries (the header is authoritative). Columns without an
    /// entry are left untouched; entries for unknown columns are ignored
    /// here; writes reject them before anything reaches disk.
    pub fn apply_header(&mut self, header: &TableHeader) {
        for col in &mut self.columns {
            if let Some(entry) = header.get(col.name()) {
                col.set_metadata(
                    entry.unit.clone(),
                    entry.description.clone(),
                    entry.time_info.clone(),
                );
            }
        }
    }

    /// Convert to an Arrow record batch, dropping unit/description/time
    /// metadata. Fields are marked nullable exactly when the column
    /// currently holds missing values.
    pub fn to_record_batch(&self) -> Result<RecordBatch, arrow::error::ArrowError> {
        let fields: Vec<Field> = self
            .columns
            .iter()
            .map(|c| Field::new(c.name(), c.data().data_type().clone(), c.has_nulls()))
            .collect();
        let arrays: Vec<ArrayRef> = self.columns.iter().map(|c| c.data().clone()).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.n_rows));
        RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
    }

    /// Rebuild a table from an Arrow record batch.
    ///
    /// Columns come back without units or descriptions; callers reattach
    /// metadata afterwards via [`Table::apply_header`]. Fails if the batch
    /// contains an Arrow type outside the supported set.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self, TableError> {
        let schema = batch.schema();
        let mut columns = Vec::with_capacity(batch.num_columns());
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let col = Column::new(field.name().clone(), array.clone());
            // Surface unsupported types now rather than at some later use.
            col.dtype()?;
            columns.push(col);
        }
        let mut table = Table::new(columns)?;
        table.n_rows = batch.num_rows();
        Ok(table)
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.n_rows == other.n_rows && self.columns == other.columns
    }
}
