//! Per-column metadata stored alongside every table artifact.
//!
//! A table header is a mapping from column name to [`ColumnHeader`],
//! serialized as a JSON object keyed by column name:
//!
//! ```json
//! {
//!   "ra": {"description": "Right ascension", "unit": "deg",
//!          "dtype": "float64", "time_info": null},
//!   "obs_time": {"description": null, "unit": "day", "dtype": "float64",
//!                "time_info": {"format": "jd", "scale": "tdb"}}
//! }
//! ```
//!
//! Header entries may describe only a subset of a table's columns; a column
//! without an entry simply carries no metadata. An entry naming a column
//! that is not in the table is a schema violation and is rejected at write
//! time by the storage layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::table::Table;

/// Temporal representation attached to a time column.
///
/// `format` names how the stored float values are to be interpreted (for
/// example `"jd"` or `"mjd"`), `scale` names the time scale they are
/// expressed in (for example `"tdb"` or `"utc"`). The persistence layer
/// carries both verbatim; interpreting them is the caller's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInfo {
    /// Temporal representation of the stored values.
    pub format: String,
    /// Time scale the values are expressed in.
    pub scale: String,
}

impl TimeInfo {
    /// Convenience constructor from string slices.
    pub fn new(format: impl Into<String>, scale: impl Into<String>) -> Self {
        TimeInfo {
            format: format.into(),
            scale: scale.into(),
        }
    }
}

/// Metadata for a single column.
///
/// All fields are optional; an all-`None` entry is valid and means "this
/// column is known but has no metadata".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHeader {
    /// Human-readable description of the column.
    #[serde(default)]
    pub description: Option<String>,
    /// Physical unit of the values (for example `"deg"` or `"day"`).
    #[serde(default)]
    pub unit: Option<String>,
    /// Canonical dtype name the column had when it was written (see
    /// [`crate::metadata::ColumnDtype`]). Informational: the data file is
    /// authoritative for the type actually read back.
    #[serde(default)]
    pub dtype: Option<String>,
    /// Temporal representation, present only for time columns.
    #[serde(default)]
    pub time_info: Option<TimeInfo>,
}

/// Mapping from column name to [`ColumnHeader`].
///
/// Keys are unique and insertion order is not significant; a `BTreeMap`
/// keeps the serialized form deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableHeader {
    columns: BTreeMap<String, ColumnHeader>,
}

impl TableHeader {
    /// Create an empty header.
    pub fn new() -> Self {
        TableHeader::default()
    }

    /// Derive the full header from a table: one entry per column, carrying
    /// the column's unit, description, dtype, and time representation.
    pub fn from_table(table: &Table) -> Self {
        let columns = table
            .columns()
            .iter()
            .map(|col| (col.name().to_string(), col.header_entry()))
            .collect();
        TableHeader { columns }
    }

    /// Insert or replace the entry for `column`.
    pub fn insert(&mut self, column: impl Into<String>, entry: ColumnHeader) {
        self.columns.insert(column.into(), entry);
    }

    /// Look up the entry for `column`.
    pub fn get(&self, column: &str) -> Option<&ColumnHeader> {
        self.columns.get(column)
    }

    /// Number of described columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the header describes no columns at all.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate over `(column name, entry)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnHeader)> {
        self.columns.iter()
    }

    /// Names of header entries that do not correspond to any column of
    /// `table`. Non-empty output means the header violates the subset rule.
    pub fn unknown_columns(&self, table: &Table) -> Vec<String> {
        self.columns
            .keys()
            .filter(|name| table.column(name).is_none())
            .cloned()
            .collect()
    }
}
