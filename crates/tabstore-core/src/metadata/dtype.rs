//! The closed set of element types the persistence layer understands.
//!
//! Backends do not agree on what they can store, so the crate pins down a
//! small set of logical element types and converts to and from Arrow types
//! at the edges. Anything outside this set is rejected when a table is
//! handed to a backend, not silently coerced.

use std::{fmt, str::FromStr};

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Logical element type of a column.
///
/// The names used by [`fmt::Display`], [`FromStr`] and serde are the
/// lowercase spellings (`"int64"`, `"float32"`, `"utf8"`, ...) that also
/// appear in the sidecar header's `dtype` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnDtype {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 encoded string.
    Utf8,
}

/// Error returned when a dtype name or Arrow type falls outside the
/// supported set.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum DtypeError {
    /// The dtype name does not match any supported logical type.
    #[snafu(display("Unknown dtype name: {name}"))]
    UnknownName {
        /// The unrecognized dtype name.
        name: String,
    },

    /// The Arrow data type has no counterpart in the supported set.
    #[snafu(display("Unsupported arrow type: {datatype}"))]
    UnsupportedArrowType {
        /// Debug rendering of the offending Arrow type.
        datatype: String,
    },
}

impl ColumnDtype {
    /// Canonical lowercase name of this dtype.
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnDtype::Bool => "bool",
            ColumnDtype::Int32 => "int32",
            ColumnDtype::Int64 => "int64",
            ColumnDtype::Float32 => "float32",
            ColumnDtype::Float64 => "float64",
            ColumnDtype::Utf8 => "utf8",
        }
    }

    /// Map this logical dtype to the Arrow data type used in memory.
    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnDtype::Bool => DataType::Boolean,
            ColumnDtype::Int32 => DataType::Int32,
            ColumnDtype::Int64 => DataType::Int64,
            ColumnDtype::Float32 => DataType::Float32,
            ColumnDtype::Float64 => DataType::Float64,
            ColumnDtype::Utf8 => DataType::Utf8,
        }
    }

    /// Map an Arrow data type back into the supported logical set.
    pub fn from_arrow(datatype: &DataType) -> Result<Self, DtypeError> {
        match datatype {
            DataType::Boolean => Ok(ColumnDtype::Bool),
            DataType::Int32 => Ok(ColumnDtype::Int32),
            DataType::Int64 => Ok(ColumnDtype::Int64),
            DataType::Float32 => Ok(ColumnDtype::Float32),
            DataType::Float64 => Ok(ColumnDtype::Float64),
            DataType::Utf8 => Ok(ColumnDtype::Utf8),
            other => Err(DtypeError::UnsupportedArrowType {
                datatype: format!("{other:?}"),
            }),
        }
    }

    /// Whether values of this dtype are integers.
    pub fn is_integer(self) -> bool {
        matches!(self, ColumnDtype::Int32 | ColumnDtype::Int64)
    }
}

impl fmt::Display for ColumnDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnDtype {
    type Err = DtypeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "bool" => Ok(ColumnDtype::Bool),
            "int32" => Ok(ColumnDtype::Int32),
            "int64" => Ok(ColumnDtype::Int64),
            "float32" => Ok(ColumnDtype::Float32),
            "float64" => Ok(ColumnDtype::Float64),
            "utf8" => Ok(ColumnDtype::Utf8),
            other => Err(DtypeError::UnknownName {
                name: other.to_string(),
            }),
        }
    }
}
