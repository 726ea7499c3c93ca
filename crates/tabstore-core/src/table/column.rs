//! A single named column: Arrow values plus unit/description/time metadata.

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use std::sync::Arc;

use crate::metadata::{ColumnDtype, ColumnHeader, TimeInfo};
use crate::table::TableError;

/// A named column of homogeneous values.
///
/// The validity bitmap of the underlying Arrow array is the per-row
/// missing-value mask. Metadata lives next to the values so a table is
/// self-contained in memory; backends decide per format what of it they
/// can persist in-file and what goes to the sidecar header.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    data: ArrayRef,
    unit: Option<String>,
    description: Option<String>,
    time_info: Option<TimeInfo>,
}

impl Column {
    /// Wrap an existing Arrow array as a column with no metadata.
    pub fn new(name: impl Into<String>, data: ArrayRef) -> Self {
        Column {
            name: name.into(),
            data,
            unit: None,
            description: None,
            time_info: None,
        }
    }

    /// Attach a physical unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Attach a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this column as a time column with the given representation.
    pub fn with_time_info(mut self, time_info: TimeInfo) -> Self {
        self.time_info = Some(time_info);
        self
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the values.
    pub fn data(&self) -> &ArrayRef {
        &self.data
    }

    /// Physical unit, if any.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Time representation, if this is a time column.
    pub fn time_info(&self) -> Option<&TimeInfo> {
        self.time_info.as_ref()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the column has zero rows.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether any row is masked as missing.
    pub fn has_nulls(&self) -> bool {
        self.data.null_count() > 0
    }

    /// Logical dtype of the values.
    pub fn dtype(&self) -> Result<ColumnDtype, TableError> {
        ColumnDtype::from_arrow(self.data.data_type()).map_err(|_| TableError::UnsupportedType {
            column: self.name.clone(),
            datatype: format!("{:?}", self.data.data_type()),
        })
    }

    /// The header entry describing this column.
    pub fn header_entry(&self) -> ColumnHeader {
        ColumnHeader {
            description: self.description.clone(),
            unit: self.unit.clone(),
            dtype: self.dtype().ok().map(|d| d.as_str().to_string()),
            time_info: self.time_info.clone(),
        }
    }

    /// Replace all metadata at once; used when a header is applied.
    pub(crate) fn set_metadata(
        &mut self,
        unit: Option<String>,
        description: Option<String>,
        time_info: Option<TimeInfo>,
    ) {
        self.unit = unit;
        self.description = description;
        self.time_info = time_info;
    }

    // Convenience constructors for the supported element types.

    /// 64-bit integer column without missing values.
    pub fn int64(name: impl Into<String>, values: Vec<i64>) -> Self {
        Column::new(name, Arc::new(Int64Array::from(values)) as ArrayRef)
    }

    /// 64-bit integer column with a missing-value mask (`None` = missing).
    pub fn int64_opt(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Column::new(name, Arc::new(Int64Array::from(values)) as ArrayRef)
    }

    /// 32-bit integer column without missing values.
    pub fn int32(name: impl Into<String>, values: Vec<i32>) -> Self {
        Column::new(name, Arc::new(Int32Array::from(values)) as ArrayRef)
    }

    /// 32-bit integer column with a missing-value mask.
    pub fn int32_opt(name: impl Into<String>, values: Vec<Option<i32>>) -> Self {
        Column::new(name, Arc::new(Int32Array::from(values)) as ArrayRef)
    }

    /// 64-bit float column without missing values.
    pub fn float64(name: impl Into<String>, values: Vec<f64>) -> Self {
        Column::new(name, Arc::new(Float64Array::from(values)) as ArrayRef)
    }

    /// 64-bit float column with a missing-value mask.
    pub fn float64_opt(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Column::new(name, Arc::new(Float64Array::from(values)) as ArrayRef)
    }

    /// 32-bit float column without missing values.
    pub fn float32(name: impl Into<String>, values: Vec<f32>) -> Self {
        Column::new(name, Arc::new(Float32Array::from(values)) as ArrayRef)
    }

    /// 32-bit float column with a missing-value mask.
    pub fn float32_opt(name: impl Into<String>, values: Vec<Option<f32>>) -> Self {
        Column::new(name, Arc::new(Float32Array::from(values)) as ArrayRef)
    }

    /// String column without missing values.
    pub fn utf8<S: AsRef<str>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Column::new(
            name,
            Arc::new(StringArray::from_iter_values(values)) as ArrayRef,
        )
    }

    /// String column with a missing-value mask.
    pub fn utf8_opt<S: AsRef<str>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<S>>,
    ) -> Self {
        Column::new(name, Arc::new(StringArray::from_iter(values)) as ArrayRef)
    }

    /// Boolean column without missing values.
    pub fn bool(name: impl Into<String>, values: Vec<bool>) -> Self {
        Column::new(name, Arc::new(BooleanArray::from(values)) as ArrayRef)
    }

    /// Boolean column with a missing-value mask.
    pub fn bool_opt(name: impl Into<String>, values: Vec<Option<bool>>) -> Self {
        Column::new(name, Arc::new(BooleanArray::from(values)) as ArrayRef)
    }

    /// Time column: float values under the given temporal representation.
    pub fn time(name: impl Into<String>, values: Vec<f64>, time_info: TimeInfo) -> Self {
        Column::float64(name, values).with_time_info(time_info)
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.unit == other.unit
            && self.description == other.description
            && self.time_info == other.time_info
            && self.data.to_data() == other.data.to_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_metadata_builders_chain() {
        let col = Column::float64("ra", vec![1.0])
            .with_unit("deg")
            .with_description("Right ascension");
        assert_eq!(col.unit(), Some("deg"));
        assert_eq!(col.description(), Some("Right ascension"));
        assert_eq!(col.dtype().unwrap(), ColumnDtype::Float64);
    }

    #[test]
    fn masked_constructors_record_nulls() {
        let col = Column::int32_opt("n", vec![Some(1), None, None]);
        assert_eq!(col.len(), 3);
        assert!(col.has_nulls());
        assert_eq!(col.data().null_count(), 2);
    }

    #[test]
    fn equality_covers_values_and_metadata() {
        let a = Column::float64("x", vec![1.0, 2.0]).with_unit("m");
        let b = Column::float64("x", vec![1.0, 2.0]).with_unit("m");
        let c = Column::float64("x", vec![1.0, 2.0]).with_unit("km");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
