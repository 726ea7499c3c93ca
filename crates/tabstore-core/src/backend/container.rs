//! Single-file hierarchical container backend.
//!
//! All artifacts live in one container file (see
//! [`crate::formats::container`] for the physical layout). Each operation
//! loads the tree, mutates it, and writes the whole file back atomically,
//! so a reader never observes a half-written container. The low-level
//! codec refuses to replace an existing group path; this backend maps
//! `overwrite = true` onto remove-then-create and `overwrite = false`
//! onto [`StorageError::AlreadyExists`].
//!
//! # Nullable integers
//!
//! The container's column block cannot represent a nullable integer
//! column. Before writing, every masked `Int32`/`Int64` column is widened
//! to `Float64` with masked entries becoming NaN. The mapping of which
//! columns were widened is kept only for the duration of the write (it is
//! logged, not persisted), so **round-tripping a table through this
//! backend is lossy for nullable-integer dtype identity**; the numeric
//! values survive except where an `Int64` exceeds 2^53, the exact-integer
//! range of `Float64`. Masked strings and booleans have no such escape
//! hatch and fail with [`StorageError::FormatLimitation`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::datatypes::{Int32Type, Int64Type};
use serde_json::Value;
use snafu::prelude::*;

use crate::formats::container::{self, Container};
use crate::metadata::{ColumnDtype, TableHeader};
use crate::storage::error::{AlreadyExistsSnafu, JsonSnafu, MalformedHeaderSnafu, NotFoundSnafu};
use crate::storage::{ensure_header_matches, io, Storage, StorageError, StorageResult};
use crate::table::{Column, Table};

/// Storage backend bound to one hierarchical container file.
#[derive(Debug, Clone)]
pub struct ContainerStorage {
    path: PathBuf,
}

impl ContainerStorage {
    /// Create a backend bound to the container file at `path`.
    ///
    /// The file is created on first write; a missing file reads as an
    /// empty container.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ContainerStorage { path: path.into() }
    }

    /// List every group and dataset currently in the container.
    pub fn structure(&self) -> StorageResult<Vec<String>> {
        Ok(self.load()?.structure())
    }

    fn load(&self) -> StorageResult<Container> {
        match io::read_bytes(&self.path, &self.path.display().to_string()) {
            Ok(bytes) => Container::from_bytes(&bytes, &self.path),
            Err(StorageError::NotFound { .. }) => Ok(Container::new()),
            Err(e) => Err(e),
        }
    }

    fn save(&self, container: &Container) -> StorageResult<()> {
        io::write_atomic(&self.path, &container.to_bytes())
    }
}

/// Widen every nullable integer column to `Float64` with NaN for masked
/// entries, returning the transformed table and the per-column widening
/// map `(column name, original dtype)`.
fn widen_nullable_ints(table: &Table) -> (Table, Vec<(String, ColumnDtype)>) {
    let mut widened = Vec::with_capacity(table.n_columns());
    let mut conversions = Vec::new();

    for col in table.columns() {
        let dtype = col.dtype().ok();
        let needs_widening = col.has_nulls()
            && matches!(dtype, Some(ColumnDtype::Int32) | Some(ColumnDtype::Int64));
        if !needs_widening {
            widened.push(col.clone());
            continue;
        }

        let data: ArrayRef = match dtype {
            Some(ColumnDtype::Int32) => {
                let array = col.data().as_primitive::<Int32Type>();
                let values: Vec<f64> = (0..array.len())
                    .map(|i| {
                        if array.is_null(i) {
                            f64::NAN
                        } else {
                            array.value(i) as f64
                        }
                    })
                    .collect();
                Arc::new(Float64Array::from(values))
            }
            _ => {
                let array = col.data().as_primitive::<Int64Type>();
                let values: Vec<f64> = (0..array.len())
                    .map(|i| {
                        if array.is_null(i) {
                            f64::NAN
                        } else {
                            array.value(i) as f64
                        }
                    })
                    .collect();
                Arc::new(Float64Array::from(values))
            }
        };

        let mut new_col = Column::new(col.name(), data);
        new_col.set_metadata(
            col.unit().map(str::to_string),
            col.description().map(str::to_string),
            col.time_info().cloned(),
        );
        widened.push(new_col);
        if let Some(dtype) = dtype {
            conversions.push((col.name().to_string(), dtype));
        }
    }

    (Table::new_unchecked(widened, table.n_rows()), conversions)
}

impl Storage for ContainerStorage {
    fn root_path(&self) -> &Path {
        &self.path
    }

    fn write_json(&self, data: &Value, name: &str, overwrite: bool) -> StorageResult<()> {
        let mut container = self.load()?;
        if container.contains(name) {
            if !overwrite {
                return AlreadyExistsSnafu { name }.fail();
            }
            container.remove(name);
        }
        let bytes = serde_json::to_vec(data).context(JsonSnafu { name })?;
        container.insert_json(name, bytes)?;
        self.save(&container)?;
        log::debug!(
            "wrote json dataset '{name}' to container {}",
            self.path.display()
        );
        Ok(())
    }

    fn read_json(&self, name: &str) -> StorageResult<Value> {
        let container = self.load()?;
        let bytes = container
            .json(name)
            .ok_or_else(|| NotFoundSnafu { name }.build())?;
        serde_json::from_slice(bytes).context(JsonSnafu { name })
    }

    fn write_table(
        &self,
        table: &Table,
        header: &TableHeader,
        name: &str,
        overwrite: bool,
    ) -> StorageResult<()> {
        ensure_header_matches(table, header, name)?;

        let mut container = self.load()?;
        if container.contains(name) {
            if !overwrite {
                return AlreadyExistsSnafu { name }.fail();
            }
            // The codec has no in-place replace; remove-then-create is the
            // documented path to overwrite a group.
            container.remove(name);
        }

        let (widened, conversions) = widen_nullable_ints(table);
        for (column, dtype) in &conversions {
            log::warn!(
                "container {}: widened nullable integer column '{column}' ({dtype}) to float64; \
                 masked entries become NaN and the original dtype is not persisted",
                self.path.display()
            );
        }

        let block = container::encode_columns(&widened, name)?;
        let header_bytes = if header.is_empty() {
            None
        } else {
            Some(serde_json::to_vec(header).context(JsonSnafu { name })?)
        };
        container.insert_table(name, block, header_bytes)?;
        self.save(&container)?;
        log::debug!(
            "wrote table '{name}' ({} rows, {} columns) to container {}",
            table.n_rows(),
            table.n_columns(),
            self.path.display()
        );
        Ok(())
    }

    fn read_table(&self, name: &str) -> StorageResult<Table> {
        let container = self.load()?;
        let block = container
            .table_block(name)
            .ok_or_else(|| NotFoundSnafu { name }.build())?;
        let mut table = container::decode_columns(block, name)?;
        if let Some(bytes) = container.table_header(name) {
            let header: TableHeader =
                serde_json::from_slice(bytes).context(MalformedHeaderSnafu { name })?;
            table.apply_header(&header);
        }
        Ok(table)
    }

    fn read_table_header(&self, name: &str) -> StorageResult<Option<TableHeader>> {
        let container = self.load()?;
        match container.table_header(name) {
            Some(bytes) => {
                let header: TableHeader =
                    serde_json::from_slice(bytes).context(MalformedHeaderSnafu { name })?;
                Ok(Some(header))
            }
            None => Ok(None),
        }
    }
}
