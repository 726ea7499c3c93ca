//! The abstract storage contract every backend implements.
//!
//! This module is responsible for:
//!
//! - The [`Storage`] trait: six operations for persisting and loading
//!   named tables and JSON documents, with identical existence/overwrite
//!   semantics across all backends.
//! - The [`StorageError`] taxonomy shared by every implementation.
//! - Small synchronous filesystem helpers used by the file-based backends
//!   (atomic write-then-rename, create-new, classified reads).
//!
//! Callers pick one backend at construction time and only ever talk
//! through the trait; nothing in this crate branches on which backend is
//! behind it.
//!
//! # Concurrency
//!
//! Every operation is synchronous and blocking, and no backend locks
//! anything. The contract assumes at most one writer per artifact name at
//! a time; concurrent writers targeting the same name can race
//! (last-writer-wins, or a torn file for non-atomic formats). Serializing
//! writers is the caller's obligation. Concurrent readers are safe against
//! a concurrent atomic write, which never exposes a partially-written
//! file.

pub mod error;
pub(crate) mod io;

pub use error::{StorageError, StorageResult};

use std::path::Path;

use serde_json::Value;
use snafu::prelude::*;

use crate::metadata::TableHeader;
use crate::table::Table;

/// Abstract persistence contract for named tables and JSON documents.
///
/// Artifact names are unique per backend instance (or per in-memory
/// namespace). Tables and JSON documents share one identifier space but
/// occupy distinct physical extensions/paths, so a table and a document
/// may carry the same name without colliding.
///
/// # Write semantics
///
/// Writing an artifact that already exists fails with
/// [`StorageError::AlreadyExists`] unless `overwrite` is true, in which
/// case the new artifact fully replaces the old one. For tables the flag
/// applies to the *table* artifact; the companion header artifact is
/// always rewritten alongside it, since metadata is not independently
/// versioned. The header is written before the table, so a failure in
/// between can leave a readable header next to a missing table. That
/// window is documented, not hidden (see [`Storage::read_table_header`]).
pub trait Storage {
    /// The backend's storage root (file or directory), for diagnostics.
    fn root_path(&self) -> &Path;

    /// Persist an arbitrary JSON document under `name`.
    fn write_json(&self, data: &Value, name: &str, overwrite: bool) -> StorageResult<()>;

    /// Load the JSON document stored under `name`.
    ///
    /// Fails with [`StorageError::NotFound`] if absent.
    fn read_json(&self, name: &str) -> StorageResult<Value>;

    /// Persist `table` and its `header` under `name`.
    ///
    /// The header must describe a subset of the table's columns; entries
    /// naming unknown columns fail with [`StorageError::Schema`] before
    /// anything is written.
    fn write_table(
        &self,
        table: &Table,
        header: &TableHeader,
        name: &str,
        overwrite: bool,
    ) -> StorageResult<()>;

    /// Load the table stored under `name`.
    ///
    /// Fails with [`StorageError::NotFound`] if the table artifact is
    /// absent. If a header was stored it is used to reconstruct units,
    /// descriptions, and time representations; otherwise columns come back
    /// bare.
    fn read_table(&self, name: &str) -> StorageResult<Table>;

    /// Load the header stored alongside table `name`.
    ///
    /// Returns `Ok(None)`, not an error, when no header was stored,
    /// which is a valid state for tables written with an empty header or
    /// left behind by an interrupted write.
    fn read_table_header(&self, name: &str) -> StorageResult<Option<TableHeader>>;
}

/// Reject headers that describe columns the table does not have.
pub(crate) fn ensure_header_matches(
    table: &Table,
    header: &TableHeader,
    name: &str,
) -> StorageResult<()> {
    let unknown = header.unknown_columns(table);
    ensure!(
        unknown.is_empty(),
        error::SchemaSnafu {
            name,
            details: format!(
                "header describes columns not present in the table: {}",
                unknown.join(", ")
            ),
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ColumnHeader;
    use crate::table::Column;

    #[test]
    fn header_subset_is_accepted() {
        let table = Table::new(vec![
            Column::float64("ra", vec![1.0]),
            Column::float64("dec", vec![2.0]),
        ])
        .unwrap();
        let mut header = TableHeader::new();
        header.insert("ra", ColumnHeader::default());

        assert!(ensure_header_matches(&table, &header, "t").is_ok());
    }

    #[test]
    fn header_with_unknown_columns_is_a_schema_error() {
        let table = Table::new(vec![Column::float64("ra", vec![1.0])]).unwrap();
        let mut header = TableHeader::new();
        header.insert("dec", ColumnHeader::default());

        let err = ensure_header_matches(&table, &header, "t").unwrap_err();
        assert!(matches!(err, StorageError::Schema { .. }));
        assert!(err.to_string().contains("dec"));
    }
}
