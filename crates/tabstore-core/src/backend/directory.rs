//! Directory-based backends: one data file plus one header sidecar per
//! table, one `.json` file per document.
//!
//! Two variants share this layout and differ only in the table file
//! codec:
//!
//! - [`IpcStorage`] writes columnar Arrow IPC files (`<name>.arrow`). The
//!   data file carries values and masks but no units, so reads always
//!   consult the sidecar to reattach metadata.
//! - [`CsvStorage`] writes self-describing annotated CSV (`<name>.csv`)
//!   whose embedded schema line already carries metadata. The sidecar is
//!   still written for layout consistency; on read the embedded schema is
//!   the primary source and the sidecar, when present, overrides it.
//!
//! Layout per table name `T`: `T.<ext>` and `T_header.json`. Documents
//! live at `T.json`. Names may contain relative subpaths; missing parent
//! directories are created on write, never on read. A name that carries
//! the variant's file extension is normalized to its stem, and a root
//! path that names a bare file roots the store at the file's parent
//! directory.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde_json::Value;
use snafu::prelude::*;

use crate::formats;
use crate::metadata::TableHeader;
use crate::storage::error::{AlreadyExistsSnafu, IoSnafu, JsonSnafu, MalformedHeaderSnafu};
use crate::storage::{ensure_header_matches, io, Storage, StorageError, StorageResult};
use crate::table::Table;

/// Table file codec used by a directory backend variant.
pub trait TableFileFormat {
    /// File extension of the table data file (without the dot).
    const EXTENSION: &'static str;
    /// Variant name used in diagnostics.
    const NAME: &'static str;

    /// Encode a table into file bytes.
    fn encode(table: &Table, name: &str) -> StorageResult<Vec<u8>>;

    /// Decode file bytes, applying the sidecar header per the variant's
    /// metadata precedence.
    fn decode(bytes: &[u8], sidecar: Option<&TableHeader>, name: &str) -> StorageResult<Table>;
}

/// Columnar Arrow IPC variant.
#[derive(Debug, Clone, Copy)]
pub struct IpcFormat;

impl TableFileFormat for IpcFormat {
    const EXTENSION: &'static str = "arrow";
    const NAME: &'static str = "ipc";

    fn encode(table: &Table, name: &str) -> StorageResult<Vec<u8>> {
        formats::ipc::encode_table(table, name)
    }

    fn decode(bytes: &[u8], sidecar: Option<&TableHeader>, name: &str) -> StorageResult<Table> {
        // The IPC file has no metadata; the sidecar is the only source.
        let mut table = formats::ipc::decode_table(bytes, name)?;
        if let Some(header) = sidecar {
            table.apply_header(header);
        }
        Ok(table)
    }
}

/// Self-describing annotated CSV variant.
#[derive(Debug, Clone, Copy)]
pub struct CsvFormat;

impl TableFileFormat for CsvFormat {
    const EXTENSION: &'static str = "csv";
    const NAME: &'static str = "csv";

    fn encode(table: &Table, name: &str) -> StorageResult<Vec<u8>> {
        formats::csv::encode_table(table, name)
    }

    fn decode(bytes: &[u8], sidecar: Option<&TableHeader>, name: &str) -> StorageResult<Table> {
        // Embedded schema first, then the sidecar overrides: after
        // independent edits the two can disagree, and one precedence order
        // is documented rather than picked per call site.
        let mut table = formats::csv::decode_table(bytes, name)?;
        if let Some(header) = sidecar {
            table.apply_header(header);
        }
        Ok(table)
    }
}

/// Directory-based storage over one table file codec.
#[derive(Debug, Clone)]
pub struct DirectoryStorage<F: TableFileFormat> {
    root: PathBuf,
    _format: PhantomData<F>,
}

/// Columnar Arrow IPC files in a directory.
pub type IpcStorage = DirectoryStorage<IpcFormat>;

/// Self-describing annotated CSV files in a directory.
pub type CsvStorage = DirectoryStorage<CsvFormat>;

impl<F: TableFileFormat> DirectoryStorage<F> {
    /// Create a backend rooted at `root`.
    ///
    /// The directory is created on first write, not here. If `root` names
    /// a bare file (it exists as a file, or carries this variant's table
    /// extension) the store is rooted at the file's parent directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = if Self::is_file_path(&root) {
            match root.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => root,
            }
        } else {
            root
        };
        DirectoryStorage {
            root,
            _format: PhantomData,
        }
    }

    fn is_file_path(path: &Path) -> bool {
        if path.is_file() {
            return true;
        }
        path.extension()
            .map(|ext| ext == F::EXTENSION)
            .unwrap_or(false)
    }

    /// Strip the variant's table extension when a name carries it, so
    /// `stars.arrow` and `stars` address the same artifact.
    fn table_name(name: &str) -> &str {
        let suffix = format!(".{}", F::EXTENSION);
        name.strip_suffix(suffix.as_str()).unwrap_or(name)
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{}", F::EXTENSION))
    }

    fn header_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}_header.json"))
    }

    fn json_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    /// Write or remove the sidecar so it always mirrors the given header.
    ///
    /// An empty header means "no metadata": any stale sidecar from a
    /// previous write is removed so `read_table_header` reports `None`.
    fn write_header_sidecar(&self, header: &TableHeader, name: &str) -> StorageResult<()> {
        let path = self.header_path(name);
        if header.is_empty() {
            match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).context(IoSnafu {
                    path: path.display().to_string(),
                }),
            }
        } else {
            let bytes = serde_json::to_vec_pretty(header).context(JsonSnafu { name })?;
            io::write_atomic(&path, &bytes)
        }
    }
}

impl<F: TableFileFormat> Storage for DirectoryStorage<F> {
    fn root_path(&self) -> &Path {
        &self.root
    }

    fn write_json(&self, data: &Value, name: &str, overwrite: bool) -> StorageResult<()> {
        let path = self.json_path(name);
        let bytes = serde_json::to_vec_pretty(data).context(JsonSnafu { name })?;
        if overwrite {
            io::write_atomic(&path, &bytes)?;
        } else {
            io::write_new(&path, &bytes, name)?;
        }
        log::debug!("wrote json document '{name}' to {}", path.display());
        Ok(())
    }

    fn read_json(&self, name: &str) -> StorageResult<Value> {
        let bytes = io::read_bytes(&self.json_path(name), name)?;
        serde_json::from_slice(&bytes).context(JsonSnafu { name })
    }

    fn write_table(
        &self,
        table: &Table,
        header: &TableHeader,
        name: &str,
        overwrite: bool,
    ) -> StorageResult<()> {
        let name = Self::table_name(name);
        ensure_header_matches(table, header, name)?;

        let table_path = self.table_path(name);
        // Checked up front so a refused write cannot clobber the old
        // header; the create-new open below still catches lost races.
        if !overwrite && table_path.exists() {
            return AlreadyExistsSnafu { name }.fail();
        }

        // Header first, then table: an interrupted write leaves a readable
        // header next to a missing table, never the reverse.
        self.write_header_sidecar(header, name)?;

        let bytes = F::encode(table, name)?;
        if overwrite {
            io::write_atomic(&table_path, &bytes)?;
        } else {
            io::write_new(&table_path, &bytes, name)?;
        }
        log::debug!(
            "wrote table '{name}' ({} rows, {} columns) to {}",
            table.n_rows(),
            table.n_columns(),
            table_path.display()
        );
        Ok(())
    }

    fn read_table(&self, name: &str) -> StorageResult<Table> {
        let name = Self::table_name(name);
        let bytes = io::read_bytes(&self.table_path(name), name)?;
        let sidecar = self.read_table_header(name)?;
        F::decode(&bytes, sidecar.as_ref(), name)
    }

    fn read_table_header(&self, name: &str) -> StorageResult<Option<TableHeader>> {
        let name = Self::table_name(name);
        let bytes = match io::read_bytes(&self.header_path(name), name) {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let header: TableHeader =
            serde_json::from_slice(&bytes).context(MalformedHeaderSnafu { name })?;
        Ok(Some(header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_strips_variant_extension() {
        assert_eq!(IpcStorage::table_name("stars.arrow"), "stars");
        assert_eq!(IpcStorage::table_name("stars"), "stars");
        assert_eq!(IpcStorage::table_name("nested/stars.arrow"), "nested/stars");
        // Foreign extensions are part of the name, not stripped.
        assert_eq!(CsvStorage::table_name("stars.arrow"), "stars.arrow");
    }

    #[test]
    fn bare_file_root_resolves_to_parent_directory() {
        let storage = IpcStorage::new("/data/catalog/stars.arrow");
        assert_eq!(storage.root_path(), Path::new("/data/catalog"));

        let storage = IpcStorage::new("/data/catalog");
        assert_eq!(storage.root_path(), Path::new("/data/catalog"));
    }
}
