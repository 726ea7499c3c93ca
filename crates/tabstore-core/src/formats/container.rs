//! Single-file hierarchical container codec.
//!
//! The container is one physical file holding a tree of named groups under
//! a fixed root namespace. Per table `<name>` there is a group with two
//! children, `table` (a dense binary column block) and `header` (a JSON
//! blob); a free-standing JSON document occupies a single dataset at
//! `/<root>/<name>`.
//!
//! On-disk layout:
//!
//! ```text
//! magic "TABSTOR1" | version u32 | payload_len u64 | payload_crc32 u32 | payload
//! ```
//!
//! All integers are little-endian; the payload is the serialized group
//! tree, and the crc32 checksum catches torn or damaged files.
//!
//! Two properties of this codec are deliberate restrictions, not
//! accidents:
//!
//! - Creating a group or dataset path that already exists fails; there is
//!   no in-place replace. Callers remove the old entry first.
//! - The column block stores dense values with no missing-value channel.
//!   Floats can smuggle missing entries as NaN; nullable integer, boolean,
//!   and string columns are rejected outright. The container backend
//!   widens nullable integers to floats before encoding (a documented
//!   lossy transform) and refuses the rest.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray,
};
use arrow::datatypes::{Float32Type, Float64Type, Int32Type, Int64Type};
use snafu::prelude::*;

use crate::metadata::ColumnDtype;
use crate::storage::error::{
    AlreadyExistsSnafu, CorruptedSnafu, FormatLimitationSnafu, SchemaSnafu,
};
use crate::storage::StorageResult;
use crate::table::{Column, Table};

/// File magic identifying a container file.
pub const MAGIC: &[u8; 8] = b"TABSTOR1";
/// Current container format version.
pub const FORMAT_VERSION: u32 = 1;
/// Root namespace all groups live under.
pub const ROOT_GROUP: &str = "tabstore";

const BACKEND_NAME: &str = "container";

/// One named entry under the root namespace.
#[derive(Debug, Clone)]
enum Entry {
    /// A free-standing JSON document dataset.
    Json(Vec<u8>),
    /// A table group with a `table` block and an optional `header` blob.
    TableGroup {
        table: Vec<u8>,
        header: Option<Vec<u8>>,
    },
}

/// In-memory image of a container file's group tree.
///
/// Loaded whole, mutated, and written back whole; container files hold
/// catalog-sized tables, not bulk data.
#[derive(Debug, Clone, Default)]
pub struct Container {
    entries: BTreeMap<String, Entry>,
}

impl Container {
    /// An empty container.
    pub fn new() -> Self {
        Container::default()
    }

    /// Whether any entry (of either kind) occupies `name`.
    ///
    /// Unlike the directory layout, the container has no per-kind file
    /// extensions: a document and a table group with the same name would
    /// collide on the same group path, so the name space is truly shared.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether `name` is occupied by a table group.
    pub fn contains_table(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(Entry::TableGroup { .. }))
    }

    /// Whether `name` is occupied by a JSON dataset.
    pub fn contains_json(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(Entry::Json(_)))
    }

    /// Create a JSON dataset at `/<root>/<name>`.
    ///
    /// Fails with `AlreadyExists` when the path is occupied; remove first
    /// to replace.
    pub fn insert_json(&mut self, name: &str, bytes: Vec<u8>) -> StorageResult<()> {
        ensure!(!self.contains(name), AlreadyExistsSnafu { name });
        self.entries.insert(name.to_string(), Entry::Json(bytes));
        Ok(())
    }

    /// Create a table group at `/<root>/<name>`.
    ///
    /// Fails with `AlreadyExists` when the path is occupied; remove first
    /// to replace.
    pub fn insert_table(
        &mut self,
        name: &str,
        table_block: Vec<u8>,
        header: Option<Vec<u8>>,
    ) -> StorageResult<()> {
        ensure!(!self.contains(name), AlreadyExistsSnafu { name });
        self.entries.insert(
            name.to_string(),
            Entry::TableGroup {
                table: table_block,
                header,
            },
        );
        Ok(())
    }

    /// Remove whatever occupies `name`. Returns whether anything was there.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Bytes of the JSON dataset at `name`, if that is what lives there.
    pub fn json(&self, name: &str) -> Option<&[u8]> {
        match self.entries.get(name) {
            Some(Entry::Json(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Bytes of the column block of table `name`, if present.
    pub fn table_block(&self, name: &str) -> Option<&[u8]> {
        match self.entries.get(name) {
            Some(Entry::TableGroup { table, .. }) => Some(table),
            _ => None,
        }
    }

    /// Bytes of the header blob of table `name`, if one was stored.
    pub fn table_header(&self, name: &str) -> Option<&[u8]> {
        match self.entries.get(name) {
            Some(Entry::TableGroup { header, .. }) => header.as_deref(),
            _ => None,
        }
    }

    /// Human-readable listing of every group and dataset in the tree.
    pub fn structure(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (name, entry) in &self.entries {
            match entry {
                Entry::Json(_) => out.push(format!("DATASET /{ROOT_GROUP}/{name}")),
                Entry::TableGroup { header, .. } => {
                    out.push(format!("GROUP /{ROOT_GROUP}/{name}"));
                    out.push(format!("DATASET /{ROOT_GROUP}/{name}/table"));
                    if header.is_some() {
                        out.push(format!("DATASET /{ROOT_GROUP}/{name}/header"));
                    }
                }
            }
        }
        out
    }

    /// Serialize the container to file bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        put_str(&mut payload, ROOT_GROUP);
        put_u32(&mut payload, self.entries.len() as u32);
        for (name, entry) in &self.entries {
            put_str(&mut payload, name);
            match entry {
                Entry::Json(bytes) => {
                    payload.push(KIND_JSON);
                    put_blob(&mut payload, bytes);
                }
                Entry::TableGroup { table, header } => {
                    payload.push(KIND_TABLE_GROUP);
                    put_blob(&mut payload, table);
                    match header {
                        Some(h) => {
                            payload.push(1);
                            put_blob(&mut payload, h);
                        }
                        None => payload.push(0),
                    }
                }
            }
        }

        let mut out = Vec::with_capacity(MAGIC.len() + 16 + payload.len());
        out.extend_from_slice(MAGIC);
        put_u32(&mut out, FORMAT_VERSION);
        put_u64(&mut out, payload.len() as u64);
        put_u32(&mut out, crc32fast::hash(&payload));
        out.extend_from_slice(&payload);
        out
    }

    /// Parse container file bytes, validating magic, version, and checksum.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> StorageResult<Self> {
        let path_str = path.display().to_string();
        let mut r = ByteReader::new(bytes, &path_str);

        let magic = r.take(MAGIC.len())?;
        ensure!(
            magic == &MAGIC[..],
            CorruptedSnafu {
                path: path_str.clone(),
                details: "bad magic".to_string(),
            }
        );
        let version = r.read_u32()?;
        ensure!(
            version == FORMAT_VERSION,
            CorruptedSnafu {
                path: path_str.clone(),
                details: format!("unsupported format version {version}"),
            }
        );
        let payload_len = r.read_u64()? as usize;
        let crc = r.read_u32()?;
        let payload = r.take(payload_len)?;
        ensure!(
            crc32fast::hash(payload) == crc,
            CorruptedSnafu {
                path: path_str.clone(),
                details: "checksum mismatch".to_string(),
            }
        );

        let mut r = ByteReader::new(payload, &path_str);
        let root = r.read_str()?;
        ensure!(
            root == ROOT_GROUP,
            CorruptedSnafu {
                path: path_str.clone(),
                details: format!("unexpected root group '{root}'"),
            }
        );

        let count = r.read_u32()?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let name = r.read_str()?;
            let kind = r.read_u8()?;
            let entry = match kind {
                KIND_JSON => Entry::Json(r.read_blob()?.to_vec()),
                KIND_TABLE_GROUP => {
                    let table = r.read_blob()?.to_vec();
                    let header = match r.read_u8()? {
                        0 => None,
                        _ => Some(r.read_blob()?.to_vec()),
                    };
                    Entry::TableGroup { table, header }
                }
                other => {
                    return CorruptedSnafu {
                        path: path_str.clone(),
                        details: format!("unknown entry kind {other}"),
                    }
                    .fail();
                }
            };
            entries.insert(name, entry);
        }
        Ok(Container { entries })
    }
}

const KIND_JSON: u8 = 1;
const KIND_TABLE_GROUP: u8 = 2;

const DTYPE_I32: u8 = 1;
const DTYPE_I64: u8 = 2;
const DTYPE_F32: u8 = 3;
const DTYPE_F64: u8 = 4;
const DTYPE_BOOL: u8 = 5;
const DTYPE_UTF8: u8 = 6;

/// Encode a table into the container's dense column block.
///
/// This is the write path that cannot accept nullable integers: the block
/// has no missing-value channel, so masked `Int32`/`Int64` columns fail
/// with `FormatLimitation` (the backend widens them to floats first).
/// Masked booleans and strings have no NaN equivalent and are refused the
/// same way. Masked floats encode as NaN.
pub fn encode_columns(table: &Table, name: &str) -> StorageResult<Vec<u8>> {
    let mut buf = Vec::new();
    put_u32(&mut buf, table.n_columns() as u32);
    put_u64(&mut buf, table.n_rows() as u64);

    for col in table.columns() {
        let dtype = col.dtype().map_err(|e| {
            SchemaSnafu {
                name,
                details: e.to_string(),
            }
            .build()
        })?;
        if col.has_nulls() && !matches!(dtype, ColumnDtype::Float32 | ColumnDtype::Float64) {
            return FormatLimitationSnafu {
                backend: BACKEND_NAME,
                name,
                details: format!(
                    "column '{}' is a nullable {} and the column block has no missing-value channel",
                    col.name(),
                    dtype
                ),
            }
            .fail();
        }

        put_str(&mut buf, col.name());
        match dtype {
            ColumnDtype::Int32 => {
                buf.push(DTYPE_I32);
                let array = col.data().as_primitive::<Int32Type>();
                for i in 0..array.len() {
                    buf.extend_from_slice(&array.value(i).to_le_bytes());
                }
            }
            ColumnDtype::Int64 => {
                buf.push(DTYPE_I64);
                let array = col.data().as_primitive::<Int64Type>();
                for i in 0..array.len() {
                    buf.extend_from_slice(&array.value(i).to_le_bytes());
                }
            }
            ColumnDtype::Float32 => {
                buf.push(DTYPE_F32);
                let array = col.data().as_primitive::<Float32Type>();
                for i in 0..array.len() {
                    let v = if array.is_null(i) {
                        f32::NAN
                    } else {
                        array.value(i)
                    };
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
            ColumnDtype::Float64 => {
                buf.push(DTYPE_F64);
                let array = col.data().as_primitive::<Float64Type>();
                for i in 0..array.len() {
                    let v = if array.is_null(i) {
                        f64::NAN
                    } else {
                        array.value(i)
                    };
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
            ColumnDtype::Bool => {
                buf.push(DTYPE_BOOL);
                let array = col.data().as_boolean();
                for i in 0..array.len() {
                    buf.push(u8::from(array.value(i)));
                }
            }
            ColumnDtype::Utf8 => {
                buf.push(DTYPE_UTF8);
                let array = col.data().as_string::<i32>();
                for i in 0..array.len() {
                    put_str(&mut buf, array.value(i));
                }
            }
        }
    }
    Ok(buf)
}

/// Decode a dense column block back into a bare table.
///
/// Columns come back without metadata; the backend applies the stored
/// header blob afterwards. Floats come back with NaN where missing values
/// were encoded; the mask itself is not recoverable.
pub fn decode_columns(bytes: &[u8], name: &str) -> StorageResult<Table> {
    let context = format!("column block of '{name}'");
    let mut r = ByteReader::new(bytes, &context);

    let n_cols = r.read_u32()? as usize;
    let n_rows = r.read_u64()? as usize;

    let mut columns = Vec::with_capacity(n_cols);
    for _ in 0..n_cols {
        let col_name = r.read_str()?;
        let tag = r.read_u8()?;
        let data: ArrayRef = match tag {
            DTYPE_I32 => {
                let raw = r.take(n_rows.saturating_mul(4))?;
                let values: Vec<i32> = raw
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Arc::new(Int32Array::from(values))
            }
            DTYPE_I64 => {
                let raw = r.take(n_rows.saturating_mul(8))?;
                let values: Vec<i64> = raw
                    .chunks_exact(8)
                    .map(|c| {
                        i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                    })
                    .collect();
                Arc::new(Int64Array::from(values))
            }
            DTYPE_F32 => {
                let raw = r.take(n_rows.saturating_mul(4))?;
                let values: Vec<f32> = raw
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Arc::new(Float32Array::from(values))
            }
            DTYPE_F64 => {
                let raw = r.take(n_rows.saturating_mul(8))?;
                let values: Vec<f64> = raw
                    .chunks_exact(8)
                    .map(|c| {
                        f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                    })
                    .collect();
                Arc::new(Float64Array::from(values))
            }
            DTYPE_BOOL => {
                let raw = r.take(n_rows)?;
                let values: Vec<bool> = raw.iter().map(|b| *b != 0).collect();
                Arc::new(BooleanArray::from(values))
            }
            DTYPE_UTF8 => {
                let mut values = Vec::with_capacity(n_rows);
                for _ in 0..n_rows {
                    values.push(r.read_str()?);
                }
                Arc::new(StringArray::from_iter_values(values))
            }
            other => {
                return CorruptedSnafu {
                    path: context,
                    details: format!("unknown dtype tag {other}"),
                }
                .fail();
            }
        };
        columns.push(Column::new(col_name, data));
    }

    Table::new(columns).map_err(|e| {
        SchemaSnafu {
            name,
            details: e.to_string(),
        }
        .build()
    })
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn put_blob(buf: &mut Vec<u8>, b: &[u8]) {
    put_u64(buf, b.len() as u64);
    buf.extend_from_slice(b);
}

/// Bounds-checked little-endian reader over a byte slice.
struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    path: &'a str,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8], path: &'a str) -> Self {
        ByteReader { buf, pos: 0, path }
    }

    fn take(&mut self, n: usize) -> StorageResult<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len());
        match end {
            Some(end) => {
                let out = &self.buf[self.pos..end];
                self.pos = end;
                Ok(out)
            }
            None => CorruptedSnafu {
                path: self.path.to_string(),
                details: "unexpected end of data".to_string(),
            }
            .fail(),
        }
    }

    fn read_u8(&mut self) -> StorageResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> StorageResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> StorageResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_str(&mut self) -> StorageResult<String> {
        let len = self.read_u32()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| {
            CorruptedSnafu {
                path: self.path.to_string(),
                details: "invalid UTF-8 in string field".to_string(),
            }
            .build()
        })
    }

    fn read_blob(&mut self) -> StorageResult<&'a [u8]> {
        let len = self.read_u64()? as usize;
        self.take(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    fn sample_block_table() -> Table {
        Table::new(vec![
            Column::utf8("name", ["a", "b"]),
            Column::int64("id", vec![10, 20]),
            Column::float64_opt("flux", vec![Some(1.5), None]),
            Column::bool("ok", vec![true, false]),
        ])
        .expect("valid table")
    }

    #[test]
    fn column_block_roundtrip() {
        let table = sample_block_table();
        let block = encode_columns(&table, "t").expect("encode");
        let back = decode_columns(&block, "t").expect("decode");

        assert_eq!(back.n_rows(), 2);
        assert_eq!(back.column_names(), vec!["name", "id", "flux", "ok"]);
        // Masked float came back as a NaN value, not a mask.
        let flux = back.column("flux").unwrap().data().as_primitive::<Float64Type>();
        assert_eq!(flux.null_count(), 0);
        assert!(flux.value(1).is_nan());
    }

    #[test]
    fn column_block_rejects_nullable_integers() {
        let table =
            Table::new(vec![Column::int64_opt("id", vec![Some(1), None])]).expect("valid table");
        let err = encode_columns(&table, "t").unwrap_err();
        assert!(matches!(err, StorageError::FormatLimitation { .. }));
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn column_block_rejects_masked_strings_and_bools() {
        let strings =
            Table::new(vec![Column::utf8_opt("s", vec![Some("x"), None])]).expect("valid table");
        assert!(matches!(
            encode_columns(&strings, "t").unwrap_err(),
            StorageError::FormatLimitation { .. }
        ));

        let bools =
            Table::new(vec![Column::bool_opt("b", vec![Some(true), None])]).expect("valid table");
        assert!(matches!(
            encode_columns(&bools, "t").unwrap_err(),
            StorageError::FormatLimitation { .. }
        ));
    }

    #[test]
    fn container_file_roundtrip() {
        let mut container = Container::new();
        container
            .insert_json("config", br#"{"a": 1}"#.to_vec())
            .expect("insert json");
        let block = encode_columns(&sample_block_table(), "stars").expect("encode");
        container
            .insert_table("stars", block, Some(b"{}".to_vec()))
            .expect("insert table");

        let bytes = container.to_bytes();
        let back = Container::from_bytes(&bytes, Path::new("test.tabstor")).expect("parse");

        assert!(back.contains_json("config"));
        assert!(back.contains_table("stars"));
        assert_eq!(back.json("config"), Some(br#"{"a": 1}"#.as_slice()));
        assert_eq!(back.table_header("stars"), Some(b"{}".as_slice()));
    }

    #[test]
    fn container_insert_refuses_occupied_path() {
        let mut container = Container::new();
        container.insert_json("x", b"1".to_vec()).expect("first");

        let err = container.insert_json("x", b"2".to_vec()).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { name, .. } if name == "x"));

        // The name space is shared across kinds: a table cannot take the
        // same path either.
        let err = container.insert_table("x", Vec::new(), None).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        assert!(container.remove("x"));
        container.insert_json("x", b"2".to_vec()).expect("after remove");
    }

    #[test]
    fn container_detects_corruption() {
        let mut container = Container::new();
        container.insert_json("doc", b"[]".to_vec()).expect("insert");
        let mut bytes = container.to_bytes();

        // Flip a payload byte: checksum must catch it.
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = Container::from_bytes(&bytes, Path::new("bad.tabstor")).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { .. }));

        // Garbage magic fails fast.
        let err = Container::from_bytes(b"NOTAFILE", Path::new("bad.tabstor")).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { .. }));
    }

    #[test]
    fn structure_lists_groups_and_datasets() {
        let mut container = Container::new();
        container.insert_json("json_data", b"{}".to_vec()).expect("insert");
        let block = encode_columns(&sample_block_table(), "test_stars").expect("encode");
        container
            .insert_table("test_stars", block, Some(b"{}".to_vec()))
            .expect("insert table");

        let structure = container.structure();
        assert!(structure.contains(&"DATASET /tabstore/json_data".to_string()));
        assert!(structure.contains(&"GROUP /tabstore/test_stars".to_string()));
        assert!(structure.contains(&"DATASET /tabstore/test_stars/table".to_string()));
        assert!(structure.contains(&"DATASET /tabstore/test_stars/header".to_string()));
    }
}
