//! Columnar Arrow IPC file codec.
//!
//! Values and validity masks round-trip through the IPC file natively;
//! units, descriptions, and time representations are deliberately *not*
//! written in-file, so readers must reattach them from the sidecar header.
//! This mirrors how the columnar format is used by the directory backend:
//! the data file is authoritative for values and types, the sidecar for
//! everything else.

use std::io::Cursor;

use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use snafu::prelude::*;

use crate::storage::error::{ArrowSnafu, SchemaSnafu};
use crate::storage::StorageResult;
use crate::table::Table;

/// Encode a table into Arrow IPC file bytes.
pub fn encode_table(table: &Table, name: &str) -> StorageResult<Vec<u8>> {
    let batch = table.to_record_batch().context(ArrowSnafu { name })?;
    let schema = batch.schema();

    let mut writer = FileWriter::try_new(Vec::new(), schema.as_ref()).context(ArrowSnafu { name })?;
    writer.write(&batch).context(ArrowSnafu { name })?;
    writer.finish().context(ArrowSnafu { name })?;
    writer.into_inner().context(ArrowSnafu { name })
}

/// Decode Arrow IPC file bytes back into a table.
///
/// Columns come back without units or descriptions; the caller applies
/// the sidecar header afterwards.
pub fn decode_table(bytes: &[u8], name: &str) -> StorageResult<Table> {
    let reader = FileReader::try_new(Cursor::new(bytes), None).context(ArrowSnafu { name })?;
    let schema = reader.schema();

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context(ArrowSnafu { name })?;
    let batch = if batches.is_empty() {
        RecordBatch::new_empty(schema)
    } else {
        arrow::compute::concat_batches(&schema, batches.iter()).context(ArrowSnafu { name })?
    };

    Table::from_record_batch(&batch).map_err(|e| {
        SchemaSnafu {
            name,
            details: e.to_string(),
        }
        .build()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn ipc_roundtrip_preserves_values_and_masks() {
        let table = Table::new(vec![
            Column::utf8("name", ["a", "b", "c"]),
            Column::int64_opt("id", vec![Some(1), None, Some(3)]),
            Column::float64("ra", vec![10.5, 20.3, 30.1]).with_unit("deg"),
        ])
        .expect("valid table");

        let bytes = encode_table(&table, "t").expect("encode");
        let back = decode_table(&bytes, "t").expect("decode");

        assert_eq!(back.n_rows(), 3);
        assert!(back.column("id").unwrap().data().is_null(1));
        // Units are not carried in-file.
        assert_eq!(back.column("ra").unwrap().unit(), None);
        assert_eq!(
            back.column("ra").unwrap().data().to_data(),
            table.column("ra").unwrap().data().to_data()
        );
    }

    #[test]
    fn ipc_roundtrip_of_zero_row_table() {
        let table = Table::new(vec![Column::float64("x", vec![])]).expect("valid table");
        let bytes = encode_table(&table, "t").expect("encode");
        let back = decode_table(&bytes, "t").expect("decode");
        assert_eq!(back.n_rows(), 0);
        assert_eq!(back.n_columns(), 1);
    }

    #[test]
    fn ipc_rejects_garbage_bytes() {
        assert!(decode_table(b"definitely not an ipc file", "t").is_err());
    }
}
