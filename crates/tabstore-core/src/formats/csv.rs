//! Self-describing annotated CSV codec.
//!
//! The row-oriented text format embeds its own schema so a file is
//! readable without the sidecar header:
//!
//! ```text
//! # tabstore.csv 1
//! # schema: [{"name":"ra","dtype":"float64","nullable":false,"unit":"deg", ...}]
//! name,ra,dec
//! star1,10.5,-5.2
//! ```
//!
//! Missing values encode as empty fields. One known fidelity limit: a
//! masked string cell and an empty string cell are indistinguishable in
//! CSV, so string masks degrade to empty strings through this format.

use std::io::Cursor;
use std::sync::Arc;

use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::metadata::{ColumnDtype, TimeInfo};
use crate::storage::error::{ArrowSnafu, JsonSnafu, SchemaSnafu};
use crate::storage::StorageResult;
use crate::table::Table;

/// First comment line of every annotated CSV file.
const SIGNATURE: &str = "tabstore.csv 1";
/// Comment prefix of the embedded schema line.
const SCHEMA_PREFIX: &str = "schema:";

/// One column in the embedded schema line.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmbeddedField {
    name: String,
    dtype: ColumnDtype,
    nullable: bool,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    time_info: Option<TimeInfo>,
}

/// Encode a table into annotated CSV bytes.
pub fn encode_table(table: &Table, name: &str) -> StorageResult<Vec<u8>> {
    let mut fields = Vec::with_capacity(table.n_columns());
    for col in table.columns() {
        let dtype = col.dtype().map_err(|e| {
            SchemaSnafu {
                name,
                details: e.to_string(),
            }
            .build()
        })?;
        fields.push(EmbeddedField {
            name: col.name().to_string(),
            dtype,
            nullable: col.has_nulls(),
            unit: col.unit().map(str::to_string),
            description: col.description().map(str::to_string),
            time_info: col.time_info().cloned(),
        });
    }
    let schema_json = serde_json::to_string(&fields).context(JsonSnafu { name })?;

    let mut buf = Vec::new();
    buf.extend_from_slice(format!("# {SIGNATURE}\n").as_bytes());
    buf.extend_from_slice(format!("# {SCHEMA_PREFIX} {schema_json}\n").as_bytes());

    let batch = table.to_record_batch().context(ArrowSnafu { name })?;
    {
        let mut writer = WriterBuilder::new().with_header(true).build(&mut buf);
        writer.write(&batch).context(ArrowSnafu { name })?;
    }
    Ok(buf)
}

/// Decode annotated CSV bytes back into a table.
///
/// The embedded schema line is the primary metadata source; the backend
/// applies the sidecar header on top of the result when one exists.
pub fn decode_table(bytes: &[u8], name: &str) -> StorageResult<Table> {
    let text = std::str::from_utf8(bytes).map_err(|e| {
        SchemaSnafu {
            name,
            details: format!("file is not valid UTF-8: {e}"),
        }
        .build()
    })?;

    // Consume leading comment lines; everything after them is CSV body.
    let mut embedded: Option<Vec<EmbeddedField>> = None;
    let mut signed = false;
    let mut offset = 0;
    while text[offset..].starts_with('#') {
        let line_end = text[offset..]
            .find('\n')
            .map(|i| offset + i + 1)
            .unwrap_or(text.len());
        let comment = text[offset..line_end].trim_start_matches('#').trim();
        if comment == SIGNATURE {
            signed = true;
        } else if let Some(json) = comment.strip_prefix(SCHEMA_PREFIX) {
            let fields: Vec<EmbeddedField> =
                serde_json::from_str(json.trim()).context(JsonSnafu { name })?;
            embedded = Some(fields);
        }
        offset = line_end;
    }
    ensure!(
        signed,
        SchemaSnafu {
            name,
            details: format!("missing '{SIGNATURE}' signature line"),
        }
    );
    let embedded = embedded.ok_or_else(|| {
        SchemaSnafu {
            name,
            details: "missing embedded schema line".to_string(),
        }
        .build()
    })?;
    let body = &text[offset..];

    let arrow_fields: Vec<Field> = embedded
        .iter()
        .map(|f| Field::new(f.name.clone(), f.dtype.to_arrow(), f.nullable))
        .collect();
    let schema = Arc::new(Schema::new(arrow_fields));

    let reader = ReaderBuilder::new(schema.clone())
        .with_format(Format::default().with_header(true))
        .build(Cursor::new(body.as_bytes()))
        .context(ArrowSnafu { name })?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context(ArrowSnafu { name })?;
    let batch = if batches.is_empty() {
        RecordBatch::new_empty(schema.clone())
    } else {
        arrow::compute::concat_batches(&schema, batches.iter()).context(ArrowSnafu { name })?
    };

    let mut table = Table::from_record_batch(&batch).map_err(|e| {
        SchemaSnafu {
            name,
            details: e.to_string(),
        }
        .build()
    })?;

    // Reattach the metadata carried by the embedded schema.
    let mut header = crate::metadata::TableHeader::new();
    for f in &embedded {
        header.insert(
            f.name.clone(),
            crate::metadata::ColumnHeader {
                description: f.description.clone(),
                unit: f.unit.clone(),
                dtype: Some(f.dtype.as_str().to_string()),
                time_info: f.time_info.clone(),
            },
        );
    }
    table.apply_header(&header);
    Ok(table)
}
