//! Pure codecs between [`crate::table::Table`] and physical bytes.
//!
//! Each submodule owns one physical representation and nothing else: no
//! paths, no existence checks, no sidecar handling; that is backend
//! business. The split keeps format quirks (what survives in-file, what
//! needs the sidecar, what cannot be represented at all) in one place per
//! format:
//!
//! - [`ipc`]: columnar Arrow IPC files. Values and masks survive in-file;
//!   units, descriptions, and time representations do not.
//! - [`csv`]: self-describing annotated CSV. A `#`-prefixed JSON schema
//!   line carries dtypes and metadata; masks encode as empty fields.
//! - [`container`]: the single-file hierarchical container and its dense
//!   column block, which has no missing-value channel for integers,
//!   booleans, or strings.

pub mod container;
pub mod csv;
pub mod ipc;
