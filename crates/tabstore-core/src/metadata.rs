//! Column-level metadata independent of any storage backend.
//!
//! This module models everything a backend needs to know about a column
//! besides its values:
//!
//! - [`ColumnDtype`], the closed set of element types the persistence layer
//!   supports, with conversions to and from Arrow data types.
//! - [`TimeInfo`], the temporal representation and scale attached to time
//!   columns (for example, `jd`/`tdb`).
//! - [`ColumnHeader`] and [`TableHeader`], the per-column metadata mapping
//!   that is serialized as a JSON object keyed by column name and stored
//!   alongside every table artifact.
//!
//! Everything here is pure data plus (de)serialization; no I/O happens in
//! this module.

pub mod dtype;
pub mod header;

pub use dtype::ColumnDtype;
pub use header::{ColumnHeader, TableHeader, TimeInfo};
