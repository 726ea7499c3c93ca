//! Typed-table persistence for scientific tabular datasets.
//!
//! This crate provides one abstract contract for saving and loading
//! tables of named columns carrying physical units, element datatypes,
//! per-row missing-value masks, and temporal representations, across
//! four incompatible physical storage backends:
//!
//! - A header/schema model describing column-level metadata independently
//!   of any backend (`metadata` module).
//! - A `Table` abstraction over Arrow arrays that the contract moves in
//!   and out of storage (`table` module).
//! - The `Storage` trait with shared existence/overwrite/not-found
//!   semantics and the common error taxonomy (`storage` module).
//! - Pure codecs for the physical formats: columnar Arrow IPC,
//!   self-describing annotated CSV, and a crc-checked single-file
//!   container (`formats` module).
//! - The four conforming backends: columnar directory, row-text
//!   directory, hierarchical container, and in-memory (`backend` module).
//!
//! Callers choose a backend at construction time and talk through the
//! trait; domain logic, downloaders, and pipelines are expected to depend
//! on this core crate rather than on any physical layout.
#![deny(missing_docs)]
pub mod backend;
pub mod formats;
pub mod metadata;
pub mod prelude;
pub mod storage;
pub mod table;
