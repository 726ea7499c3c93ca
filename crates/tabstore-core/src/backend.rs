//! The four concrete [`crate::storage::Storage`] implementations.
//!
//! - [`directory::IpcStorage`]: columnar Arrow IPC files in a directory,
//!   one data file plus one JSON header sidecar per table.
//! - [`directory::CsvStorage`]: self-describing annotated CSV in the same
//!   directory layout.
//! - [`container::ContainerStorage`]: a single hierarchical container
//!   file with internal named groups.
//! - [`memory::MemoryStorage`]: a process-local keyed store for tests and
//!   zero-I/O pipelines.
//!
//! Backends are chosen by the caller at construction time; shared logic
//! never switches on which one it got.

pub mod container;
pub mod directory;
pub mod memory;

pub use container::ContainerStorage;
pub use directory::{CsvStorage, IpcStorage};
pub use memory::{MemoryStorage, MemoryStore};
