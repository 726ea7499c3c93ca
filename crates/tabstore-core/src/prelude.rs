//! Convenience re-exports of the types most callers need.

pub use crate::backend::{ContainerStorage, CsvStorage, IpcStorage, MemoryStorage, MemoryStore};
pub use crate::metadata::{ColumnDtype, ColumnHeader, TableHeader, TimeInfo};
pub use crate::storage::{Storage, StorageError, StorageResult};
pub use crate::table::{Column, Table};
