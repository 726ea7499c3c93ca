//! Process-local in-memory backend for tests and zero-I/O pipelines.
//!
//! Artifacts live in a [`MemoryStore`]: a clonable handle to a shared map
//! keyed by `(namespace, artifact name, kind)`. Two backend instances
//! given the same store and the same namespace see each other's
//! artifacts; different namespaces are fully partitioned even within one
//! store. The store is an explicit value, not hidden global state: the
//! process-wide store behind [`MemoryStorage::new`] is one instance that
//! tests can fetch with [`MemoryStorage::shared_store`] and wipe with
//! [`MemoryStorage::clear_shared`].
//!
//! # Isolation
//!
//! JSON documents are deep-copied on write and on read. Tables are cloned
//! on both paths as well; their Arrow buffers are shared but immutable,
//! so a table obtained from [`crate::storage::Storage::read_table`] can
//! never be mutated in a way that reaches the stored artifact, and
//! vice versa.
//!
//! Concurrent reads are safe; concurrent writes to the same key are a
//! last-write-wins race the caller must serialize, same as every other
//! backend.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::metadata::TableHeader;
use crate::storage::error::{AlreadyExistsSnafu, NotFoundSnafu};
use crate::storage::{ensure_header_matches, Storage, StorageResult};
use crate::table::Table;

/// The process-wide store used by [`MemoryStorage::new`].
static PROCESS_STORE: Lazy<MemoryStore> = Lazy::new(MemoryStore::new);

/// Artifact kind discriminator within a store key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ArtifactKind {
    Json,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct StoreKey {
    namespace: String,
    name: String,
    kind: ArtifactKind,
}

#[derive(Debug, Clone)]
enum StoredArtifact {
    Json(Value),
    Table {
        table: Table,
        header: Option<TableHeader>,
    },
}

/// Clonable handle to a shared in-memory artifact map.
///
/// Cloning the handle shares the underlying map; construct a fresh
/// [`MemoryStore`] for a fully independent one.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<BTreeMap<StoreKey, StoredArtifact>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Remove every artifact in every namespace.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Total number of stored artifacts across all namespaces.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no artifacts at all.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<StoreKey, StoredArtifact>> {
        // A poisoned lock only means another thread panicked mid-access;
        // the map itself is still structurally sound.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-memory implementation of the storage contract.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    store: MemoryStore,
    namespace: String,
    root: PathBuf,
}

impl MemoryStorage {
    /// Create a backend on the process-wide shared store, partitioned
    /// under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        MemoryStorage::with_store(PROCESS_STORE.clone(), namespace)
    }

    /// Create a backend on an explicitly provided store.
    pub fn with_store(store: MemoryStore, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let root = PathBuf::from(format!("memory://{namespace}"));
        MemoryStorage {
            store,
            namespace,
            root,
        }
    }

    /// Handle to the process-wide store shared by [`MemoryStorage::new`]
    /// instances.
    pub fn shared_store() -> MemoryStore {
        PROCESS_STORE.clone()
    }

    /// Wipe the process-wide store. Intended for test setup.
    pub fn clear_shared() {
        PROCESS_STORE.clear();
    }

    /// The namespace this instance is partitioned under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, name: &str, kind: ArtifactKind) -> StoreKey {
        StoreKey {
            namespace: self.namespace.clone(),
            name: name.to_string(),
            kind,
        }
    }
}

impl Storage for MemoryStorage {
    fn root_path(&self) -> &Path {
        &self.root
    }

    fn write_json(&self, data: &Value, name: &str, overwrite: bool) -> StorageResult<()> {
        let key = self.key(name, ArtifactKind::Json);
        let mut map = self.store.lock();
        if map.contains_key(&key) && !overwrite {
            return AlreadyExistsSnafu { name }.fail();
        }
        map.insert(key, StoredArtifact::Json(data.clone()));
        Ok(())
    }

    fn read_json(&self, name: &str) -> StorageResult<Value> {
        let map = self.store.lock();
        match map.get(&self.key(name, ArtifactKind::Json)) {
            Some(StoredArtifact::Json(value)) => Ok(value.clone()),
            _ => NotFoundSnafu { name }.fail(),
        }
    }

    fn write_table(
        &self,
        table: &Table,
        header: &TableHeader,
        name: &str,
        overwrite: bool,
    ) -> StorageResult<()> {
        ensure_header_matches(table, header, name)?;

        let key = self.key(name, ArtifactKind::Table);
        let mut map = self.store.lock();
        if map.contains_key(&key) && !overwrite {
            return AlreadyExistsSnafu { name }.fail();
        }
        let stored_header = if header.is_empty() {
            None
        } else {
            Some(header.clone())
        };
        map.insert(
            key,
            StoredArtifact::Table {
                table: table.clone(),
                header: stored_header,
            },
        );
        Ok(())
    }

    fn read_table(&self, name: &str) -> StorageResult<Table> {
        let map = self.store.lock();
        match map.get(&self.key(name, ArtifactKind::Table)) {
            Some(StoredArtifact::Table { table, header }) => {
                let mut out = table.clone();
                if let Some(header) = header {
                    out.apply_header(header);
                }
                Ok(out)
            }
            _ => NotFoundSnafu { name }.fail(),
        }
    }

    fn read_table_header(&self, name: &str) -> StorageResult<Option<TableHeader>> {
        let map = self.store.lock();
        match map.get(&self.key(name, ArtifactKind::Table)) {
            Some(StoredArtifact::Table { header, .. }) => Ok(header.clone()),
            _ => Ok(None),
        }
    }
}
