//! Metadata store abstraction.
//!
//! [`CatalogStore`] is the document-collection interface the catalog core
//! consumes: insert, query-all (newest first), delete. Nothing richer —
//! uniqueness checks and reconciliation filter client-side over
//! `query_all`, which bounds scalability but keeps every backend trivial
//! to implement.
//!
//! Implementations must be `Send + Sync`; all operations are async via
//! `async-trait`. Two backends ship with the crate:
//!
//! * [`JsonFileStore`] — one JSON document collection on disk, opened
//!   explicitly at process start and reused for the process lifetime.
//! * [`MemoryStore`] — in-process vector, for tests and embedding.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::record::CatalogRecord;
use crate::error::CatalogError;

/// Abstract metadata store holding [`CatalogRecord`]s.
///
/// The interface deliberately exposes no update and no query-by-key: the
/// core fetches all records and filters in memory. A backend with a unique
/// index on the location key may enforce uniqueness at insert and surface
/// violations as [`CatalogError::LocationOccupied`]; the shipped backends
/// do not (see DESIGN.md on the check-then-insert race).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a record, assigning and returning its store identity.
    async fn insert(&self, record: CatalogRecord) -> Result<String, CatalogError>;

    /// All records, ordered by `uploaded_at` descending (newest first).
    async fn query_all(&self) -> Result<Vec<CatalogRecord>, CatalogError>;

    /// Remove the record with the given id. Removing an id that does not
    /// exist is a no-op, not an error.
    async fn delete(&self, id: &str) -> Result<(), CatalogError>;
}

fn sort_newest_first(records: &mut [CatalogRecord]) {
    records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
}

// ── JSON file backend ────────────────────────────────────────────────────

/// A metadata store persisted as a single JSON array on disk.
///
/// Writes are atomic (temp file + rename) so a crash mid-write never
/// leaves a half-serialised collection behind. The whole collection is
/// held in memory behind a mutex; this matches the catalog's scale
/// assumptions (client-side filtering over `query_all`).
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<Vec<CatalogRecord>>,
}

impl JsonFileStore {
    /// Open (or create) the collection file at `path`.
    ///
    /// Called once at process start; the returned store is shared for the
    /// process lifetime. A missing file is an empty collection.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| CatalogError::StoreFailed {
                detail: format!("collection file '{}' is corrupt: {e}", path.display()),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(CatalogError::StoreFailed {
                    detail: format!("cannot read collection file '{}': {e}", path.display()),
                })
            }
        };
        info!(
            "Opened catalog collection '{}' ({} records)",
            path.display(),
            records.len()
        );
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Serialise the collection atomically: write a sibling temp file then
    /// rename over the real one.
    async fn persist(&self, records: &[CatalogRecord]) -> Result<(), CatalogError> {
        let bytes =
            serde_json::to_vec_pretty(records).map_err(|e| CatalogError::StoreFailed {
                detail: format!("serialisation failed: {e}"),
            })?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CatalogError::StoreFailed {
                    detail: format!("cannot create '{}': {e}", parent.display()),
                })?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| CatalogError::StoreFailed {
                detail: format!("cannot write '{}': {e}", tmp_path.display()),
            })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| CatalogError::StoreFailed {
                detail: format!("cannot replace '{}': {e}", self.path.display()),
            })
    }
}

#[async_trait]
impl CatalogStore for JsonFileStore {
    async fn insert(&self, mut record: CatalogRecord) -> Result<String, CatalogError> {
        let id = Uuid::new_v4().to_string();
        record.id = id.clone();

        let mut records = self.records.lock().await;
        records.push(record);
        self.persist(&records).await?;
        debug!("Inserted catalog record {id}");
        Ok(id)
    }

    async fn query_all(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        let records = self.records.lock().await;
        let mut out = records.clone();
        sort_newest_first(&mut out);
        Ok(out)
    }

    async fn delete(&self, id: &str) -> Result<(), CatalogError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() != before {
            self.persist(&records).await?;
            debug!("Deleted catalog record {id}");
        }
        Ok(())
    }
}

// ── In-memory backend ────────────────────────────────────────────────────

/// In-process metadata store. Returns immediately-ready futures; used in
/// tests and by embedders that manage their own persistence.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<CatalogRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert(&self, mut record: CatalogRecord) -> Result<String, CatalogError> {
        let id = Uuid::new_v4().to_string();
        record.id = id.clone();
        self.records.lock().await.push(record);
        Ok(id)
    }

    async fn query_all(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        let mut out = self.records.lock().await.clone();
        sort_newest_first(&mut out);
        Ok(out)
    }

    async fn delete(&self, id: &str) -> Result<(), CatalogError> {
        self.records.lock().await.retain(|r| r.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::record::LocationKey;
    use chrono::{Duration, Utc};

    fn record(title: &str, offset_secs: i64) -> CatalogRecord {
        CatalogRecord {
            id: String::new(),
            title: title.into(),
            category: String::new(),
            extracted_text: "text".into(),
            blob_path: format!("/uploads/{title}.pdf"),
            original_blob_name: None,
            location: LocationKey::new("G1", "1", format!("{offset_secs}")).unwrap(),
            uploaded_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn memory_store_assigns_ids_and_sorts_newest_first() {
        let store = MemoryStore::new();
        let id_old = store.insert(record("old", 0)).await.unwrap();
        let id_new = store.insert(record("new", 60)).await.unwrap();
        assert_ne!(id_old, id_new);

        let all = store.query_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "new");
        assert_eq!(all[1].title, "old");
    }

    #[tokio::test]
    async fn memory_store_delete_is_idempotent() {
        let store = MemoryStore::new();
        let id = store.insert(record("doc", 0)).await.unwrap();
        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(store.query_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_store_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.insert(record("persisted", 0)).await.unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let all = reopened.query_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "persisted");
        assert!(!all[0].id.is_empty());
    }

    #[tokio::test]
    async fn json_store_missing_file_is_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("new.json")).await.unwrap();
        assert!(store.query_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_store_delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let id = {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.insert(record("doomed", 0)).await.unwrap()
        };

        let store = JsonFileStore::open(&path).await.unwrap();
        store.delete(&id).await.unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert!(reopened.query_all().await.unwrap().is_empty());
    }
}
