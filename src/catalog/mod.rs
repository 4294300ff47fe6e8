//! The catalog: records, the two stores, and the reconciliation view.
//!
//! Two independently-mutable stores hold the archive's state — a blob store
//! of PDF binaries and a metadata store of [`record::CatalogRecord`]s.
//! They can diverge (orphaned blobs, records with missing blobs);
//! [`reconcile`] unifies them into one consistent view on every read
//! instead of trying to keep them transactionally consistent on write.
//!
//! * [`record`]    — entities, location keys, blob-name derivation
//! * [`store`]     — the metadata-store trait and its backends
//! * [`blob`]      — the blob-store trait and the filesystem backend
//! * [`reconcile`] — matched/orphan computation, ordering, search

pub mod blob;
pub mod record;
pub mod reconcile;
pub mod store;
