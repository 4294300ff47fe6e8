//! # scanvault
//!
//! Ingest scanned PDF documents, recover machine-readable text via OCR,
//! and maintain a catalog addressable by physical archive location
//! (group, folder, document number).
//!
//! ## Why this crate?
//!
//! Scanned civil archives arrive as malformed, image-only PDFs. Text
//! extraction tools that read the PDF text layer find nothing; the pages
//! are pictures. scanvault rasterises each page, binarises it, runs a
//! recognition engine over it, and regenerates a formatted PDF and DOCX
//! from the recovered text — while keeping a location-keyed catalog
//! consistent across two independently-mutable stores: a blob store of
//! PDF binaries and a metadata store of structured records.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Validate   presence, location fields, digits, slot uniqueness
//!  ├─ 2. Repair     best-effort qpdf pass, degrades to a verbatim copy
//!  ├─ 3. Render     rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 4. Recognize  grayscale + threshold, then tesseract per page
//!  ├─ 5. Synthesize regenerated PDF + DOCX from one paragraph split
//!  └─ 6. Commit     catalog record; artifacts offered as downloads
//! ```
//!
//! The stores can diverge — blobs with no record ("orphans"), records
//! whose blob vanished — so listings are produced by reconciliation: both
//! stores are read and merged into one view on every request rather than
//! kept transactionally consistent on writes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanvault::{CatalogService, IngestRequest, JsonFileStore, ServiceConfig, UploadedFile};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(JsonFileStore::open("./catalog.json").await?);
//!     let service = CatalogService::open(ServiceConfig::default(), store).await?;
//!
//!     let receipt = service
//!         .ingest(IngestRequest {
//!             pdf: UploadedFile::new("scan.pdf", std::fs::read("scan.pdf")?),
//!             group: "G1".into(),
//!             folder: "3".into(),
//!             document_number: "7".into(),
//!             original: None,
//!         })
//!         .await?;
//!     println!("committed {}", receipt.blob_path);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scanvault` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! scanvault = { version = "0.3", default-features = false }
//! ```
//!
//! ## External tools
//!
//! The repair and recognition stages shell out to `qpdf` and `tesseract`.
//! Both are probed at service startup: a missing `qpdf` downgrades repair
//! to a pass-through copy (by policy, not error); a missing `tesseract`
//! fails recognition with a [`CatalogError::EngineUnavailable`] the first
//! time a page is processed. Rasterisation binds `pdfium` in-process.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use catalog::blob::{BlobStore, FsBlobStore};
pub use catalog::record::{
    derive_blob_name, derive_original_name, CatalogRecord, LocationKey, RECONSTRUCTED_TEXT,
};
pub use catalog::reconcile::{CatalogView, MatchedEntry, OrphanEntry};
pub use catalog::store::{CatalogStore, JsonFileStore, MemoryStore};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{CatalogError, ErrorKind};
pub use pipeline::ingest::IngestStage;
pub use pipeline::recognize::{Recognizer, TesseractRecognizer};
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use pipeline::repair::{CopyRepairer, QpdfRepairer, Repairer};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::{
    ArtifactHandle, CatalogService, CommitReceipt, IngestReceipt, IngestRequest, PreviewReceipt,
    ReconstructedRequest, UploadedFile,
};
