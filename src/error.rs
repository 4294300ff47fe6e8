//! Error types for the scanvault library.
//!
//! One enum, [`CatalogError`], covers every failure the catalog can report.
//! Each variant maps onto exactly one [`ErrorKind`] so transport layers can
//! return a machine-readable kind alongside the human-readable message
//! without matching on individual variants.
//!
//! The kinds split along the same seams as the pipeline stages:
//!
//! * `Validation` / `Conflict` — rejected before any processing stage runs;
//!   user-correctable.
//! * `Conversion` / `Recognition` / `Synthesis` — a processing stage failed;
//!   the failing stage is identifiable from the kind alone.
//! * `Storage` — blob or metadata store unreachable or refused a write.
//! * `NotFound` — a delete or fetch referenced a name that does not exist.
//!
//! Repair failures never appear here: the repair stage degrades to a
//! pass-through copy and logs instead of propagating (see
//! [`crate::pipeline::repair`]).

use std::path::PathBuf;
use thiserror::Error;

/// Machine-readable classification of a [`CatalogError`].
///
/// Serialised alongside the display message in API-facing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed request fields; nothing was processed.
    Validation,
    /// The location key (group, folder, document number) is already occupied.
    Conflict,
    /// The PDF could not be parsed or rasterised.
    Conversion,
    /// The recognition engine failed on a page image.
    Recognition,
    /// A synthesized artifact could not be produced or written.
    Synthesis,
    /// Blob store or metadata store failure.
    Storage,
    /// The named blob or artifact does not exist.
    NotFound,
    /// Unexpected internal error.
    Internal,
}

/// All errors returned by the scanvault library.
#[derive(Debug, Error)]
pub enum CatalogError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// A required field was missing or empty.
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    /// `folder` or `document_number` contained non-digit characters.
    #[error("Field '{field}' must be numeric, got '{value}'")]
    NotNumeric { field: &'static str, value: String },

    /// The uploaded bytes are not a PDF.
    #[error("Upload '{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: [u8; 4] },

    // ── Conflict errors ───────────────────────────────────────────────────
    /// Another record already occupies the (group, folder, document number)
    /// slot. The check is read-then-insert against the metadata store; two
    /// concurrent ingests can both pass it (see DESIGN.md).
    #[error(
        "Document number {document_number} is already occupied for group '{group}', folder {folder}"
    )]
    LocationOccupied {
        group: String,
        folder: String,
        document_number: String,
    },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    /// By the time rasterisation runs the repair stage has already had its
    /// chance, so this is terminal for the ingestion.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Recognition errors ────────────────────────────────────────────────
    /// The OCR engine failed on a page image (engine-level failure, not an
    /// empty result — a blank page recognises to an empty string).
    #[error("Text recognition failed for page {page}: {detail}")]
    RecognitionFailed { page: usize, detail: String },

    /// The recognition engine binary could not be executed at all.
    #[error("Recognition engine '{engine}' could not be run: {detail}\nCheck it is installed and on PATH.")]
    EngineUnavailable { engine: String, detail: String },

    // ── Synthesis errors ──────────────────────────────────────────────────
    /// A generated artifact could not be encoded.
    #[error("Failed to synthesize {format} artifact: {detail}")]
    SynthesisFailed { format: &'static str, detail: String },

    /// The artifact output path was not writable.
    #[error("Failed to write artifact '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Blob store I/O failure (put, delete, or listing).
    #[error("Blob store operation failed for '{name}': {source}")]
    BlobIo {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Metadata store failure (insert, query, or delete).
    #[error("Metadata store operation failed: {detail}")]
    StoreFailed { detail: String },

    // ── Not-found errors ──────────────────────────────────────────────────
    /// Delete referenced a blob that does not exist.
    #[error("Blob not found: '{name}'")]
    BlobNotFound { name: String },

    /// FetchArtifact referenced a handle with no backing file.
    #[error("Artifact not found: '{name}'")]
    ArtifactNotFound { name: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// The machine-readable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::MissingField { .. }
            | CatalogError::NotNumeric { .. }
            | CatalogError::NotAPdf { .. } => ErrorKind::Validation,
            CatalogError::LocationOccupied { .. } => ErrorKind::Conflict,
            CatalogError::CorruptPdf { .. } | CatalogError::RasterisationFailed { .. } => {
                ErrorKind::Conversion
            }
            CatalogError::RecognitionFailed { .. } | CatalogError::EngineUnavailable { .. } => {
                ErrorKind::Recognition
            }
            CatalogError::SynthesisFailed { .. } | CatalogError::ArtifactWriteFailed { .. } => {
                ErrorKind::Synthesis
            }
            CatalogError::BlobIo { .. } | CatalogError::StoreFailed { .. } => ErrorKind::Storage,
            CatalogError::BlobNotFound { .. } | CatalogError::ArtifactNotFound { .. } => {
                ErrorKind::NotFound
            }
            CatalogError::Internal(_) => ErrorKind::Internal,
        }
    }
}
