//! The transport-agnostic catalog operations.
//!
//! [`CatalogService`] owns the two stores and the pipeline engines and
//! exposes the full operation surface: ingest, preview ("fix" mode),
//! reconstructed commit, catalog listing, delete, artifact fetch. A
//! transport layer maps these onto whatever protocol it likes; nothing in
//! here knows about HTTP.
//!
//! ## Ingest ordering
//!
//! Validation runs strictly before staging: PDF presence, location-field
//! presence, numeric format, then the uniqueness check against the
//! committed records. Only then is the upload staged into the blob store
//! and processed. A stage failure after staging deliberately leaves the
//! staged blob behind — it surfaces as an orphan in the catalog view and
//! the scan is not lost. The uniqueness check runs once more right before
//! commit; the check-then-insert gap is still a race (see DESIGN.md), the
//! re-check merely narrows it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::blob::{BlobStore, FsBlobStore};
use crate::catalog::record::{
    derive_blob_name, derive_original_name, file_stem, CatalogRecord, LocationKey,
    RECONSTRUCTED_TEXT,
};
use crate::catalog::reconcile::{build_view, original_candidates, CatalogView};
use crate::catalog::store::CatalogStore;
use crate::config::ServiceConfig;
use crate::error::CatalogError;
use crate::pipeline::ingest::{run_ocr_pipeline, IngestStage};
use crate::pipeline::recognize::{Recognizer, TesseractRecognizer};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::pipeline::repair::{self, Repairer};

/// An uploaded file: client-supplied name plus raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Inputs for the primary ingest operation.
#[derive(Debug)]
pub struct IngestRequest {
    pub pdf: UploadedFile,
    pub group: String,
    pub folder: String,
    pub document_number: String,
    /// Optional unprocessed secondary scan, kept for reference.
    pub original: Option<UploadedFile>,
}

/// Inputs for the reconstructed-commit operation: a PDF synthesized by an
/// earlier preview call, committed without re-running OCR.
#[derive(Debug)]
pub struct ReconstructedRequest {
    pub pdf: UploadedFile,
    pub original: Option<UploadedFile>,
    pub group: String,
    pub folder: String,
    pub document_number: String,
}

/// A short-lived reference to a synthesized artifact awaiting download.
/// Not part of the permanent catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub name: String,
}

/// Result of a successful ingest: the committed blob path plus download
/// handles for the two synthesized artifacts.
#[derive(Debug, Serialize)]
pub struct IngestReceipt {
    pub blob_path: String,
    pub ocr_pdf: ArtifactHandle,
    pub ocr_docx: ArtifactHandle,
}

/// Result of a preview ("fix") call: artifacts only, nothing committed.
#[derive(Debug, Serialize)]
pub struct PreviewReceipt {
    pub ocr_pdf: ArtifactHandle,
    pub ocr_docx: ArtifactHandle,
}

/// Result of a reconstructed commit.
#[derive(Debug, Serialize)]
pub struct CommitReceipt {
    pub blob_path: String,
    pub title: String,
    pub location: LocationKey,
}

/// The catalog service: stores + engines + config.
pub struct CatalogService {
    config: ServiceConfig,
    store: Arc<dyn CatalogStore>,
    uploads: Arc<dyn BlobStore>,
    originals: Arc<dyn BlobStore>,
    repairer: Arc<dyn Repairer>,
    rasterizer: Arc<dyn Rasterizer>,
    recognizer: Arc<dyn Recognizer>,
}

impl CatalogService {
    /// Open the service: create the store directories, resolve the
    /// pipeline engines, and probe repair-tool availability once.
    ///
    /// The metadata store is injected rather than constructed here so its
    /// lifecycle stays explicit: open it at process start, pass it in,
    /// close it at shutdown.
    pub async fn open(
        config: ServiceConfig,
        store: Arc<dyn CatalogStore>,
    ) -> Result<Self, CatalogError> {
        let uploads: Arc<dyn BlobStore> =
            Arc::new(FsBlobStore::open(&config.uploads_dir).await?);
        let originals: Arc<dyn BlobStore> =
            Arc::new(FsBlobStore::open(&config.originals_dir).await?);
        tokio::fs::create_dir_all(&config.results_dir)
            .await
            .map_err(|e| CatalogError::ArtifactWriteFailed {
                path: config.results_dir.clone(),
                source: e,
            })?;

        let repairer: Arc<dyn Repairer> = match config.repairer.clone() {
            Some(r) => r,
            None => Arc::from(repair::detect(&config.qpdf_path, config.repair_enabled).await),
        };
        let rasterizer: Arc<dyn Rasterizer> = config
            .rasterizer
            .clone()
            .unwrap_or_else(|| Arc::new(PdfiumRasterizer));
        let recognizer: Arc<dyn Recognizer> = config.recognizer.clone().unwrap_or_else(|| {
            Arc::new(TesseractRecognizer::new(
                &config.tesseract_path,
                &config.ocr_language,
            ))
        });

        info!(
            "Catalog service open (uploads: '{}', repairer: {})",
            config.uploads_dir.display(),
            repairer.name()
        );

        Ok(Self {
            config,
            store,
            uploads,
            originals,
            repairer,
            rasterizer,
            recognizer,
        })
    }

    fn notify_stage(&self, stage: IngestStage) {
        if let Some(ref cb) = self.config.progress {
            cb.on_stage_start(stage);
        }
    }

    /// Ingest one scanned PDF: validate, stage, run the OCR pipeline, and
    /// commit a catalog record.
    ///
    /// The record's blob is the *original* uploaded bytes; the synthesized
    /// PDF/DOCX are transient downloads, not the canonical stored artifact.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReceipt, CatalogError> {
        self.notify_stage(IngestStage::Received);

        // Validation, in contract order, all before anything is staged.
        validate_pdf_upload(&request.pdf)?;
        let location = LocationKey::new(
            request.group.clone(),
            request.folder.clone(),
            request.document_number.clone(),
        )?;
        self.ensure_location_free(&location).await?;

        // Stage the upload. From here on a processing failure leaves the
        // blob behind as a recoverable orphan rather than losing the scan.
        let staged_name = derive_blob_name(
            &request.pdf.name,
            Some(&location.document_number),
            Utc::now().timestamp_millis(),
        );
        self.uploads.put(&staged_name, &request.pdf.bytes).await?;
        info!("Staged upload '{}' for {}", staged_name, location);

        let processed = run_ocr_pipeline(
            self.repairer.as_ref(),
            self.rasterizer.as_ref(),
            self.recognizer.as_ref(),
            &self.config,
            &staged_name,
            &request.pdf.bytes,
            &self.config.results_dir,
        )
        .await?;

        // Re-check the slot right before commit. A concurrent ingest may
        // have taken it while OCR ran; losing here removes our staged blob
        // unless the winner's record references that very name.
        self.notify_stage(IngestStage::LocationCheck);
        if let Err(conflict) = self.ensure_location_free(&location).await {
            let referenced = self
                .store
                .query_all()
                .await?
                .iter()
                .any(|r| r.blob_file_name() == staged_name);
            if !referenced {
                if let Err(e) = self.uploads.delete(&staged_name).await {
                    warn!("Could not clean staged blob '{}': {e}", staged_name);
                }
            }
            return Err(conflict);
        }

        self.notify_stage(IngestStage::Committing);
        let original_blob_name = self.stash_original(request.original.as_ref()).await?;
        let blob_path = format!("/uploads/{staged_name}");
        let record = CatalogRecord {
            id: String::new(),
            title: file_stem(&request.pdf.name),
            category: String::new(),
            extracted_text: processed.text,
            blob_path: blob_path.clone(),
            original_blob_name,
            location: location.clone(),
            uploaded_at: Utc::now(),
        };
        let id = self.store.insert(record).await?;
        info!("Committed record {id} at {location} ({blob_path})");
        self.notify_stage(IngestStage::Done);

        Ok(IngestReceipt {
            blob_path,
            ocr_pdf: artifact_handle(&processed.pdf_artifact),
            ocr_docx: artifact_handle(&processed.docx_artifact),
        })
    }

    /// Preview ("fix") mode: run the full OCR pipeline but commit nothing.
    ///
    /// No blob is staged and no record is written; the only output is the
    /// pair of synthesized artifacts, intended to be inspected and then
    /// re-submitted via [`Self::commit_reconstructed`].
    pub async fn preview_fix(&self, pdf: UploadedFile) -> Result<PreviewReceipt, CatalogError> {
        self.notify_stage(IngestStage::Received);
        validate_pdf_upload(&pdf)?;

        let scratch_name = derive_blob_name(&pdf.name, None, Utc::now().timestamp_millis());
        let processed = run_ocr_pipeline(
            self.repairer.as_ref(),
            self.rasterizer.as_ref(),
            self.recognizer.as_ref(),
            &self.config,
            &scratch_name,
            &pdf.bytes,
            &self.config.results_dir,
        )
        .await?;
        self.notify_stage(IngestStage::Done);

        Ok(PreviewReceipt {
            ocr_pdf: artifact_handle(&processed.pdf_artifact),
            ocr_docx: artifact_handle(&processed.docx_artifact),
        })
    }

    /// Commit an already-synthesized PDF without re-running OCR.
    ///
    /// Same validation and uniqueness rules as [`Self::ingest`]; the
    /// stored `extracted_text` is a fixed placeholder because the text was
    /// produced upstream in the preview step.
    pub async fn commit_reconstructed(
        &self,
        request: ReconstructedRequest,
    ) -> Result<CommitReceipt, CatalogError> {
        validate_pdf_upload(&request.pdf)?;
        let location = LocationKey::new(
            request.group.clone(),
            request.folder.clone(),
            request.document_number.clone(),
        )?;
        self.ensure_location_free(&location).await?;

        let staged_name = derive_blob_name(
            &request.pdf.name,
            Some(&location.document_number),
            Utc::now().timestamp_millis(),
        );
        self.uploads.put(&staged_name, &request.pdf.bytes).await?;

        let original_blob_name = self.stash_original(request.original.as_ref()).await?;
        let title = file_stem(&request.pdf.name);
        let blob_path = format!("/uploads/{staged_name}");
        let record = CatalogRecord {
            id: String::new(),
            title: title.clone(),
            category: String::new(),
            extracted_text: RECONSTRUCTED_TEXT.to_string(),
            blob_path: blob_path.clone(),
            original_blob_name,
            location: location.clone(),
            uploaded_at: Utc::now(),
        };
        let id = self.store.insert(record).await?;
        info!("Committed reconstructed record {id} at {location}");

        Ok(CommitReceipt {
            blob_path,
            title,
            location,
        })
    }

    /// The reconciled catalog view, optionally filtered by a search query.
    pub async fn list_catalog(&self, query: Option<&str>) -> Result<CatalogView, CatalogError> {
        let files = self.uploads.list_names().await?;
        let records = self.store.query_all().await?;
        Ok(build_view(records, &files, query))
    }

    /// Delete a document by its blob filename.
    ///
    /// Best-effort and not transactional: the blob, the companion original
    /// and the record are removed in that order, and a failure partway
    /// leaves the earlier steps done. Fails with `NotFound` only when
    /// neither a blob nor a record answers to the name.
    pub async fn delete_by_blob_name(&self, name: &str) -> Result<(), CatalogError> {
        let existed = self.uploads.exists(name).await;
        if existed {
            self.uploads.delete(name).await?;
            info!("Deleted blob '{name}'");
        }

        let records = self.store.query_all().await?;
        match records.into_iter().find(|r| r.blob_file_name() == name) {
            Some(record) => {
                if let Some(ref orig) = record.original_blob_name {
                    if self.originals.exists(orig).await {
                        self.originals.delete(orig).await?;
                        info!("Deleted original blob '{orig}'");
                    }
                }
                self.store.delete(&record.id).await?;
                info!("Deleted record {} ('{}')", record.id, record.title);
                Ok(())
            }
            None if existed => {
                // Orphan: no record to consult, so probe the naming
                // convention for a companion original.
                for candidate in original_candidates(name) {
                    if self.originals.exists(&candidate).await {
                        self.originals.delete(&candidate).await?;
                        info!("Deleted companion original '{candidate}'");
                        break;
                    }
                }
                Ok(())
            }
            None => Err(CatalogError::BlobNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Read a synthesized artifact's bytes by handle.
    pub async fn fetch_artifact(&self, handle: &ArtifactHandle) -> Result<Vec<u8>, CatalogError> {
        // Handles resolve inside the results directory only.
        let is_bare = Path::new(&handle.name)
            .file_name()
            .map(|f| f == std::ffi::OsStr::new(handle.name.as_str()))
            .unwrap_or(false);
        if !is_bare {
            return Err(CatalogError::ArtifactNotFound {
                name: handle.name.clone(),
            });
        }

        let path = self.config.results_dir.join(&handle.name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CatalogError::ArtifactNotFound {
                    name: handle.name.clone(),
                })
            }
            Err(e) => Err(CatalogError::BlobIo {
                name: handle.name.clone(),
                source: e,
            }),
        }
    }

    /// Fail with the conflict error when any committed record already
    /// occupies `location`.
    async fn ensure_location_free(&self, location: &LocationKey) -> Result<(), CatalogError> {
        let records = self.store.query_all().await?;
        if records.iter().any(|r| r.location == *location) {
            return Err(CatalogError::LocationOccupied {
                group: location.group.clone(),
                folder: location.folder.clone(),
                document_number: location.document_number.clone(),
            });
        }
        Ok(())
    }

    /// Store the optional secondary scan under its `original_` name.
    async fn stash_original(
        &self,
        original: Option<&UploadedFile>,
    ) -> Result<Option<String>, CatalogError> {
        match original {
            Some(file) => {
                let name = derive_original_name(&file.name);
                self.originals.put(&name, &file.bytes).await?;
                info!("Stored original scan '{name}'");
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }
}

/// PDF upload validation: present, non-empty, starts with the PDF magic.
fn validate_pdf_upload(file: &UploadedFile) -> Result<(), CatalogError> {
    if file.bytes.is_empty() {
        return Err(CatalogError::MissingField { field: "pdf" });
    }
    if file.bytes.len() < 4 || &file.bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = file.bytes.len().min(4);
        magic[..n].copy_from_slice(&file.bytes[..n]);
        return Err(CatalogError::NotAPdf {
            name: file.name.clone(),
            magic,
        });
    }
    Ok(())
}

fn artifact_handle(path: &Path) -> ArtifactHandle {
    ArtifactHandle {
        name: path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
