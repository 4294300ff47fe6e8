//! Ingestion orchestration: the staged OCR pipeline.
//!
//! One linear state machine with no branch-back:
//!
//! ```text
//! Received → Repairing → Rasterizing → Recognizing(1..N) → Synthesizing
//!          → LocationCheck → Committing → Done
//! ```
//!
//! with a terminal `Failed(stage, reason)` reachable from any state. This
//! module runs the processing stages (`Repairing` through `Synthesizing`);
//! the location check and commit belong to [`crate::service`], which owns
//! the stores.
//!
//! Every call gets its own scratch `TempDir`. The repaired intermediate
//! and the per-page images live there and are removed on every exit path —
//! success, stage failure, or panic — because scratch leakage from a busy
//! archive adds up fast. The synthesized artifacts are the one deliberate
//! exception: they land in the results area so the caller can download
//! them after the call returns.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::catalog::record::file_stem;
use crate::config::ServiceConfig;
use crate::error::CatalogError;
use crate::pipeline::recognize::{recognize_pages, Recognizer};
use crate::pipeline::render::Rasterizer;
use crate::pipeline::repair::Repairer;
use crate::pipeline::synthesize::synthesize_artifacts;

/// The pipeline states, in order. Used for progress events and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Received,
    Repairing,
    Rasterizing,
    Recognizing,
    Synthesizing,
    LocationCheck,
    Committing,
    Done,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Repairing => "repairing",
            IngestStage::Rasterizing => "rasterizing",
            IngestStage::Recognizing => "recognizing",
            IngestStage::Synthesizing => "synthesizing",
            IngestStage::LocationCheck => "location-check",
            IngestStage::Committing => "committing",
            IngestStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Output of the processing stages: the recovered text plus the two
/// synthesized artifacts waiting in the results area.
#[derive(Debug)]
pub struct ProcessedDocument {
    /// OCR output, pages in order, one line break between pages.
    pub text: String,
    /// Artifact base name: the staged PDF's file stem.
    pub base_name: String,
    pub pdf_artifact: PathBuf,
    pub docx_artifact: PathBuf,
    pub page_count: usize,
}

fn notify_stage(config: &ServiceConfig, stage: IngestStage) {
    if let Some(ref cb) = config.progress {
        cb.on_stage_start(stage);
    }
}

/// Run Repair → Rasterize → Recognize → Synthesize over one staged PDF.
///
/// `pdf_bytes` are the staged upload's bytes, written into the call's own
/// scratch directory so the external tools get a private file path no
/// matter which blob backend staged them. `staged_name` decides the
/// artifact base name. Artifacts are written into `results_dir` as
/// `<base>-ocr.pdf` and `<base>-ocr.docx`.
pub async fn run_ocr_pipeline(
    repairer: &dyn Repairer,
    rasterizer: &dyn Rasterizer,
    recognizer: &dyn Recognizer,
    config: &ServiceConfig,
    staged_name: &str,
    pdf_bytes: &[u8],
    results_dir: &Path,
) -> Result<ProcessedDocument, CatalogError> {
    let started = Instant::now();
    let scratch = TempDir::new()
        .map_err(|e| CatalogError::Internal(format!("cannot create scratch dir: {e}")))?;

    let input_path = scratch.path().join(staged_name);
    tokio::fs::write(&input_path, pdf_bytes)
        .await
        .map_err(|e| CatalogError::Internal(format!("cannot write scratch input: {e}")))?;

    // ── Repairing ────────────────────────────────────────────────────────
    notify_stage(config, IngestStage::Repairing);
    let repaired_path = scratch.path().join("repaired.pdf");
    let usable = repairer.repair(&input_path, &repaired_path).await;
    debug!("Repair ({}) produced '{}'", repairer.name(), usable.display());

    // ── Rasterizing ──────────────────────────────────────────────────────
    notify_stage(config, IngestStage::Rasterizing);
    let render_start = Instant::now();
    let pages = rasterizer
        .rasterize(&usable, config.max_render_pixels)
        .await?;
    let page_count = pages.len();
    info!(
        "Rasterised {} pages in {}ms",
        page_count,
        render_start.elapsed().as_millis()
    );

    // ── Recognizing ──────────────────────────────────────────────────────
    notify_stage(config, IngestStage::Recognizing);
    let ocr_start = Instant::now();
    let text = recognize_pages(recognizer, pages, scratch.path(), config).await?;
    info!(
        "Recognised {} chars across {} pages in {}ms",
        text.len(),
        page_count,
        ocr_start.elapsed().as_millis()
    );

    // ── Synthesizing ─────────────────────────────────────────────────────
    notify_stage(config, IngestStage::Synthesizing);
    let base_name = file_stem(staged_name);
    tokio::fs::create_dir_all(results_dir)
        .await
        .map_err(|e| CatalogError::ArtifactWriteFailed {
            path: results_dir.to_path_buf(),
            source: e,
        })?;
    let pdf_artifact = results_dir.join(format!("{base_name}-ocr.pdf"));
    let docx_artifact = results_dir.join(format!("{base_name}-ocr.docx"));
    synthesize_artifacts(&text, Some(&base_name), &pdf_artifact, &docx_artifact).await?;

    info!(
        "Pipeline complete for '{}' in {}ms",
        staged_name,
        started.elapsed().as_millis()
    );
    if let Some(ref cb) = config.progress {
        cb.on_pipeline_complete(page_count);
    }

    // `scratch` drops here, removing the input copy, the repaired
    // intermediate, and any page image a failed run left behind.
    Ok(ProcessedDocument {
        text,
        base_name,
        pdf_artifact,
        docx_artifact,
        page_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::repair::CopyRepairer;
    use async_trait::async_trait;
    use image::{DynamicImage, Rgba, RgbaImage};

    struct FakeRasterizer {
        pages: usize,
    }

    #[async_trait]
    impl Rasterizer for FakeRasterizer {
        async fn rasterize(
            &self,
            _pdf_path: &Path,
            _max_pixels: u32,
        ) -> Result<Vec<DynamicImage>, CatalogError> {
            Ok((0..self.pages)
                .map(|_| DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255; 4]))))
                .collect())
        }
    }

    struct FakeRecognizer;

    #[async_trait]
    impl Recognizer for FakeRecognizer {
        async fn recognize(&self, _path: &Path, page: usize) -> Result<String, CatalogError> {
            Ok(format!("text of page {page}"))
        }
    }

    struct CorruptRasterizer;

    #[async_trait]
    impl Rasterizer for CorruptRasterizer {
        async fn rasterize(
            &self,
            pdf_path: &Path,
            _max_pixels: u32,
        ) -> Result<Vec<DynamicImage>, CatalogError> {
            Err(CatalogError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: "not a pdf".into(),
            })
        }
    }

    #[tokio::test]
    async fn pipeline_produces_text_and_artifacts() {
        let results = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder().build().unwrap();

        let processed = run_ocr_pipeline(
            &CopyRepairer,
            &FakeRasterizer { pages: 2 },
            &FakeRecognizer,
            &config,
            "scan_7.pdf",
            b"%PDF-1.4 fake",
            results.path(),
        )
        .await
        .unwrap();

        assert_eq!(processed.text, "text of page 1\ntext of page 2");
        assert_eq!(processed.base_name, "scan_7");
        assert_eq!(processed.page_count, 2);
        assert!(processed.pdf_artifact.ends_with("scan_7-ocr.pdf"));
        assert!(processed.pdf_artifact.exists());
        assert!(processed.docx_artifact.exists());
    }

    #[tokio::test]
    async fn stage_failure_leaves_no_artifacts() {
        let results = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder().build().unwrap();

        let err = run_ocr_pipeline(
            &CopyRepairer,
            &CorruptRasterizer,
            &FakeRecognizer,
            &config,
            "bad.pdf",
            b"not a pdf at all",
            results.path(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CatalogError::CorruptPdf { .. }));
        let leftovers: Vec<_> = std::fs::read_dir(results.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn stage_display_names() {
        assert_eq!(IngestStage::LocationCheck.to_string(), "location-check");
        assert_eq!(IngestStage::Recognizing.to_string(), "recognizing");
    }
}
