//! Recognition stage: extract text from rasterised page images.
//!
//! Each page image is normalised before recognition — grayscale followed
//! by fixed-threshold binarisation — which measurably improves engine
//! accuracy on low-contrast office scans. This is a quality heuristic, not
//! a correctness requirement: the engine accepts unnormalised images too.
//!
//! Pages are recognised concurrently (`buffer_unordered`) and the results
//! re-ordered by page index before concatenation, so the assembled text is
//! always in page order no matter which page finished first. An empty
//! result is a valid recognition of a blank page; only engine-level
//! failures surface as errors, and any such failure aborts the whole
//! ingestion.

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use image::DynamicImage;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::error::CatalogError;

/// Extracts text from a single page image file.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognise the text in `image_path`. An empty string is a valid
    /// result (blank page); `Err` means the engine itself failed.
    async fn recognize(&self, image_path: &Path, page: usize) -> Result<String, CatalogError>;
}

/// tesseract-CLI-backed recogniser: `tesseract <image> stdout -l <lang>`.
pub struct TesseractRecognizer {
    binary: String,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    async fn recognize(&self, image_path: &Path, page: usize) -> Result<String, CatalogError> {
        let output = Command::new(&self.binary)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CatalogError::EngineUnavailable {
                engine: self.binary.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(CatalogError::RecognitionFailed {
                page,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .trim_end()
            .to_string())
    }
}

/// Grayscale + fixed-threshold binarisation.
///
/// Pixels at or above `threshold` become white, the rest black. 180 works
/// well for typical toner-on-paper scans; lower it for faint originals.
pub fn preprocess_page(image: &DynamicImage, threshold: u8) -> DynamicImage {
    let mut gray = image.to_luma8();
    for px in gray.pixels_mut() {
        px.0[0] = if px.0[0] >= threshold { 255 } else { 0 };
    }
    DynamicImage::ImageLuma8(gray)
}

/// Recognise all pages and assemble the document text.
///
/// Writes each preprocessed page into `scratch`, fans recognition out up
/// to `config.ocr_concurrency` pages at a time, deletes each page image as
/// soon as its text is in hand, then joins the texts in page order with a
/// single line break between pages.
pub async fn recognize_pages(
    recognizer: &dyn Recognizer,
    pages: Vec<DynamicImage>,
    scratch: &Path,
    config: &ServiceConfig,
) -> Result<String, CatalogError> {
    let total = pages.len();

    let mut results: Vec<(usize, String)> = stream::iter(pages.into_iter().enumerate().map(
        |(idx, image)| {
            let page = idx + 1;
            let image_path = scratch.join(format!("page-{page}.png"));
            let threshold = config.binarize_threshold;
            let progress = config.progress.clone();
            async move {
                if let Some(ref cb) = progress {
                    cb.on_page_start(page, total);
                }
                let text =
                    recognize_one(recognizer, image, &image_path, page, threshold).await?;
                if let Some(ref cb) = progress {
                    cb.on_page_recognized(page, total, text.len());
                }
                Ok::<_, CatalogError>((idx, text))
            }
        },
    ))
    .buffer_unordered(config.ocr_concurrency)
    .try_collect()
    .await?;

    // Concurrent completion order is arbitrary; output order is page order.
    results.sort_by_key(|(idx, _)| *idx);

    let text = results
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join("\n");
    Ok(text.trim().to_string())
}

/// Preprocess, write, recognise, and clean up one page.
async fn recognize_one(
    recognizer: &dyn Recognizer,
    image: DynamicImage,
    image_path: &Path,
    page: usize,
    threshold: u8,
) -> Result<String, CatalogError> {
    let prepared = tokio::task::spawn_blocking({
        let path = image_path.to_path_buf();
        move || -> Result<(), CatalogError> {
            let prepared = preprocess_page(&image, threshold);
            prepared
                .save(&path)
                .map_err(|e| CatalogError::RecognitionFailed {
                    page,
                    detail: format!("could not write page image: {e}"),
                })
        }
    })
    .await
    .map_err(|e| CatalogError::Internal(format!("Preprocess task panicked: {e}")))?;
    prepared?;

    let result = recognizer.recognize(image_path, page).await;

    // Page images are scratch data; drop each one as soon as it is read so
    // a long document never accumulates its whole page set on disk.
    if let Err(e) = tokio::fs::remove_file(image_path).await {
        warn!("Could not remove page image '{}': {e}", image_path.display());
    }

    match &result {
        Ok(text) => debug!("Page {page}: recognised {} chars", text.len()),
        Err(e) => warn!("Page {page}: recognition failed: {e}"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba, RgbaImage};

    #[test]
    fn preprocess_binarizes_around_threshold() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([250, 250, 250, 255]));
        img.put_pixel(1, 0, Rgba([20, 20, 20, 255]));

        let out = preprocess_page(&DynamicImage::ImageRgba8(img), 180);
        let gray = out.to_luma8();
        assert_eq!(gray.get_pixel(0, 0), &Luma([255u8]));
        assert_eq!(gray.get_pixel(1, 0), &Luma([0u8]));
    }

    struct FixedRecognizer;

    #[async_trait]
    impl Recognizer for FixedRecognizer {
        async fn recognize(&self, _path: &Path, page: usize) -> Result<String, CatalogError> {
            // Slow down early pages so completion order differs from page
            // order and the reorder step actually gets exercised.
            tokio::time::sleep(std::time::Duration::from_millis(
                (20usize.saturating_sub(page * 5)) as u64,
            ))
            .await;
            Ok(format!("page {page} text"))
        }
    }

    struct FailingRecognizer;

    #[async_trait]
    impl Recognizer for FailingRecognizer {
        async fn recognize(&self, _path: &Path, page: usize) -> Result<String, CatalogError> {
            Err(CatalogError::RecognitionFailed {
                page,
                detail: "engine exploded".into(),
            })
        }
    }

    fn blank_pages(n: usize) -> Vec<DynamicImage> {
        (0..n)
            .map(|_| DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255; 4]))))
            .collect()
    }

    #[tokio::test]
    async fn pages_concatenate_in_page_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder()
            .ocr_concurrency(3)
            .build()
            .unwrap();

        let text = recognize_pages(&FixedRecognizer, blank_pages(3), dir.path(), &config)
            .await
            .unwrap();
        assert_eq!(text, "page 1 text\npage 2 text\npage 3 text");
    }

    #[tokio::test]
    async fn page_images_are_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder().build().unwrap();

        recognize_pages(&FixedRecognizer, blank_pages(2), dir.path(), &config)
            .await
            .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "scratch images were not removed");
    }

    #[tokio::test]
    async fn engine_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder().build().unwrap();

        let err = recognize_pages(&FailingRecognizer, blank_pages(2), dir.path(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::RecognitionFailed { .. }));
    }

    #[tokio::test]
    async fn no_pages_is_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::builder().build().unwrap();
        let text = recognize_pages(&FixedRecognizer, Vec::new(), dir.path(), &config)
            .await
            .unwrap();
        assert_eq!(text, "");
    }
}
