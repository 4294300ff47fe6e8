//! Rasterisation stage: one image per PDF page, in page order.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto the
//! blocking-thread pool so Tokio worker threads never stall during
//! CPU-heavy rendering.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: a ledger-size scan at high DPI can produce a
//! tens-of-megapixel image. `max_pixels` caps the longest edge regardless
//! of physical page size, keeping memory bounded while staying well above
//! what the recognition engine needs for clean glyphs.
//!
//! By this stage the input has already been through the repair stage, so a
//! parse failure here is terminal: it maps to the conversion error rather
//! than any further best-effort fallback.

use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

use crate::error::CatalogError;

/// Converts one PDF into a sequence of page images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render every page of `pdf_path`, longest edge capped at
    /// `max_pixels`, returned in page order.
    async fn rasterize(
        &self,
        pdf_path: &Path,
        max_pixels: u32,
    ) -> Result<Vec<DynamicImage>, CatalogError>;
}

/// pdfium-backed rasteriser.
pub struct PdfiumRasterizer;

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        pdf_path: &Path,
        max_pixels: u32,
    ) -> Result<Vec<DynamicImage>, CatalogError> {
        let path = pdf_path.to_path_buf();
        tokio::task::spawn_blocking(move || rasterize_blocking(&path, max_pixels))
            .await
            .map_err(|e| CatalogError::Internal(format!("Render task panicked: {e}")))?
    }
}

/// Blocking implementation of page rendering.
fn rasterize_blocking(
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, CatalogError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| CatalogError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);

    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| CatalogError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| CatalogError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push(image);
    }

    Ok(results)
}
