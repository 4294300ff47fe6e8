//! Configuration for the scanvault catalog service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share the config across tasks, log it, and diff two
//! deployments to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::CatalogError;
use crate::pipeline::recognize::Recognizer;
use crate::pipeline::render::Rasterizer;
use crate::pipeline::repair::Repairer;
use crate::progress::ProgressCallback;

/// Configuration for a [`crate::service::CatalogService`].
///
/// Built via [`ServiceConfig::builder()`] or [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use scanvault::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .uploads_dir("./uploads")
///     .ocr_language("eng")
///     .ocr_concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Directory backing the primary blob store. Default: `./uploads`.
    pub uploads_dir: PathBuf,

    /// Directory backing the originals store (unprocessed secondary
    /// scans, `original_*` names). Default: `./originals`.
    pub originals_dir: PathBuf,

    /// Results area where synthesized artifacts await download.
    /// Default: `./results`.
    pub results_dir: PathBuf,

    /// Recognition language passed to the OCR engine. Default: `"spa"`.
    ///
    /// The archive this system was built for holds Spanish-language civil
    /// records; switch to `"eng"` (or any installed traineddata pack) per
    /// deployment.
    pub ocr_language: String,

    /// Fixed binarisation threshold applied after grayscale, 0–255.
    /// Default: 180.
    ///
    /// Pixels at or above the threshold become white. 180 suits typical
    /// toner-on-paper scans; lower it for faint or pencil originals.
    pub binarize_threshold: u8,

    /// Maximum rendered page dimension (width or height) in pixels.
    /// Default: 2000.
    ///
    /// A safety cap independent of page size: a ledger-size scan could
    /// otherwise rasterise into a memory-exhausting image. 2000 px on the
    /// longest edge keeps glyphs crisp enough for recognition.
    pub max_render_pixels: u32,

    /// Number of pages recognised concurrently. Default: 4.
    ///
    /// Recognition shells out to an external engine, so this bounds child
    /// processes, not threads. Page order in the assembled text is
    /// preserved regardless of completion order.
    pub ocr_concurrency: usize,

    /// Path to the tesseract binary. Default: `"tesseract"` (PATH lookup).
    pub tesseract_path: String,

    /// Path to the qpdf binary used by the repair stage. Default: `"qpdf"`.
    pub qpdf_path: String,

    /// Whether the repair stage may invoke the external repair tool at
    /// all. When false (or when the tool is missing at startup) repairs
    /// are pass-through copies. Default: true.
    pub repair_enabled: bool,

    /// Pre-constructed repairer. Takes precedence over tool detection.
    pub repairer: Option<Arc<dyn Repairer>>,

    /// Pre-constructed rasterizer. Takes precedence over the pdfium
    /// default.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Pre-constructed recognition engine. Takes precedence over the
    /// tesseract default.
    pub recognizer: Option<Arc<dyn Recognizer>>,

    /// Progress callback receiving stage and page events.
    pub progress: Option<ProgressCallback>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("./uploads"),
            originals_dir: PathBuf::from("./originals"),
            results_dir: PathBuf::from("./results"),
            ocr_language: "spa".to_string(),
            binarize_threshold: 180,
            max_render_pixels: 2000,
            ocr_concurrency: 4,
            tesseract_path: "tesseract".to_string(),
            qpdf_path: "qpdf".to_string(),
            repair_enabled: true,
            repairer: None,
            rasterizer: None,
            recognizer: None,
            progress: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("uploads_dir", &self.uploads_dir)
            .field("originals_dir", &self.originals_dir)
            .field("results_dir", &self.results_dir)
            .field("ocr_language", &self.ocr_language)
            .field("binarize_threshold", &self.binarize_threshold)
            .field("max_render_pixels", &self.max_render_pixels)
            .field("ocr_concurrency", &self.ocr_concurrency)
            .field("tesseract_path", &self.tesseract_path)
            .field("qpdf_path", &self.qpdf_path)
            .field("repair_enabled", &self.repair_enabled)
            .field("repairer", &self.repairer.as_ref().map(|_| "<dyn Repairer>"))
            .field(
                "rasterizer",
                &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"),
            )
            .field(
                "recognizer",
                &self.recognizer.as_ref().map(|_| "<dyn Recognizer>"),
            )
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.uploads_dir = dir.into();
        self
    }

    pub fn originals_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.originals_dir = dir.into();
        self
    }

    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.results_dir = dir.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn binarize_threshold(mut self, threshold: u8) -> Self {
        self.config.binarize_threshold = threshold;
        self
    }

    pub fn max_render_pixels(mut self, px: u32) -> Self {
        self.config.max_render_pixels = px.max(100);
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<String>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn qpdf_path(mut self, path: impl Into<String>) -> Self {
        self.config.qpdf_path = path.into();
        self
    }

    pub fn repair_enabled(mut self, enabled: bool) -> Self {
        self.config.repair_enabled = enabled;
        self
    }

    pub fn repairer(mut self, repairer: Arc<dyn Repairer>) -> Self {
        self.config.repairer = Some(repairer);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, CatalogError> {
        let c = &self.config;
        if c.ocr_language.trim().is_empty() {
            return Err(CatalogError::Internal(
                "ocr_language must not be empty".into(),
            ));
        }
        if c.ocr_concurrency == 0 {
            return Err(CatalogError::Internal("ocr_concurrency must be ≥ 1".into()));
        }
        if c.uploads_dir == c.originals_dir {
            return Err(CatalogError::Internal(
                "uploads_dir and originals_dir must be distinct directories".into(),
            ));
        }
        Ok(self.config)
    }
}
