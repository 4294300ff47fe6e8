//! Pipeline stages for scanned-document ingestion.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap an
//! implementation (a different repair tool, an in-process OCR engine)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ repair ──▶ render ──▶ recognize ──▶ synthesize
//! (bytes)    (qpdf)    (pdfium)   (tesseract)   (pdf + docx)
//! ```
//!
//! 1. [`repair`]     — best-effort structural normalisation; the only stage
//!    whose failures are absorbed instead of propagated
//! 2. [`render`]     — rasterise every page; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`recognize`]  — preprocess (grayscale + threshold) and OCR each page
//!    concurrently, re-ordering by page index before assembly
//! 4. [`synthesize`] — regenerate a formatted PDF and DOCX from the text
//! 5. [`ingest`]     — the state machine chaining 1–4 with per-call scratch
//!    cleanup; location check and commit live with the stores in
//!    [`crate::service`]

pub mod ingest;
pub mod recognize;
pub mod render;
pub mod repair;
pub mod synthesize;
