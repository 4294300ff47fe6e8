//! Repair stage: best-effort structural normalisation of a possibly
//! malformed PDF before rasterisation.
//!
//! Malformed scans are common — office copiers emit broken xref tables,
//! truncated streams, stale trailers. The policy here is deliberate:
//! a repair failure is logged and degraded to a verbatim copy of the
//! input, never an error. An unusable original should still flow through
//! the pipeline rather than aborting ingestion; if the bytes are truly
//! unreadable the rasteriser reports that with a proper conversion error.
//!
//! [`Repairer`] is a capability interface with two implementations —
//! [`QpdfRepairer`] shelling out to `qpdf`, and [`CopyRepairer`] as the
//! pass-through no-op. Which one a service uses is decided once at
//! startup by [`detect`], not re-probed per call.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Attempts to rewrite a PDF into well-formed structure.
///
/// Contract: always yields a usable path — the repaired output, a verbatim
/// copy of the input, or (when even copying fails) the input itself.
/// Never fails the caller.
#[async_trait]
pub trait Repairer: Send + Sync {
    /// Implementation name, for logs.
    fn name(&self) -> &'static str;

    /// Repair `input` into `output`; returns the path the next stage
    /// should read.
    async fn repair(&self, input: &Path, output: &Path) -> PathBuf;
}

/// Fall back to a byte-for-byte copy; if even that fails, hand the next
/// stage the original path.
async fn copy_fallback(input: &Path, output: &Path) -> PathBuf {
    match tokio::fs::copy(input, output).await {
        Ok(_) => output.to_path_buf(),
        Err(e) => {
            warn!(
                "Could not copy '{}' to scratch: {e}; using original in place",
                input.display()
            );
            input.to_path_buf()
        }
    }
}

// ── qpdf-backed repairer ─────────────────────────────────────────────────

/// Repairs PDFs by round-tripping them through `qpdf`, which rebuilds the
/// xref table and rewrites damaged object streams.
pub struct QpdfRepairer {
    binary: String,
}

impl QpdfRepairer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Repairer for QpdfRepairer {
    fn name(&self) -> &'static str {
        "qpdf"
    }

    async fn repair(&self, input: &Path, output: &Path) -> PathBuf {
        let result = Command::new(&self.binary)
            .arg("--decrypt")
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            // Exit code 3 means "succeeded with warnings" — the output file
            // was still written and is the repaired document.
            Ok(out) if out.status.success() || out.status.code() == Some(3) => {
                debug!("qpdf repaired '{}'", input.display());
                output.to_path_buf()
            }
            Ok(out) => {
                warn!(
                    "qpdf failed on '{}' (status {:?}): {}; passing original through",
                    input.display(),
                    out.status.code(),
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                copy_fallback(input, output).await
            }
            Err(e) => {
                warn!(
                    "qpdf could not be spawned ({e}); passing original through"
                );
                copy_fallback(input, output).await
            }
        }
    }
}

// ── Pass-through repairer ────────────────────────────────────────────────

/// No-op repairer used when no repair tool is available (or repair is
/// disabled): copies the input through unchanged.
pub struct CopyRepairer;

#[async_trait]
impl Repairer for CopyRepairer {
    fn name(&self) -> &'static str {
        "copy"
    }

    async fn repair(&self, input: &Path, output: &Path) -> PathBuf {
        copy_fallback(input, output).await
    }
}

// ── Startup detection ────────────────────────────────────────────────────

/// Probe whether the repair tool can be executed at all.
async fn tool_available(binary: &str) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Select the repairer once at service startup: the real tool when it is
/// runnable, the pass-through otherwise.
pub async fn detect(qpdf_path: &str, repair_enabled: bool) -> Box<dyn Repairer> {
    if repair_enabled && tool_available(qpdf_path).await {
        info!("Repair stage: using qpdf at '{qpdf_path}'");
        Box::new(QpdfRepairer::new(qpdf_path))
    } else {
        if repair_enabled {
            warn!("Repair stage: '{qpdf_path}' not available, repairs become pass-through copies");
        } else {
            info!("Repair stage: disabled, using pass-through");
        }
        Box::new(CopyRepairer)
    }
}
