//! CLI binary for scanvault.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig`, drives the catalog operations, and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use scanvault::{
    ArtifactHandle, CatalogService, IngestProgressCallback, IngestRequest, IngestStage,
    JsonFileStore, ReconstructedRequest, ServiceConfig, UploadedFile,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner that names the active pipeline stage and
/// counts recognised pages. Page events arrive out of order in concurrent
/// mode; only the running count is shown, so ordering does not matter.
struct CliProgress {
    bar: ProgressBar,
    pages_done: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            pages_done: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl IngestProgressCallback for CliProgress {
    fn on_stage_start(&self, stage: IngestStage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message("");
    }

    fn on_page_start(&self, page: usize, total_pages: usize) {
        self.bar.set_message(format!("page {page}/{total_pages}"));
    }

    fn on_page_recognized(&self, _page: usize, total_pages: usize, text_len: usize) {
        let done = self.pages_done.fetch_add(1, Ordering::SeqCst) + 1;
        self.bar.println(format!(
            "  {} page {done}/{total_pages}  {}",
            green("✓"),
            dim(&format!("{text_len} chars"))
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ingest a scan into group G1, folder 3, document 7
  scanvault ingest scan.pdf --group G1 --folder 3 --doc-number 7

  # Keep the raw scan alongside the catalogued file
  scanvault ingest scan.pdf --group G1 --folder 3 --doc-number 7 --original raw.pdf

  # Preview the OCR reconstruction without committing anything
  scanvault preview damaged.pdf

  # Commit a previously previewed reconstruction
  scanvault commit-reconstructed fixed-ocr.pdf --original damaged.pdf \
      --group G1 --folder 3 --doc-number 7

  # List the catalog (matched entries + orphans), optionally filtered
  scanvault list
  scanvault list deed

  # Delete by blob filename (removes record and companion original too)
  scanvault delete scan_7.pdf

  # Download a synthesized artifact
  scanvault artifact scan_7-ocr.docx -o out.docx

EXTERNAL TOOLS:
  qpdf        optional; missing tool downgrades repair to a pass-through copy
  tesseract   required for OCR (install a language pack matching --lang)
  pdfium      bound in-process for rasterisation
"#;

#[derive(Parser)]
#[command(
    name = "scanvault",
    version,
    about = "Scanned-document OCR ingestion and location-keyed catalog",
    after_help = AFTER_HELP
)]
struct Cli {
    /// Directory backing the primary blob store.
    #[arg(long, global = true, default_value = "./uploads", env = "SCANVAULT_UPLOADS")]
    uploads_dir: PathBuf,

    /// Directory holding unprocessed original scans.
    #[arg(long, global = true, default_value = "./originals", env = "SCANVAULT_ORIGINALS")]
    originals_dir: PathBuf,

    /// Results area where synthesized artifacts await download.
    #[arg(long, global = true, default_value = "./results", env = "SCANVAULT_RESULTS")]
    results_dir: PathBuf,

    /// Metadata collection file.
    #[arg(long, global = true, default_value = "./catalog.json", env = "SCANVAULT_CATALOG")]
    catalog: PathBuf,

    /// OCR language (tesseract traineddata name).
    #[arg(long, global = true, default_value = "spa", env = "SCANVAULT_LANG")]
    lang: String,

    /// Pages recognised concurrently.
    #[arg(long, global = true, default_value_t = 4)]
    ocr_concurrency: usize,

    /// Emit machine-readable JSON instead of human output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a scanned PDF and commit a catalog record.
    Ingest {
        /// The scanned PDF file.
        pdf: PathBuf,
        /// Archive group label.
        #[arg(long)]
        group: String,
        /// Folder number (digits only).
        #[arg(long)]
        folder: String,
        /// Document number within the folder (digits only).
        #[arg(long)]
        doc_number: String,
        /// Optional unprocessed original to keep alongside.
        #[arg(long)]
        original: Option<PathBuf>,
    },
    /// Run the OCR pipeline and produce artifacts without committing.
    Preview {
        /// The scanned PDF file.
        pdf: PathBuf,
    },
    /// Commit an already-synthesized PDF without re-running OCR.
    CommitReconstructed {
        /// The synthesized PDF from a previous preview.
        pdf: PathBuf,
        /// The original scan it was reconstructed from.
        #[arg(long)]
        original: Option<PathBuf>,
        #[arg(long)]
        group: String,
        #[arg(long)]
        folder: String,
        #[arg(long)]
        doc_number: String,
    },
    /// List the catalog: matched entries and orphaned blobs.
    List {
        /// Case-insensitive search over titles and orphan filenames.
        query: Option<String>,
    },
    /// Delete a document by blob filename.
    Delete {
        /// Blob filename as shown by `list`.
        name: String,
    },
    /// Fetch a synthesized artifact.
    Artifact {
        /// Artifact name as returned by ingest/preview.
        name: String,
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let progress = if cli.json {
        None
    } else {
        Some(CliProgress::new())
    };

    let mut builder = ServiceConfig::builder()
        .uploads_dir(&cli.uploads_dir)
        .originals_dir(&cli.originals_dir)
        .results_dir(&cli.results_dir)
        .ocr_language(&cli.lang)
        .ocr_concurrency(cli.ocr_concurrency);
    if let Some(ref p) = progress {
        builder = builder.progress_callback(p.clone());
    }
    let config = builder.build().map_err(|e| anyhow::anyhow!("{e}"))?;

    let store = Arc::new(
        JsonFileStore::open(&cli.catalog)
            .await
            .with_context(|| format!("opening catalog '{}'", cli.catalog.display()))?,
    );
    let service = CatalogService::open(config, store)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let result = run_command(&service, &cli).await;
    if let Some(ref p) = progress {
        p.finish();
    }

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            // Surface the machine-readable kind next to the message the
            // way a transport layer would.
            if let Some(cat) = e.downcast_ref::<scanvault::CatalogError>() {
                eprintln!("{} [{:?}] {cat}", red("error:"), cat.kind());
                std::process::exit(1);
            }
            Err(e)
        }
    }
}

async fn run_command(service: &CatalogService, cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Ingest {
            pdf,
            group,
            folder,
            doc_number,
            original,
        } => {
            let request = IngestRequest {
                pdf: read_upload(pdf)?,
                group: group.clone(),
                folder: folder.clone(),
                document_number: doc_number.clone(),
                original: original.as_ref().map(|p| read_upload(p)).transpose()?,
            };
            let receipt = service.ingest(request).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                println!("{} {}", green("✔"), bold("Document ingested"));
                println!("  blob:  {}", receipt.blob_path);
                println!("  pdf:   {}", receipt.ocr_pdf.name);
                println!("  docx:  {}", receipt.ocr_docx.name);
            }
        }
        Command::Preview { pdf } => {
            let receipt = service.preview_fix(read_upload(pdf)?).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                println!("{} {}", green("✔"), bold("Preview artifacts ready"));
                println!("  pdf:   {}", receipt.ocr_pdf.name);
                println!("  docx:  {}", receipt.ocr_docx.name);
                println!(
                    "{}",
                    dim("Nothing was committed; use commit-reconstructed to file it.")
                );
            }
        }
        Command::CommitReconstructed {
            pdf,
            original,
            group,
            folder,
            doc_number,
        } => {
            let request = ReconstructedRequest {
                pdf: read_upload(pdf)?,
                original: original.as_ref().map(|p| read_upload(p)).transpose()?,
                group: group.clone(),
                folder: folder.clone(),
                document_number: doc_number.clone(),
            };
            let receipt = service.commit_reconstructed(request).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                println!(
                    "{} {} at {}",
                    green("✔"),
                    bold(&receipt.title),
                    receipt.location
                );
            }
        }
        Command::List { query } => {
            let view = service.list_catalog(query.as_deref()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else if view.is_empty() {
                println!("{}", dim("No documents stored."));
            } else {
                for entry in &view.matched {
                    println!(
                        "{}  {}  {}",
                        bold(&entry.record.title),
                        dim(&entry.record.location.to_string()),
                        entry.file_name
                    );
                }
                for orphan in &view.orphans {
                    println!("{}  {}", orphan.file_name, dim("(no catalog record)"));
                }
            }
        }
        Command::Delete { name } => {
            service.delete_by_blob_name(name).await?;
            if cli.json {
                println!("{{\"deleted\": \"{name}\"}}");
            } else {
                println!("{} deleted '{name}'", green("✔"));
            }
        }
        Command::Artifact { name, output } => {
            let bytes = service
                .fetch_artifact(&ArtifactHandle { name: name.clone() })
                .await?;
            match output {
                Some(path) => {
                    std::fs::write(path, &bytes)
                        .with_context(|| format!("writing '{}'", path.display()))?;
                    if !cli.json {
                        println!(
                            "{} wrote {} bytes to '{}'",
                            green("✔"),
                            bytes.len(),
                            path.display()
                        );
                    }
                }
                None => std::io::stdout().write_all(&bytes)?,
            }
        }
    }
    Ok(())
}

fn read_upload(path: &std::path::Path) -> Result<UploadedFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading '{}'", path.display()))?;
    let name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.pdf".to_string());
    Ok(UploadedFile::new(name, bytes))
}
