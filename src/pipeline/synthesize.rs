//! Synthesis stage: render extracted text back into a formatted PDF and a
//! formatted word-processing document.
//!
//! Both artifacts are generated from the same paragraph segmentation
//! ([`split_paragraphs`]), so they are textually equivalent; everything
//! else — fonts, justification, page breaks — is cosmetic and
//! format-specific. The PDF gets a centered emphasised title and justified
//! body text; the DOCX gets the title as a heading paragraph and one body
//! paragraph per segment.
//!
//! PDF generation builds the document object-by-object with `lopdf`
//! (fonts, per-page content streams, pages tree, catalog); there is no
//! layout engine underneath, so line wrapping and justification use the
//! Helvetica average-width approximation, which is plenty for OCR output.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use tracing::debug;

use crate::error::CatalogError;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 56.0;
const BODY_SIZE: f32 = 11.0;
const TITLE_SIZE: f32 = 16.0;
const LEADING: f32 = 14.0;
/// Helvetica averages roughly half an em per glyph at body sizes.
const AVG_CHAR_WIDTH: f32 = 0.5;
const CHARS_PER_LINE: usize =
    ((PAGE_WIDTH - 2.0 * MARGIN) / (BODY_SIZE * AVG_CHAR_WIDTH)) as usize;

/// Split text into paragraphs on blank-line boundaries.
///
/// Line breaks inside a paragraph are collapsed to spaces — OCR output
/// breaks lines where the scan did, which is meaningless once the text
/// reflows into a new page geometry.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(|p| {
            p.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Greedy word-wrap to at most `width` characters per line. Words longer
/// than a full line are hard-split.
fn wrap_paragraph(paragraph: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in paragraph.split_whitespace() {
        if word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(width) {
                lines.push(chunk.iter().collect());
            }
            continue;
        }
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Map text to the byte encoding usable with the standard Type1 fonts.
/// Characters outside Latin-1 degrade to '?'; recognition output for the
/// supported scan languages stays within it.
fn encode_pdf_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u32 as u8 } else { b'?' })
        .collect()
}

/// A positioned line ready for the content stream.
struct Line {
    text: String,
    /// Last line of its paragraph: never justified.
    paragraph_end: bool,
}

/// Generate the formatted PDF artifact.
pub fn synthesize_pdf(
    text: &str,
    title: Option<&str>,
    out: &Path,
) -> Result<(), CatalogError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let font_bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_regular,
            "F2" => font_bold,
        },
    });

    // Flatten paragraphs into wrapped lines with paragraph-end markers.
    let mut lines: Vec<Line> = Vec::new();
    for paragraph in split_paragraphs(text) {
        let wrapped = wrap_paragraph(&paragraph, CHARS_PER_LINE);
        let last = wrapped.len().saturating_sub(1);
        for (i, text) in wrapped.into_iter().enumerate() {
            lines.push(Line {
                text,
                paragraph_end: i == last,
            });
        }
    }

    let content_width = PAGE_WIDTH - 2.0 * MARGIN;
    let mut page_ids = Vec::new();
    let mut line_iter = lines.into_iter().peekable();
    let mut first_page = true;

    while first_page || line_iter.peek().is_some() {
        let mut ops: Vec<Operation> = Vec::new();
        let mut y = PAGE_HEIGHT - MARGIN - TITLE_SIZE;

        if first_page {
            if let Some(t) = title {
                let est_width = t.chars().count() as f32 * TITLE_SIZE * AVG_CHAR_WIDTH;
                let x = ((PAGE_WIDTH - est_width) / 2.0).max(MARGIN);
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec!["F2".into(), TITLE_SIZE.into()]));
                ops.push(Operation::new("Td", vec![x.into(), y.into()]));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(encode_pdf_text(t))],
                ));
                ops.push(Operation::new("ET", vec![]));
                y -= 2.0 * LEADING;
            }
            first_page = false;
        }

        while y >= MARGIN {
            let Some(line) = line_iter.next() else { break };
            // Crude justification: distribute the leftover width over the
            // line's word gaps, except on paragraph-final lines.
            let gaps = line.text.matches(' ').count();
            let est_width = line.text.chars().count() as f32 * BODY_SIZE * AVG_CHAR_WIDTH;
            let word_spacing = if !line.paragraph_end && gaps > 0 {
                ((content_width - est_width) / gaps as f32).clamp(0.0, 6.0)
            } else {
                0.0
            };

            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new("Tf", vec!["F1".into(), BODY_SIZE.into()]));
            ops.push(Operation::new("Tw", vec![word_spacing.into()]));
            ops.push(Operation::new("Td", vec![MARGIN.into(), y.into()]));
            ops.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_pdf_text(&line.text))],
            ));
            ops.push(Operation::new("ET", vec![]));
            y -= LEADING;
            if line.paragraph_end {
                y -= LEADING * 0.5;
            }
        }

        let content = Content { operations: ops };
        let encoded = content
            .encode()
            .map_err(|e| CatalogError::SynthesisFailed {
                format: "pdf",
                detail: format!("content stream encoding failed: {e}"),
            })?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut file = std::fs::File::create(out).map_err(|e| CatalogError::ArtifactWriteFailed {
        path: out.to_path_buf(),
        source: e,
    })?;
    doc.save_to(&mut file)
        .map_err(|e| CatalogError::SynthesisFailed {
            format: "pdf",
            detail: format!("{e:?}"),
        })?;
    debug!("Synthesized PDF artifact '{}'", out.display());
    Ok(())
}

/// Generate the formatted word-processing (DOCX) artifact.
pub fn synthesize_docx(
    text: &str,
    title: Option<&str>,
    out: &Path,
) -> Result<(), CatalogError> {
    use docx_rs::{AlignmentType, Docx, Paragraph, Run};

    let file = std::fs::File::create(out).map_err(|e| CatalogError::ArtifactWriteFailed {
        path: out.to_path_buf(),
        source: e,
    })?;

    let mut docx = Docx::new();
    if let Some(t) = title {
        docx = docx.add_paragraph(
            Paragraph::new()
                .align(AlignmentType::Center)
                .add_run(Run::new().add_text(t).bold().size(32)),
        );
    }
    for paragraph in split_paragraphs(text) {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(paragraph)));
    }

    docx.build()
        .pack(file)
        .map_err(|e| CatalogError::SynthesisFailed {
            format: "docx",
            detail: e.to_string(),
        })?;
    debug!("Synthesized DOCX artifact '{}'", out.display());
    Ok(())
}

/// Produce both artifacts from the same text, off the async threads.
pub async fn synthesize_artifacts(
    text: &str,
    title: Option<&str>,
    pdf_out: &Path,
    docx_out: &Path,
) -> Result<(), CatalogError> {
    let text = text.to_string();
    let title = title.map(str::to_string);
    let pdf_out = pdf_out.to_path_buf();
    let docx_out = docx_out.to_path_buf();

    tokio::task::spawn_blocking(move || {
        synthesize_pdf(&text, title.as_deref(), &pdf_out)?;
        synthesize_docx(&text, title.as_deref(), &docx_out)
    })
    .await
    .map_err(|e| CatalogError::Internal(format!("Synthesis task panicked: {e}")))?
}
