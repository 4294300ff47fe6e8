//! Catalog data model: records, location keys, and blob naming.
//!
//! A [`CatalogRecord`] is the metadata-store entity; a [`LocationKey`] is the
//! physical archive slot (group, folder, document number) a document lives
//! in. Location keys are validated on construction so an invalid key can
//! never reach the uniqueness check or the store.
//!
//! Blob names are derived here too, in one place, because the reconciliation
//! view and the delete heuristic both depend on the exact naming scheme:
//!
//! * primary blob: `<stem>_<documentNumber><ext>` when a document number is
//!   known, else `<millis>-<originalName>`
//! * original scan: `original_<originalName>`

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::CatalogError;

static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// Placeholder stored as `extracted_text` when a reconstructed document is
/// committed without re-running OCR (the text was produced in a prior
/// preview step).
pub const RECONSTRUCTED_TEXT: &str = "Reconstructed document - text already processed by OCR";

/// Prefix under which original (unprocessed) scans are stored.
pub const ORIGINAL_PREFIX: &str = "original_";

/// The (group, folder, document number) tuple identifying a document's
/// catalog slot. Unique across all committed records.
///
/// `folder` and `document_number` are digit strings, checked against
/// `^\d+$` at construction. They stay as strings because the archive's
/// labels are strings — `folder "007"` and `folder "7"` are the same slot
/// numerically but are displayed as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationKey {
    pub group: String,
    pub folder: String,
    pub document_number: String,
}

impl LocationKey {
    /// Validate and build a location key.
    ///
    /// Checks run in the same order the ingest contract promises: presence
    /// of all three fields first, then the numeric-format check on `folder`
    /// and `document_number`.
    pub fn new(
        group: impl Into<String>,
        folder: impl Into<String>,
        document_number: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let group = group.into();
        let folder = folder.into();
        let document_number = document_number.into();

        if group.trim().is_empty() {
            return Err(CatalogError::MissingField { field: "group" });
        }
        if folder.trim().is_empty() {
            return Err(CatalogError::MissingField { field: "folder" });
        }
        if document_number.trim().is_empty() {
            return Err(CatalogError::MissingField {
                field: "document_number",
            });
        }
        if !RE_DIGITS.is_match(&folder) {
            return Err(CatalogError::NotNumeric {
                field: "folder",
                value: folder,
            });
        }
        if !RE_DIGITS.is_match(&document_number) {
            return Err(CatalogError::NotNumeric {
                field: "document_number",
                value: document_number,
            });
        }

        Ok(Self {
            group,
            folder,
            document_number,
        })
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.folder, self.document_number)
    }
}

/// The metadata-store entity for one committed document.
///
/// Records are immutable after commit: they are created by a successful
/// ingestion (or reconstructed commit) and removed by the catalog delete
/// operation, never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Opaque identity assigned by the metadata store at insert.
    pub id: String,
    /// Display name, derived from the uploaded file's stem at ingestion.
    pub title: String,
    /// Placeholder category column, currently always empty.
    pub category: String,
    /// Full OCR output, pages concatenated in page order with a single
    /// line break between pages; stored verbatim including OCR noise.
    pub extracted_text: String,
    /// Logical path of the primary PDF in the blob store, e.g.
    /// `/uploads/scan_7.pdf`.
    pub blob_path: String,
    /// Name of the secondary unprocessed scan in the originals store, when
    /// one was uploaded alongside the primary file.
    pub original_blob_name: Option<String>,
    /// The physical archive slot. Unique across committed records.
    #[serde(flatten)]
    pub location: LocationKey,
    /// Commit timestamp; listings are newest-first by this field.
    pub uploaded_at: DateTime<Utc>,
}

impl CatalogRecord {
    /// The blob filename referenced by `blob_path` (its final segment).
    pub fn blob_file_name(&self) -> &str {
        self.blob_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.blob_path)
    }
}

/// The file stem of an uploaded name, used as the record title and the
/// artifact base name.
pub fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Strip any path components from a client-supplied filename.
///
/// Uploaded names are attacker-controlled; only the final component may
/// reach the stores.
pub fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.pdf".to_string())
}

/// Derive the blob-store name for a staged upload.
///
/// `<stem>_<documentNumber><ext>` when a document number is supplied, else
/// `<millis>-<originalName>`. The document-number form keeps re-uploads of
/// the same slot at a stable, predictable name; the timestamp form avoids
/// collisions for uncommitted uploads.
pub fn derive_blob_name(original_name: &str, document_number: Option<&str>, millis: i64) -> String {
    let clean = sanitize_file_name(original_name);
    match document_number {
        Some(num) => {
            let stem = file_stem(&clean);
            let ext = Path::new(&clean)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            format!("{stem}_{num}{ext}")
        }
        None => format!("{millis}-{clean}"),
    }
}

/// The originals-store name for a secondary scan: `original_<name>`.
pub fn derive_original_name(original_name: &str) -> String {
    format!("{ORIGINAL_PREFIX}{}", sanitize_file_name(original_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_key_accepts_digits() {
        let key = LocationKey::new("G1", "3", "7").unwrap();
        assert_eq!(key.to_string(), "G1/3/7");
    }

    #[test]
    fn location_key_rejects_missing_fields() {
        assert!(matches!(
            LocationKey::new("", "3", "7"),
            Err(CatalogError::MissingField { field: "group" })
        ));
        assert!(matches!(
            LocationKey::new("G1", "  ", "7"),
            Err(CatalogError::MissingField { field: "folder" })
        ));
    }

    #[test]
    fn location_key_rejects_non_digits() {
        assert!(matches!(
            LocationKey::new("G1", "3a", "7"),
            Err(CatalogError::NotNumeric { field: "folder", .. })
        ));
        assert!(matches!(
            LocationKey::new("G1", "3", "7.5"),
            Err(CatalogError::NotNumeric {
                field: "document_number",
                ..
            })
        ));
    }

    #[test]
    fn presence_is_checked_before_format() {
        // An empty document_number must report MissingField, not NotNumeric.
        assert!(matches!(
            LocationKey::new("G1", "x", ""),
            Err(CatalogError::MissingField {
                field: "document_number"
            })
        ));
    }

    #[test]
    fn blob_name_with_document_number() {
        assert_eq!(
            derive_blob_name("scan.pdf", Some("7"), 0),
            "scan_7.pdf".to_string()
        );
        assert_eq!(
            derive_blob_name("deed of sale.PDF", Some("12"), 0),
            "deed of sale_12.PDF".to_string()
        );
    }

    #[test]
    fn blob_name_without_document_number_uses_timestamp() {
        assert_eq!(
            derive_blob_name("scan.pdf", None, 1_700_000_000_123),
            "1700000000123-scan.pdf".to_string()
        );
    }

    #[test]
    fn blob_name_strips_path_components() {
        assert_eq!(
            derive_blob_name("../../etc/passwd.pdf", Some("1"), 0),
            "passwd_1.pdf".to_string()
        );
    }

    #[test]
    fn original_name_is_prefixed() {
        assert_eq!(derive_original_name("scan.pdf"), "original_scan.pdf");
    }

    #[test]
    fn blob_file_name_takes_final_segment() {
        let record = CatalogRecord {
            id: "x".into(),
            title: "t".into(),
            category: String::new(),
            extracted_text: String::new(),
            blob_path: "/uploads/scan_7.pdf".into(),
            original_blob_name: None,
            location: LocationKey::new("G1", "3", "7").unwrap(),
            uploaded_at: Utc::now(),
        };
        assert_eq!(record.blob_file_name(), "scan_7.pdf");
    }
}
