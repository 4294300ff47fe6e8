//! Reconciliation: merge the blob listing and the record listing into one
//! catalog view.
//!
//! The two stores mutate independently, so neither is authoritative alone:
//!
//! * a record whose blob exists is a **matched** entry;
//! * a blob no matched record references is an **orphan** entry;
//! * a record whose blob is missing appears in neither set — it is
//!   invisible until its blob reappears or the record is purged.
//!
//! The view is a pure function of `(records, files)` — nothing here touches
//! a store, and every listing request recomputes it from scratch, so two
//! listings with no intervening mutation are identical.
//!
//! Ordering is archive order, not insertion order: group compares with
//! numeric-aware lexicographic rules ("G2" before "G10"), folder and
//! document number compare numerically.

use serde::Serialize;
use std::cmp::Ordering;

use crate::catalog::record::CatalogRecord;

/// A catalog record whose blob is confirmed present.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedEntry {
    pub record: CatalogRecord,
    /// The blob filename (final segment of the record's blob path).
    pub file_name: String,
}

/// A blob with no catalog record.
#[derive(Debug, Clone, Serialize)]
pub struct OrphanEntry {
    pub file_name: String,
}

/// The derived, read-only projection of both stores. Never persisted.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CatalogView {
    pub matched: Vec<MatchedEntry>,
    pub orphans: Vec<OrphanEntry>,
}

impl CatalogView {
    /// Distinct "no documents" signal: both sets empty is a valid, ordinary
    /// state of a fresh archive, not an error.
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.orphans.is_empty()
    }
}

/// Build the catalog view from the full record and blob listings,
/// optionally filtered by a search query.
///
/// The query filters matched entries by title and orphan entries by
/// filename — case-insensitive substring, each set filtered independently.
pub fn build_view(
    records: Vec<CatalogRecord>,
    files: &[String],
    query: Option<&str>,
) -> CatalogView {
    let mut matched: Vec<MatchedEntry> = records
        .into_iter()
        .filter_map(|record| {
            let file_name = record.blob_file_name().to_string();
            if files.iter().any(|f| *f == file_name) {
                Some(MatchedEntry { record, file_name })
            } else {
                None
            }
        })
        .collect();

    let mut orphans: Vec<OrphanEntry> = files
        .iter()
        .filter(|f| !matched.iter().any(|m| m.file_name == **f))
        .map(|f| OrphanEntry {
            file_name: f.clone(),
        })
        .collect();

    if let Some(q) = query {
        let q = q.to_lowercase();
        if !q.is_empty() {
            matched.retain(|m| m.record.title.to_lowercase().contains(&q));
            orphans.retain(|o| o.file_name.to_lowercase().contains(&q));
        }
    }

    matched.sort_by(|a, b| {
        let la = &a.record.location;
        let lb = &b.record.location;
        natural_cmp(&la.group, &lb.group)
            .then_with(|| numeric_str_cmp(&la.folder, &lb.folder))
            .then_with(|| numeric_str_cmp(&la.document_number, &lb.document_number))
    });
    orphans.sort_by(|a, b| natural_cmp(&a.file_name, &b.file_name));

    CatalogView { matched, orphans }
}

/// Candidate names for an orphan's companion original scan, in probe order.
///
/// Originals are stored as `original_<uploadName>`; for an orphan we only
/// know the staged blob name, so try the convention applied literally and,
/// when the name already carries the prefix, the name itself.
pub fn original_candidates(file_name: &str) -> Vec<String> {
    let mut candidates = vec![format!("original_{file_name}")];
    if file_name.starts_with("original_") {
        candidates.push(file_name.to_string());
    }
    candidates
}

/// Compare digit strings by numeric value without parsing: strip leading
/// zeros, then longer means larger, then byte order decides.
fn numeric_str_cmp(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Numeric-aware lexicographic comparison: digit runs compare by value,
/// everything else byte-wise case-insensitively.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    while i < a_bytes.len() && j < b_bytes.len() {
        let (ca, cb) = (a_bytes[i], b_bytes[j]);
        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let run = |s: &[u8], mut k: usize| {
                let start = k;
                while k < s.len() && s[k].is_ascii_digit() {
                    k += 1;
                }
                (start, k)
            };
            let (sa, ea) = run(a_bytes, i);
            let (sb, eb) = run(b_bytes, j);
            let ord = numeric_str_cmp(&a[sa..ea], &b[sb..eb]);
            if ord != Ordering::Equal {
                return ord;
            }
            i = ea;
            j = eb;
        } else {
            let ord = ca.to_ascii_lowercase().cmp(&cb.to_ascii_lowercase());
            if ord != Ordering::Equal {
                return ord;
            }
            i += 1;
            j += 1;
        }
    }

    (a_bytes.len() - i).cmp(&(b_bytes.len() - j))
}
