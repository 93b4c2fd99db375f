//! Output types returned by the conversion functions.

use crate::config::DocumentKind;
use crate::error::{EbookError, EnhancementError, RenderError};
use crate::model::{AssetKind, Chapter, Slide};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of a complete conversion.
///
/// Contains one [`RenderedFile`] per requested format. A format that failed
/// carries its [`RenderError`]; the other format is unaffected.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Rendered documents, PDF first.
    pub files: Vec<RenderedFile>,
    /// Slides that fell back to their raw text.
    pub warnings: Vec<EnhancementError>,
    /// Chapter layout the document was built from.
    pub chapters: Vec<ChapterSummary>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// The rendered file of the given kind, if it was requested.
    pub fn file(&self, kind: DocumentKind) -> Option<&RenderedFile> {
        self.files.iter().find(|f| f.kind == kind)
    }

    /// Bytes of the given kind, if it was requested and rendered.
    pub fn bytes(&self, kind: DocumentKind) -> Option<&[u8]> {
        self.file(kind).and_then(RenderedFile::bytes)
    }

    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_err()).count()
    }

    /// Treat any failed format as an error.
    pub fn into_result(self) -> Result<Self, EbookError> {
        let total = self.files.len();
        let failed = self.failed_count();
        if failed == 0 {
            return Ok(self);
        }
        if failed == total {
            let first_error = self
                .files
                .iter()
                .find_map(|f| f.outcome.as_ref().err())
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(EbookError::AllFormatsFailed { total, first_error });
        }
        Err(EbookError::PartialFailure { failed, total })
    }

    /// Serialisable summary, without document bytes.
    pub fn report(&self) -> ConversionReport {
        ConversionReport {
            files: self.files.iter().map(FileReport::from).collect(),
            warnings: self.warnings.clone(),
            chapters: self.chapters.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// One output document, or the reason it could not be produced.
#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub kind: DocumentKind,
    /// File name derived from the eBook title, e.g. `My_eBook.pdf`.
    pub file_name: String,
    pub outcome: Result<Vec<u8>, RenderError>,
    /// Where the document was written, when written to disk.
    pub path: Option<PathBuf>,
}

impl RenderedFile {
    pub fn new(kind: DocumentKind, title: &str, outcome: Result<Vec<u8>, RenderError>) -> Self {
        Self {
            kind,
            file_name: output_file_name(title, kind),
            outcome,
            path: None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.outcome.as_deref().ok()
    }
}

/// Chapter layout as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub number: usize,
    pub heading: String,
    /// Source slide indices, 1-based.
    pub slides: Vec<usize>,
}

impl From<&Chapter> for ChapterSummary {
    fn from(c: &Chapter) -> Self {
        Self {
            number: c.number,
            heading: c.heading(),
            slides: c.slide_indices(),
        }
    }
}

/// Aggregate statistics for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_slides: usize,
    pub total_chapters: usize,
    /// Slides whose text came from the enhancer.
    pub enhanced_slides: usize,
    /// Slides that fell back to raw text after an enhancement failure.
    pub fallback_slides: usize,
    pub images: usize,
    pub diagrams: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub enhance_duration_ms: u64,
    pub render_duration_ms: u64,
}

/// JSON-friendly view of a [`ConversionOutput`].
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub files: Vec<FileReport>,
    pub warnings: Vec<EnhancementError>,
    pub chapters: Vec<ChapterSummary>,
    pub stats: ConversionStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub kind: DocumentKind,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&RenderedFile> for FileReport {
    fn from(f: &RenderedFile) -> Self {
        Self {
            kind: f.kind,
            file_name: f.file_name.clone(),
            path: f.path.clone(),
            size_bytes: f.bytes().map(<[u8]>::len),
            error: f.outcome.as_ref().err().map(|e| e.to_string()),
        }
    }
}

// ── Inspection ───────────────────────────────────────────────────────────

/// Deck structure as seen by [`crate::inspect`], without any enhancement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckSummary {
    pub name: String,
    pub slide_count: usize,
    pub slides: Vec<SlideSummary>,
    pub chapters: Vec<ChapterSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSummary {
    pub index: usize,
    pub title: String,
    pub body_chars: usize,
    pub photos: usize,
    pub diagrams: usize,
}

impl From<&Slide> for SlideSummary {
    fn from(s: &Slide) -> Self {
        let diagrams = s
            .assets
            .iter()
            .filter(|a| a.kind == AssetKind::Diagram)
            .count();
        Self {
            index: s.index,
            title: s.title.clone(),
            body_chars: s.body.chars().count(),
            photos: s.assets.len() - diagrams,
            diagrams,
        }
    }
}

// ── File naming ──────────────────────────────────────────────────────────

/// File stem for an eBook title: spaces become `_`, path-hostile
/// characters are dropped, and an empty result becomes `ebook`.
pub fn output_file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "ebook".to_string()
    } else {
        stem.to_string()
    }
}

pub fn output_file_name(title: &str, kind: DocumentKind) -> String {
    format!("{}.{}", output_file_stem(title), kind.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(kind: DocumentKind, ok: bool) -> RenderedFile {
        let outcome = if ok {
            Ok(vec![1, 2, 3])
        } else {
            Err(RenderError::Encode {
                format: kind.to_string(),
                detail: "boom".into(),
            })
        };
        RenderedFile::new(kind, "Deck", outcome)
    }

    fn output(files: Vec<RenderedFile>) -> ConversionOutput {
        ConversionOutput {
            files,
            warnings: vec![],
            chapters: vec![],
            stats: ConversionStats::default(),
        }
    }

    #[test]
    fn file_stem_sanitises_titles() {
        assert_eq!(output_file_stem("My eBook"), "My_eBook");
        assert_eq!(output_file_stem("Q3: Plans/Goals?"), "Q3_PlansGoals");
        assert_eq!(output_file_stem("  a <b> c  "), "a_b_c");
        assert_eq!(output_file_stem(""), "ebook");
        assert_eq!(output_file_stem("///"), "ebook");
        assert_eq!(output_file_stem(".."), "ebook");
        assert_eq!(output_file_name("Café Notes", DocumentKind::Docx), "Café_Notes.docx");
    }

    #[test]
    fn into_result_distinguishes_partial_and_total_failure() {
        let ok = output(vec![file(DocumentKind::Pdf, true), file(DocumentKind::Docx, true)]);
        assert!(ok.into_result().is_ok());

        let partial = output(vec![file(DocumentKind::Pdf, true), file(DocumentKind::Docx, false)]);
        assert!(matches!(
            partial.into_result(),
            Err(EbookError::PartialFailure { failed: 1, total: 2 })
        ));

        let none = output(vec![file(DocumentKind::Pdf, false)]);
        match none.into_result() {
            Err(EbookError::AllFormatsFailed { total, first_error }) => {
                assert_eq!(total, 1);
                assert!(first_error.contains("boom"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn report_omits_bytes_and_keeps_errors() {
        let out = output(vec![file(DocumentKind::Pdf, true), file(DocumentKind::Docx, false)]);
        let json = serde_json::to_value(out.report()).unwrap();
        assert_eq!(json["files"][0]["size_bytes"], 3);
        assert_eq!(json["files"][0]["file_name"], "Deck.pdf");
        assert!(json["files"][1]["error"].as_str().unwrap().contains("boom"));
        assert!(json["files"][0].get("error").is_none());
    }

    #[test]
    fn slide_summary_counts_assets() {
        use crate::model::VisualAsset;
        let slide = Slide::new(4, "Flow", "abc")
            .with_asset(VisualAsset::new(vec![], AssetKind::Photo))
            .with_asset(VisualAsset::new(vec![], AssetKind::Diagram));
        let s = SlideSummary::from(&slide);
        assert_eq!((s.photos, s.diagrams, s.body_chars), (1, 1, 3));
    }
}
