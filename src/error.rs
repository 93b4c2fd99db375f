//! Error types for the slides2ebook library.
//!
//! Four error types reflect four failure scopes:
//!
//! * [`EbookError`]: **fatal**, the request cannot proceed at all (bad
//!   input file, corrupt deck, invalid chapter policy). Returned as
//!   `Err(EbookError)` from the top-level `convert*` functions.
//!
//! * [`ConfigError`]: invalid configuration, in particular chapter-policy
//!   parameters. Always raised before any enhancement call is made, so no
//!   partial work is ever thrown away. Wrapped by [`EbookError::Config`].
//!
//! * [`EnhancementError`]: **non-fatal**, one slide could not be enhanced.
//!   The slide falls back to its raw text and the error is kept in
//!   [`crate::output::ConversionOutput::warnings`].
//!
//! * [`RenderError`]: one output format failed. Stored in that format's
//!   [`crate::output::RenderedFile`] so the other format can still succeed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the slides2ebook library.
#[derive(Debug, Error)]
pub enum EbookError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Presentation not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Input is larger than the configured ceiling.
    #[error("Presentation '{name}' is {size} bytes; the limit is {limit} bytes")]
    InputTooLarge { name: String, size: u64, limit: u64 },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The bytes are not a ZIP container, so cannot be a PPTX deck.
    #[error("'{name}' is not a PPTX presentation\nFirst bytes: {magic:?}")]
    NotAPresentation { name: String, magic: [u8; 4] },

    /// The container opened but a required part is missing or unreadable.
    #[error("Presentation '{name}' is corrupt: {detail}")]
    CorruptPresentation { name: String, detail: String },

    /// The deck parsed but contains no slides.
    #[error("Presentation '{name}' has no slides")]
    EmptyPresentation { name: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Invalid configuration or chapter-policy parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// A provider was requested explicitly but could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Every requested output format failed to render.
    #[error("All {total} output formats failed.\nFirst error: {first_error}")]
    AllFormatsFailed { total: usize, first_error: String },

    /// Some formats rendered but at least one failed.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when
    /// the caller wants to treat any format failure as an error.
    #[error("{failed}/{total} output formats failed")]
    PartialFailure { failed: usize, total: usize },

    /// Could not create or write an output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Invalid configuration, reported before any slide is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Slides per chapter must be 2–20, got {0}")]
    SlidesPerChapterOutOfRange(usize),

    #[error("No chapter ranges given")]
    NoRanges,

    #[error("Malformed chapter range '{range}': expected 'start-end', 'start-end: label' or a single slide number")]
    MalformedRange { range: String },

    #[error("Chapter range '{range}' ends before it starts")]
    InvertedRange { range: String },

    #[error("Chapter range '{range}' is outside slides 1–{slide_count}")]
    RangeOutOfBounds { range: String, slide_count: usize },

    #[error("Chapter range '{range}' covers slide {slide}, which an earlier range already covers")]
    OverlappingRange { range: String, slide: usize },

    #[error("Slide {slide} is not covered by any chapter range")]
    UncoveredSlide { slide: usize },

    /// Any other builder validation failure.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A non-fatal enhancement failure for a single slide.
///
/// The slide is rendered from its raw text instead.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum EnhancementError {
    /// The provider returned errors on every attempt.
    #[error("Slide {slide}: enhancement failed after {retries} retries: {detail}")]
    Failed {
        slide: usize,
        retries: u32,
        detail: String,
    },

    /// The last attempt exceeded the per-call timeout.
    #[error("Slide {slide}: enhancement timed out after {secs}s")]
    Timeout { slide: usize, secs: u64 },

    /// The provider answered with nothing usable.
    #[error("Slide {slide}: enhancement returned an empty response")]
    EmptyResponse { slide: usize },
}

impl EnhancementError {
    /// Source slide index this error belongs to.
    pub fn slide(&self) -> usize {
        match self {
            EnhancementError::Failed { slide, .. }
            | EnhancementError::Timeout { slide, .. }
            | EnhancementError::EmptyResponse { slide } => *slide,
        }
    }
}

/// A failure confined to one output format.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RenderError {
    /// An image block carries bytes the renderer cannot decode.
    #[error("{format}: cannot place image '{caption}': {detail}")]
    UndecodableImage {
        format: String,
        caption: String,
        detail: String,
    },

    /// The document could not be serialised.
    #[error("{format}: failed to encode document: {detail}")]
    Encode { format: String, detail: String },

    /// The render task itself failed.
    #[error("{format}: internal render error: {detail}")]
    Internal { format: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = EbookError::PartialFailure {
            failed: 1,
            total: 2,
        };
        assert!(e.to_string().contains("1/2"), "got: {e}");
    }

    #[test]
    fn uncovered_slide_names_the_slide() {
        let e = EbookError::from(ConfigError::UncoveredSlide { slide: 6 });
        assert_eq!(e.to_string(), "Slide 6 is not covered by any chapter range");
    }

    #[test]
    fn overlap_names_range_and_slide() {
        let e = ConfigError::OverlappingRange {
            range: "4-8".into(),
            slide: 4,
        };
        let msg = e.to_string();
        assert!(msg.contains("4-8"), "got: {msg}");
        assert!(msg.contains("slide 4"), "got: {msg}");
    }

    #[test]
    fn enhancement_error_slide_accessor() {
        let e = EnhancementError::Timeout { slide: 3, secs: 60 };
        assert_eq!(e.slide(), 3);
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn render_error_names_format() {
        let e = RenderError::UndecodableImage {
            format: "PDF".into(),
            caption: "Figure 1.1: Intro".into(),
            detail: "unsupported".into(),
        };
        assert!(e.to_string().starts_with("PDF:"));
    }
}
