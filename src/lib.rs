//! # slides2ebook
//!
//! Convert PowerPoint (PPTX) slide decks into PDF and DOCX eBooks.
//!
//! ## Why this crate?
//!
//! A slide deck is terse by design: titles, bullet fragments and pictures.
//! Printing the slides gives a handout, not a book. This crate groups slides
//! into chapters, optionally asks an LLM to turn each slide's bullets into
//! flowing prose, and lays the result out as a paginated PDF (with a running
//! header and a footer that tracks the current chapter) and/or a DOCX file
//! with real heading styles.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PPTX
//!  │
//!  ├─ 1. Input     read local file or download from URL (≤ 100 MB, ZIP check)
//!  ├─ 2. Extract   slide titles, text and pictures; diagrams tagged
//!  ├─ 3. Segment   equal groups, custom ranges, or one slide per chapter
//!  ├─ 4. Enhance   concurrent LLM calls; raw-text fallback per slide
//!  ├─ 5. Assemble  chapter headings, slide sections, captioned figures
//!  └─ 6. Render    PDF (pdf-writer) and DOCX (docx-rs), independently
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slides2ebook::{convert_to_dir, ChapterPolicy, ConversionConfig, OutputFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY;
//!     // without one, slide text is used as written.
//!     let config = ConversionConfig::builder()
//!         .title("Distributed Systems")
//!         .author("Ada")
//!         .chapter_policy(ChapterPolicy::custom_ranges("1-4: Basics, 5-12: Consensus")?)
//!         .formats(OutputFormat::Both)
//!         .build()?;
//!     let output = convert_to_dir("lecture.pptx", "books", &config).await?;
//!     for file in &output.files {
//!         println!("{}: {:?}", file.kind, file.path);
//!     }
//!     eprintln!("{} slides fell back to raw text", output.warnings.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slides2ebook` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! slides2ebook = { version = "0.1", default-features = false }
//! ```
//!
//! ## Custom enhancers
//!
//! Enhancement sits behind the [`Enhancer`] trait. Pass your own
//! implementation to [`convert_with_enhancer`] to use a different text
//! service, or [`Passthrough`] to skip enhancement entirely.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod render;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ChapterPolicy, ConversionConfig, ConversionConfigBuilder, DocumentKind, OutputFormat, PageSize,
};
pub use convert::{
    convert, convert_bytes, convert_sync, convert_to_dir, convert_with_enhancer, inspect,
    write_outputs,
};
pub use error::{ConfigError, EbookError, EnhancementError, RenderError};
pub use model::{AssetKind, Block, Chapter, Slide, VisualAsset};
pub use output::{
    ChapterSummary, ConversionOutput, ConversionReport, ConversionStats, DeckSummary,
    RenderedFile, SlideSummary,
};
pub use pipeline::llm::{EnhanceRequest, Enhancement, Enhancer, LlmEnhancer, Passthrough};
pub use pipeline::segment::ChapterRange;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use render::RenderMetadata;
