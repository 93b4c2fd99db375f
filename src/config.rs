//! Configuration types for slide-deck-to-eBook conversion.
//!
//! Every knob of a conversion request lives in [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is passed explicitly into
//! each pipeline call; nothing (API provider, debug switches, page layout)
//! is kept in process-wide state, so two requests never see each other's
//! settings.

use crate::error::ConfigError;
use crate::pipeline::segment::{parse_ranges, ChapterRange};
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Smallest accepted slides-per-chapter value for [`ChapterPolicy::EqualGroups`].
pub const MIN_SLIDES_PER_CHAPTER: usize = 2;
/// Largest accepted slides-per-chapter value for [`ChapterPolicy::EqualGroups`].
pub const MAX_SLIDES_PER_CHAPTER: usize = 20;

/// Token replaced by the current chapter number in the footer template.
pub const CHAPTER_TOKEN: &str = "{chapter}";

/// Configuration for one conversion request.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use slides2ebook::{ChapterPolicy, ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .title("Distributed Systems Notes")
///     .author("Ada")
///     .chapter_policy(ChapterPolicy::EqualGroups { slides_per_chapter: 5 })
///     .formats(OutputFormat::Both)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// eBook title. Default: "My eBook". Also drives the output file names.
    pub title: String,

    /// Author shown on the title page and in document properties. Default: "Anonymous".
    pub author: String,

    /// Static text in every PDF page header and the DOCX header.
    /// If None, the title is used.
    pub header_text: Option<String>,

    /// Left footer template for PDF pages. `{chapter}` is replaced by the
    /// current chapter number; `{title}` and `{author}` are also expanded.
    /// If None, "Chapter {chapter}" is used.
    pub footer_template: Option<String>,

    /// How slides are grouped into chapters. Default: five slides per chapter.
    pub chapter_policy: ChapterPolicy,

    /// Which documents to produce. Default: PDF.
    pub formats: OutputFormat,

    /// PDF page size. Default: A4.
    pub page_size: PageSize,

    /// Start every chapter after the first on a new page. Default: false.
    pub chapter_starts_new_page: bool,

    /// Run slide text through the LLM. Default: true.
    ///
    /// When no provider can be resolved the conversion still runs, with
    /// enhancement disabled and a warning logged.
    pub enhance: bool,

    /// Number of concurrent enhancement calls. Default: 4.
    ///
    /// Output order never depends on this; it only bounds how many slides
    /// are in flight at once.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4.1-mini", "gemini-2.5-pro".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for enhancement. Default: 0.4.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per slide. Default: 2048.
    pub max_tokens: usize,

    /// Retries per slide on a failed or timed-out call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (doubles per attempt). Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses the built-in eBook-writer prompt.
    pub system_prompt: Option<String>,

    /// Per-call LLM timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Largest accepted input in bytes. Default: 100 MB.
    pub max_input_bytes: u64,

    /// Optional per-slide progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            title: "My eBook".to_string(),
            author: "Anonymous".to_string(),
            header_text: None,
            footer_template: None,
            chapter_policy: ChapterPolicy::default(),
            formats: OutputFormat::default(),
            page_size: PageSize::default(),
            chapter_starts_new_page: false,
            enhance: true,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.4,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            system_prompt: None,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            max_input_bytes: 100 * 1024 * 1024,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("title", &self.title)
            .field("author", &self.author)
            .field("header_text", &self.header_text)
            .field("footer_template", &self.footer_template)
            .field("chapter_policy", &self.chapter_policy)
            .field("formats", &self.formats)
            .field("page_size", &self.page_size)
            .field("chapter_starts_new_page", &self.chapter_starts_new_page)
            .field("enhance", &self.enhance)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Header text with the title fallback applied.
    pub fn effective_header(&self) -> String {
        match &self.header_text {
            Some(h) if !h.trim().is_empty() => h.clone(),
            _ => self.title.clone(),
        }
    }

    /// Footer template with the default applied.
    pub fn effective_footer_template(&self) -> String {
        match &self.footer_template {
            Some(f) if !f.trim().is_empty() => f.clone(),
            _ => format!("Chapter {CHAPTER_TOKEN}"),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = author.into();
        self
    }

    pub fn header_text(mut self, text: impl Into<String>) -> Self {
        self.config.header_text = Some(text.into());
        self
    }

    pub fn footer_template(mut self, template: impl Into<String>) -> Self {
        self.config.footer_template = Some(template.into());
        self
    }

    pub fn chapter_policy(mut self, policy: ChapterPolicy) -> Self {
        self.config.chapter_policy = policy;
        self
    }

    pub fn formats(mut self, formats: OutputFormat) -> Self {
        self.config.formats = formats;
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn chapter_starts_new_page(mut self, v: bool) -> Self {
        self.config.chapter_starts_new_page = v;
        self
    }

    pub fn enhance(mut self, v: bool) -> Self {
        self.config.enhance = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_input_bytes(mut self, bytes: u64) -> Self {
        self.config.max_input_bytes = bytes;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Custom-range coverage depends on the slide count and is checked by
    /// the segmenter once the deck has been read, still before any
    /// enhancement call.
    pub fn build(self) -> Result<ConversionConfig, ConfigError> {
        let c = &self.config;
        if let ChapterPolicy::EqualGroups { slides_per_chapter } = c.chapter_policy {
            check_slides_per_chapter(slides_per_chapter)?;
        }
        if let ChapterPolicy::CustomRanges(ref ranges) = c.chapter_policy {
            if ranges.is_empty() {
                return Err(ConfigError::NoRanges);
            }
        }
        if c.concurrency == 0 {
            return Err(ConfigError::Invalid("Concurrency must be ≥ 1".into()));
        }
        if c.max_input_bytes == 0 {
            return Err(ConfigError::Invalid("Input size limit must be > 0".into()));
        }
        Ok(self.config)
    }
}

pub(crate) fn check_slides_per_chapter(k: usize) -> Result<(), ConfigError> {
    if (MIN_SLIDES_PER_CHAPTER..=MAX_SLIDES_PER_CHAPTER).contains(&k) {
        Ok(())
    } else {
        Err(ConfigError::SlidesPerChapterOutOfRange(k))
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How slides are grouped into chapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChapterPolicy {
    /// Fixed-size groups; the last chapter takes the remainder.
    EqualGroups { slides_per_chapter: usize },
    /// Explicit inclusive slide ranges, one chapter per range, in the order given.
    CustomRanges(Vec<ChapterRange>),
    /// Every slide becomes its own chapter.
    OnePerChapter,
}

impl Default for ChapterPolicy {
    fn default() -> Self {
        ChapterPolicy::EqualGroups {
            slides_per_chapter: 5,
        }
    }
}

impl ChapterPolicy {
    /// Parse range text such as `"1-5, 6-12: Methods, 13"` into a policy.
    pub fn custom_ranges(text: &str) -> Result<Self, ConfigError> {
        Ok(ChapterPolicy::CustomRanges(parse_ranges(text)?))
    }
}

/// Which documents a request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Pdf,
    Docx,
    Both,
}

impl OutputFormat {
    /// The concrete document kinds to render, PDF first.
    pub fn kinds(self) -> Vec<DocumentKind> {
        match self {
            OutputFormat::Pdf => vec![DocumentKind::Pdf],
            OutputFormat::Docx => vec![DocumentKind::Docx],
            OutputFormat::Both => vec![DocumentKind::Pdf, DocumentKind::Docx],
        }
    }
}

/// A single output document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Pdf => write!(f, "PDF"),
            DocumentKind::Docx => write!(f, "DOCX"),
        }
    }
}

/// PDF page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in PostScript points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.title, "My eBook");
        assert_eq!(c.author, "Anonymous");
        assert_eq!(
            c.chapter_policy,
            ChapterPolicy::EqualGroups {
                slides_per_chapter: 5
            }
        );
        assert_eq!(c.formats, OutputFormat::Pdf);
        assert_eq!(c.max_input_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn build_rejects_slides_per_chapter_out_of_range() {
        for k in [0, 1, 21, 100] {
            let err = ConversionConfig::builder()
                .chapter_policy(ChapterPolicy::EqualGroups {
                    slides_per_chapter: k,
                })
                .build()
                .unwrap_err();
            assert_eq!(err, ConfigError::SlidesPerChapterOutOfRange(k));
        }
        for k in [2, 5, 20] {
            assert!(ConversionConfig::builder()
                .chapter_policy(ChapterPolicy::EqualGroups {
                    slides_per_chapter: k
                })
                .build()
                .is_ok());
        }
    }

    #[test]
    fn build_rejects_empty_range_list() {
        let err = ConversionConfig::builder()
            .chapter_policy(ChapterPolicy::CustomRanges(vec![]))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::NoRanges);
    }

    #[test]
    fn header_and_footer_fallbacks() {
        let c = ConversionConfig::builder().title("Rust Book").build().unwrap();
        assert_eq!(c.effective_header(), "Rust Book");
        assert_eq!(c.effective_footer_template(), "Chapter {chapter}");

        let c = ConversionConfig::builder()
            .header_text("Internal draft")
            .footer_template("Part {chapter} of {title}")
            .build()
            .unwrap();
        assert_eq!(c.effective_header(), "Internal draft");
        assert_eq!(c.effective_footer_template(), "Part {chapter} of {title}");
    }

    #[test]
    fn output_format_kinds() {
        assert_eq!(OutputFormat::Pdf.kinds(), vec![DocumentKind::Pdf]);
        assert_eq!(
            OutputFormat::Both.kinds(),
            vec![DocumentKind::Pdf, DocumentKind::Docx]
        );
        assert_eq!(DocumentKind::Docx.extension(), "docx");
    }
}
