//! Conversion entry points.
//!
//! Every function here runs the same pipeline and differs only in where the
//! deck comes from and where the documents go:
//!
//! | Function | Input | Output |
//! |----------|-------|--------|
//! | [`convert`] | path or URL | in memory |
//! | [`convert_bytes`] | bytes | in memory |
//! | [`convert_with_enhancer`] | bytes + caller's [`Enhancer`] | in memory |
//! | [`convert_to_dir`] | path or URL | files in a directory |
//! | [`convert_sync`] | path or URL | in memory, blocking |
//!
//! [`inspect`] stops after segmentation and never contacts an LLM.

use crate::config::{ConversionConfig, DocumentKind};
use crate::error::{EbookError, EnhancementError, RenderError};
use crate::model::{Block, Slide};
use crate::output::{ChapterSummary, ConversionOutput, ConversionStats, DeckSummary, RenderedFile, SlideSummary};
use crate::pipeline::llm::{resolve_provider, EnhanceRequest, Enhancement, Enhancer, LlmEnhancer, Passthrough};
use crate::pipeline::{assemble, extract, input, segment};
use crate::render::{docx, pdf, RenderMetadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PPTX file or URL into the configured eBook formats.
///
/// # Returns
/// `Ok(ConversionOutput)` when at least one format rendered. Slides that
/// could not be enhanced are listed in `output.warnings`; a format that
/// failed carries its error in `output.files`.
///
/// # Errors
/// Fatal errors only: unreadable or invalid input, a corrupt deck, an
/// invalid chapter policy, an explicitly requested provider that cannot be
/// created, or every format failing.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, EbookError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let loaded = input::load_input(
        input_str,
        config.download_timeout_secs,
        config.max_input_bytes,
    )
    .await?;
    convert_bytes(loaded.bytes, &loaded.name, config).await
}

/// Convert an in-memory PPTX deck. `name` is used in log and error messages.
pub async fn convert_bytes(
    bytes: Vec<u8>,
    name: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, EbookError> {
    let enhancer = ConfiguredEnhancer::from_config(config)?;
    convert_with_enhancer(bytes, name, config, &enhancer).await
}

/// Convert an in-memory deck with a caller-supplied enhancer.
///
/// `config.enhance` and the provider settings are ignored; everything else
/// applies. Use [`Passthrough`] for a conversion without enhancement.
pub async fn convert_with_enhancer<E: Enhancer>(
    bytes: Vec<u8>,
    name: &str,
    config: &ConversionConfig,
    enhancer: &E,
) -> Result<ConversionOutput, EbookError> {
    let total_start = Instant::now();

    // ── Step 1: Read the deck ────────────────────────────────────────────
    let slides = extract_blocking(bytes, name, config.max_input_bytes).await?;

    // ── Step 2: Chapters (fails before any enhancement work) ─────────────
    let chapters = segment::segment(slides, &config.chapter_policy)?;
    let total_slides: usize = chapters.iter().map(|c| c.slides.len()).sum();
    info!(
        "'{}': {} slides in {} chapters",
        name,
        total_slides,
        chapters.len()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_slides, chapters.len());
    }

    // ── Step 3: Enhance and assemble ─────────────────────────────────────
    let enhance_start = Instant::now();
    let assembled = assemble::assemble(
        &chapters,
        &config.title,
        enhancer,
        config.concurrency,
        config.progress_callback.as_ref(),
    )
    .await;
    let enhance_duration_ms = enhance_start.elapsed().as_millis() as u64;
    for w in &assembled.warnings {
        debug!("{}", w);
    }

    // ── Step 4: Render each format ───────────────────────────────────────
    let render_start = Instant::now();
    let meta = RenderMetadata::from_config(config, RenderMetadata::today());
    let files = render_all(assembled.blocks, meta, config).await;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_slides, assembled.stats.enhanced_slides);
    }

    let failed = files.iter().filter(|f| f.outcome.is_err()).count();
    if failed == files.len() {
        let first_error = files
            .iter()
            .find_map(|f| f.outcome.as_ref().err())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no output format requested".to_string());
        return Err(EbookError::AllFormatsFailed {
            total: files.len(),
            first_error,
        });
    }

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let a = &assembled.stats;
    let stats = ConversionStats {
        total_slides,
        total_chapters: chapters.len(),
        enhanced_slides: a.enhanced_slides,
        fallback_slides: a.fallback_slides,
        images: a.images,
        diagrams: a.diagrams,
        total_input_tokens: a.input_tokens,
        total_output_tokens: a.output_tokens,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        enhance_duration_ms,
        render_duration_ms,
    };

    info!(
        "Conversion complete: {} slides ({} enhanced, {} fallback), {}/{} formats, {}ms",
        total_slides,
        stats.enhanced_slides,
        stats.fallback_slides,
        files.len() - failed,
        files.len(),
        stats.total_duration_ms
    );
    Ok(ConversionOutput {
        files,
        warnings: assembled.warnings,
        chapters: chapters.iter().map(ChapterSummary::from).collect(),
        stats,
    })
}

/// Convert and write the rendered documents into `dir`.
///
/// Each file is written atomically (temp file + rename), and its path is
/// recorded in `RenderedFile::path`. Failed formats are not written.
pub async fn convert_to_dir(
    input_str: impl AsRef<str>,
    dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, EbookError> {
    let mut output = convert(input_str, config).await?;
    write_outputs(&mut output, dir.as_ref()).await?;
    Ok(output)
}

/// Write every successfully rendered file of `output` into `dir`.
pub async fn write_outputs(output: &mut ConversionOutput, dir: &Path) -> Result<(), EbookError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| EbookError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    for file in &mut output.files {
        let Ok(bytes) = &file.outcome else {
            continue;
        };
        let path = dir.join(&file.file_name);
        write_atomic(&path, bytes).await?;
        info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        file.path = Some(path);
    }
    Ok(())
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), EbookError> {
    let write_failed = |source| EbookError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, EbookError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| EbookError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Read a deck and report its slides and chapter layout.
///
/// Applies `config`'s chapter policy and input limits. Does not require an
/// LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<DeckSummary, EbookError> {
    let loaded = input::load_input(
        input_str.as_ref(),
        config.download_timeout_secs,
        config.max_input_bytes,
    )
    .await?;
    let name = loaded.name.clone();
    let slides = extract_blocking(loaded.bytes, &loaded.name, config.max_input_bytes).await?;
    let slide_summaries: Vec<SlideSummary> = slides.iter().map(SlideSummary::from).collect();
    let chapters = segment::segment(slides, &config.chapter_policy)?;

    Ok(DeckSummary {
        name,
        slide_count: slide_summaries.len(),
        slides: slide_summaries,
        chapters: chapters.iter().map(ChapterSummary::from).collect(),
    })
}

// ── Enhancer selection ───────────────────────────────────────────────────

/// The enhancer a [`ConversionConfig`] asks for.
pub(crate) enum ConfiguredEnhancer {
    Llm(LlmEnhancer),
    Passthrough(Passthrough),
}

impl ConfiguredEnhancer {
    pub(crate) fn from_config(config: &ConversionConfig) -> Result<Self, EbookError> {
        if !config.enhance {
            info!("Enhancement disabled; slide text is used as written");
            return Ok(Self::Passthrough(Passthrough));
        }
        match resolve_provider(config)? {
            Some(provider) => {
                info!(
                    "LLM enhancement enabled (concurrency {})",
                    config.concurrency
                );
                Ok(Self::Llm(LlmEnhancer::new(provider, config)))
            }
            None => Ok(Self::Passthrough(Passthrough)),
        }
    }
}

impl Enhancer for ConfiguredEnhancer {
    async fn enhance(&self, req: &EnhanceRequest<'_>) -> Result<Enhancement, EnhancementError> {
        match self {
            Self::Llm(e) => e.enhance(req).await,
            Self::Passthrough(e) => e.enhance(req).await,
        }
    }

    fn is_active(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_active(),
            Self::Passthrough(e) => e.is_active(),
        }
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Validate and extract the deck off the async runtime.
async fn extract_blocking(
    bytes: Vec<u8>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<Slide>, EbookError> {
    input::check_bytes(name, &bytes, max_bytes)?;
    let owned_name = name.to_string();
    tokio::task::spawn_blocking(move || extract::extract_slides(&owned_name, &bytes))
        .await
        .map_err(|e| EbookError::Internal(format!("extraction task failed: {e}")))?
}

fn render_one(kind: DocumentKind, blocks: &[Block], meta: &RenderMetadata) -> Result<Vec<u8>, RenderError> {
    match kind {
        DocumentKind::Pdf => pdf::render_pdf(blocks, meta),
        DocumentKind::Docx => docx::render_docx(blocks, meta),
    }
}

/// Render every requested format concurrently on the blocking pool.
async fn render_all(
    blocks: Vec<Block>,
    meta: RenderMetadata,
    config: &ConversionConfig,
) -> Vec<RenderedFile> {
    let blocks = Arc::new(blocks);
    let meta = Arc::new(meta);

    let tasks = config.formats.kinds().into_iter().map(|kind| {
        let blocks = Arc::clone(&blocks);
        let meta = Arc::clone(&meta);
        async move {
            let outcome = tokio::task::spawn_blocking(move || render_one(kind, &blocks, &meta))
                .await
                .unwrap_or_else(|e| {
                    Err(RenderError::Internal {
                        format: kind.to_string(),
                        detail: e.to_string(),
                    })
                });
            (kind, outcome)
        }
    });
    let results = futures::future::join_all(tasks).await;

    results
        .into_iter()
        .map(|(kind, outcome)| {
            match &outcome {
                Ok(bytes) => debug!("{} rendered: {} bytes", kind, bytes.len()),
                Err(e) => warn!("{}", e),
            }
            if let Some(ref cb) = config.progress_callback {
                match &outcome {
                    Ok(bytes) => cb.on_document_rendered(kind, Ok(bytes.len())),
                    Err(e) => {
                        let msg = e.to_string();
                        cb.on_document_rendered(kind, Err(&msg));
                    }
                }
            }
            RenderedFile::new(kind, &config.title, outcome)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChapterPolicy, OutputFormat};
    use crate::pipeline::extract::tests::{build_pptx, TestSlide};

    fn deck(n: usize) -> Vec<u8> {
        let titles: Vec<String> = (1..=n).map(|i| format!("Slide {i}")).collect();
        let slides: Vec<TestSlide> = titles
            .iter()
            .map(|t| TestSlide {
                title: Some(t.as_str()),
                texts: vec!["Some body text."],
                pictures: vec![],
            })
            .collect();
        build_pptx(&slides)
    }

    #[test]
    fn disabled_enhancement_is_passthrough() {
        let config = ConversionConfig::builder().enhance(false).build().unwrap();
        let e = ConfiguredEnhancer::from_config(&config).unwrap();
        assert!(matches!(e, ConfiguredEnhancer::Passthrough(_)));
        assert!(!e.is_active());
    }

    #[tokio::test]
    async fn converts_bytes_to_both_formats() {
        let config = ConversionConfig::builder()
            .title("Unit Deck")
            .formats(OutputFormat::Both)
            .chapter_policy(ChapterPolicy::EqualGroups {
                slides_per_chapter: 2,
            })
            .enhance(false)
            .build()
            .unwrap();
        let out = convert_bytes(deck(3), "unit.pptx", &config).await.unwrap();
        assert_eq!(out.files.len(), 2);
        assert!(out.bytes(DocumentKind::Pdf).unwrap().starts_with(b"%PDF"));
        assert!(out.bytes(DocumentKind::Docx).unwrap().starts_with(b"PK"));
        assert_eq!(out.files[0].file_name, "Unit_Deck.pdf");
        assert_eq!(out.stats.total_slides, 3);
        assert_eq!(out.stats.total_chapters, 2);
        assert_eq!(out.stats.enhanced_slides, 0);
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn invalid_policy_fails_before_rendering() {
        let config = ConversionConfig::builder()
            .chapter_policy(ChapterPolicy::custom_ranges("1-2").unwrap())
            .enhance(false)
            .build()
            .unwrap();
        let err = convert_bytes(deck(3), "unit.pptx", &config).await.unwrap_err();
        assert!(matches!(
            err,
            EbookError::Config(crate::error::ConfigError::UncoveredSlide { slide: 3 })
        ));
    }

    #[tokio::test]
    async fn non_zip_bytes_are_rejected() {
        let config = ConversionConfig::builder().enhance(false).build().unwrap();
        let err = convert_bytes(b"%PDF-1.7".to_vec(), "x.pdf", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, EbookError::NotAPresentation { .. }));
    }
}
