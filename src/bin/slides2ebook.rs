//! CLI binary for slides2ebook.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use slides2ebook::{
    convert_to_dir, inspect, ChapterPolicy, ConversionConfig, ConversionOutput,
    ConversionProgressCallback, DeckSummary, DocumentKind, OutputFormat, PageSize,
    ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Shorten `s` to at most `max` characters.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per slide. Slides may finish out of
/// order when several enhancement calls are in flight.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the slide count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading presentation…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Writing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, slide: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&slide))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_slides: usize, total_chapters: usize) {
        self.activate_bar(total_slides);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Writing {total_slides} slides as {total_chapters} chapters…"
            ))
        ));
    }

    fn on_slide_start(&self, slide: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(slide, Instant::now());
        }
        self.bar.set_message(format!("slide {slide}"));
    }

    fn on_slide_complete(&self, slide: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(slide);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            slide,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_slide_fallback(&self, slide: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(slide);
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            yellow("↺"),
            slide,
            total,
            yellow(&format!("raw text: {}", truncate(error, 70))),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_rendered(&self, kind: DocumentKind, result: Result<usize, &str>) {
        match result {
            Ok(bytes) => self.bar.println(format!(
                "  {} {:<4} {}",
                green("✓"),
                kind,
                dim(&format!("{} KB", bytes.div_ceil(1024)))
            )),
            Err(e) => self
                .bar
                .println(format!("  {} {:<4} {}", red("✗"), kind, red(&truncate(e, 80)))),
        }
    }

    fn on_conversion_complete(&self, total_slides: usize, enhanced: usize) {
        self.bar.finish_and_clear();
        let fallbacks = self.fallbacks.load(Ordering::SeqCst);
        if fallbacks == 0 {
            eprintln!(
                "{} {} slides written ({} enhanced)",
                green("✔"),
                bold(&total_slides.to_string()),
                enhanced
            );
        } else {
            eprintln!(
                "{} {} slides written  ({} used raw text)",
                cyan("⚠"),
                bold(&total_slides.to_string()),
                yellow(&fallbacks.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Five slides per chapter, PDF into ./output
  slides2ebook lecture.pptx

  # Both formats with a title and author
  slides2ebook --title "Distributed Systems" --author "Ada" --format both lecture.pptx

  # Custom chapters, with optional labels and single-slide chapters
  slides2ebook --chapters ranges --ranges "1-4: Basics, 5-11: Consensus, 12" deck.pptx

  # One chapter per slide, each starting on a new page
  slides2ebook --chapters single --chapter-page-break deck.pptx

  # Keep the slide text as written (no LLM)
  slides2ebook --no-enhance deck.pptx

  # Show slides and chapter layout only (no API key needed)
  slides2ebook --inspect-only --chapters equal --slides-per-chapter 3 deck.pptx

  # Convert from URL, JSON report on stdout
  slides2ebook --json https://example.com/talk.pptx > report.json

FOOTER TEMPLATE:
  {chapter}  current chapter number (default template: "Chapter {chapter}")
  {title}    eBook title
  {author}   author name
  A template without {chapter} gets "  |  Chapter N" appended.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  SLIDES2EBOOK_*          Every flag, e.g. SLIDES2EBOOK_FORMAT=both

  Without any API key the deck is converted with its slide text as written.
"#;

/// Convert PowerPoint decks into PDF and DOCX eBooks.
#[derive(Parser, Debug)]
#[command(
    name = "slides2ebook",
    version,
    about = "Convert PowerPoint decks into PDF and DOCX eBooks",
    long_about = "Convert a PPTX slide deck (local file or URL) into a formatted eBook. \
Slides are grouped into chapters, each slide's text is optionally rewritten as book prose by \
an LLM (OpenAI, Anthropic, Gemini, Ollama, ...), and the result is written as a paginated PDF \
with chapter-aware footers and/or a DOCX document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PPTX file path or HTTP/HTTPS URL.
    input: String,

    /// Directory the eBook files are written to.
    #[arg(short, long, env = "SLIDES2EBOOK_OUT_DIR", default_value = "output")]
    out_dir: PathBuf,

    /// eBook title (also names the output files).
    #[arg(long, env = "SLIDES2EBOOK_TITLE", default_value = "My eBook")]
    title: String,

    /// Author shown on the title page.
    #[arg(long, env = "SLIDES2EBOOK_AUTHOR", default_value = "Anonymous")]
    author: String,

    /// Running header text. Default: the title.
    #[arg(long, env = "SLIDES2EBOOK_HEADER")]
    header: Option<String>,

    /// Footer template; see FOOTER TEMPLATE below.
    #[arg(long, env = "SLIDES2EBOOK_FOOTER")]
    footer: Option<String>,

    /// Chapter policy.
    #[arg(long, env = "SLIDES2EBOOK_CHAPTERS", value_enum, default_value = "equal")]
    chapters: ChaptersArg,

    /// Slides per chapter for `--chapters equal` (2–20).
    #[arg(long, env = "SLIDES2EBOOK_SLIDES_PER_CHAPTER", default_value_t = 5)]
    slides_per_chapter: usize,

    /// Ranges for `--chapters ranges`, e.g. "1-5, 6-12: Methods, 13".
    #[arg(long, env = "SLIDES2EBOOK_RANGES")]
    ranges: Option<String>,

    /// Output format.
    #[arg(long, env = "SLIDES2EBOOK_FORMAT", value_enum, default_value = "pdf")]
    format: FormatArg,

    /// PDF page size.
    #[arg(long, env = "SLIDES2EBOOK_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Start every chapter after the first on a new page.
    #[arg(long, env = "SLIDES2EBOOK_CHAPTER_PAGE_BREAK")]
    chapter_page_break: bool,

    /// Use slide text as written; make no LLM calls.
    #[arg(long, env = "SLIDES2EBOOK_NO_ENHANCE")]
    no_enhance: bool,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "SLIDES2EBOOK_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// LLM model ID (default: gpt-4.1-mini).
    #[arg(long, env = "SLIDES2EBOOK_MODEL")]
    model: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "SLIDES2EBOOK_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Number of concurrent LLM calls.
    #[arg(short, long, env = "SLIDES2EBOOK_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries per slide on LLM failure.
    #[arg(long, env = "SLIDES2EBOOK_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SLIDES2EBOOK_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Max LLM output tokens per slide.
    #[arg(long, env = "SLIDES2EBOOK_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "SLIDES2EBOOK_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SLIDES2EBOOK_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print slides and chapter layout only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Print a JSON report on stdout.
    #[arg(long, env = "SLIDES2EBOOK_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SLIDES2EBOOK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs and full error chains.
    #[arg(short, long, env = "SLIDES2EBOOK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SLIDES2EBOOK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ChaptersArg {
    /// Fixed-size groups (`--slides-per-chapter`).
    Equal,
    /// Explicit ranges (`--ranges`).
    Ranges,
    /// One chapter per slide.
    Single,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Docx,
    Both,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => OutputFormat::Pdf,
            FormatArg::Docx => OutputFormat::Docx,
            FormatArg::Both => OutputFormat::Both,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(e) = run(cli).await {
        if verbose {
            eprintln!("{} {:?}", red("error:"), e);
        } else {
            eprintln!("{} {}", red("error:"), e);
            if let Some(cause) = e.chain().nth(1) {
                eprintln!("  {}", dim(&cause.to_string()));
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None).await?;
        let summary = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect presentation")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
            );
        } else {
            print_summary(&summary);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_to_dir(&cli.input, &cli.out_dir, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output.report()).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        print_result(&output, show_progress);
    }

    let failed = output.failed_count();
    if failed > 0 {
        anyhow::bail!(
            "{failed} of {} output formats failed",
            output.files.len()
        );
    }
    Ok(())
}

fn print_summary(summary: &DeckSummary) {
    println!("File:      {}", summary.name);
    println!("Slides:    {}", summary.slide_count);
    for s in &summary.slides {
        let title = if s.title.is_empty() { "(untitled)" } else { s.title.as_str() };
        println!(
            "  {:>3}  {:<50} {:>5} chars  {} photos  {} diagrams",
            s.index,
            truncate(title, 50),
            s.body_chars,
            s.photos,
            s.diagrams
        );
    }
    println!("Chapters:  {}", summary.chapters.len());
    for c in &summary.chapters {
        let first = c.slides.first().copied().unwrap_or(0);
        let last = c.slides.last().copied().unwrap_or(0);
        println!("  {}  (slides {}-{})", c.heading, first, last);
    }
}

fn print_result(output: &ConversionOutput, show_progress: bool) {
    for file in &output.files {
        match (&file.outcome, &file.path) {
            (Ok(bytes), Some(path)) => eprintln!(
                "{} {:<4} →  {}  {}",
                green("✔"),
                file.kind,
                bold(&path.display().to_string()),
                dim(&format!("{} KB", bytes.len().div_ceil(1024)))
            ),
            (Ok(_), None) => {}
            (Err(e), _) => eprintln!("{} {:<4} {}", red("✘"), file.kind, e),
        }
    }
    if !show_progress {
        for w in &output.warnings {
            eprintln!("  {} {}", yellow("↺"), w);
        }
    }
    let s = &output.stats;
    eprintln!(
        "   {} slides, {} chapters, {} images  —  {} tokens in / {} tokens out  —  {}ms total",
        s.total_slides,
        s.total_chapters,
        s.images,
        dim(&s.total_input_tokens.to_string()),
        dim(&s.total_output_tokens.to_string()),
        s.total_duration_ms,
    );
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let policy = match cli.chapters {
        ChaptersArg::Equal => ChapterPolicy::EqualGroups {
            slides_per_chapter: cli.slides_per_chapter,
        },
        ChaptersArg::Single => ChapterPolicy::OnePerChapter,
        ChaptersArg::Ranges => {
            let text = cli
                .ranges
                .as_deref()
                .context("--chapters ranges needs --ranges, e.g. --ranges \"1-5, 6-10\"")?;
            ChapterPolicy::custom_ranges(text).context("Invalid --ranges")?
        }
    };

    let mut builder = ConversionConfig::builder()
        .title(&cli.title)
        .author(&cli.author)
        .chapter_policy(policy)
        .formats(cli.format.into())
        .page_size(cli.page_size.into())
        .chapter_starts_new_page(cli.chapter_page_break)
        .enhance(!cli.no_enhance)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref header) = cli.header {
        builder = builder.header_text(header);
    }
    if let Some(ref footer) = cli.footer {
        builder = builder.footer_template(footer);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
