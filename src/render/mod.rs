//! Document renderers: blocks in, finished file bytes out.
//!
//! Both renderers take the same flat [`Block`](crate::model::Block) sequence
//! and [`RenderMetadata`], and both are pure CPU work, so the conversion
//! driver runs them in `spawn_blocking`. A renderer failure is confined to
//! its own format.
//!
//! 1. [`pdf`]: paginated layout with running header and chapter-aware footer
//! 2. [`docx`]: flowing word-processor document with heading styles

pub mod docx;
pub mod metrics;
pub mod pdf;

use crate::config::{ConversionConfig, PageSize, CHAPTER_TOKEN};
use crate::model::VisualAsset;
use image::{DynamicImage, RgbImage};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::io::Cursor;

static RE_FOOTER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(chapter|title|author)\}").unwrap());

/// Document-level settings shared by both renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMetadata {
    pub title: String,
    pub author: String,
    pub header_text: String,
    /// Left footer template; see [`RenderMetadata::footer_left`].
    pub footer_template: String,
    /// Pre-formatted generation date for the title page.
    pub date: String,
    pub page_size: PageSize,
    pub chapter_starts_new_page: bool,
}

impl RenderMetadata {
    /// Metadata for `config`, stamped with `date`.
    pub fn from_config(config: &ConversionConfig, date: impl Into<String>) -> Self {
        Self {
            title: config.title.clone(),
            author: config.author.clone(),
            header_text: config.effective_header(),
            footer_template: config.effective_footer_template(),
            date: date.into(),
            page_size: config.page_size,
            chapter_starts_new_page: config.chapter_starts_new_page,
        }
    }

    /// Today's date as shown on title pages, e.g. "March 03, 2026".
    pub fn today() -> String {
        chrono::Local::now().format("%B %d, %Y").to_string()
    }

    /// Left footer text for a page whose current chapter is `chapter`.
    ///
    /// `{chapter}`, `{title}` and `{author}` are substituted in one pass over
    /// the template, so tokens inside the title or author stay literal. A
    /// template without `{chapter}` gets `  |  Chapter N` appended so the
    /// chapter indicator is never lost.
    pub fn footer_left(&self, chapter: Option<usize>) -> String {
        let number = chapter.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
        let text = RE_FOOTER_TOKEN
            .replace_all(&self.footer_template, |caps: &Captures<'_>| match &caps[1] {
                "chapter" => number.clone(),
                "title" => self.title.clone(),
                _ => self.author.clone(),
            })
            .into_owned();
        match chapter {
            Some(n) if !self.footer_template.contains(CHAPTER_TOKEN) => {
                format!("{text}  |  Chapter {n}")
            }
            _ => text,
        }
    }
}

impl Default for RenderMetadata {
    fn default() -> Self {
        Self::from_config(&ConversionConfig::default(), "")
    }
}

// ── Shared image handling ────────────────────────────────────────────────

/// Decode an asset and flatten any transparency onto white.
///
/// Both output formats want opaque RGB: JPEG has no alpha channel and a
/// transparent PNG would show the page colour through a diagram.
pub(crate) fn decode_opaque(asset: &VisualAsset) -> Result<RgbImage, String> {
    let img = image::load_from_memory(&asset.data).map_err(|e| e.to_string())?;
    if img.width() == 0 || img.height() == 0 {
        return Err("image has zero size".to_string());
    }
    Ok(flatten_alpha(img))
}

fn flatten_alpha(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let a = src[3] as u32;
        for c in 0..3 {
            dst[c] = ((src[c] as u32 * a + 255 * (255 - a)) / 255) as u8;
        }
    }
    out
}

pub(crate) fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(img)
        .map_err(|e| e.to_string())?;
    Ok(buf)
}

pub(crate) fn encode_png(img: &RgbImage) -> Result<Vec<u8>, String> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(buf.into_inner())
}

/// Scale `(w, h)` to fit inside `(max_w, max_h)`, never enlarging.
pub(crate) fn fit(w: f32, h: f32, max_w: f32, max_h: f32) -> (f32, f32) {
    if w <= 0.0 || h <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (max_w / w).min(max_h / h).min(1.0);
    (w * scale, h * scale)
}
