//! PDF renderer: paginated layout over the standard-14 Helvetica fonts.
//!
//! Rendering is two passes. [`layout`] flows the blocks onto pages and
//! produces [`PageLayout`]s (positioned text runs, rules and images plus
//! the resolved header and footer); [`write_pdf`] serialises them with
//! `pdf-writer`. Keeping the passes apart lets the footer and styling
//! decisions be tested without parsing PDF bytes.
//!
//! ## Chapter-aware footer
//!
//! A `current_chapter` accumulator is updated when a chapter-start heading is
//! placed. Footers are resolved when a page is closed, so each page shows the
//! chapter current at its end: the indicator changes on exactly the page where
//! the new chapter's heading first appears.

use crate::error::RenderError;
use crate::model::{AssetKind, Block};
use crate::render::metrics::{encode_win_ansi, encoded_width, text_width, Font};
use crate::render::{decode_opaque, encode_jpeg, fit, RenderMetadata};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use tracing::debug;

const FORMAT: &str = "PDF";

// ── Page geometry (points) ───────────────────────────────────────────────

const MARGIN_X: f32 = 72.0;
const MARGIN_TOP: f32 = 72.0;
const MARGIN_BOTTOM: f32 = 72.0;
const HEADER_BASELINE_FROM_TOP: f32 = 50.0;
const HEADER_RULE_FROM_TOP: f32 = 56.0;
const FOOTER_RULE_Y: f32 = 50.0;
const FOOTER_BASELINE_Y: f32 = 36.0;
const HEADER_FOOTER_SIZE: f32 = 9.0;

// ── Typography ───────────────────────────────────────────────────────────

const TITLE_SIZE: f32 = 24.0;
const BODY_SIZE: f32 = 12.0;
const BODY_LEADING: f32 = 18.0;
const PARAGRAPH_SPACE: f32 = 8.0;
const CHAPTER_HEADING_SIZE: f32 = 18.0;
const HEADING_SPACE_BEFORE: f32 = 14.0;
const HEADING_SPACE_AFTER: f32 = 8.0;
const CAPTION_SIZE: f32 = 10.0;
const CAPTION_LEADING: f32 = 13.0;
const CAPTION_GRAY: f32 = 0.4;

// ── Images ───────────────────────────────────────────────────────────────

const PHOTO_BOX: (f32, f32) = (400.0, 300.0);
const DIAGRAM_MAX_HEIGHT: f32 = 340.0;
const PHOTO_JPEG_QUALITY: u8 = 85;
const DIAGRAM_JPEG_QUALITY: u8 = 95;
const IMAGE_SPACE: f32 = 12.0;

fn heading_size(level: u8) -> f32 {
    match level {
        1 => 20.0,
        2 => 18.0,
        3 => 16.0,
        _ => 14.0,
    }
}

// ── Layout model ─────────────────────────────────────────────────────────

/// A positioned drawing operation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op {
    Text {
        font: Font,
        size: f32,
        x: f32,
        y: f32,
        gray: f32,
        word_spacing: f32,
        text: String,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
        width: f32,
    },
    Image {
        /// Position in the document's image list.
        index: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        border: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Footer {
    pub left: String,
    pub right: String,
}

/// One laid-out page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PageLayout {
    pub ops: Vec<Op>,
    pub header: Option<String>,
    pub footer: Option<Footer>,
}

impl PageLayout {
    fn blank() -> Self {
        Self {
            ops: Vec::new(),
            header: None,
            footer: None,
        }
    }

    /// All body text on the page, one run per line (test helper and debug aid).
    #[cfg(test)]
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Pixel size and kind of each image block, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ImageInfo {
    pub width_px: u32,
    pub height_px: u32,
    pub kind: AssetKind,
}

/// One wrapped line.
#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    width: f32,
    spaces: usize,
}

/// Greedy word wrap. Words wider than `max_width` are split by character.
fn wrap(text: &str, font: Font, size: f32, max_width: f32) -> Vec<Line> {
    let space = text_width(font, " ", size);
    let mut lines = Vec::new();
    let mut current = Line {
        text: String::new(),
        width: 0.0,
        spaces: 0,
    };

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        let mut word_width = text_width(font, &word, size);

        while word_width > max_width {
            if !current.text.is_empty() {
                lines.push(std::mem::replace(
                    &mut current,
                    Line {
                        text: String::new(),
                        width: 0.0,
                        spaces: 0,
                    },
                ));
            }
            let (head, tail) = split_to_width(&word, font, size, max_width);
            lines.push(Line {
                width: text_width(font, &head, size),
                text: head,
                spaces: 0,
            });
            word = tail;
            word_width = text_width(font, &word, size);
        }
        if word.is_empty() {
            continue;
        }

        if current.text.is_empty() {
            current.text = word;
            current.width = word_width;
        } else if current.width + space + word_width <= max_width {
            current.text.push(' ');
            current.text.push_str(&word);
            current.width += space + word_width;
            current.spaces += 1;
        } else {
            lines.push(std::mem::replace(
                &mut current,
                Line {
                    text: word,
                    width: word_width,
                    spaces: 0,
                },
            ));
        }
    }
    if !current.text.is_empty() {
        lines.push(current);
    }
    lines
}

/// Longest prefix of `word` (at least one char) that fits in `max_width`.
fn split_to_width(word: &str, font: Font, size: f32, max_width: f32) -> (String, String) {
    let mut end = 0;
    for (i, c) in word.char_indices() {
        let next = i + c.len_utf8();
        if end > 0 && text_width(font, &word[..next], size) > max_width {
            break;
        }
        end = next;
    }
    (word[..end].to_string(), word[end..].to_string())
}

// ── Layout pass ──────────────────────────────────────────────────────────

struct Layouter<'a> {
    meta: &'a RenderMetadata,
    page_width: f32,
    page_height: f32,
    pages: Vec<PageLayout>,
    page: PageLayout,
    y: f32,
    current_chapter: Option<usize>,
    chapters_seen: usize,
}

impl<'a> Layouter<'a> {
    fn new(meta: &'a RenderMetadata) -> Self {
        let (page_width, page_height) = meta.page_size.dimensions();
        Self {
            meta,
            page_width,
            page_height,
            pages: Vec::new(),
            page: PageLayout::blank(),
            y: page_height - MARGIN_TOP,
            current_chapter: None,
            chapters_seen: 0,
        }
    }

    fn text_width(&self) -> f32 {
        self.page_width - 2.0 * MARGIN_X
    }

    fn top(&self) -> f32 {
        self.page_height - MARGIN_TOP
    }

    fn at_top(&self) -> bool {
        self.page.ops.is_empty()
    }

    fn remaining(&self) -> f32 {
        self.y - MARGIN_BOTTOM
    }

    fn title_page(&mut self) {
        let w = self.text_width();
        let mut y = self.page_height * 0.62;
        for line in wrap(&self.meta.title, Font::Bold, TITLE_SIZE, w) {
            self.centered(Font::Bold, TITLE_SIZE, y, 0.0, line.text);
            y -= TITLE_SIZE * 1.3;
        }
        y -= 24.0;
        let by = format!("by {}", self.meta.author);
        self.centered(Font::Regular, 14.0, y, 0.0, by);
        if !self.meta.date.is_empty() {
            let generated = format!("Generated on {}", self.meta.date);
            self.centered(Font::Oblique, 11.0, y - 28.0, CAPTION_GRAY, generated);
        }
        // The title page carries no header or footer.
        self.pages.push(std::mem::replace(&mut self.page, PageLayout::blank()));
        self.y = self.top();
    }

    fn centered(&mut self, font: Font, size: f32, y: f32, gray: f32, text: String) {
        let x = (self.page_width - text_width(font, &text, size)) / 2.0;
        self.page.ops.push(Op::Text {
            font,
            size,
            x,
            y,
            gray,
            word_spacing: 0.0,
            text,
        });
    }

    /// Close the current page, resolving header and footer.
    fn finish_page(&mut self) {
        let number = self.pages.len() + 1;
        let mut page = std::mem::replace(&mut self.page, PageLayout::blank());
        page.header = Some(self.meta.header_text.clone());
        page.footer = Some(Footer {
            left: self.meta.footer_left(self.current_chapter),
            right: format!("Page {number}"),
        });
        self.pages.push(page);
        self.y = self.top();
    }

    fn ensure_space(&mut self, needed: f32) {
        if needed > self.remaining() && !self.at_top() {
            self.finish_page();
        }
    }

    fn heading(&mut self, level: u8, text: &str, chapter: Option<usize>) {
        if chapter.is_some() {
            self.chapters_seen += 1;
            if self.meta.chapter_starts_new_page && self.chapters_seen > 1 && !self.at_top() {
                self.finish_page();
            }
        }

        let size = if chapter.is_some() {
            CHAPTER_HEADING_SIZE
        } else {
            heading_size(level)
        };
        let leading = size * 1.25;
        let lines = wrap(text, Font::Bold, size, self.text_width());
        let before = if self.at_top() { 0.0 } else { HEADING_SPACE_BEFORE };
        let rule = if chapter.is_some() { 8.0 } else { 0.0 };

        // Keep the heading with at least one body line.
        let needed = before + lines.len() as f32 * leading + rule + HEADING_SPACE_AFTER + BODY_LEADING;
        self.ensure_space(needed);
        if !self.at_top() {
            self.y -= HEADING_SPACE_BEFORE;
        }

        if let Some(n) = chapter {
            self.current_chapter = Some(n);
        }

        for line in lines {
            self.y -= leading;
            self.page.ops.push(Op::Text {
                font: Font::Bold,
                size,
                x: MARGIN_X,
                y: self.y,
                gray: 0.0,
                word_spacing: 0.0,
                text: line.text,
            });
        }
        if chapter.is_some() {
            self.y -= rule;
            self.page.ops.push(Op::Rule {
                x1: MARGIN_X,
                x2: self.page_width - MARGIN_X,
                y: self.y + 2.0,
                width: 1.0,
            });
        }
        self.y -= HEADING_SPACE_AFTER;
    }

    fn paragraph(&mut self, text: &str) {
        let max = self.text_width();
        let lines = wrap(text, Font::Regular, BODY_SIZE, max);
        let count = lines.len();
        for (i, line) in lines.into_iter().enumerate() {
            if BODY_LEADING > self.remaining() {
                self.finish_page();
            }
            self.y -= BODY_LEADING;
            // Justify every line but the last.
            let word_spacing = if i + 1 < count && line.spaces > 0 {
                (max - line.width) / line.spaces as f32
            } else {
                0.0
            };
            self.page.ops.push(Op::Text {
                font: Font::Regular,
                size: BODY_SIZE,
                x: MARGIN_X,
                y: self.y,
                gray: 0.0,
                word_spacing,
                text: line.text,
            });
        }
        self.y -= PARAGRAPH_SPACE;
    }

    fn image(&mut self, index: usize, info: ImageInfo, caption: &str) {
        let text_width = self.text_width();
        let (max_w, max_h, border) = match info.kind {
            AssetKind::Photo => (PHOTO_BOX.0.min(text_width), PHOTO_BOX.1, false),
            AssetKind::Diagram => (text_width, DIAGRAM_MAX_HEIGHT, true),
        };
        let (width, height) = fit(info.width_px as f32, info.height_px as f32, max_w, max_h);
        let caption_lines = wrap(caption, Font::Oblique, CAPTION_SIZE, text_width);
        let needed =
            IMAGE_SPACE + height + 6.0 + caption_lines.len() as f32 * CAPTION_LEADING + IMAGE_SPACE;
        self.ensure_space(needed);

        if !self.at_top() {
            self.y -= IMAGE_SPACE;
        }
        self.y -= height;
        self.page.ops.push(Op::Image {
            index,
            x: MARGIN_X + (text_width - width) / 2.0,
            y: self.y,
            width,
            height,
            border,
        });
        self.y -= 6.0;
        for line in caption_lines {
            self.y -= CAPTION_LEADING;
            let x = MARGIN_X + (text_width - line.width) / 2.0;
            self.page.ops.push(Op::Text {
                font: Font::Oblique,
                size: CAPTION_SIZE,
                x,
                y: self.y,
                gray: CAPTION_GRAY,
                word_spacing: 0.0,
                text: line.text,
            });
        }
        self.y -= IMAGE_SPACE;
    }

    fn finish(mut self) -> Vec<PageLayout> {
        // Always close the last body page, even for an empty document.
        if !self.at_top() || self.pages.len() == 1 {
            self.finish_page();
        }
        self.pages
    }
}

/// Flow `blocks` onto pages. `images` holds one entry per image block.
pub(crate) fn layout(blocks: &[Block], meta: &RenderMetadata, images: &[ImageInfo]) -> Vec<PageLayout> {
    let mut l = Layouter::new(meta);
    l.title_page();

    let mut image_index = 0;
    for block in blocks {
        match block {
            Block::Heading {
                level,
                text,
                chapter,
            } => l.heading(*level, text, *chapter),
            Block::Paragraph(text) => l.paragraph(text),
            Block::Image { caption, .. } => {
                if let Some(info) = images.get(image_index) {
                    l.image(image_index, *info, caption);
                }
                image_index += 1;
            }
        }
    }
    l.finish()
}

// ── Serialisation pass ───────────────────────────────────────────────────

/// An image ready to embed as a DCT-encoded XObject.
struct PreparedImage {
    jpeg: Vec<u8>,
    info: ImageInfo,
}

fn prepare_images(blocks: &[Block]) -> Result<Vec<PreparedImage>, RenderError> {
    blocks
        .iter()
        .filter_map(|b| match b {
            Block::Image { asset, caption } => Some((asset, caption)),
            _ => None,
        })
        .map(|(asset, caption)| {
            let undecodable = |detail: String| RenderError::UndecodableImage {
                format: FORMAT.to_string(),
                caption: caption.clone(),
                detail,
            };
            let rgb = decode_opaque(asset).map_err(undecodable)?;
            let quality = match asset.kind {
                AssetKind::Photo => PHOTO_JPEG_QUALITY,
                AssetKind::Diagram => DIAGRAM_JPEG_QUALITY,
            };
            let jpeg = encode_jpeg(&rgb, quality).map_err(undecodable)?;
            Ok(PreparedImage {
                jpeg,
                info: ImageInfo {
                    width_px: rgb.width(),
                    height_px: rgb.height(),
                    kind: asset.kind,
                },
            })
        })
        .collect()
}

/// Sequential indirect-object allocator.
struct RefAlloc(i32);

impl RefAlloc {
    fn next(&mut self) -> Ref {
        self.0 += 1;
        Ref::new(self.0)
    }
}

fn image_name(index: usize) -> String {
    format!("Im{}", index + 1)
}

/// Render the blocks as a PDF document.
pub fn render_pdf(blocks: &[Block], meta: &RenderMetadata) -> Result<Vec<u8>, RenderError> {
    let images = prepare_images(blocks)?;
    let infos: Vec<ImageInfo> = images.iter().map(|i| i.info).collect();
    let pages = layout(blocks, meta, &infos);
    debug!("PDF layout: {} pages, {} images", pages.len(), images.len());
    Ok(write_pdf(&pages, &images, meta))
}

fn write_pdf(pages: &[PageLayout], images: &[PreparedImage], meta: &RenderMetadata) -> Vec<u8> {
    let (page_width, page_height) = meta.page_size.dimensions();
    let mut alloc = RefAlloc(0);
    let catalog_id = alloc.next();
    let tree_id = alloc.next();
    let info_id = alloc.next();
    let font_ids: Vec<(Font, Ref)> = Font::ALL.iter().map(|&f| (f, alloc.next())).collect();
    let image_ids: Vec<Ref> = images.iter().map(|_| alloc.next()).collect();
    let page_ids: Vec<(Ref, Ref)> = pages.iter().map(|_| (alloc.next(), alloc.next())).collect();

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(tree_id);
    pdf.pages(tree_id)
        .kids(page_ids.iter().map(|(page, _)| *page))
        .count(page_ids.len() as i32);

    pdf.document_info(info_id)
        .title(TextStr(&meta.title))
        .author(TextStr(&meta.author))
        .creator(TextStr("slides2ebook"));

    for (font, id) in &font_ids {
        pdf.type1_font(*id)
            .base_font(Name(font.base_font()))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
    }

    for (image, id) in images.iter().zip(&image_ids) {
        let mut xobject = pdf.image_xobject(*id, &image.jpeg);
        xobject.filter(Filter::DctDecode);
        xobject.width(image.info.width_px as i32);
        xobject.height(image.info.height_px as i32);
        xobject.color_space().device_rgb();
        xobject.bits_per_component(8);
        xobject.finish();
    }

    for (layout, (page_id, content_id)) in pages.iter().zip(&page_ids) {
        let mut page = pdf.page(*page_id);
        page.media_box(Rect::new(0.0, 0.0, page_width, page_height));
        page.parent(tree_id);
        page.contents(*content_id);
        let mut resources = page.resources();
        let mut fonts = resources.fonts();
        for (font, id) in &font_ids {
            fonts.pair(Name(font.resource_name()), *id);
        }
        fonts.finish();
        let used: Vec<usize> = layout
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Image { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        if !used.is_empty() {
            let mut xobjects = resources.x_objects();
            for index in used {
                let name = image_name(index);
                xobjects.pair(Name(name.as_bytes()), image_ids[index]);
            }
            xobjects.finish();
        }
        resources.finish();
        page.finish();

        let content = page_content(layout, page_width, page_height);
        pdf.stream(*content_id, &content);
    }

    pdf.finish()
}

fn page_content(layout: &PageLayout, page_width: f32, page_height: f32) -> Vec<u8> {
    let mut content = Content::new();

    if let Some(header) = &layout.header {
        let y = page_height - HEADER_BASELINE_FROM_TOP;
        show_text(&mut content, Font::Oblique, HEADER_FOOTER_SIZE, MARGIN_X, y, CAPTION_GRAY, 0.0, header);
        rule(&mut content, MARGIN_X, page_width - MARGIN_X, page_height - HEADER_RULE_FROM_TOP, 0.5);
    }

    for op in &layout.ops {
        match op {
            Op::Text {
                font,
                size,
                x,
                y,
                gray,
                word_spacing,
                text,
            } => show_text(&mut content, *font, *size, *x, *y, *gray, *word_spacing, text),
            Op::Rule { x1, x2, y, width } => rule(&mut content, *x1, *x2, *y, *width),
            Op::Image {
                index,
                x,
                y,
                width,
                height,
                border,
            } => {
                let name = image_name(*index);
                content.save_state();
                content.transform([*width, 0.0, 0.0, *height, *x, *y]);
                content.x_object(Name(name.as_bytes()));
                content.restore_state();
                if *border {
                    content.save_state();
                    content.set_stroke_gray(0.6);
                    content.set_line_width(0.75);
                    content.rect(*x - 2.0, *y - 2.0, *width + 4.0, *height + 4.0);
                    content.stroke();
                    content.restore_state();
                }
            }
        }
    }

    if let Some(footer) = &layout.footer {
        rule(&mut content, MARGIN_X, page_width - MARGIN_X, FOOTER_RULE_Y, 0.5);
        show_text(&mut content, Font::Regular, HEADER_FOOTER_SIZE, MARGIN_X, FOOTER_BASELINE_Y, CAPTION_GRAY, 0.0, &footer.left);
        let right = encode_win_ansi(&footer.right);
        let x = page_width - MARGIN_X - encoded_width(Font::Regular, &right, HEADER_FOOTER_SIZE);
        show_text(&mut content, Font::Regular, HEADER_FOOTER_SIZE, x, FOOTER_BASELINE_Y, CAPTION_GRAY, 0.0, &footer.right);
    }

    content.finish()
}

#[allow(clippy::too_many_arguments)]
fn show_text(
    content: &mut Content,
    font: Font,
    size: f32,
    x: f32,
    y: f32,
    gray: f32,
    word_spacing: f32,
    text: &str,
) {
    let encoded = encode_win_ansi(text);
    content.begin_text();
    content.set_fill_gray(gray);
    content.set_font(Name(font.resource_name()), size);
    if word_spacing > 0.0 {
        content.set_word_spacing(word_spacing);
    }
    content.set_text_matrix([1.0, 0.0, 0.0, 1.0, x, y]);
    content.show(Str(&encoded));
    content.end_text();
}

fn rule(content: &mut Content, x1: f32, x2: f32, y: f32, width: f32) {
    content.save_state();
    content.set_stroke_gray(0.5);
    content.set_line_width(width);
    content.move_to(x1, y);
    content.line_to(x2, y);
    content.stroke();
    content.restore_state();
}
