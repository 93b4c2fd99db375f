//! Core data model shared by every pipeline stage.
//!
//! ```text
//! Slide ──(segment)──▶ Chapter ──(assemble)──▶ Block ──▶ renderers
//! ```
//!
//! Slides are produced once by the extractor and never mutated afterwards.
//! Chapters take ownership of their member slides, and the assembler copies
//! whatever text and image bytes it needs into owned [`Block`]s, so the
//! renderers see a flat, self-contained sequence.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One slide of the source deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    /// 1-based position in the source deck.
    pub index: usize,
    /// Slide title; empty when the slide has none.
    pub title: String,
    /// Body text. Paragraphs are separated by blank lines.
    pub body: String,
    /// Pictures found on the slide, in document order.
    pub assets: Vec<VisualAsset>,
}

impl Slide {
    pub fn new(index: usize, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            body: body.into(),
            assets: Vec::new(),
        }
    }

    pub fn with_asset(mut self, asset: VisualAsset) -> Self {
        self.assets.push(asset);
        self
    }
}

/// Whether a picture is a photo-like image or a diagram/flowchart.
///
/// The renderers give diagrams their own treatment (wider box, border,
/// higher encode quality, "Diagram" captions), so the tag must survive
/// every stage unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    #[default]
    Photo,
    Diagram,
}

impl AssetKind {
    /// Caption prefix used in the assembled document.
    pub fn caption_label(self) -> &'static str {
        match self {
            AssetKind::Photo => "Figure",
            AssetKind::Diagram => "Diagram",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Photo => write!(f, "photo"),
            AssetKind::Diagram => write!(f, "diagram"),
        }
    }
}

/// An embedded picture.
#[derive(Clone, PartialEq, Eq)]
pub struct VisualAsset {
    pub data: Vec<u8>,
    pub kind: AssetKind,
    /// Caption text derived from the slide title.
    pub caption: Option<String>,
    /// MIME type of `data`, e.g. `image/png`.
    pub media_type: String,
    /// Shape name in the source deck (`Picture 3`, `Flowchart 1`, ...).
    pub name: String,
}

impl VisualAsset {
    pub fn new(data: Vec<u8>, kind: AssetKind) -> Self {
        Self {
            data,
            kind,
            caption: None,
            media_type: "application/octet-stream".to_string(),
            name: String::new(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// Image bytes are noise in logs and test failures.
impl fmt::Debug for VisualAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualAsset")
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .field("kind", &self.kind)
            .field("caption", &self.caption)
            .field("media_type", &self.media_type)
            .field("name", &self.name)
            .finish()
    }
}

/// A contiguous group of slides presented as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based position in the output, independent of slide indices.
    pub number: usize,
    /// Explicit title; `None` means the title is generated from the number.
    pub label: Option<String>,
    pub slides: Vec<Slide>,
}

impl Chapter {
    /// Chapter title without the number prefix.
    pub fn title(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("Chapter {}", self.number),
        }
    }

    /// Text of the chapter-start heading.
    pub fn heading(&self) -> String {
        match &self.label {
            Some(label) => format!("Chapter {}: {}", self.number, label),
            None => format!("Chapter {}", self.number),
        }
    }

    /// Source slide indices, in chapter order.
    pub fn slide_indices(&self) -> Vec<usize> {
        self.slides.iter().map(|s| s.index).collect()
    }
}

/// Renderer-agnostic document unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A heading. `chapter` is set only on the heading that opens a chapter.
    Heading {
        level: u8,
        text: String,
        chapter: Option<usize>,
    },
    Paragraph(String),
    Image {
        asset: VisualAsset,
        caption: String,
    },
}

impl Block {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level: level.clamp(1, 4),
            text: text.into(),
            chapter: None,
        }
    }

    pub fn chapter_start(number: usize, text: impl Into<String>) -> Self {
        Block::Heading {
            level: 1,
            text: text.into(),
            chapter: Some(number),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph(text.into())
    }

    /// Chapter number if this block opens a chapter.
    pub fn chapter_start_number(&self) -> Option<usize> {
        match self {
            Block::Heading { chapter, .. } => *chapter,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_heading_generated_and_labelled() {
        let generated = Chapter {
            number: 3,
            label: None,
            slides: vec![],
        };
        assert_eq!(generated.heading(), "Chapter 3");
        assert_eq!(generated.title(), "Chapter 3");

        let labelled = Chapter {
            number: 2,
            label: Some("Methods".into()),
            slides: vec![],
        };
        assert_eq!(labelled.heading(), "Chapter 2: Methods");
        assert_eq!(labelled.title(), "Methods");
    }

    #[test]
    fn heading_level_is_clamped() {
        assert_eq!(
            Block::heading(9, "deep"),
            Block::Heading {
                level: 4,
                text: "deep".into(),
                chapter: None
            }
        );
        assert_eq!(Block::chapter_start(2, "x").chapter_start_number(), Some(2));
        assert_eq!(Block::paragraph("p").chapter_start_number(), None);
    }

    #[test]
    fn asset_debug_hides_bytes() {
        let a = VisualAsset::new(vec![0u8; 2048], AssetKind::Diagram);
        let dbg = format!("{a:?}");
        assert!(dbg.contains("<2048 bytes>"), "got: {dbg}");
        assert!(dbg.contains("Diagram"));
    }
}
