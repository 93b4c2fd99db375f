//! Content assembly: chapters in, renderer-agnostic blocks out.
//!
//! Every slide is sent through the [`Enhancer`] (concurrently, bounded by
//! `concurrency`), then the results are laid out in slide order:
//!
//! ```text
//! Heading(1, "Chapter N[: label]", chapter = N)
//!   Heading(2, slide title)        when it differs from the chapter title
//!   ...slide text blocks...
//!   Image(asset, "Figure N.i: ...") per picture, right after its slide
//! ```
//!
//! A failed slide falls back to its raw text and leaves an
//! [`EnhancementError`] in the warnings; it never aborts the document.

use crate::error::EnhancementError;
use crate::model::{AssetKind, Block, Chapter, Slide, VisualAsset};
use crate::pipeline::llm::{EnhanceRequest, Enhancer};
use crate::pipeline::markdown::{parse_blocks, parse_raw};
use crate::pipeline::postprocess::clean_response;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Result of assembling a deck.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    pub blocks: Vec<Block>,
    /// One entry per slide that fell back to raw text, in slide order.
    pub warnings: Vec<EnhancementError>,
    pub stats: AssemblyStats,
}

/// Counters gathered while assembling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStats {
    pub total_slides: usize,
    pub enhanced_slides: usize,
    pub fallback_slides: usize,
    pub images: usize,
    pub diagrams: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Per-slide enhancement outcome.
struct SlideText {
    blocks: Vec<Block>,
    enhanced: bool,
    warning: Option<EnhancementError>,
    input_tokens: u64,
    output_tokens: u64,
}

/// Assemble the chapters into a flat block sequence.
pub async fn assemble<E: Enhancer>(
    chapters: &[Chapter],
    deck_title: &str,
    enhancer: &E,
    concurrency: usize,
    progress: Option<&ProgressCallback>,
) -> AssembledDocument {
    let total_slides: usize = chapters.iter().map(|c| c.slides.len()).sum();
    if !enhancer.is_active() {
        debug!("Enhancement disabled; using slide text as written");
    }

    let jobs = chapters.iter().flat_map(|chapter| {
        chapter
            .slides
            .iter()
            .enumerate()
            .map(move |(i, slide)| (chapter, i + 1, slide))
    });

    // `buffered` yields in submission order, so results line up with slides.
    let texts: Vec<SlideText> = stream::iter(jobs.map(|(chapter, position, slide)| {
        enhance_slide(
            enhancer,
            chapter,
            position,
            slide,
            deck_title,
            total_slides,
            progress,
        )
    }))
    .buffered(concurrency.max(1))
    .collect()
    .await;

    let mut stats = AssemblyStats {
        total_slides,
        ..Default::default()
    };
    let mut warnings = Vec::new();
    let mut blocks = Vec::new();
    let mut texts = texts.into_iter();

    for chapter in chapters {
        blocks.push(Block::chapter_start(chapter.number, chapter.heading()));
        let chapter_title = chapter.title();
        let mut image_no = 0;

        for slide in &chapter.slides {
            let Some(text) = texts.next() else { break };

            let title = slide.title.trim();
            if !title.is_empty() && !title.eq_ignore_ascii_case(chapter_title.trim()) {
                blocks.push(Block::heading(2, title));
            }

            blocks.extend(text.blocks);
            if text.enhanced {
                stats.enhanced_slides += 1;
            }
            if let Some(w) = text.warning {
                stats.fallback_slides += 1;
                warnings.push(w);
            }
            stats.input_tokens += text.input_tokens;
            stats.output_tokens += text.output_tokens;

            for asset in &slide.assets {
                image_no += 1;
                stats.images += 1;
                if asset.kind == AssetKind::Diagram {
                    stats.diagrams += 1;
                }
                blocks.push(Block::Image {
                    caption: caption(chapter.number, image_no, slide, asset),
                    asset: asset.clone(),
                });
            }
        }
    }

    info!(
        "Assembled {} blocks from {} slides ({} enhanced, {} fallback, {} images)",
        blocks.len(),
        stats.total_slides,
        stats.enhanced_slides,
        stats.fallback_slides,
        stats.images
    );

    AssembledDocument {
        blocks,
        warnings,
        stats,
    }
}

async fn enhance_slide<E: Enhancer>(
    enhancer: &E,
    chapter: &Chapter,
    position: usize,
    slide: &Slide,
    deck_title: &str,
    total_slides: usize,
    progress: Option<&ProgressCallback>,
) -> SlideText {
    let raw = SlideText {
        blocks: parse_raw(&slide.body),
        enhanced: false,
        warning: None,
        input_tokens: 0,
        output_tokens: 0,
    };

    if !enhancer.is_active() || (slide.title.trim().is_empty() && slide.body.trim().is_empty()) {
        if let Some(cb) = progress {
            cb.on_slide_complete(slide.index, total_slides, slide.body.len());
        }
        return raw;
    }

    if let Some(cb) = progress {
        cb.on_slide_start(slide.index, total_slides);
    }

    let req = EnhanceRequest {
        slide_index: slide.index,
        chapter_number: chapter.number,
        position,
        chapter_len: chapter.slides.len(),
        deck_title,
        slide_title: &slide.title,
        text: &slide.body,
        image_count: slide.assets.len(),
    };

    let outcome = enhancer.enhance(&req).await.and_then(|enhancement| {
        let cleaned = clean_response(&enhancement.text);
        if cleaned.is_empty() {
            Err(EnhancementError::EmptyResponse { slide: slide.index })
        } else {
            Ok((cleaned, enhancement))
        }
    });

    match outcome {
        Ok((cleaned, enhancement)) => {
            debug!(
                "Slide {}: enhanced after {} retries ({} bytes)",
                slide.index,
                enhancement.retries,
                cleaned.len()
            );
            if let Some(cb) = progress {
                cb.on_slide_complete(slide.index, total_slides, cleaned.len());
            }
            SlideText {
                blocks: parse_blocks(&cleaned),
                enhanced: true,
                warning: None,
                input_tokens: enhancement.input_tokens as u64,
                output_tokens: enhancement.output_tokens as u64,
            }
        }
        Err(e) => {
            warn!("Slide {}: using raw text ({})", slide.index, e);
            if let Some(cb) = progress {
                cb.on_slide_fallback(slide.index, total_slides, &e.to_string());
            }
            SlideText {
                warning: Some(e),
                ..raw
            }
        }
    }
}

/// Figure caption for the `image_no`-th picture of a chapter.
fn caption(chapter: usize, image_no: usize, slide: &Slide, asset: &VisualAsset) -> String {
    let subject = asset
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .or_else(|| Some(slide.title.trim()).filter(|t| !t.is_empty()));

    match subject {
        Some(subject) => format!(
            "{} {}.{}: {}",
            asset.kind.caption_label(),
            chapter,
            image_no,
            subject
        ),
        None => match asset.kind {
            AssetKind::Photo => format!("Image from Slide {}", slide.index),
            AssetKind::Diagram => format!("Diagram from Slide {}", slide.index),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChapterPolicy;
    use crate::pipeline::llm::{Enhancement, Passthrough};
    use crate::pipeline::segment::segment;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Uppercases slide text; fails for the listed slides.
    struct ScriptedEnhancer {
        fail_on: Vec<usize>,
        calls: AtomicUsize,
    }

    impl ScriptedEnhancer {
        fn failing_on(fail_on: Vec<usize>) -> Self {
            Self {
                fail_on,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Enhancer for ScriptedEnhancer {
        async fn enhance(&self, req: &EnhanceRequest<'_>) -> Result<Enhancement, EnhancementError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Later slides finish first, so ordering is really exercised.
            tokio::time::sleep(Duration::from_millis(
                (20 - req.slide_index.min(20)) as u64,
            ))
            .await;
            if self.fail_on.contains(&req.slide_index) {
                return Err(EnhancementError::Failed {
                    slide: req.slide_index,
                    retries: 2,
                    detail: "HTTP 503".into(),
                });
            }
            Ok(Enhancement::text(format!(
                "Sure! Here is the section:\n\nENHANCED {}",
                req.text.to_uppercase()
            )))
        }
    }

    fn deck(n: usize) -> Vec<Slide> {
        (1..=n)
            .map(|i| Slide::new(i, format!("Topic {i}"), format!("point {i}")))
            .collect()
    }

    fn chapters(slides: Vec<Slide>, k: usize) -> Vec<Chapter> {
        segment(
            slides,
            &ChapterPolicy::EqualGroups {
                slides_per_chapter: k,
            },
        )
        .unwrap()
    }

    fn paragraphs(blocks: &[Block]) -> Vec<&str> {
        blocks
            .iter()
            .filter_map(|b| match b {
                Block::Paragraph(p) => Some(p.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn failing_slide_falls_back_to_raw_text() {
        let chapters = chapters(deck(5), 5);
        let enhancer = ScriptedEnhancer::failing_on(vec![3]);
        let doc = assemble(&chapters, "Deck", &enhancer, 4, None).await;

        assert_eq!(
            paragraphs(&doc.blocks),
            vec![
                "ENHANCED POINT 1",
                "ENHANCED POINT 2",
                "point 3",
                "ENHANCED POINT 4",
                "ENHANCED POINT 5",
            ]
        );
        assert_eq!(doc.warnings.len(), 1);
        assert_eq!(doc.warnings[0].slide(), 3);
        assert_eq!(doc.stats.enhanced_slides, 4);
        assert_eq!(doc.stats.fallback_slides, 1);
        assert_eq!(enhancer.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn output_order_is_slide_order_at_any_concurrency() {
        for concurrency in [1, 3, 16] {
            let chapters = chapters(deck(12), 4);
            let enhancer = ScriptedEnhancer::failing_on(vec![]);
            let doc = assemble(&chapters, "Deck", &enhancer, concurrency, None).await;
            let expected: Vec<String> = (1..=12).map(|i| format!("ENHANCED POINT {i}")).collect();
            assert_eq!(paragraphs(&doc.blocks), expected);
        }
    }

    #[tokio::test]
    async fn chapter_and_slide_headings() {
        let chapters = chapters(deck(4), 2);
        let doc = assemble(&chapters, "Deck", &Passthrough, 4, None).await;
        assert_eq!(
            doc.blocks,
            vec![
                Block::chapter_start(1, "Chapter 1"),
                Block::heading(2, "Topic 1"),
                Block::paragraph("point 1"),
                Block::heading(2, "Topic 2"),
                Block::paragraph("point 2"),
                Block::chapter_start(2, "Chapter 2"),
                Block::heading(2, "Topic 3"),
                Block::paragraph("point 3"),
                Block::heading(2, "Topic 4"),
                Block::paragraph("point 4"),
            ]
        );
        assert!(doc.warnings.is_empty());
        assert_eq!(doc.stats.enhanced_slides, 0);
    }

    #[tokio::test]
    async fn slide_title_matching_chapter_label_is_not_repeated() {
        let chapters = segment(deck(2), &ChapterPolicy::OnePerChapter).unwrap();
        let doc = assemble(&chapters, "Deck", &Passthrough, 1, None).await;
        assert_eq!(
            doc.blocks,
            vec![
                Block::chapter_start(1, "Chapter 1: Topic 1"),
                Block::paragraph("point 1"),
                Block::chapter_start(2, "Chapter 2: Topic 2"),
                Block::paragraph("point 2"),
            ]
        );
    }

    #[tokio::test]
    async fn images_follow_their_slide_with_numbered_captions() {
        let slides = vec![
            Slide::new(1, "Architecture", "text")
                .with_asset(VisualAsset::new(vec![1], AssetKind::Photo))
                .with_asset(VisualAsset::new(vec![2], AssetKind::Diagram)),
            Slide::new(2, "", "untitled")
                .with_asset(VisualAsset::new(vec![3], AssetKind::Photo))
                .with_asset(VisualAsset::new(vec![4], AssetKind::Diagram)),
            Slide::new(3, "Next chapter", "")
                .with_asset(VisualAsset::new(vec![5], AssetKind::Photo)),
        ];
        let chapters = segment(
            slides,
            &ChapterPolicy::custom_ranges("1-2, 3").unwrap(),
        )
        .unwrap();
        let doc = assemble(&chapters, "Deck", &Passthrough, 2, None).await;

        let captions: Vec<&str> = doc
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Image { caption, .. } => Some(caption.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            captions,
            vec![
                "Figure 1.1: Architecture",
                "Diagram 1.2: Architecture",
                "Image from Slide 2",
                "Diagram from Slide 2",
                "Figure 2.1: Next chapter",
            ]
        );
        // The first image comes right after slide 1's text.
        assert_eq!(doc.blocks[2], Block::paragraph("text"));
        assert!(matches!(doc.blocks[3], Block::Image { .. }));
        assert_eq!(doc.stats.images, 5);
        assert_eq!(doc.stats.diagrams, 2);
    }

    #[tokio::test]
    async fn progress_events_cover_every_slide() {
        #[derive(Default)]
        struct Counter {
            done: AtomicUsize,
            fallback: AtomicUsize,
        }
        impl crate::progress::ConversionProgressCallback for Counter {
            fn on_slide_complete(&self, _: usize, _: usize, _: usize) {
                self.done.fetch_add(1, Ordering::SeqCst);
            }
            fn on_slide_fallback(&self, _: usize, _: usize, _: &str) {
                self.fallback.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter::default());
        let cb: ProgressCallback = counter.clone();
        let chapters = chapters(deck(6), 3);
        let enhancer = ScriptedEnhancer::failing_on(vec![2, 6]);
        assemble(&chapters, "Deck", &enhancer, 3, Some(&cb)).await;
        assert_eq!(counter.done.load(Ordering::SeqCst), 4);
        assert_eq!(counter.fallback.load(Ordering::SeqCst), 2);
    }
}
