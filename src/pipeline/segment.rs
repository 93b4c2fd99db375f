//! Chapter segmentation: partition the slide sequence into chapters.
//!
//! Every policy returns chapters that cover each slide exactly once, and
//! chapter numbers are always the 1-based position in the returned list,
//! whatever the policy. Range validation happens here (not in the config
//! builder) because coverage depends on the slide count, which is only known
//! once the deck has been read.

use crate::config::{check_slides_per_chapter, ChapterPolicy};
use crate::error::ConfigError;
use crate::model::{Chapter, Slide};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// An inclusive, 1-based slide range with an optional chapter label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRange {
    pub start: usize,
    pub end: usize,
    pub label: Option<String>,
}

impl ChapterRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ChapterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parse comma-separated range text.
///
/// Accepted items: `3-7`, `3 - 7`, `3-7: Label`, `4` (same as `4-4`).
/// Well-formedness (`start <= end`, indices ≥ 1) is checked here; bounds and
/// coverage are checked against the deck in [`segment`].
pub fn parse_ranges(text: &str) -> Result<Vec<ChapterRange>, ConfigError> {
    let mut ranges = Vec::new();

    for item in text.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        let (span, label) = match item.split_once(':') {
            Some((span, label)) => {
                let label = label.trim();
                (span.trim(), (!label.is_empty()).then(|| label.to_string()))
            }
            None => (item, None),
        };

        let malformed = || ConfigError::MalformedRange {
            range: item.to_string(),
        };
        let (start, end) = match span.split_once('-') {
            Some((a, b)) => (
                a.trim().parse::<usize>().map_err(|_| malformed())?,
                b.trim().parse::<usize>().map_err(|_| malformed())?,
            ),
            None => {
                let n = span.parse::<usize>().map_err(|_| malformed())?;
                (n, n)
            }
        };

        if start == 0 {
            return Err(malformed());
        }
        if start > end {
            return Err(ConfigError::InvertedRange {
                range: span.to_string(),
            });
        }

        ranges.push(ChapterRange { start, end, label });
    }

    if ranges.is_empty() {
        return Err(ConfigError::NoRanges);
    }
    Ok(ranges)
}

/// Group `slides` into chapters according to `policy`.
///
/// `slides` must be in deck order with indices `1..=N`.
pub fn segment(slides: Vec<Slide>, policy: &ChapterPolicy) -> Result<Vec<Chapter>, ConfigError> {
    let chapters = match policy {
        ChapterPolicy::EqualGroups { slides_per_chapter } => {
            equal_groups(slides, *slides_per_chapter)?
        }
        ChapterPolicy::CustomRanges(ranges) => custom_ranges(slides, ranges)?,
        ChapterPolicy::OnePerChapter => one_per_chapter(slides),
    };
    debug!("Segmented into {} chapters", chapters.len());
    Ok(chapters)
}

fn equal_groups(slides: Vec<Slide>, k: usize) -> Result<Vec<Chapter>, ConfigError> {
    check_slides_per_chapter(k)?;

    let mut chapters: Vec<Chapter> = Vec::with_capacity(slides.len().div_ceil(k));
    for slide in slides {
        match chapters.last_mut() {
            Some(ch) if ch.slides.len() < k => ch.slides.push(slide),
            _ => chapters.push(Chapter {
                number: chapters.len() + 1,
                label: None,
                slides: vec![slide],
            }),
        }
    }
    Ok(chapters)
}

fn custom_ranges(slides: Vec<Slide>, ranges: &[ChapterRange]) -> Result<Vec<Chapter>, ConfigError> {
    if ranges.is_empty() {
        return Err(ConfigError::NoRanges);
    }
    let slide_count = slides.len();

    // covered[i] is the slide at index i + 1
    let mut covered = vec![false; slide_count];
    for range in ranges {
        if range.start == 0 || range.start > range.end {
            return Err(ConfigError::InvertedRange {
                range: range.to_string(),
            });
        }
        if range.end > slide_count {
            return Err(ConfigError::RangeOutOfBounds {
                range: range.to_string(),
                slide_count,
            });
        }
        for slide in range.start..=range.end {
            if covered[slide - 1] {
                return Err(ConfigError::OverlappingRange {
                    range: range.to_string(),
                    slide,
                });
            }
            covered[slide - 1] = true;
        }
    }
    if let Some(gap) = covered.iter().position(|c| !c) {
        return Err(ConfigError::UncoveredSlide { slide: gap + 1 });
    }

    // Ranges are disjoint and complete, so every slide moves out exactly once.
    let mut pool: Vec<Option<Slide>> = slides.into_iter().map(Some).collect();
    let chapters = ranges
        .iter()
        .enumerate()
        .map(|(i, range)| Chapter {
            number: i + 1,
            label: range.label.clone(),
            slides: (range.start..=range.end)
                .filter_map(|idx| pool[idx - 1].take())
                .collect(),
        })
        .collect();
    Ok(chapters)
}

fn one_per_chapter(slides: Vec<Slide>) -> Vec<Chapter> {
    slides
        .into_iter()
        .enumerate()
        .map(|(i, slide)| {
            let title = slide.title.trim();
            let label = (!title.is_empty()).then(|| title.to_string());
            Chapter {
                number: i + 1,
                label,
                slides: vec![slide],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck(n: usize) -> Vec<Slide> {
        (1..=n)
            .map(|i| Slide::new(i, format!("Slide title {i}"), format!("Body {i}")))
            .collect()
    }

    fn sizes(chapters: &[Chapter]) -> Vec<usize> {
        chapters.iter().map(|c| c.slides.len()).collect()
    }

    fn numbers(chapters: &[Chapter]) -> Vec<usize> {
        chapters.iter().map(|c| c.number).collect()
    }

    fn assert_partition(chapters: &[Chapter], n: usize) {
        let mut seen: Vec<usize> = chapters.iter().flat_map(|c| c.slide_indices()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=n).collect::<Vec<_>>());
        assert_eq!(numbers(chapters), (1..=chapters.len()).collect::<Vec<_>>());
    }

    #[test]
    fn equal_groups_exact_multiple() {
        let chapters = segment(
            deck(30),
            &ChapterPolicy::EqualGroups {
                slides_per_chapter: 5,
            },
        )
        .unwrap();
        assert_eq!(sizes(&chapters), vec![5; 6]);
        assert_eq!(numbers(&chapters), vec![1, 2, 3, 4, 5, 6]);
        assert_partition(&chapters, 30);
    }

    #[test]
    fn equal_groups_remainder_in_last_chapter() {
        let chapters = segment(
            deck(32),
            &ChapterPolicy::EqualGroups {
                slides_per_chapter: 5,
            },
        )
        .unwrap();
        assert_eq!(sizes(&chapters), vec![5, 5, 5, 5, 5, 5, 2]);
        assert_eq!(chapters[6].slide_indices(), vec![31, 32]);
        assert_partition(&chapters, 32);
    }

    #[test]
    fn equal_groups_rejects_k_out_of_range() {
        for k in [1, 21] {
            let err = segment(
                deck(10),
                &ChapterPolicy::EqualGroups {
                    slides_per_chapter: k,
                },
            )
            .unwrap_err();
            assert_eq!(err, ConfigError::SlidesPerChapterOutOfRange(k));
        }
    }

    #[test]
    fn equal_groups_empty_input() {
        let chapters = segment(
            Vec::new(),
            &ChapterPolicy::EqualGroups {
                slides_per_chapter: 3,
            },
        )
        .unwrap();
        assert!(chapters.is_empty());
    }

    #[test]
    fn partition_holds_for_every_count_and_k() {
        for n in 1..=45 {
            for k in 2..=20 {
                let chapters = segment(
                    deck(n),
                    &ChapterPolicy::EqualGroups {
                        slides_per_chapter: k,
                    },
                )
                .unwrap();
                assert_partition(&chapters, n);
                assert_eq!(chapters.len(), n.div_ceil(k));
                assert!(chapters.iter().all(|c| !c.slides.is_empty()));
            }
            let singles = segment(deck(n), &ChapterPolicy::OnePerChapter).unwrap();
            assert_partition(&singles, n);
        }
    }

    #[test]
    fn custom_ranges_sizes_and_numbers() {
        let policy = ChapterPolicy::custom_ranges("1-5, 6-12, 13-18").unwrap();
        let chapters = segment(deck(18), &policy).unwrap();
        assert_eq!(sizes(&chapters), vec![5, 7, 6]);
        assert_eq!(numbers(&chapters), vec![1, 2, 3]);
        assert_partition(&chapters, 18);
    }

    #[test]
    fn custom_ranges_number_in_given_order() {
        let policy = ChapterPolicy::custom_ranges("6-10, 1-5").unwrap();
        let chapters = segment(deck(10), &policy).unwrap();
        assert_eq!(chapters[0].number, 1);
        assert_eq!(chapters[0].slide_indices(), vec![6, 7, 8, 9, 10]);
        assert_eq!(chapters[1].number, 2);
        assert_eq!(chapters[1].slide_indices(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn custom_ranges_gap_names_first_uncovered_slide() {
        let policy = ChapterPolicy::custom_ranges("1-5, 7-10").unwrap();
        let err = segment(deck(10), &policy).unwrap_err();
        assert_eq!(err, ConfigError::UncoveredSlide { slide: 6 });
    }

    #[test]
    fn custom_ranges_trailing_gap() {
        let policy = ChapterPolicy::custom_ranges("1-8").unwrap();
        let err = segment(deck(10), &policy).unwrap_err();
        assert_eq!(err, ConfigError::UncoveredSlide { slide: 9 });
    }

    #[test]
    fn custom_ranges_overlap_names_range() {
        let policy = ChapterPolicy::custom_ranges("1-5, 5-10").unwrap();
        let err = segment(deck(10), &policy).unwrap_err();
        assert_eq!(
            err,
            ConfigError::OverlappingRange {
                range: "5-10".into(),
                slide: 5
            }
        );
    }

    #[test]
    fn custom_ranges_duplicate_range_is_overlap() {
        let policy = ChapterPolicy::custom_ranges("1-5, 1-5, 6-10").unwrap();
        let err = segment(deck(10), &policy).unwrap_err();
        assert!(matches!(err, ConfigError::OverlappingRange { slide: 1, .. }));
    }

    #[test]
    fn custom_ranges_out_of_bounds() {
        let policy = ChapterPolicy::custom_ranges("1-5, 6-12").unwrap();
        let err = segment(deck(10), &policy).unwrap_err();
        assert_eq!(
            err,
            ConfigError::RangeOutOfBounds {
                range: "6-12".into(),
                slide_count: 10
            }
        );
    }

    #[test]
    fn custom_ranges_labels_and_single_indices() {
        let policy = ChapterPolicy::custom_ranges("1-2: Getting started, 3, 4-5 :  Wrap-up").unwrap();
        let chapters = segment(deck(5), &policy).unwrap();
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].heading(), "Chapter 1: Getting started");
        assert_eq!(chapters[1].slide_indices(), vec![3]);
        assert_eq!(chapters[1].heading(), "Chapter 2");
        assert_eq!(chapters[2].heading(), "Chapter 3: Wrap-up");
    }

    #[test]
    fn parse_rejects_malformed_and_inverted() {
        assert_eq!(
            parse_ranges("1-5, six-9"),
            Err(ConfigError::MalformedRange {
                range: "six-9".into()
            })
        );
        assert_eq!(
            parse_ranges("0-3"),
            Err(ConfigError::MalformedRange { range: "0-3".into() })
        );
        assert_eq!(
            parse_ranges("9-4"),
            Err(ConfigError::InvertedRange { range: "9-4".into() })
        );
        assert_eq!(parse_ranges(" , "), Err(ConfigError::NoRanges));
    }

    #[test]
    fn one_per_chapter_uses_slide_titles() {
        let mut slides = deck(10);
        slides[3].title.clear();
        let chapters = segment(slides, &ChapterPolicy::OnePerChapter).unwrap();
        assert_eq!(sizes(&chapters), vec![1; 10]);
        assert_eq!(numbers(&chapters), (1..=10).collect::<Vec<_>>());
        assert_eq!(chapters[0].heading(), "Chapter 1: Slide title 1");
        assert_eq!(chapters[3].heading(), "Chapter 4");
    }
}
