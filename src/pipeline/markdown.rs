//! Light markdown parsing of cleaned slide text into document blocks.
//!
//! Only the subset an enhancer realistically produces is recognised:
//! `#`-headings, paragraphs separated by blank lines, bullet and numbered
//! list items, and inline emphasis (which is stripped, since both renderers
//! set whole paragraphs in one face).

use crate::model::Block;
use once_cell::sync::Lazy;
use regex::Regex;

const BULLET: &str = "\u{2022}";

static RE_BULLET_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*+]\s+(.*)$").unwrap());
static RE_NUMBERED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)[.)]\s+(.*)$").unwrap());
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\s][^*]*?)\*").unwrap());

/// Parse cleaned text into heading and paragraph blocks.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<String> = Vec::new();

    fn flush(paragraph: &mut Vec<String>, blocks: &mut Vec<Block>) {
        if !paragraph.is_empty() {
            blocks.push(Block::paragraph(paragraph.join(" ")));
            paragraph.clear();
        }
    }

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            flush(&mut paragraph, &mut blocks);
            continue;
        }

        if line.starts_with('#') {
            flush(&mut paragraph, &mut blocks);
            let level = line.chars().take_while(|&c| c == '#').count();
            let heading = strip_inline(line[level..].trim());
            if !heading.is_empty() {
                blocks.push(Block::heading(level.min(4) as u8, heading));
            }
            continue;
        }

        if let Some(caps) = RE_BULLET_ITEM.captures(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::paragraph(format!(
                "{BULLET} {}",
                strip_inline(&caps[1])
            )));
            continue;
        }

        if let Some(caps) = RE_NUMBERED_ITEM.captures(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::paragraph(format!(
                "{}. {}",
                &caps[1],
                strip_inline(&caps[2])
            )));
            continue;
        }

        paragraph.push(strip_inline(line));
    }
    flush(&mut paragraph, &mut blocks);

    blocks
}

/// Parse unenhanced slide text, where every line is its own bullet or
/// sentence fragment and must not be run together.
pub fn parse_raw(text: &str) -> Vec<Block> {
    text.lines().flat_map(parse_blocks).collect()
}

/// Remove bold/italic markers and backticks, keeping the enclosed text.
pub fn strip_inline(text: &str) -> String {
    let s = RE_BOLD.replace_all(text, |caps: &regex::Captures<'_>| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    let s = RE_ITALIC.replace_all(&s, "$1");
    s.replace('`', "").trim().to_string()
}
