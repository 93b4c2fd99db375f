//! Post-processing: deterministic cleanup of LLM-enhanced slide text.
//!
//! Chat models asked to "rewrite this slide as an eBook section" tend to
//! answer conversationally: an acknowledgment ("Of course."), a lead-in line
//! ("Here is a comprehensive eBook section based on the slide:"), sometimes
//! a ```` ```markdown ```` fence around the whole thing. None of that belongs
//! in a book. The rules below remove it without touching content; a pattern
//! they miss is left visible in the output, never guessed at.
//!
//! ## Rule Order
//!
//! Fences go first so the acknowledgment check sees the real first line.
//! Line endings are normalised before any line-based rule runs.

use once_cell::sync::Lazy;
use regex::Regex;

/// First lines shorter than this that end in `:` are treated as lead-ins.
const MAX_LEAD_IN_CHARS: usize = 100;

/// Apply all cleanup rules to a raw enhancer response.
///
/// Rules (applied in order):
/// 1. Strip an outer markdown fence
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip a leading acknowledgment ("Of course.", "Sure!", ...)
/// 4. Drop a lead-in first line ("Here is ...", "Here's ...", "...:")
/// 5. Normalise headings (`##Title` → `## Title`, `## : Title` → `## Title`)
/// 6. Replace image links with their alt text
/// 7. Drop table separator rows
/// 8. Trim trailing whitespace per line
/// 9. Collapse runs of blank lines
/// 10. Strip invisible Unicode
pub fn clean_response(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = strip_acknowledgment(&s);
    let s = drop_lead_in_line(&s);
    let s = normalise_headings(&s);
    let s = replace_image_links(&s);
    let s = drop_table_separators(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip leading acknowledgment ─────────────────────────────────────

static RE_ACKNOWLEDGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:of course|sure|certainly|absolutely|great)[.!,:]+[ \t]*").unwrap()
});

fn strip_acknowledgment(input: &str) -> String {
    RE_ACKNOWLEDGMENT.replace(input, "").to_string()
}

// ── Rule 4: Drop a lead-in first line ────────────────────────────────────────

static RE_HERE_IS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:here is|here's|here are|below is)\b").unwrap());

fn drop_lead_in_line(input: &str) -> String {
    let trimmed = input.trim_start();
    let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    let first = first.trim();

    let is_lead_in = RE_HERE_IS.is_match(first)
        || (!first.starts_with('#')
            && first.ends_with(':')
            && first.chars().count() < MAX_LEAD_IN_CHARS);

    if is_lead_in {
        rest.to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Rule 5: Normalise headings ───────────────────────────────────────────────

/// Rebuild every heading line as `#{1,4} text` and give it a blank line
/// before it. Headings deeper than four levels are clamped to four; a line
/// of only `#` characters is dropped.
fn normalise_headings(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    for line in input.lines() {
        let stripped = line.trim_start();
        if !stripped.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let hashes = stripped.chars().take_while(|&c| c == '#').count();
        let text = stripped[hashes..].trim_start_matches([':', ' ', '\t']).trim();
        if text.is_empty() {
            continue;
        }

        if !result.is_empty() {
            let kept = result.trim_end_matches('\n').len();
            result.truncate(kept);
            result.push_str("\n\n");
        }
        result.push_str(&"#".repeat(hashes.min(4)));
        result.push(' ');
        result.push_str(text);
        result.push('\n');
    }
    result
}

// ── Rule 6: Replace image links ──────────────────────────────────────────────
//
// Slide pictures are placed by the assembler, so any `![alt](url)` the model
// writes points at nothing. Keep the alt text in italics.

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

fn replace_image_links(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            if alt.is_empty() {
                String::new()
            } else {
                format!("*{}*", alt)
            }
        })
        .to_string()
}

// ── Rule 7: Drop table separator rows ────────────────────────────────────────

fn drop_table_separators(input: &str) -> String {
    input
        .lines()
        .filter(|line| !is_separator_row(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

// ── Rule 8: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 9: Collapse blank-line runs ─────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 10: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────
