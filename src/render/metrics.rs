//! Standard-14 font metrics and WinAnsi encoding for the PDF renderer.
//!
//! The PDF uses the built-in Helvetica family so no font program has to be
//! embedded. Those fonts only cover the WinAnsi code page; anything outside
//! it is written as `?`.

/// The three faces the PDF uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Regular,
    Bold,
    Oblique,
}

impl Font {
    /// Resource name in the page dictionary.
    pub fn resource_name(self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
            Font::Oblique => b"F3",
        }
    }

    /// PostScript name of the standard-14 font.
    pub fn base_font(self) -> &'static [u8] {
        match self {
            Font::Regular => b"Helvetica",
            Font::Bold => b"Helvetica-Bold",
            Font::Oblique => b"Helvetica-Oblique",
        }
    }

    pub const ALL: [Font; 3] = [Font::Regular, Font::Bold, Font::Oblique];
}

// Advance widths in 1/1000 em for codes 32..=126.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Width of one WinAnsi code in 1/1000 em.
pub fn code_width(font: Font, code: u8) -> u16 {
    let table = match font {
        Font::Bold => &HELVETICA_BOLD,
        Font::Regular | Font::Oblique => &HELVETICA,
    };
    match code {
        32..=126 => table[(code - 32) as usize],
        133 | 137 | 151 => 1000,
        145 | 146 => 222,
        147 | 148 => 333,
        149 => 350,
        160 => 278,
        // Accented capitals are close to their base letters.
        192..=221 => 722,
        _ => 556,
    }
}

/// Width of already-encoded text at `size` points.
pub fn encoded_width(font: Font, encoded: &[u8], size: f32) -> f32 {
    let units: u32 = encoded.iter().map(|&c| code_width(font, c) as u32).sum();
    units as f32 * size / 1000.0
}

/// Width of `text` at `size` points.
pub fn text_width(font: Font, text: &str, size: f32) -> f32 {
    encoded_width(font, &encode_win_ansi(text), size)
}

/// Encode text for a WinAnsi simple font. Unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_code).collect()
}

fn win_ansi_code(c: char) -> u8 {
    match c {
        '\t' => b' ',
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '€' => 128,
        '‚' => 130,
        'ƒ' => 131,
        '„' => 132,
        '…' => 133,
        '†' => 134,
        '‡' => 135,
        'ˆ' => 136,
        '‰' => 137,
        'Š' => 138,
        '‹' => 139,
        'Œ' => 140,
        'Ž' => 142,
        '\u{2018}' => 145,
        '\u{2019}' => 146,
        '\u{201C}' => 147,
        '\u{201D}' => 148,
        '•' => 149,
        '–' => 150,
        '—' => 151,
        '˜' => 152,
        '™' => 153,
        'š' => 154,
        '›' => 155,
        'œ' => 156,
        'ž' => 158,
        'Ÿ' => 159,
        _ => b'?',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(encode_win_ansi("Hello, PDF!"), b"Hello, PDF!".to_vec());
    }

    #[test]
    fn typographic_punctuation_maps_to_win_ansi() {
        assert_eq!(
            encode_win_ansi("\u{2018}a\u{2019} \u{201C}b\u{201D} \u{2022} \u{2013} \u{2014} \u{2026} \u{20AC}"),
            vec![145, b'a', 146, b' ', 147, b'b', 148, b' ', 149, b' ', 150, b' ', 151, b' ', 133, b' ', 128]
        );
        assert_eq!(encode_win_ansi("café"), vec![b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn unmappable_becomes_question_mark() {
        assert_eq!(encode_win_ansi("λ→✓"), b"???".to_vec());
    }

    #[test]
    fn widths_follow_afm() {
        assert_eq!(code_width(Font::Regular, b' '), 278);
        assert_eq!(code_width(Font::Regular, b'W'), 944);
        assert_eq!(code_width(Font::Bold, b'b'), 611);
        assert_eq!(code_width(Font::Oblique, b'i'), 222);
        // "ab" in Helvetica at 10pt: (556 + 556) / 100
        assert!((text_width(Font::Regular, "ab", 10.0) - 11.12).abs() < 1e-4);
    }

    #[test]
    fn bold_is_wider_than_regular() {
        let s = "The quick brown fox";
        assert!(text_width(Font::Bold, s, 12.0) > text_width(Font::Regular, s, 12.0));
    }
}
