//! Page font resources.
//!
//! A [`Font`] carries what text extraction and glyph removal need: how to
//! split shown strings into character codes, how far each code advances,
//! which Unicode text each code represents, and (for embedded subsets) the
//! glyph programs that must be pruned once a code is no longer drawn.

pub mod cmap;

pub use cmap::{CMap, parse_tounicode_cmap};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default advance width (glyph space, 1/1000 em) for codes without a width entry.
pub const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// How shown strings are split into character codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontKind {
    /// Single-byte codes (Type1, TrueType, Type3)
    Simple,
    /// Two-byte codes (Type0 with Identity-H/V)
    Composite,
}

/// One glyph program of an embedded subset font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphProgram {
    /// PostScript glyph name
    pub name: String,
    /// Raw outline data
    pub outline: Vec<u8>,
}

/// An embedded subset font program, indexed by character code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedSubset {
    /// Six-letter subset tag (`ABCDEF+`)
    pub subset_tag: String,
    /// Glyph programs by character code
    pub glyphs: BTreeMap<u32, GlyphProgram>,
}

/// A font resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    /// BaseFont name
    pub base_font: String,
    /// Code width
    pub kind: FontKind,
    /// ToUnicode map
    pub to_unicode: CMap,
    /// Advance widths in glyph space
    pub widths: BTreeMap<u32, f32>,
    /// Width for codes missing from `widths`
    pub default_width: f32,
    /// Embedded subset, if the font program travels with the document
    pub embedded: Option<EmbeddedSubset>,
}

impl Font {
    /// A simple (single-byte) font with no mappings.
    pub fn simple(base_font: impl Into<String>) -> Self {
        Self::new(base_font, FontKind::Simple)
    }

    /// A composite (two-byte) font with no mappings.
    pub fn composite(base_font: impl Into<String>) -> Self {
        Self::new(base_font, FontKind::Composite)
    }

    fn new(base_font: impl Into<String>, kind: FontKind) -> Self {
        Self {
            base_font: base_font.into(),
            kind,
            to_unicode: CMap::new(),
            widths: BTreeMap::new(),
            default_width: DEFAULT_GLYPH_WIDTH,
            embedded: None,
        }
    }

    /// Set the ToUnicode map from CMap stream bytes.
    pub fn with_tounicode_cmap(mut self, data: &[u8]) -> Self {
        self.to_unicode = parse_tounicode_cmap(data);
        self
    }

    /// Add one ToUnicode entry.
    pub fn with_mapping(mut self, code: u32, text: impl Into<String>) -> Self {
        self.to_unicode.insert(code, text.into());
        self
    }

    /// Set widths for consecutive codes starting at `first_char`, like `/Widths`.
    pub fn with_widths(mut self, first_char: u32, widths: &[f32]) -> Self {
        for (code, &w) in (first_char..).zip(widths) {
            self.widths.insert(code, w);
        }
        self
    }

    /// Set the width used for codes without an explicit entry.
    pub fn with_default_width(mut self, width: f32) -> Self {
        self.default_width = width;
        self
    }

    /// Add an embedded glyph program for `code`, creating the subset on first use.
    pub fn with_embedded_glyph(mut self, code: u32, name: impl Into<String>, outline: Vec<u8>) -> Self {
        let subset_tag = subset_tag_of(&self.base_font);
        let subset = self.embedded.get_or_insert_with(|| EmbeddedSubset {
            subset_tag,
            glyphs: BTreeMap::new(),
        });
        subset.glyphs.insert(
            code,
            GlyphProgram {
                name: name.into(),
                outline,
            },
        );
        self
    }

    /// Bytes per character code.
    pub fn code_length(&self) -> usize {
        match self.kind {
            FontKind::Simple => 1,
            FontKind::Composite => 2,
        }
    }

    /// Split a shown string into `(code, byte_offset, byte_len)` triples.
    ///
    /// A trailing odd byte of a composite string becomes a one-byte code.
    pub fn codes(&self, bytes: &[u8]) -> Vec<(u32, usize, usize)> {
        let step = self.code_length();
        bytes
            .chunks(step)
            .enumerate()
            .map(|(i, chunk)| {
                let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                (code, i * step, chunk.len())
            })
            .collect()
    }

    /// Advance width of `code` in glyph space.
    pub fn width(&self, code: u32) -> f32 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    /// Whether word spacing applies to `code` (single-byte code 32 only).
    pub fn is_word_space(&self, code: u32, byte_len: usize) -> bool {
        byte_len == 1 && code == 32
    }

    /// Unicode text for `code`.
    ///
    /// Order: ToUnicode, embedded glyph name, Latin-1 for simple fonts,
    /// and U+FFFD when nothing applies.
    pub fn decode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.get(&code) {
            if text != "\u{FFFD}" {
                return text.clone();
            }
        }

        if let Some(glyph) = self.embedded.as_ref().and_then(|e| e.glyphs.get(&code)) {
            if let Some(text) = glyph_name_to_unicode(&glyph.name) {
                return text;
            }
        }

        if self.kind == FontKind::Simple {
            if let Some(c) = char::from_u32(code) {
                return c.to_string();
            }
        }

        log::debug!("No Unicode mapping for code 0x{:04X} in font '{}'", code, self.base_font);
        "\u{FFFD}".to_string()
    }

    /// Drop embedded glyphs and ToUnicode entries for every code not in `used`.
    ///
    /// Only fonts with an embedded subset are pruned; returns the removed codes.
    pub fn prune_unused(&mut self, used: &BTreeSet<u32>) -> Vec<u32> {
        let Some(subset) = self.embedded.as_mut() else {
            return Vec::new();
        };
        let removed: Vec<u32> = subset
            .glyphs
            .keys()
            .filter(|code| !used.contains(code))
            .copied()
            .collect();
        for code in &removed {
            subset.glyphs.remove(code);
            self.to_unicode.remove(code);
        }
        removed
    }
}

fn subset_tag_of(base_font: &str) -> String {
    match base_font.split_once('+') {
        Some((tag, _)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => {
            tag.to_string()
        },
        _ => String::new(),
    }
}

/// Map a glyph name to Unicode text.
///
/// Understands `uniXXXX[XXXX...]`, `uXXXX[XX]`, single-character names,
/// and a handful of common names (ligatures, punctuation, digit names).
pub fn glyph_name_to_unicode(name: &str) -> Option<String> {
    // Suffixes like ".sc" or ".alt" name variants of the same character.
    let base = name.split('.').next().unwrap_or(name);

    let known = match base {
        "space" => Some(" "),
        "fi" => Some("fi"),
        "fl" => Some("fl"),
        "ff" => Some("ff"),
        "ffi" => Some("ffi"),
        "ffl" => Some("ffl"),
        "period" => Some("."),
        "comma" => Some(","),
        "hyphen" => Some("-"),
        "colon" => Some(":"),
        "slash" => Some("/"),
        "zero" => Some("0"),
        "one" => Some("1"),
        "two" => Some("2"),
        "three" => Some("3"),
        "four" => Some("4"),
        "five" => Some("5"),
        "six" => Some("6"),
        "seven" => Some("7"),
        "eight" => Some("8"),
        "nine" => Some("9"),
        _ => None,
    };
    if let Some(text) = known {
        return Some(text.to_string());
    }

    let mut chars = base.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            return Some(c.to_string());
        }
    }

    if let Some(hex) = base.strip_prefix("uni") {
        if !hex.is_empty() && hex.len() % 4 == 0 {
            let units: Option<Vec<u16>> = (0..hex.len())
                .step_by(4)
                .map(|i| u16::from_str_radix(&hex[i..i + 4], 16).ok())
                .collect();
            return units.and_then(|u| String::from_utf16(&u).ok());
        }
    }

    if let Some(hex) = base.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            return u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_codes() {
        let font = Font::simple("Helvetica");
        assert_eq!(font.codes(b"AB"), vec![(65, 0, 1), (66, 1, 1)]);
    }

    #[test]
    fn test_composite_codes_with_trailing_byte() {
        let font = Font::composite("Identity");
        assert_eq!(font.codes(&[0x00, 0x41, 0x01, 0x02, 0x07]), vec![
            (0x41, 0, 2),
            (0x0102, 2, 2),
            (0x07, 4, 1)
        ]);
    }

    #[test]
    fn test_decode_priority() {
        let font = Font::simple("ABCDEF+Custom")
            .with_mapping(1, "X")
            .with_embedded_glyph(2, "uni0050", vec![1])
            .with_embedded_glyph(3, "fi", vec![2]);
        assert_eq!(font.decode(1), "X");
        assert_eq!(font.decode(2), "P");
        assert_eq!(font.decode(3), "fi");
        assert_eq!(font.decode(0x41), "A");
        assert_eq!(font.embedded.as_ref().unwrap().subset_tag, "ABCDEF");
    }

    #[test]
    fn test_decode_replacement_for_composite_without_mapping() {
        let font = Font::composite("Identity");
        assert_eq!(font.decode(0x1234), "\u{FFFD}");
    }

    #[test]
    fn test_tounicode_fffd_falls_through() {
        let font = Font::simple("F").with_mapping(0x41, "\u{FFFD}");
        assert_eq!(font.decode(0x41), "A");
    }

    #[test]
    fn test_tounicode_cmap_stream() {
        let font = Font::composite("Identity")
            .with_tounicode_cmap(b"beginbfchar\n<0003> <0050>\nendbfchar\nbeginbfrange\n<0010> <0012> <0041>\nendbfrange");
        assert_eq!(font.decode(3), "P");
        assert_eq!(font.decode(0x11), "B");
        assert_eq!(font.decode(0x20), "\u{FFFD}");
    }

    #[test]
    fn test_widths() {
        let font = Font::simple("F").with_widths(65, &[600.0, 700.0]).with_default_width(250.0);
        assert_eq!(font.width(65), 600.0);
        assert_eq!(font.width(66), 700.0);
        assert_eq!(font.width(67), 250.0);
    }

    #[test]
    fn test_word_space_only_single_byte_32() {
        let font = Font::simple("F");
        assert!(font.is_word_space(32, 1));
        assert!(!font.is_word_space(32, 2));
        assert!(!font.is_word_space(65, 1));
    }

    #[test]
    fn test_prune_unused() {
        let mut font = Font::simple("ABCDEF+F")
            .with_embedded_glyph(65, "A", vec![1])
            .with_embedded_glyph(66, "B", vec![2])
            .with_mapping(65, "A")
            .with_mapping(66, "B");
        let used: BTreeSet<u32> = [65].into_iter().collect();
        assert_eq!(font.prune_unused(&used), vec![66]);
        let subset = font.embedded.as_ref().unwrap();
        assert!(subset.glyphs.contains_key(&65));
        assert!(!subset.glyphs.contains_key(&66));
        assert!(!font.to_unicode.contains_key(&66));
    }

    #[test]
    fn test_prune_without_subset_is_noop() {
        let mut font = Font::simple("Helvetica").with_mapping(65, "A");
        assert!(font.prune_unused(&BTreeSet::new()).is_empty());
        assert!(font.to_unicode.contains_key(&65));
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_unicode("a").as_deref(), Some("a"));
        assert_eq!(glyph_name_to_unicode("seven").as_deref(), Some("7"));
        assert_eq!(glyph_name_to_unicode("uni00660069").as_deref(), Some("fi"));
        assert_eq!(glyph_name_to_unicode("u1F600").as_deref(), Some("\u{1F600}"));
        assert_eq!(glyph_name_to_unicode("A.sc").as_deref(), Some("A"));
        assert_eq!(glyph_name_to_unicode("bogusname"), None);
    }
}
