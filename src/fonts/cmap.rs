//! ToUnicode CMap parsing.
//!
//! CMap streams map character codes to Unicode. Only the `bfchar` and
//! `bfrange` sections matter for text extraction; codespace ranges are
//! implied by the font kind.

use regex::Regex;
use std::collections::BTreeMap;

/// Character code → Unicode string.
pub type CMap = BTreeMap<u32, String>;

/// Decode a destination hex string, which is UTF-16BE (surrogates and
/// multi-character ligature mappings included).
fn decode_destination(hex: &str) -> Option<String> {
    if hex.len() <= 2 {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    let units: Vec<u16> = hex
        .as_bytes()
        .chunks(4)
        .map(|chunk| std::str::from_utf8(chunk).ok().and_then(|s| u16::from_str_radix(s, 16).ok()))
        .collect::<Option<_>>()?;
    let decoded = String::from_utf16(&units).ok()?;
    if decoded.is_empty() { None } else { Some(decoded) }
}

/// Parse a ToUnicode CMap stream.
///
/// ```
/// use pdf_sanitizer::fonts::parse_tounicode_cmap;
///
/// let cmap = parse_tounicode_cmap(b"beginbfchar\n<01> <0041>\nendbfchar");
/// assert_eq!(cmap.get(&1).map(String::as_str), Some("A"));
/// ```
pub fn parse_tounicode_cmap(data: &[u8]) -> CMap {
    lazy_static::lazy_static! {
        static ref BFCHAR: Regex = Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>").unwrap();
        static ref BFRANGE_SEQ: Regex =
            Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>").unwrap();
        static ref BFRANGE_ARRAY: Regex =
            Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*\[([^\]]*)\]").unwrap();
        static ref HEX: Regex = Regex::new(r"<([0-9A-Fa-f]+)>").unwrap();
    }

    let mut cmap = CMap::new();
    let content = String::from_utf8_lossy(data);

    for section in extract_sections(&content, "beginbfchar", "endbfchar") {
        for caps in BFCHAR.captures_iter(section) {
            if let (Ok(src), Some(dst)) =
                (u32::from_str_radix(&caps[1], 16), decode_destination(&caps[2]))
            {
                cmap.insert(src, dst);
            }
        }
    }

    for section in extract_sections(&content, "beginbfrange", "endbfrange") {
        for line in section.lines() {
            if let Some(caps) = BFRANGE_ARRAY.captures(line) {
                let (Ok(start), Ok(end)) =
                    (u32::from_str_radix(&caps[1], 16), u32::from_str_radix(&caps[2], 16))
                else {
                    continue;
                };
                for (code, dst) in (start..=end).zip(HEX.captures_iter(&caps[3])) {
                    if let Some(s) = decode_destination(&dst[1]) {
                        cmap.insert(code, s);
                    }
                }
            } else if let Some(caps) = BFRANGE_SEQ.captures(line) {
                let (Ok(start), Ok(end)) =
                    (u32::from_str_radix(&caps[1], 16), u32::from_str_radix(&caps[2], 16))
                else {
                    continue;
                };
                let Some(first) = decode_destination(&caps[3]) else {
                    continue;
                };
                // The last UTF-16 unit is incremented across the range.
                let mut units: Vec<u16> = first.encode_utf16().collect();
                for code in start..=end.min(start.saturating_add(0xFFFF)) {
                    if let Ok(s) = String::from_utf16(&units) {
                        cmap.insert(code, s);
                    }
                    if let Some(last) = units.last_mut() {
                        *last = last.wrapping_add(1);
                    }
                }
            }
        }
    }

    cmap
}

fn extract_sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut sections = Vec::new();
    let mut remaining = content;

    while let Some(begin_pos) = remaining.find(begin) {
        let after_begin = &remaining[begin_pos + begin.len()..];
        match after_begin.find(end) {
            Some(end_pos) => {
                sections.push(&after_begin[..end_pos]);
                remaining = &after_begin[end_pos + end.len()..];
            },
            None => break,
        }
    }

    sections
}
