//! Regular expressions and check-digit validators for each recognizer.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};

lazy_static! {
    /// Five letters, four digits, one letter.
    pub(crate) static ref PAN: Regex = Regex::new(r"(?i)\b[A-Z]{5}[0-9]{4}[A-Z]\b").unwrap();

    /// Twelve digits, optionally grouped 4-4-4 by single spaces.
    pub(crate) static ref AADHAAR: Regex =
        Regex::new(r"\b[0-9]{4} ?[0-9]{4} ?[0-9]{4}\b").unwrap();

    /// State code, embedded PAN, entity code, literal Z, check character.
    pub(crate) static ref GSTIN: Regex = Regex::new(
        r"(?i)\b(?:0[1-9]|[12][0-9]|3[0-8]|97)[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]\b"
    )
    .unwrap();
}

/// Build the digit-run regex for bank account numbers.
pub(crate) fn bank_account_regex(min: usize, max: usize) -> Result<Regex> {
    Regex::new(&format!(r"\b[0-9]{{{},{}}}\b", min, max))
        .map_err(|e| Error::InvalidConfig(format!("bank account pattern: {}", e)))
}

/// Build a case-insensitive alternation of literal terms.
///
/// Longer terms come first so the leftmost match is also the longest.
pub(crate) fn term_regex(terms: &[String]) -> Result<Regex> {
    let mut escaped: Vec<String> = terms.iter().map(|t| regex::escape(t.trim())).collect();
    escaped.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    escaped.dedup();

    RegexBuilder::new(&escaped.join("|"))
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("term pattern: {}", e)))
}

/// True when every digit in `candidate` is the same.
pub(crate) fn is_repeated_digit(candidate: &str) -> bool {
    let mut digits = candidate.chars().filter(|c| c.is_ascii_digit());
    match digits.next() {
        Some(first) => digits.all(|c| c == first),
        None => false,
    }
}

const VERHOEFF_D: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

const VERHOEFF_P: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

/// Verhoeff check over the digits of `candidate`, check digit last.
pub(crate) fn verhoeff_valid(candidate: &str) -> bool {
    let digits: Vec<u8> = candidate
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect();
    if digits.is_empty() {
        return false;
    }

    let mut c = 0u8;
    for (i, &d) in digits.iter().rev().enumerate() {
        c = VERHOEFF_D[c as usize][VERHOEFF_P[i % 8][d as usize] as usize];
    }
    c == 0
}

const GSTIN_CHARSET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Mod-36 weighted check of the fifteenth GSTIN character.
pub(crate) fn gstin_checksum_valid(candidate: &str) -> bool {
    let upper = candidate.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    if bytes.len() != 15 {
        return false;
    }

    let mut total = 0u32;
    for (i, &b) in bytes[..14].iter().enumerate() {
        let value = match GSTIN_CHARSET.iter().position(|&c| c == b) {
            Some(v) => v as u32,
            None => return false,
        };
        let factor = if i % 2 == 0 { 1 } else { 2 };
        let product = value * factor;
        total += product / 36 + product % 36;
    }

    let check = GSTIN_CHARSET[((36 - total % 36) % 36) as usize];
    check == bytes[14]
}
