//! Identifier recognition over extracted text.
//!
//! [`PatternMatcher`] runs one recognizer per [`PatternKind`] and resolves
//! overlapping candidates: the longest match wins, equal lengths fall back
//! to [`PatternKind::priority`], then to the earliest start.
//!
//! Matching never fails. Empty or garbled text simply yields no spans.

mod recognizers;

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SanitizerConfig;
use crate::error::Result;

/// Kind of sensitive identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Permanent Account Number
    Pan,
    /// Goods and Services Tax Identification Number
    Gstin,
    /// Aadhaar number
    Aadhaar,
    /// Bank account number (digit run of configured length)
    BankAccount,
    /// Caller-supplied literal term
    Term,
}

impl PatternKind {
    /// Every kind, highest priority first.
    pub const ALL: [PatternKind; 5] = [
        PatternKind::Pan,
        PatternKind::Gstin,
        PatternKind::Aadhaar,
        PatternKind::BankAccount,
        PatternKind::Term,
    ];

    /// Tie-break rank among equal-length overlapping matches (higher wins).
    pub fn priority(self) -> u8 {
        match self {
            PatternKind::Pan => 5,
            PatternKind::Gstin => 4,
            PatternKind::Aadhaar => 3,
            PatternKind::BankAccount => 2,
            PatternKind::Term => 1,
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PatternKind::Pan => "PAN",
            PatternKind::Gstin => "GSTIN",
            PatternKind::Aadhaar => "Aadhaar",
            PatternKind::BankAccount => "bank account",
            PatternKind::Term => "term",
        };
        f.write_str(name)
    }
}

/// A match in a page's extracted text.
///
/// Offsets are byte offsets into the text the matcher was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    /// Recognizer that produced the match
    pub pattern_kind: PatternKind,
    /// Start byte offset (inclusive)
    pub start_offset: usize,
    /// End byte offset (exclusive)
    pub end_offset: usize,
    /// The matched text
    pub matched_text: String,
}

impl MatchSpan {
    /// Length of the match in bytes.
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    /// Whether the match is empty.
    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }
}

/// Runs the configured recognizers over text.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    kinds: Vec<PatternKind>,
    bank_account: Option<Regex>,
    terms: Vec<String>,
    term_regex: Option<Regex>,
    aadhaar_reject_repeated: bool,
    aadhaar_checksum: bool,
    gstin_checksum: bool,
}

impl PatternMatcher {
    /// Build a matcher from a validated configuration.
    pub fn new(config: &SanitizerConfig) -> Result<Self> {
        config.validate()?;

        let mut kinds = config.kinds.clone();
        kinds.sort();
        kinds.dedup();

        let bank_account = match config.bank_account_digits {
            Some(range) if kinds.contains(&PatternKind::BankAccount) => {
                Some(recognizers::bank_account_regex(range.min, range.max)?)
            },
            _ => None,
        };

        let terms: Vec<String> = if kinds.contains(&PatternKind::Term) {
            config.terms.iter().map(|t| t.trim().to_string()).collect()
        } else {
            Vec::new()
        };
        let term_regex = if terms.is_empty() {
            None
        } else {
            Some(recognizers::term_regex(&terms)?)
        };

        Ok(Self {
            kinds,
            bank_account,
            terms,
            term_regex,
            aadhaar_reject_repeated: config.aadhaar_reject_repeated,
            aadhaar_checksum: config.aadhaar_checksum,
            gstin_checksum: config.gstin_checksum,
        })
    }

    /// Kinds this matcher runs, highest priority first.
    pub fn kinds(&self) -> &[PatternKind] {
        &self.kinds
    }

    fn regex_for(&self, kind: PatternKind) -> Option<&Regex> {
        match kind {
            PatternKind::Pan => Some(&recognizers::PAN),
            PatternKind::Gstin => Some(&recognizers::GSTIN),
            PatternKind::Aadhaar => Some(&recognizers::AADHAAR),
            PatternKind::BankAccount => self.bank_account.as_ref(),
            PatternKind::Term => self.term_regex.as_ref(),
        }
    }

    fn accept(&self, kind: PatternKind, candidate: &str) -> bool {
        match kind {
            PatternKind::Aadhaar => {
                !(self.aadhaar_reject_repeated && recognizers::is_repeated_digit(candidate))
                    && (!self.aadhaar_checksum || recognizers::verhoeff_valid(candidate))
            },
            PatternKind::Gstin => !self.gstin_checksum || recognizers::gstin_checksum_valid(candidate),
            _ => true,
        }
    }

    /// Lazily yield the matches of one recognizer, left to right.
    ///
    /// Matches of a single kind never overlap each other. A kind with no
    /// configured pattern (bank accounts without a range, terms without a
    /// term list) yields nothing.
    pub fn find<'a>(&'a self, text: &'a str, kind: PatternKind) -> impl Iterator<Item = MatchSpan> + 'a {
        self.regex_for(kind)
            .into_iter()
            .flat_map(move |re| re.find_iter(text))
            .filter(move |m| self.accept(kind, m.as_str()))
            .map(move |m| MatchSpan {
                pattern_kind: kind,
                start_offset: m.start(),
                end_offset: m.end(),
                matched_text: m.as_str().to_string(),
            })
    }

    /// Run every configured kind and return non-overlapping spans sorted by start.
    pub fn find_all(&self, text: &str) -> Vec<MatchSpan> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<MatchSpan> = self
            .kinds
            .iter()
            .flat_map(|&kind| self.find(text, kind))
            .collect();

        candidates.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| b.pattern_kind.priority().cmp(&a.pattern_kind.priority()))
                .then_with(|| a.start_offset.cmp(&b.start_offset))
        });

        // start -> end of accepted spans; accepted spans never overlap, so only
        // the nearest span starting before a candidate's end can collide with it
        let mut taken: BTreeMap<usize, usize> = BTreeMap::new();
        let mut accepted = Vec::new();
        for span in candidates {
            let collides = taken
                .range(..span.end_offset)
                .next_back()
                .is_some_and(|(_, &end)| end > span.start_offset);
            if !collides {
                taken.insert(span.start_offset, span.end_offset);
                accepted.push(span);
            }
        }

        accepted.sort_by_key(|s| s.start_offset);
        accepted
    }

    /// Whether any configured kind matches `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.kinds.iter().any(|&kind| self.find(text, kind).next().is_some())
    }

    /// Count term matches, keyed by the configured term they matched.
    pub fn term_counts<'s>(&self, spans: impl IntoIterator<Item = &'s MatchSpan>) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for span in spans {
            if span.pattern_kind != PatternKind::Term {
                continue;
            }
            let found = span.matched_text.to_lowercase();
            let key = self
                .terms
                .iter()
                .find(|t| t.to_lowercase() == found)
                .cloned()
                .unwrap_or(found);
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}
