//! Configuration for sanitization runs.
//!
//! Every field is explicit: the JSON form requires all of them, and the
//! only constructor is [`SanitizerConfig::baseline`], whose values are
//! spelled out in its documentation.

use crate::error::{Error, Result};
use crate::patterns::PatternKind;
use serde::{Deserialize, Serialize};

/// Inclusive digit-length range for bank-account-like numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DigitRange {
    /// Minimum number of digits
    pub min: usize,
    /// Maximum number of digits
    pub max: usize,
}

/// What to do with a match that cannot be mapped to removable operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlocatablePolicy {
    /// Abort the whole operation on the first unlocatable span
    FailFast,
    /// Record it as a page error and continue; verification still fails
    Collect,
}

/// Sanitization configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SanitizerConfig {
    /// Recognizers to run
    pub kinds: Vec<PatternKind>,

    /// Digit range for [`PatternKind::BankAccount`]; required when that kind is enabled
    pub bank_account_digits: Option<DigitRange>,

    /// Reject Aadhaar candidates made of a single repeated digit
    pub aadhaar_reject_repeated: bool,

    /// Require a valid Verhoeff check digit on Aadhaar candidates
    pub aadhaar_checksum: bool,

    /// Require a valid mod-36 check character on GSTIN candidates
    pub gstin_checksum: bool,

    /// Literal terms for [`PatternKind::Term`], matched case-insensitively
    pub terms: Vec<String>,

    /// Handling of unlocatable spans
    pub unlocatable: UnlocatablePolicy,

    /// Inline form XObjects whose text holds a match, then retry location
    pub inline_form_xobjects: bool,

    /// Process pages on the rayon thread pool
    pub parallel: bool,

    /// Remove every free-text metadata field, matched or not
    pub strip_all_metadata: bool,

    /// Remove every annotation
    pub flatten_annotations: bool,
}

impl SanitizerConfig {
    /// A configuration running `kinds` with:
    ///
    /// - no bank-account range and no terms
    /// - Aadhaar and GSTIN heuristics off
    /// - [`UnlocatablePolicy::FailFast`]
    /// - no form inlining, sequential processing
    /// - metadata and annotations scrubbed only where they match
    pub fn baseline(kinds: impl IntoIterator<Item = PatternKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            bank_account_digits: None,
            aadhaar_reject_repeated: false,
            aadhaar_checksum: false,
            gstin_checksum: false,
            terms: Vec::new(),
            unlocatable: UnlocatablePolicy::FailFast,
            inline_form_xobjects: false,
            parallel: false,
            strip_all_metadata: false,
            flatten_annotations: false,
        }
    }

    /// Set the bank-account digit range.
    pub fn with_bank_account_digits(mut self, min: usize, max: usize) -> Self {
        self.bank_account_digits = Some(DigitRange { min, max });
        self
    }

    /// Set the literal terms.
    pub fn with_terms<S: Into<String>>(mut self, terms: impl IntoIterator<Item = S>) -> Self {
        self.terms = terms.into_iter().map(Into::into).collect();
        self
    }

    /// Set the Aadhaar heuristics.
    pub fn with_aadhaar_checks(mut self, reject_repeated: bool, checksum: bool) -> Self {
        self.aadhaar_reject_repeated = reject_repeated;
        self.aadhaar_checksum = checksum;
        self
    }

    /// Enable or disable GSTIN checksum validation.
    pub fn with_gstin_checksum(mut self, enable: bool) -> Self {
        self.gstin_checksum = enable;
        self
    }

    /// Set the unlocatable-span policy.
    pub fn with_unlocatable(mut self, policy: UnlocatablePolicy) -> Self {
        self.unlocatable = policy;
        self
    }

    /// Enable or disable form XObject inlining.
    pub fn with_inline_form_xobjects(mut self, enable: bool) -> Self {
        self.inline_form_xobjects = enable;
        self
    }

    /// Enable or disable parallel page processing.
    pub fn with_parallel(mut self, enable: bool) -> Self {
        self.parallel = enable;
        self
    }

    /// Enable or disable full metadata removal.
    pub fn with_strip_all_metadata(mut self, enable: bool) -> Self {
        self.strip_all_metadata = enable;
        self
    }

    /// Enable or disable annotation flattening.
    pub fn with_flatten_annotations(mut self, enable: bool) -> Self {
        self.flatten_annotations = enable;
        self
    }

    /// Check the configuration for contradictions.
    pub fn validate(&self) -> Result<()> {
        if self.kinds.is_empty() {
            return Err(Error::InvalidConfig("at least one pattern kind is required".to_string()));
        }

        if let Some(range) = self.bank_account_digits {
            if range.min == 0 || range.min > range.max {
                return Err(Error::InvalidConfig(format!(
                    "bank account digit range {}..={} is empty or starts at zero",
                    range.min, range.max
                )));
            }
        } else if self.kinds.contains(&PatternKind::BankAccount) {
            return Err(Error::InvalidConfig(
                "bank account matching needs bank_account_digits".to_string(),
            ));
        }

        if self.kinds.contains(&PatternKind::Term) {
            if self.terms.is_empty() {
                return Err(Error::InvalidConfig("term matching needs at least one term".to_string()));
            }
            if self.terms.iter().any(|t| t.trim().is_empty()) {
                return Err(Error::InvalidConfig("terms must not be blank".to_string()));
            }
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
