//! Phone number canonicalization.
//!
//! Every number that is compared, whether it comes from a transport event, the
//! contact directory or a dial request, goes through [`PhoneNormalizer::normalize`]
//! first. The result keeps only digits, drops the international prefix (`+` or
//! `00`) and keeps the last `max_compare_length` digits, so `+49 89 12345678`,
//! `0049 89 12345678` and `089/12345678` all land on `8912345678`.

use serde::Serialize;

pub const DEFAULT_MAX_COMPARE_LENGTH: usize = 10;

const INTERNATIONAL_ACCESS_PREFIX: &str = "00";

/// Digit-only comparison key.
///
/// Can only be produced by [`PhoneNormalizer`]. An empty key means "no usable
/// number" and never matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedNumber(String);

impl NormalizedNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for NormalizedNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhoneNormalizer {
    max_compare_length: usize,
}

impl PhoneNormalizer {
    /// `max_compare_length` of zero is treated as one; config validation keeps
    /// real values in a sensible range.
    pub fn new(max_compare_length: usize) -> Self {
        Self {
            max_compare_length: max_compare_length.max(1),
        }
    }

    pub fn max_compare_length(&self) -> usize {
        self.max_compare_length
    }

    /// Pure and idempotent: `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, raw: &str) -> NormalizedNumber {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        // Stripping and truncating until nothing changes keeps the result a
        // fixed point, even when truncation exposes another leading "00".
        let mut current = digits.as_str();
        loop {
            let next = self.collapse(current);
            if next.len() == current.len() {
                break;
            }
            current = next;
        }

        NormalizedNumber(current.to_string())
    }

    fn collapse<'a>(&self, digits: &'a str) -> &'a str {
        let stripped = digits
            .strip_prefix(INTERNATIONAL_ACCESS_PREFIX)
            .unwrap_or(digits);
        let start = stripped.len().saturating_sub(self.max_compare_length);
        &stripped[start..]
    }
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMPARE_LENGTH)
    }
}
