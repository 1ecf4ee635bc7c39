//! Phone numbers that never show up in full in log output.

use std::fmt;

use zeroize::Zeroize;

/// Number of trailing digits left readable.
const VISIBLE_DIGITS: usize = 3;

const MASK_CHAR: char = '*';

const EMPTY_PLACEHOLDER: &str = "<none>";

/// A phone number wrapped for logging.
///
/// `Display`, `Debug` and `Serialize` all render the masked form, e.g.
/// `*********678`, which is enough to tell calls apart in a log without
/// writing personal data to disk. The buffer is wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct MaskedNumber {
    inner: String,
}

impl MaskedNumber {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            inner: number.into(),
        }
    }

    /// The unmasked number. Only for handing to a collaborator, never to a logger.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Render the masked form.
    pub fn masked(&self) -> String {
        let digits: Vec<char> = self.inner.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return EMPTY_PLACEHOLDER.to_string();
        }

        let hidden = digits.len().saturating_sub(VISIBLE_DIGITS);
        let mut out = String::with_capacity(digits.len());
        out.extend(std::iter::repeat_n(MASK_CHAR, hidden));
        out.extend(&digits[hidden..]);
        out
    }
}

impl From<&str> for MaskedNumber {
    fn from(number: &str) -> Self {
        Self::new(number)
    }
}

impl fmt::Debug for MaskedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaskedNumber({})", self.masked())
    }
}

impl fmt::Display for MaskedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl Drop for MaskedNumber {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl serde::Serialize for MaskedNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.masked())
    }
}
