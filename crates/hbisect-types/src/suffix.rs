//! Binary hash suffixes.
//!
//! A suffix is a string over `{'0','1'}` naming the low-order bits of a
//! 64-bit site hash; its length is the mask width. The empty suffix
//! matches every hash. Suffixes only ever grow by prepending a bit, so a
//! grown suffix always matches a subset of what its parent matched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use hbisect_error::{BisectError, Result};

/// Hard cap on suffix length; rules never look at more than 64 hash bits.
pub const MAX_SUFFIX_BITS: usize = 64;

/// One bit of a suffix, used when choosing which half to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bit {
    Zero,
    One,
}

impl Bit {
    /// The character this bit contributes to a suffix.
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Bit::Zero => '0',
            Bit::One => '1',
        }
    }

    /// The other bit.
    #[must_use]
    pub fn flipped(self) -> Bit {
        match self {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
        }
    }
}

impl TryFrom<char> for Bit {
    type Error = BisectError;

    fn try_from(c: char) -> Result<Bit> {
        match c {
            '0' => Ok(Bit::Zero),
            '1' => Ok(Bit::One),
            other => Err(BisectError::InvalidSuffix {
                text: other.to_string(),
                reason: "expected '0' or '1'".to_owned(),
            }),
        }
    }
}

/// A validated binary suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Suffix(String);

impl Suffix {
    /// The empty suffix (matches everything).
    #[must_use]
    pub fn empty() -> Suffix {
        Suffix(String::new())
    }

    /// Validate and wrap a binary string.
    pub fn new(text: &str) -> Result<Suffix> {
        if text.len() > MAX_SUFFIX_BITS {
            return Err(BisectError::InvalidSuffix {
                text: text.to_owned(),
                reason: format!("longer than {MAX_SUFFIX_BITS} bits"),
            });
        }
        if let Some(bad) = text.chars().find(|c| *c != '0' && *c != '1') {
            return Err(BisectError::InvalidSuffix {
                text: text.to_owned(),
                reason: format!("contains '{bad}'"),
            });
        }
        Ok(Suffix(text.to_owned()))
    }

    /// Number of constrained bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A new suffix with `bit` prepended (one bit longer, matching half
    /// the hashes this one matched).
    #[must_use]
    pub fn prepended(&self, bit: Bit) -> Suffix {
        let mut s = String::with_capacity(self.0.len() + 1);
        s.push(bit.as_char());
        s.push_str(&self.0);
        Suffix(s)
    }

    /// `(1 << len) - 1`, saturating at all-ones for 64-bit suffixes.
    #[must_use]
    pub fn mask(&self) -> u64 {
        if self.0.len() >= 64 {
            u64::MAX
        } else {
            (1u64 << self.0.len()) - 1
        }
    }

    /// The numeric value of the suffix read as a binary number; the
    /// empty suffix is zero.
    #[must_use]
    pub fn value(&self) -> u64 {
        if self.0.is_empty() {
            0
        } else {
            // Validated to be [01]{1,64}, so this cannot fail.
            u64::from_str_radix(&self.0, 2).unwrap_or(0)
        }
    }

    /// Whether `hash` ends in this suffix.
    #[must_use]
    pub fn matches_hash(&self, hash: u64) -> bool {
        hash & self.mask() == self.value()
    }

    /// Split a user-supplied exclude list on space, comma, `+`, or `-`.
    ///
    /// Characters outside `{0,1}` and the separators are ignored, the way
    /// a shell-quoted list tends to arrive.
    #[must_use]
    pub fn parse_list(text: &str) -> Vec<Suffix> {
        let mut out = Vec::new();
        let mut acc = String::new();
        for c in text.chars() {
            match c {
                '0' | '1' => acc.push(c),
                ' ' | ',' | '-' | '+' => {
                    if !acc.is_empty() {
                        out.push(Suffix(std::mem::take(&mut acc)));
                    }
                }
                _ => {}
            }
        }
        if !acc.is_empty() {
            out.push(Suffix(acc));
        }
        out
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Suffix {
    type Err = BisectError;

    fn from_str(s: &str) -> Result<Suffix> {
        Suffix::new(s)
    }
}
