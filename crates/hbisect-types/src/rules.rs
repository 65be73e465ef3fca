//! Hash-and-mask rules and the environment-value grammar.
//!
//! A rule `(h, m)` matches a 64-bit site hash `x` iff `(x ^ h) & m == 0`.
//! Rule sets arrive in the subject process as the value of a single
//! environment variable; the grammar accepted here is the permissive one:
//!
//! ```text
//! value := ε                       every site matches, silently
//!        | ('y'|'Y') …             always-yes: match everything, log
//!        | ('n'|'N') …             always-no: nothing matches
//!        | rule { sep rule }
//! rule  := '-' bits                exclusion (anywhere, not just leading)
//!        | bits                    inclusion
//! sep   := '/' | '+' | ',' | ' ' | '\t' | 'v'
//! bits  := [01]*                   longer than 64: trailing 64 kept
//! ```
//!
//! An empty inclusion is only meaningful as the single leading token
//! (optionally followed by one empty token) and means "match everything,
//! loudly"; other placements are rejected rather than guessed at.

use std::fmt;

use serde::{Deserialize, Serialize};

use hbisect_error::{BisectError, Result};

/// Tag prefix used when an exclusion rule fails to parse or fires.
pub const EXCLUDE_TAG: &str = "HASH_EXCLUDE";

/// One suffix constraint plus the tag used when it triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashAndMask {
    pub hash: u64,
    pub mask: u64,
    /// Base variable name, or base name + "0", "1", etc.
    pub tag: String,
}

impl HashAndMask {
    /// Build a rule from a binary string, keeping the trailing 64
    /// characters when the string is longer.
    pub fn from_bits(bits: &str, tag: impl Into<String>) -> Result<HashAndMask> {
        let tag = tag.into();
        let bits = if bits.len() > 64 {
            &bits[bits.len() - 64..]
        } else {
            bits
        };
        let mask = if bits.len() >= 64 {
            u64::MAX
        } else {
            (1u64 << bits.len()) - 1
        };
        let hash = u64::from_str_radix(bits, 2).map_err(|_| BisectError::RuleParse {
            var: tag.clone(),
            text: bits.to_owned(),
        })?;
        Ok(HashAndMask { hash, mask, tag })
    }

    /// Whether `hash` satisfies this rule.
    #[must_use]
    pub fn matches(&self, hash: u64) -> bool {
        (hash ^ self.hash) & self.mask == 0
    }
}

impl fmt::Display for HashAndMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:x}/{:x}", self.tag, self.hash, self.mask)
    }
}

/// Short-circuit behavior of a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// No search configured: every site matches, nothing is logged.
    Default,
    /// Match everything and log each decision.
    AlwaysYes,
    /// Match nothing.
    AlwaysNo,
    /// Consult the exclusion and inclusion rules.
    Normal,
}

/// An ordered rule set as decoded from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub mode: MatchMode,
    pub matches: Vec<HashAndMask>,
    pub excludes: Vec<HashAndMask>,
}

/// A parsed token: exclusion flag plus its (possibly empty) bits.
struct Token {
    exclude: bool,
    bits: String,
}

impl RuleSet {
    /// The unconfigured rule set.
    #[must_use]
    pub fn unset() -> RuleSet {
        RuleSet {
            mode: MatchMode::Default,
            matches: Vec::new(),
            excludes: Vec::new(),
        }
    }

    /// Decode an environment value into a rule set.
    ///
    /// `var` names the carrying variable (it becomes the tag of the
    /// primary inclusion rule); `hash_prefix` is the fixed text the
    /// encoder prepends to the rules, stripped here when present.
    pub fn parse(var: &str, hash_prefix: &str, value: &str) -> Result<RuleSet> {
        let value = value.strip_prefix(hash_prefix).unwrap_or(value);
        if value.is_empty() {
            return Ok(RuleSet::unset());
        }
        match value.as_bytes()[0] {
            b'y' | b'Y' => {
                return Ok(RuleSet {
                    mode: MatchMode::AlwaysYes,
                    matches: Vec::new(),
                    excludes: Vec::new(),
                })
            }
            b'n' | b'N' => {
                return Ok(RuleSet {
                    mode: MatchMode::AlwaysNo,
                    matches: Vec::new(),
                    excludes: Vec::new(),
                })
            }
            _ => {}
        }

        let tokens = tokenize(var, value)?;

        // An empty inclusion token is the encoder's "match everything"
        // form. It only makes sense trailing the exclusions: reject any
        // stream mixing empty inclusions with named ones, more than two
        // empties, or rules appearing after an empty.
        let first_empty = tokens
            .iter()
            .position(|t| !t.exclude && t.bits.is_empty());
        if let Some(at) = first_empty {
            let empties = tokens
                .iter()
                .filter(|t| !t.exclude && t.bits.is_empty())
                .count();
            let mixed = tokens
                .iter()
                .any(|t| !t.exclude && !t.bits.is_empty());
            let rules_after_empty = tokens[at..].iter().any(|t| t.exclude);
            if mixed || empties > 2 || rules_after_empty {
                return Err(BisectError::EmptyMatchPlacement {
                    var: var.to_owned(),
                });
            }
        }

        let mut excludes = Vec::new();
        for tok in tokens.iter().filter(|t| t.exclude) {
            let tag = format!("{EXCLUDE_TAG}{}", excludes.len());
            excludes.push(HashAndMask::from_bits(&tok.bits, tag)?);
        }

        let mut matches = Vec::new();
        let mut named = 0usize;
        for tok in tokens.iter().filter(|t| !t.exclude) {
            if tok.bits.is_empty() {
                // Validated above; expand and stop.
                push_match_everything(var, &mut matches)?;
                break;
            }
            let tag = if named == 0 {
                var.to_owned()
            } else {
                format!("{var}{}", named - 1)
            };
            matches.push(HashAndMask::from_bits(&tok.bits, tag)?);
            named += 1;
        }

        // Exclusions with no inclusion token at all still mean
        // "everything else matches".
        if matches.is_empty() {
            push_match_everything(var, &mut matches)?;
        }

        Ok(RuleSet {
            mode: MatchMode::Normal,
            matches,
            excludes,
        })
    }

    /// Whether an exclusion rule fires for `hash`.
    #[must_use]
    pub fn is_excluded(&self, hash: u64) -> bool {
        self.excludes.iter().any(|m| m.matches(hash))
    }

    /// The first inclusion rule matching `hash`, if any.
    #[must_use]
    pub fn matching_rule(&self, hash: u64) -> Option<&HashAndMask> {
        self.matches.iter().find(|m| m.matches(hash))
    }
}

/// The "match everything, loudly" expansion: one rule per low bit value.
fn push_match_everything(var: &str, matches: &mut Vec<HashAndMask>) -> Result<()> {
    matches.push(HashAndMask::from_bits("0", format!("{var}0"))?);
    matches.push(HashAndMask::from_bits("1", format!("{var}1"))?);
    Ok(())
}

fn tokenize(var: &str, value: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut cur: Option<Token> = None;
    for c in value.chars() {
        match c {
            '0' | '1' => cur
                .get_or_insert_with(|| Token {
                    exclude: false,
                    bits: String::new(),
                })
                .bits
                .push(c),
            '-' => {
                if let Some(tok) = cur.take() {
                    tokens.push(tok);
                }
                cur = Some(Token {
                    exclude: true,
                    bits: String::new(),
                });
            }
            '/' | '+' | ',' | ' ' | '\t' | 'v' => {
                tokens.push(cur.take().unwrap_or(Token {
                    exclude: false,
                    bits: String::new(),
                }));
            }
            _ => {
                return Err(BisectError::RuleParse {
                    var: var.to_owned(),
                    text: value.to_owned(),
                })
            }
        }
    }
    tokens.push(cur.take().unwrap_or(Token {
        exclude: false,
        bits: String::new(),
    }));
    Ok(tokens)
}
