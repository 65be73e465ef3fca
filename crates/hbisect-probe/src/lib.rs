//! The in-subject probe.
//!
//! A [`HashGate`] is embedded in the process under test. Each time the
//! subject reaches a site where the hash-gated behavior could apply, it
//! asks the gate whether to proceed; a `true` answer is accompanied by a
//! trigger line the search driver parses out of the captured output.
//!
//! The gate is read-only after construction, so it is safe to share
//! across subject threads; only the output sink is synchronized.

use std::env;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use hbisect_error::{BisectError, Result};
use hbisect_types::{MatchMode, RuleSet};

pub mod hash;

pub use hash::{binary_string, site_hash};
pub use hbisect_types::LOGFILE_ENV;

/// Which trigger-line shape the gate emits. External tools depend on
/// these exact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStyle {
    /// `<tag> triggered <site>[:<param>] <bits>`
    Legacy,
    /// `<site>[:<param>] [bisect-match 0x<hex>]`
    Bisect,
}

/// Decision gate for hash-gated behavior.
pub struct HashGate {
    name: String,
    rules: RuleSet,
    style: TriggerStyle,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl HashGate {
    /// Build a gate from the decoded environment value, writing triggers
    /// to stdout or to the file named by [`LOGFILE_ENV`].
    pub fn new(name: &str, hash_prefix: &str, value: &str, style: TriggerStyle) -> Result<HashGate> {
        Self::with_sink(name, hash_prefix, value, style, default_sink()?)
    }

    /// Build a gate with an explicit trigger sink.
    pub fn with_sink(
        name: &str,
        hash_prefix: &str,
        value: &str,
        style: TriggerStyle,
        sink: Box<dyn Write + Send>,
    ) -> Result<HashGate> {
        let rules = RuleSet::parse(name, hash_prefix, value)?;
        Ok(HashGate {
            name: name.to_owned(),
            rules,
            style,
            sink: Mutex::new(sink),
        })
    }

    /// The decoded rule set's short-circuit mode.
    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.rules.mode
    }

    /// Decide whether the gated behavior applies at `site`.
    #[must_use]
    pub fn matches(&self, site: &str) -> bool {
        self.matches_param(site, 0)
    }

    /// Decide whether the gated behavior applies at `site` with `param`
    /// (typically a line number) mixed into the hash.
    #[must_use]
    pub fn matches_param(&self, site: &str, param: u64) -> bool {
        if self.rules.mode == MatchMode::Default {
            // No search configured; stay out of the subject's way.
            return true;
        }

        let hash = site_hash(site, param);
        if self.rules.is_excluded(hash) {
            return false;
        }

        match self.rules.mode {
            MatchMode::AlwaysNo => false,
            MatchMode::AlwaysYes => {
                self.emit(&self.name, site, param, hash, true);
                true
            }
            MatchMode::Normal => match self.rules.matching_rule(hash) {
                Some(rule) => {
                    self.emit(&rule.tag, site, param, hash, false);
                    true
                }
                None => false,
            },
            MatchMode::Default => true,
        }
    }

    /// Write one trigger line. Sink errors are swallowed: a broken pipe
    /// in the subject must not change its behavior under search.
    fn emit(&self, tag: &str, site: &str, param: u64, hash: u64, always_yes: bool) {
        let line = match self.style {
            TriggerStyle::Legacy => {
                let bits = if always_yes {
                    "y".to_owned()
                } else {
                    let mut b = binary_string(hash);
                    if b.len() > 32 {
                        b = b[b.len() - 32..].to_owned();
                    }
                    b
                };
                if param == 0 {
                    format!("{tag} triggered {site} {bits}\n")
                } else {
                    format!("{tag} triggered {site}:{param} {bits}\n")
                }
            }
            TriggerStyle::Bisect => {
                if param == 0 {
                    format!("{site} [bisect-match {hash:#x}]\n")
                } else {
                    format!("{site}:{param} [bisect-match {hash:#x}]\n")
                }
            }
        };
        if let Ok(mut sink) = self.sink.lock() {
            let _ = sink.write_all(line.as_bytes());
            let _ = sink.flush();
        }
    }
}

/// Extract the rule value from a carrier variable's content: everything
/// after the last `=`, or the whole string when there is none. Carriers
/// like `GOCOMPILEDEBUG` hold comma-separated `key=value` settings with
/// the hash rules last.
#[must_use]
pub fn value_after_last_eq(carrier: &str) -> &str {
    match carrier.rfind('=') {
        Some(i) => &carrier[i + 1..],
        None => carrier,
    }
}

fn default_sink() -> Result<Box<dyn Write + Send>> {
    match env::var_os(LOGFILE_ENV) {
        Some(path) if !path.is_empty() => {
            let path = PathBuf::from(path);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| BisectError::Logfile { path, source })?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(io::stdout())),
    }
}
