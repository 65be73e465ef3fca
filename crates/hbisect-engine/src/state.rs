//! Mutable state of one in-progress search.

use serde::{Deserialize, Serialize};

use hbisect_types::Suffix;

/// State for locating one failure. A fresh one is created per driver
/// iteration; nothing persists in the subject process between trials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchState {
    /// The current suffix known (or being tested) to contain a failing
    /// site.
    pub suffix: Suffix,

    /// Additional confirmed suffixes for multi-point failures. Entries
    /// before `next_singleton_hash_index` are singletons (grown until
    /// they isolate exactly one site); entries at or after it are known
    /// to contain at least one required trigger but are not yet
    /// narrowed.
    pub hashes: Vec<Suffix>,

    /// Partition point within `hashes`; advances as still-multi entries
    /// are proven singletons.
    pub next_singleton_hash_index: usize,

    /// Site identifier from the most recent accepted trigger, kept for
    /// the final report.
    pub last_trigger: String,

    /// Raw captured output of the most recent confirming trial.
    #[serde(skip)]
    pub last_output: Vec<u8>,

    /// Omit the accumulated exclusions when rendering the rule
    /// environment string; set during the filter pass.
    pub without_excludes: bool,
}

impl SearchState {
    /// Whether every entry (and the suffix itself) has been proven a
    /// singleton.
    #[must_use]
    pub fn fully_reduced(&self) -> bool {
        self.next_singleton_hash_index == self.hashes.len()
    }
}

/// How a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchTermination {
    /// The suffix and every extra hash are singletons and the test
    /// fails with exactly that rule set.
    Converged,
    /// The trial outcomes contradicted each other with nothing left to
    /// back out: flaky test or bad search.
    Flaky,
    /// The suffix reached the configured length limit without isolating
    /// a single site.
    LimitExhausted,
}
