//! Search configuration.
//!
//! Everything that shapes a search is captured here once, up front, and
//! passed through the engine as an immutable snapshot; nothing reads
//! process-global state mid-search.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use hbisect_types::{Bit, Suffix};

/// Default cap on suffix length; exceeding it is search failure.
pub const DEFAULT_HASH_LIMIT: usize = 30;

/// Default name of the variable carrying the hash rules.
pub const DEFAULT_HASH_VAR: &str = "gossahash";

/// Default prefix for the environment-encoded variable.
pub const DEFAULT_ENV_PREFIX: &str = "GOCOMPILEDEBUG=";

/// Default prefix on the PASS/FAIL log file names.
pub const DEFAULT_LOG_PREFIX: &str = "HBISECT_LAST_";

/// Immutable per-search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name (or `name=`-prefixed spec) of the hash-carrying variable.
    pub hash_var: String,
    /// Text prepended to the variable name when rendering the rule
    /// environment string, e.g. `GOCOMPILEDEBUG=` or `GODEBUG=`, possibly
    /// already carrying comma-separated settings.
    pub env_prefix: String,
    /// Text prepended to the hash rules themselves, for special hash
    /// interpretation on the probe side.
    pub hash_prefix: String,
    /// Maximum suffix length before the search gives up.
    pub hash_limit: usize,
    /// Prefix on `PASS.log` / `FAIL.<n>.log` file names.
    pub log_prefix: String,
    /// When set, trials read trigger lines from this file instead of the
    /// captured output; the driver truncates it before each run.
    pub trigger_logfile: Option<PathBuf>,
    /// Expect bisect-form trigger lines instead of the legacy form.
    pub bisect_syntax: bool,
    /// Echo each trial's captured output.
    pub verbose: bool,
    /// When excluding a found failure between searches, also exclude all
    /// of its extra hashes.
    pub batch_exclude: bool,
    /// Stop after this many failures; 0 means don't stop.
    pub multiple: u32,
    /// Suffix assumed to contain a failure before the first trial.
    pub initial_suffix: Suffix,
    /// Restart hint: which half to try first on the first search step.
    pub restart: Option<Bit>,
    /// Seed for the trial-order coin flips; printed so a run can be
    /// reproduced exactly.
    pub seed: u64,
    /// Extra `KEY=VALUE` pairs injected into every trial.
    pub extra_env: Vec<(String, String)>,
}

impl SearchConfig {
    /// The variable name as it appears in trigger lines: `hash_var` up
    /// to its first `=`.
    #[must_use]
    pub fn hash_var_name(&self) -> &str {
        match self.hash_var.find('=') {
            Some(i) => &self.hash_var[..i],
            None => &self.hash_var,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            hash_var: DEFAULT_HASH_VAR.to_owned(),
            env_prefix: DEFAULT_ENV_PREFIX.to_owned(),
            hash_prefix: String::new(),
            hash_limit: DEFAULT_HASH_LIMIT,
            log_prefix: DEFAULT_LOG_PREFIX.to_owned(),
            trigger_logfile: None,
            bisect_syntax: false,
            verbose: false,
            batch_exclude: false,
            multiple: 1,
            initial_suffix: Suffix::empty(),
            restart: None,
            seed: 0,
            extra_env: Vec::new(),
        }
    }
}
