//! Core value types for the hashbisect workspace: binary hash suffixes
//! and the hash-and-mask rule sets both the search driver and the
//! in-subject probe operate on.

pub mod rules;
pub mod suffix;

pub use rules::{HashAndMask, MatchMode, RuleSet, EXCLUDE_TAG};
pub use suffix::{Bit, Suffix, MAX_SUFFIX_BITS};

/// Environment variable naming a file trigger lines are appended to
/// instead of stdout. Both sides of the protocol use it: the driver
/// exports it for file-mode trials, the probe honors it when emitting.
pub const LOGFILE_ENV: &str = "HBISECT_LOGFILE";
