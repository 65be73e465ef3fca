//! Shared error type for the hashbisect workspace.
//!
//! One structured enum covers every crate: configuration problems caught
//! before the first trial, rule-grammar rejections, and trial-runner
//! failures. Grouped variants keep the taxonomy visible at the type level;
//! a workspace-wide [`Result`] alias keeps signatures short.

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for hashbisect operations.
#[derive(Error, Debug)]
pub enum BisectError {
    // === Configuration ===
    /// A user-supplied binary suffix contained something other than 0/1,
    /// or was too long.
    #[error("invalid binary suffix '{text}': {reason}")]
    InvalidSuffix { text: String, reason: String },

    /// Mutually exclusive flags, malformed flag values, and similar
    /// pre-trial misconfiguration.
    #[error("{0}")]
    Config(String),

    // === Rule grammar ===
    /// A rule token could not be parsed as a binary number.
    #[error("could not parse {var} (={text}) as a binary number")]
    RuleParse { var: String, text: String },

    /// An empty inclusion token appeared anywhere but as the single
    /// leading one.
    #[error("empty hash match string for {var} should be first (and only) one")]
    EmptyMatchPlacement { var: String },

    // === Trials ===
    /// The test command could not be launched at all. Never classified as
    /// a failing trial; the search aborts instead.
    #[error("failed to launch test command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The trigger logfile could not be opened or created.
    #[error("could not open trigger logfile '{path}': {source}")]
    Logfile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, BisectError>;
