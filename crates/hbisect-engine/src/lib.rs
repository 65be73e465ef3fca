//! The bisection search engine.
//!
//! Given an opaque test command and a cooperating probe in the subject
//! process, the engine narrows binary hash suffixes until each remaining
//! rule pins exactly one triggering site and the test still fails. The
//! moving parts, leaves first:
//!
//! - [`trigger`] extracts and deduplicates trigger reports from captured
//!   output.
//! - [`outcome`] folds one trial's exit code and trigger count into one
//!   of five tags.
//! - [`envspec`] renders the rule set into the single environment
//!   variable the probe reads.
//! - [`runner`] launches trials behind a trait so tests can substitute a
//!   simulator.
//! - [`session`] runs one classified trial ([`Session::try_suffix`]).
//! - [`search`] grows suffixes bit by bit over trial outcomes.
//! - [`filter`] re-tests a converged multi-point set, dropping hashes
//!   that were not strictly required.
//! - [`driver`] repeats the whole search for multiple failures,
//!   accumulating exclusions between runs.

pub mod config;
pub mod driver;
pub mod envspec;
pub mod filter;
pub mod logs;
pub mod outcome;
pub mod runner;
pub mod search;
pub mod session;
pub mod state;
pub mod trigger;

pub use config::SearchConfig;
pub use outcome::Outcome;
pub use runner::{CommandSpec, ProcessRunner, TrialOutput, TrialRunner};
pub use session::Session;
pub use state::{SearchState, SearchTermination};
