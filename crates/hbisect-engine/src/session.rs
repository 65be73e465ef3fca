//! One search session: configuration, runner, exclusions, and the
//! classified-trial primitive everything else is built from.

use std::fs::File;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use hbisect_error::{BisectError, Result};
use hbisect_types::{Suffix, LOGFILE_ENV};

use crate::config::SearchConfig;
use crate::envspec::{render_hash_env, split_assignment};
use crate::logs::save_log_file;
use crate::outcome::{classify, Outcome};
use crate::runner::TrialRunner;
use crate::state::SearchState;
use crate::trigger::scan_triggers;

/// A search session. Holds the immutable configuration, the trial
/// runner, the exclusion list accumulated across searches, and the
/// seeded coin used to vary trial order between reruns.
pub struct Session<R> {
    pub config: SearchConfig,
    pub runner: R,
    /// Suffixes of previously-found failures, excluded from matching.
    pub excludes: Vec<Suffix>,
    rng: StdRng,
}

impl<R: TrialRunner> Session<R> {
    #[must_use]
    pub fn new(config: SearchConfig, runner: R) -> Session<R> {
        let rng = StdRng::seed_from_u64(config.seed);
        Session {
            config,
            runner,
            excludes: Vec::new(),
            rng,
        }
    }

    /// The trial-order coin. Randomization here only breaks ties between
    /// equally-plausible halves across reruns; correctness never depends
    /// on which side is tried first.
    pub(crate) fn coin(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    /// A random index in `lo..hi` for still-multi bookkeeping swaps.
    pub(crate) fn pick_index(&mut self, lo: usize, hi: usize) -> usize {
        self.rng.gen_range(lo..hi)
    }

    /// Run one trial with `suffix` as the primary rule plus the state's
    /// confirmed hashes, classify it, and store the appropriate log
    /// file. Narrative goes to stdout; external tooling reads it.
    pub fn try_suffix(
        &mut self,
        state: &mut SearchState,
        suffix: Suffix,
    ) -> Result<(Outcome, Vec<u8>)> {
        state.suffix = suffix;

        let mut env: Vec<(String, String)> = Vec::new();
        if let Some(path) = &self.config.trigger_logfile {
            // Truncate up front so stale triggers from the previous
            // trial cannot leak into this one.
            File::create(path).map_err(|source| BisectError::Logfile {
                path: path.clone(),
                source,
            })?;
            env.push((LOGFILE_ENV.to_owned(), path.display().to_string()));
        }
        let assignment = render_hash_env(
            &self.config,
            &self.excludes,
            state,
            !state.without_excludes,
        );
        env.push(split_assignment(&assignment));
        env.extend(self.config.extra_env.iter().cloned());

        let mut narrated = String::new();
        for (k, v) in &env {
            narrated.push_str(k);
            narrated.push('=');
            narrated.push_str(v);
            narrated.push(' ');
        }
        narrated.push_str(&self.runner.command_line());
        println!("Trying: {narrated}");

        let trial = self.runner.run_trial(&env)?;
        let mut output = trial.output;
        if let Some(path) = &self.config.trigger_logfile {
            // The harness may have swallowed stdout; the logfile is the
            // source of truth when it is readable.
            if let Ok(bytes) = std::fs::read(path) {
                output = bytes;
            }
        }
        if self.config.verbose {
            print!("{}", String::from_utf8_lossy(&output));
        }

        let scan = scan_triggers(
            &output,
            self.config.hash_var_name(),
            &state.suffix,
            self.config.bisect_syntax,
        );
        state.last_trigger = scan.last_site.clone();
        let count = scan.distinct();
        let outcome = classify(trial.exit_ok, count);
        debug!(suffix = %state.suffix, ?outcome, distinct = count, "trial classified");

        if outcome.failed() {
            println!(
                "{} failed ({} distinct triggers): {}",
                self.runner.program(),
                count,
                trial.status
            );
            let fail_log = format!(
                "{}FAIL.{}.log",
                self.config.log_prefix, state.next_singleton_hash_index
            );
            save_log_file(&fail_log, &output);
            if count <= 1 {
                println!("Review {fail_log} for failing run");
            }
        } else {
            save_log_file(&format!("{}PASS.log", self.config.log_prefix), &output);
        }

        Ok((outcome, output))
    }
}
