//! The post-convergence filter pass.
//!
//! Flaky tests can leave hashes in the converged set that are not
//! actually required for failure. The pass rotates each entry out in
//! turn (position `len` is the already-removed candidate, position `-1`
//! is the primary suffix) and re-runs the trial without it: a run that
//! still fails proves the removed entry redundant, and a failure with
//! no triggers at all proves both the removed entry and the current
//! rules redundant. Exclusions are intentionally omitted from these
//! trials so previously-found failures don't distort the re-test.

use std::mem;

use tracing::info;

use hbisect_error::Result;
use hbisect_types::Suffix;

use crate::outcome::Outcome;
use crate::runner::TrialRunner;
use crate::session::Session;
use crate::state::SearchState;

impl<R: TrialRunner> Session<R> {
    /// Drop hashes not strictly required for the failure, then re-run
    /// once to capture fresh output for the final report.
    pub fn filter(&mut self, state: &mut SearchState) -> Result<()> {
        if state.hashes.is_empty() {
            println!("Not filtering, single point failure");
            return Ok(());
        }

        print!(
            "Before filtering, multiple hashes required for failure:\n{}={}",
            self.config.hash_var_name(),
            state.suffix
        );
        for (i, h) in state.hashes.iter().enumerate() {
            print!(" {}{}={}", self.config.hash_var_name(), i, h);
        }
        println!();

        // `removed` is the entry currently out of the rule set; None
        // once a collapse proved it redundant wholesale.
        let mut removed: Option<Suffix> = state.hashes.pop();

        let mut i = state.hashes.len() as isize;
        while i >= -1 && !state.hashes.is_empty() {
            // Rotate the candidate at position i out, putting the
            // previous candidate back in. Position len(hashes) is
            // `removed` itself, position -1 the primary suffix.
            let t = removed.take().unwrap_or_default();
            if i == -1 {
                removed = Some(mem::replace(&mut state.suffix, t));
            } else if (i as usize) < state.hashes.len() {
                removed = Some(mem::replace(&mut state.hashes[i as usize], t));
            } else {
                removed = Some(t);
            }

            let current = state.suffix.clone();
            let (result, _) = self.try_suffix(state, current)?;
            match result {
                Outcome::Done0 => {
                    // Failed with nothing triggered: neither the current
                    // rules nor the removed entry were needed. Collapse
                    // to the last remaining entry alone.
                    state.suffix = state.hashes[state.hashes.len() - 1].clone();
                    state.hashes.clear();
                    removed = None;
                }
                Outcome::Done | Outcome::Failed => {
                    // Still fails without the removed entry: drop it for
                    // good and trial-remove the next one.
                    removed = state.hashes.pop();
                }
                Outcome::Passed | Outcome::Passed0 => {
                    // Needed after all; the next rotation puts it back.
                }
            }
            i -= 1;
        }

        if let Some(h) = removed {
            if !h.is_empty() {
                state.hashes.push(h);
            }
        }

        info!(
            suffix = %state.suffix,
            kept = state.hashes.len(),
            "filter pass complete"
        );
        println!("Confirming filtered hash set triggers failure:");
        let confirmed = state.suffix.clone();
        let (_, output) = self.try_suffix(state, confirmed)?;
        state.last_output = output;
        Ok(())
    }
}
