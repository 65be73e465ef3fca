//! The outer driver loop: repeated searches, exclusion accumulation,
//! and the final report.

use tracing::{debug, warn};

use hbisect_error::Result;

use crate::outcome::Outcome;
use crate::runner::TrialRunner;
use crate::session::Session;
use crate::state::{SearchState, SearchTermination};
use crate::trigger::scan_triggers;

impl<R: TrialRunner> Session<R> {
    /// Search for up to `multiple` failures (0 = unbounded), excluding
    /// each found suffix from the next search. Returns the converged
    /// states; an empty vector means the very first search came up
    /// flaky or unsearchable.
    pub fn run_driver(&mut self) -> Result<Vec<SearchState>> {
        let mut found: Vec<SearchState> = Vec::new();
        let mut remaining = i64::from(self.config.multiple);

        loop {
            let mut state = SearchState::default();
            let initial = self.config.initial_suffix.clone();
            let term = self.search(&mut state, initial.clone(), self.config.restart)?;
            if term != SearchTermination::Converged {
                warn!(?term, "search did not converge");
                println!("FLAKY TEST OR BAD SEARCH");
                break;
            }

            // Trim accidental extras before reporting; this also makes
            // the exclusions more precise when hunting multiple errors.
            state.without_excludes = true;
            self.filter(&mut state)?;
            if let Ok(summary) = serde_json::to_string(&state) {
                debug!(%summary, "converged");
            }

            remaining -= 1;
            let stop = remaining == 0;
            if !stop {
                self.excludes.push(state.suffix.clone());
                if self.config.batch_exclude {
                    self.excludes.extend(state.hashes.iter().cloned());
                }
            }
            found.push(state);
            if stop {
                break;
            }

            // Confirm another failure still exists before searching on.
            let mut fresh = SearchState::default();
            let (result, _) = self.try_suffix(&mut fresh, initial)?;
            if matches!(result, Outcome::Passed | Outcome::Passed0) {
                println!("NO MORE FAILURES");
                break;
            }
        }

        self.excludes.clear();
        for state in &found {
            self.finish(state);
        }
        Ok(found)
    }

    /// Print the suggested debugging command line for one converged
    /// state, decoding `POS=` trigger payloads into source locations.
    fn finish(&self, state: &SearchState) {
        use crate::envspec::render_hash_env;

        if state.hashes.is_empty() {
            println!("FINISHED, suggest this command line for debugging:");
            print!("{}", render_hash_env(&self.config, &[], state, false));
            self.print_command_line();
            println!();
            print_pos(&state.last_trigger, "Problem is at");
        } else {
            println!("FINISHED, after filtering, suggest this command line for debugging:");
            print!("{}", render_hash_env(&self.config, &[], state, false));
            self.print_command_line();
            println!();

            // Re-extract each rule's last trigger from the confirming
            // run's output, under the tag the probe actually used.
            let scan = scan_triggers(
                &state.last_output,
                self.config.hash_var_name(),
                &state.suffix,
                self.config.bisect_syntax,
            );
            print_pos(&scan.last_site, "Problem is at");
            for (i, h) in state.hashes.iter().enumerate() {
                let tag = format!("{}{}", self.config.hash_var_name(), i);
                let scan = scan_triggers(&state.last_output, &tag, h, self.config.bisect_syntax);
                print_pos(&scan.last_site, "and");
            }
        }
    }

    fn print_command_line(&self) {
        for (k, v) in &self.config.extra_env {
            print!(" {k}={v}");
        }
        print!(" {}", self.runner.command_line());
    }
}

/// Decode a `POS=`-prefixed trigger payload into "Problem is at" lines;
/// a `;`-separated list is an inlining chain, innermost first.
fn print_pos(trigger: &str, intro: &str) {
    let Some(rest) = trigger.strip_prefix("POS=") else {
        return;
    };
    let locs: Vec<&str> = rest.split(';').collect();
    if locs.len() == 1 {
        println!("{intro} {}", locs[0]);
    } else {
        println!("{intro}:");
        for (i, loc) in locs.iter().enumerate() {
            if i == 0 {
                println!("\t{loc}");
            } else {
                println!("\t{loc} (inlined function)");
            }
        }
    }
}
