//! The bisection decision tree.
//!
//! Loop invariant: `confirmed` is known to contain at least one failing
//! site; a trial restricted to it fails. Each step prepends a bit to
//! split that universe in half and classifies both halves. Writing
//! `U(x)` for the set of sites whose hash ends in `x`, the halves
//! partition it: `U(0x) ⊎ U(1x) = U(x)` — which is why both halves
//! passing alone while `x` fails witnesses a multi-point failure: at
//! least one site in each half is required.

use std::mem;

use tracing::{info, warn};

use hbisect_error::Result;
use hbisect_types::{Bit, Suffix};

use crate::outcome::Outcome;
use crate::runner::TrialRunner;
use crate::session::Session;
use crate::state::{SearchState, SearchTermination};

impl<R: TrialRunner> Session<R> {
    /// Grow `initial_suffix` until the failure is pinned to singletons.
    ///
    /// `restart` forces which half is tried on the first step; after
    /// that the coin decides.
    pub fn search(
        &mut self,
        state: &mut SearchState,
        initial_suffix: Suffix,
        restart: Option<Bit>,
    ) -> Result<SearchTermination> {
        let mut confirmed = initial_suffix;
        let mut restart = restart;

        while confirmed.len() < self.config.hash_limit {
            let mut a = Bit::Zero;
            let mut b = Bit::One;
            let swap = match restart.take() {
                Some(Bit::One) => true,
                Some(Bit::Zero) => false,
                None => self.coin(),
            };
            if swap {
                mem::swap(&mut a, &mut b);
            }

            let (first, _) = self.try_suffix(state, confirmed.prepended(a))?;
            match first {
                Outcome::Failed => {
                    // Still more than one trigger in this half, but it
                    // fails: narrow into it.
                    confirmed = state.suffix.clone();
                    continue;
                }
                Outcome::Done => {
                    if state.fully_reduced() {
                        return Ok(SearchTermination::Converged);
                    }
                    // A new singleton: commit it at the partition point
                    // and keep reducing the entry it displaced.
                    let at = state.next_singleton_hash_index;
                    confirmed = mem::replace(&mut state.hashes[at], state.suffix.clone());
                    state.next_singleton_hash_index += 1;
                    continue;
                }
                Outcome::Passed | Outcome::Passed0 | Outcome::Done0 => {
                    // This half alone doesn't reproduce it; try the
                    // other one.
                }
            }

            let (second, _) = self.try_suffix(state, confirmed.prepended(b))?;
            match second {
                Outcome::Failed => {
                    confirmed = state.suffix.clone();
                }
                Outcome::Done => {
                    if state.fully_reduced() {
                        return Ok(SearchTermination::Converged);
                    }
                    // Commit the singleton, then pick a random
                    // still-multi entry to reduce next.
                    let lo = state.next_singleton_hash_index;
                    let j = self.pick_index(lo, state.hashes.len());
                    let next = state.hashes[j].clone();
                    state.hashes[j] = state.hashes[lo].clone();
                    state.hashes[lo] = state.suffix.clone();
                    state.next_singleton_hash_index += 1;
                    confirmed = next;
                }
                Outcome::Passed if first == Outcome::Passed => {
                    println!("Both trials unexpectedly succeeded");
                    info!(suffix = %confirmed, "multi-point failure witnessed");
                    // Each half alone passes but together they fail:
                    // pin one half as a still-multi rule and keep
                    // narrowing the other. Which is which is a coin
                    // flip.
                    let (narrow, pin) = if self.coin() { (b, a) } else { (a, b) };
                    state.hashes.push(confirmed.prepended(pin));
                    confirmed = confirmed.prepended(narrow);
                }
                Outcome::Passed | Outcome::Passed0 | Outcome::Done0 => {
                    println!("Combination of empty and pass, discard path (test is flaky)");
                    if state.fully_reduced() {
                        // Nothing still-multi to back out to.
                        return Ok(SearchTermination::Flaky);
                    }
                    match state.hashes.pop() {
                        // Back out to the most recent still-multi entry
                        // and retry from there.
                        Some(h) => confirmed = h,
                        None => return Ok(SearchTermination::Flaky),
                    }
                }
            }
        }
        warn!(
            limit = self.config.hash_limit,
            "suffix length limit reached without isolating a site"
        );
        Ok(SearchTermination::LimitExhausted)
    }
}
