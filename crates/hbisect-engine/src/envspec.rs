//! Rendering rule sets into the probe's environment variable.

use hbisect_types::Suffix;

use crate::config::SearchConfig;
use crate::state::SearchState;

/// Render the full `PREFIX…var=…` assignment for one trial: exclusions
/// (when requested), then the current suffix, then the confirmed extra
/// hashes in order.
#[must_use]
pub fn render_hash_env(
    config: &SearchConfig,
    excludes: &[Suffix],
    state: &SearchState,
    with_excludes: bool,
) -> String {
    let mut ev = format!(
        "{}{}={}",
        config.env_prefix, config.hash_var, config.hash_prefix
    );
    if with_excludes {
        for x in excludes {
            ev.push('-');
            ev.push_str(x.as_str());
            ev.push('/');
        }
    }
    ev.push_str(state.suffix.as_str());
    for h in &state.hashes {
        ev.push('/');
        ev.push_str(h.as_str());
    }
    ev
}

/// Split a rendered assignment at its first `=` into the (key, value)
/// pair actually injected into the trial environment.
#[must_use]
pub fn split_assignment(ev: &str) -> (String, String) {
    match ev.split_once('=') {
        Some((k, v)) => (k.to_owned(), v.to_owned()),
        None => (ev.to_owned(), String::new()),
    }
}
