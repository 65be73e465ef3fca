#![no_main]

//! Fuzz the environment-value rule grammar.
//!
//! The probe decodes this value inside arbitrary subject processes, so
//! hostile or mangled environments must produce an error, never a
//! panic. Accepted values are additionally checked for the structural
//! invariants the search relies on.

use libfuzzer_sys::fuzz_target;

use hbisect_types::{MatchMode, RuleSet};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = std::str::from_utf8(data) else {
        return;
    };

    if value.len() > 4096 {
        return;
    }

    let Ok(rules) = RuleSet::parse("gossahash", "", value) else {
        return;
    };

    match rules.mode {
        MatchMode::Default | MatchMode::AlwaysYes | MatchMode::AlwaysNo => {
            assert!(rules.matches.is_empty());
            assert!(rules.excludes.is_empty());
        }
        MatchMode::Normal => {
            // Normal rule sets always carry at least one inclusion and
            // every mask covers its hash.
            assert!(!rules.matches.is_empty());
            for rule in rules.matches.iter().chain(rules.excludes.iter()) {
                assert_eq!(rule.hash & !rule.mask, 0);
            }
        }
    }
});
