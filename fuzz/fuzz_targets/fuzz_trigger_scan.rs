#![no_main]

//! Fuzz the trigger-line scanner with arbitrary captured output.
//!
//! Trial output comes from whatever the test command prints, including
//! binary garbage and truncated lines; scanning must never panic and
//! the distinct count must equal the number of distinct payload keys.

use libfuzzer_sys::fuzz_target;

use hbisect_engine::trigger::scan_triggers;
use hbisect_types::Suffix;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1 << 16 {
        return;
    }

    for suffix in [Suffix::empty(), Suffix::new("1011").unwrap()] {
        for bisect in [false, true] {
            let scan = scan_triggers(data, "gossahash", &suffix, bisect);
            assert_eq!(scan.distinct(), scan.counts.len());
            for count in scan.counts.values() {
                assert!(*count > 0);
            }
        }
    }
});
