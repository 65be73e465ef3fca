//! Trigger-report extraction from captured trial output.
//!
//! Sites fire more than once (a function compiled per test binary, a
//! line hit per iteration), so repeats of exactly the same payload
//! collapse into one count. The payload key is the trailing hash token
//! when one parses; otherwise the whole line, which means output noise
//! appended to a trigger line can prevent convergence on a single
//! distinct trigger rather than silently merging unequal reports.

use std::collections::BTreeMap;

use hbisect_types::Suffix;

/// Accumulated trigger reports from one trial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerScan {
    /// Payload key to repetition count.
    pub counts: BTreeMap<String, u64>,
    /// Site identifier of the last accepted trigger.
    pub last_site: String,
}

impl TriggerScan {
    /// Number of distinct triggers.
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }
}

/// Scan `output` for trigger lines.
///
/// In legacy form a line reads `<var_name> triggered <site>[:n] <bits>`;
/// in bisect form `<site>[:n] [bisect-match 0x<hex>]`. Bisect-form
/// hashes additionally must end in `suffix`, honoring the contract that
/// triggers reported outside the asked-for suffix do not count.
#[must_use]
pub fn scan_triggers(output: &[u8], var_name: &str, suffix: &Suffix, bisect: bool) -> TriggerScan {
    let mask = suffix.mask();
    let want = suffix.value();
    let prefix = if bisect {
        "[bisect-match ".to_owned()
    } else {
        format!("{var_name} triggered")
    };

    let mut scan = TriggerScan::default();
    for raw in output.split(|&b| b == b'\n') {
        let line = String::from_utf8_lossy(raw);
        let s = line.trim();
        let Some(pi) = s.find(prefix.as_str()) else {
            continue;
        };

        let space = s.rfind(' ');
        let end = if bisect {
            s.rfind(']').unwrap_or(s.len())
        } else {
            s.len()
        };

        let token = match space {
            Some(sp) if sp < end => Some(s[sp..end].trim()),
            _ => None,
        };

        match token {
            Some(tok) if is_hash_token(tok) => {
                if bisect {
                    match parse_hex(tok) {
                        Some(hv) => {
                            if hv & mask != want {
                                // Outside the asked-for suffix: skip
                                // without recording anything.
                                continue;
                            }
                            *scan.counts.entry(tok.to_owned()).or_insert(0) += 1;
                        }
                        // Binary or overlong token in bisect form: fall
                        // back to whole-line keying.
                        None => *scan.counts.entry(s.to_owned()).or_insert(0) += 1,
                    }
                } else {
                    *scan.counts.entry(tok.to_owned()).or_insert(0) += 1;
                }
            }
            _ => *scan.counts.entry(s.to_owned()).or_insert(0) += 1,
        }

        scan.last_site = if bisect {
            s[..pi].trim().to_owned()
        } else {
            let start = pi + prefix.len();
            let stop = space.unwrap_or(s.len()).max(start);
            s[start..stop].trim().to_owned()
        };
    }
    scan
}

fn is_hash_token(t: &str) -> bool {
    if let Some(hex) = t.strip_prefix("0x") {
        !hex.is_empty() && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    } else {
        !t.is_empty() && t.bytes().all(|b| b == b'0' || b == b'1')
    }
}

fn parse_hex(t: &str) -> Option<u64> {
    u64::from_str_radix(t.strip_prefix("0x")?, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sfx(s: &str) -> Suffix {
        Suffix::new(s).unwrap()
    }

    #[test]
    fn legacy_lines_key_on_bits_token() {
        let out = b"noise\n\
                    gossahash triggered main.F 10110\n\
                    gossahash triggered main.F 10110\n\
                    gossahash triggered main.G 01101\n";
        let scan = scan_triggers(out, "gossahash", &sfx(""), false);
        assert_eq!(scan.distinct(), 2);
        assert_eq!(scan.counts["10110"], 2);
        assert_eq!(scan.counts["01101"], 1);
        assert_eq!(scan.last_site, "main.G");
    }

    #[test]
    fn legacy_site_with_param() {
        let out = b"gossahash triggered main.F:17 111\n";
        let scan = scan_triggers(out, "gossahash", &sfx(""), false);
        assert_eq!(scan.last_site, "main.F:17");
        assert_eq!(scan.counts["111"], 1);
    }

    #[test]
    fn other_variable_names_do_not_count() {
        let out = b"gossahash0 triggered main.F 101\n";
        let scan = scan_triggers(out, "gossahash", &sfx(""), false);
        assert_eq!(scan.distinct(), 0);
        let scan = scan_triggers(out, "gossahash0", &sfx(""), false);
        assert_eq!(scan.distinct(), 1);
    }

    #[test]
    fn unparseable_tail_keys_on_whole_line() {
        let out = b"gossahash triggered main.F notbits\n\
                    gossahash triggered main.F notbits\n\
                    gossahash triggered main.F alsonot\n";
        let scan = scan_triggers(out, "gossahash", &sfx(""), false);
        // Distinct whole lines, counted per line text.
        assert_eq!(scan.distinct(), 2);
    }

    #[test]
    fn hex_tokens_count_in_legacy_form() {
        let out = b"gossahash triggered main.F 0x1f\n";
        let scan = scan_triggers(out, "gossahash", &sfx(""), false);
        assert_eq!(scan.counts["0x1f"], 1);
    }

    #[test]
    fn bisect_form_filters_by_suffix() {
        // Low bits of 0x...e3 are 11.
        let out = b"./a/a.go:11:6 [bisect-match 0x800ddd09be2584e3]\n";
        let scan = scan_triggers(out, "gossahash", &sfx("11"), true);
        assert_eq!(scan.distinct(), 1);
        assert_eq!(scan.counts["0x800ddd09be2584e3"], 1);
        assert_eq!(scan.last_site, "./a/a.go:11:6");

        let scan = scan_triggers(out, "gossahash", &sfx("00"), true);
        assert_eq!(scan.distinct(), 0);
        assert_eq!(scan.last_site, "");
    }

    #[test]
    fn bisect_form_counts_all_tags() {
        // Bisect lines carry no variable tag; both sites count when the
        // suffix accepts them.
        let out = b"p.F [bisect-match 0x5]\np.G [bisect-match 0xd]\n";
        let scan = scan_triggers(out, "whatever", &sfx("101"), true);
        assert_eq!(scan.distinct(), 2);
    }

    #[test]
    fn bisect_malformed_hash_keys_whole_line() {
        let out = b"p.F [bisect-match 10101]\n";
        let scan = scan_triggers(out, "v", &sfx("1"), true);
        assert_eq!(scan.distinct(), 1);
        assert!(scan.counts.keys().next().unwrap().contains("bisect-match"));
    }

    #[test]
    fn crlf_and_padding_are_trimmed() {
        let out = b"  gossahash triggered main.F 101\r\n";
        let scan = scan_triggers(out, "gossahash", &sfx(""), false);
        assert_eq!(scan.counts["101"], 1);
        assert_eq!(scan.last_site, "main.F");
    }

    #[test]
    fn empty_output_scans_clean() {
        let scan = scan_triggers(b"", "gossahash", &sfx("0"), false);
        assert_eq!(scan.distinct(), 0);
        assert_eq!(scan.last_site, "");
    }
}
