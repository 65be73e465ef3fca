//! The embedded self-test subject (`-F`).
//!
//! Instead of driving an external command, the binary becomes a test
//! program: it asks the probe about each of the fixed names below and
//! "fails" when at least four of the three-letter names trigger. Since
//! no single exclusion can remove four independent names, this
//! demonstrates multi-point failure detection end to end:
//!
//! ```text
//! hbisect hbisect -F
//! ```

use std::env;
use std::thread;
use std::time::Duration;

use hbisect_probe::{value_after_last_eq, HashGate, TriggerStyle};

/// How many three-letter names must trigger for the self-test to fail.
const FAIL_THRESHOLD: usize = 4;

pub(crate) const NAMES: [&str; 108] = [
    "preformulate",
    "tetracyn",
    "exptl",
    "extemporaneity",
    "presignalled",
    "licenced",
    "pyelographic",
    "riksmaal",
    "luminesce",
    "megawatt",
    "boeotus",
    "corporate",
    "saltine",
    "arsenide",
    "umbrellalike",
    "ecotonal",
    "cocoyam",
    "venetianed",
    "hiordis",
    "osteoma",
    "unshackle",
    "importability",
    "petrarchan",
    "elytron",
    "karbala",
    "haleakala",
    "unflirtatious",
    "emanuel",
    "catholicalness",
    "overawe",
    "pokable",
    "bacteroides",
    "amplifier",
    "paraphysate",
    "outseen",
    "wawa",
    "karoline",
    "excipule",
    "introductoriness",
    "grosgrained",
    "houdon",
    "interlocular",
    "toniest",
    "frozenly",
    "asexually",
    "ossification",
    "earthshine",
    "untransmuted",
    "karaism",
    "bond",
    "bituminize",
    "calycate",
    "codon",
    "sialkot",
    "ctesiphon",
    "griskin",
    "shiftily",
    "interdebate",
    "thistly",
    "effigiated",
    "misinference",
    "collinsville",
    "repatriate",
    "duplicatus",
    "nonordination",
    "geminated",
    "cauliflorous",
    "septembrist",
    "assertional",
    "incumber",
    "pedagogical",
    "sigher",
    "technicolor",
    "impugner",
    "anomalousness",
    "perhydrogenizing",
    "periastral",
    "lanchow",
    "machineless",
    "djinny",
    "ruga",
    "cerebroid",
    "genip",
    "environs",
    "muticate",
    "adamic",
    "indivisibility",
    "crissa",
    "conjunctive",
    "nonsculptured",
    "keble",
    "subverter",
    "gelignite",
    "stilettoed",
    "gratulated",
    "guanase",
    "proselytise",
    "orthrus",
    "excursionary",
    "ellipsoidal",
    "ant",
    "bat",
    "cat",
    "dog",
    "emu",
    "fox",
    "gnu",
    "hen",
];

/// Run as a test program; returns the process exit code.
pub fn run(hash_var: &str) -> i32 {
    let carrier = env::var("GOCOMPILEDEBUG").unwrap_or_default();
    let value = value_after_last_eq(&carrier).to_owned();
    let gate = match HashGate::new(hash_var, "", &value, TriggerStyle::Legacy) {
        Ok(gate) => gate,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };

    let mut three_letters = 0;
    for (i, name) in NAMES.iter().enumerate() {
        if gate.matches_param(name, i as u64) && name.len() == 3 {
            three_letters += 1;
        }
    }
    thread::sleep(Duration::from_millis(50));

    if three_letters >= FAIL_THRESHOLD {
        println!("FAIL!");
        return 1;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_word_list_shape() {
        assert_eq!(NAMES.len(), 108);
        let three: Vec<&&str> = NAMES.iter().filter(|n| n.len() == 3).collect();
        assert_eq!(three.len(), 8);
        // The short names sit at the end, in order.
        assert_eq!(
            &NAMES[100..],
            &["ant", "bat", "cat", "dog", "emu", "fox", "gnu", "hen"]
        );
    }

    #[test]
    fn names_are_unique() {
        let mut sorted: Vec<&str> = NAMES.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), NAMES.len());
    }
}
