//! A deterministic in-process stand-in for the external test command.
//!
//! The simulator receives the rendered trial environment, decodes it
//! with the real probe, lets every site in its universe ask the gate
//! whether to trigger, and then decides pass/fail from which sites
//! actually triggered. Because the universe answers any trial order
//! correctly, tests don't care which half the engine's coin tries
//! first.

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use hbisect_engine::{SearchConfig, Session, TrialOutput, TrialRunner};
use hbisect_error::Result;
use hbisect_probe::{site_hash, value_after_last_eq, HashGate, TriggerStyle};
use hbisect_types::Suffix;

/// Shared capture buffer usable as a gate sink.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One named site in the simulated subject program.
#[derive(Debug, Clone)]
pub struct SimSite {
    pub name: String,
    pub param: u64,
}

impl SimSite {
    pub fn hash(&self) -> u64 {
        site_hash(&self.name, self.param)
    }
}

/// Simulated subject: sites plus a failure predicate over the set of
/// triggered site indices.
pub struct SimUniverse {
    pub carrier: String,
    pub hash_var: String,
    pub style: TriggerStyle,
    pub sites: Vec<SimSite>,
    pub fail_if: Box<dyn FnMut(&[usize]) -> bool>,
    /// Trials executed so far.
    pub trials: usize,
}

impl SimUniverse {
    pub fn new(sites: Vec<SimSite>, fail_if: Box<dyn FnMut(&[usize]) -> bool>) -> SimUniverse {
        SimUniverse {
            carrier: "GOCOMPILEDEBUG".to_owned(),
            hash_var: "gossahash".to_owned(),
            style: TriggerStyle::Legacy,
            sites,
            fail_if,
            trials: 0,
        }
    }
}

impl TrialRunner for SimUniverse {
    fn run_trial(&mut self, env: &[(String, String)]) -> Result<TrialOutput> {
        self.trials += 1;
        let value = env
            .iter()
            .find(|(k, _)| *k == self.carrier)
            .map(|(_, v)| value_after_last_eq(v))
            .unwrap_or("");

        let buf = SharedBuf::default();
        let gate = HashGate::with_sink(&self.hash_var, "", value, self.style, Box::new(buf.clone()))?;

        let mut triggered = Vec::new();
        for (i, site) in self.sites.iter().enumerate() {
            if gate.matches_param(&site.name, site.param) {
                triggered.push(i);
            }
        }
        let fails = (self.fail_if)(&triggered);

        Ok(TrialOutput {
            exit_ok: !fails,
            timed_out: false,
            output: buf.take(),
            status: if fails {
                "exit status: 1".to_owned()
            } else {
                String::new()
            },
        })
    }

    fn command_line(&self) -> String {
        "sim-test".to_owned()
    }

    fn program(&self) -> &str {
        "sim-test"
    }
}

/// The self-test word list: 100 long names plus 8 three-letter ones.
pub const NAMES: [&str; 108] = [
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

/// All 108 names as sites, param = list index.
pub fn name_sites() -> Vec<SimSite> {
    NAMES
        .iter()
        .enumerate()
        .map(|(i, n)| SimSite {
            name: (*n).to_owned(),
            param: i as u64,
        })
        .collect()
}

/// Indices of the three-letter names.
pub fn three_letter_indices() -> Vec<usize> {
    NAMES
        .iter()
        .enumerate()
        .filter(|(_, n)| n.len() == 3)
        .map(|(i, _)| i)
        .collect()
}

/// A session whose log files land in `dir` instead of the working
/// directory.
pub fn session_in(
    dir: &tempfile::TempDir,
    mut config: SearchConfig,
    runner: SimUniverse,
) -> Session<SimUniverse> {
    config.log_prefix = dir
        .path()
        .join("HBISECT_LAST_")
        .to_string_lossy()
        .into_owned();
    Session::new(config, runner)
}

/// How many sites of `sites` the suffix matches.
pub fn matching_sites(sites: &[SimSite], suffix: &Suffix) -> usize {
    sites.iter().filter(|s| suffix.matches_hash(s.hash())).count()
}
