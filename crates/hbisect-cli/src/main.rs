//! `hbisect` runs a test command repeatedly with longer and longer hash
//! suffix constraints, binary-searching for the site (or sites) whose
//! hash-gated behavior makes the test fail.

mod logging;
mod selftest;

use std::env;
use std::ffi::OsString;
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, info};

use hbisect_engine::{CommandSpec, ProcessRunner, SearchConfig, Session};
use hbisect_error::{BisectError, Result};
use hbisect_types::{Bit, Suffix};

const DEFAULT_TEST_COMMAND: &str = "./hbisect_test.bash";
const DEFAULT_TIMEOUT_SECS: i64 = 900;

/// Raw command-line options, before they are folded into a
/// [`SearchConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    self_test: bool,
    env_prefix: String,
    hash_var: String,
    hash_prefix: String,
    restart: String,
    excludes: String,
    bisect_syntax: bool,
    batch_exclude: bool,
    multiple: u32,
    timeout_secs: i64,
    verbose: bool,
    use_file: bool,
    fma: bool,
    loopvar: bool,
    seed: Option<u64>,
    show_help: bool,
    operands: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            self_test: false,
            env_prefix: hbisect_engine::config::DEFAULT_ENV_PREFIX.to_owned(),
            hash_var: hbisect_engine::config::DEFAULT_HASH_VAR.to_owned(),
            hash_prefix: String::new(),
            restart: String::new(),
            excludes: String::new(),
            bisect_syntax: false,
            batch_exclude: false,
            multiple: 1,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verbose: false,
            use_file: false,
            fma: false,
            loopvar: false,
            seed: None,
            show_help: false,
            operands: Vec::new(),
        }
    }
}

fn main() {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let code = run(env::args_os(), &mut stdout, &mut stderr);
    if code != 0 {
        std::process::exit(code);
    }
}

/// The whole entrypoint behind injectable writers: protocol and help
/// text go to `out`, diagnostics to `err`, so tests can assert on both
/// plus the exit code.
fn run<I, W, E>(args: I, out: &mut W, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let options = match parse_args(args) {
        Ok(options) => options,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            let _ = writeln!(err);
            let _ = write!(err, "{}", usage());
            return 2;
        }
    };

    if options.show_help {
        let _ = write!(out, "{}", usage());
        return 0;
    }

    logging::init(options.verbose);

    let hash_var = match resolve_hash_var(&options) {
        Ok(hash_var) => hash_var,
        Err(error) => {
            let _ = writeln!(err, "error: {error}");
            return exit_code_for(&error);
        }
    };

    if options.self_test {
        return selftest::run(var_name(&hash_var));
    }

    match drive(&options, hash_var) {
        Ok(found) => {
            if found == 0 {
                1
            } else {
                0
            }
        }
        Err(error) => {
            error!(%error, "search aborted");
            let _ = writeln!(err, "error: {error}");
            exit_code_for(&error)
        }
    }
}

/// Fold the preset flags into the hash-variable name; combining the
/// presets is a configuration error.
fn resolve_hash_var(options: &Options) -> Result<String> {
    if options.fma && options.loopvar {
        return Err(BisectError::Config(
            "cannot set both -fma and -loopvar".to_owned(),
        ));
    }
    Ok(if options.fma {
        "fmahash".to_owned()
    } else if options.loopvar {
        "loopvarhash".to_owned()
    } else {
        options.hash_var.clone()
    })
}

/// Configuration problems exit 2 like usage errors; runner and I/O
/// failures exit 1.
fn exit_code_for(error: &BisectError) -> i32 {
    match error {
        BisectError::Config(_)
        | BisectError::InvalidSuffix { .. }
        | BisectError::RuleParse { .. }
        | BisectError::EmptyMatchPlacement { .. } => 2,
        _ => 1,
    }
}

/// Assemble the configuration and run the driver loop; returns the
/// number of converged searches.
fn drive(options: &Options, hash_var: String) -> Result<usize> {
    let initial_prefix = options.env_prefix.clone();
    let mut env_prefix = initial_prefix.clone();
    // Splice pre-existing comma-separated settings in front of ours so
    // the trial keeps whatever debugging the caller already asked for.
    if env_prefix == "GOCOMPILEDEBUG=" {
        if let Ok(existing) = env::var("GOCOMPILEDEBUG") {
            if !existing.is_empty() {
                env_prefix.push_str(&existing);
                env_prefix.push(',');
            }
        }
    }

    let scan = scan_operands(&options.operands, &initial_prefix, env_prefix);
    let OperandScan {
        env_prefix,
        extra_env,
        program,
        args,
    } = scan;

    let (initial_suffix, restart) = parse_restart(&options.restart)?;
    let excludes = Suffix::parse_list(&options.excludes);

    let seed = options.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    });
    info!(seed, "trial-order seed (rerun with -s to reproduce)");

    // In file mode the trigger log lives in a fresh temp dir that must
    // outlive every trial.
    let mut logfile_dir: Option<tempfile::TempDir> = None;
    let trigger_logfile = if options.use_file {
        let dir = tempfile::Builder::new().prefix("hbisect").tempdir()?;
        let path = dir.path().join(format!("{}.triggered", var_name(&hash_var)));
        logfile_dir = Some(dir);
        Some(path)
    } else {
        None
    };

    let config = SearchConfig {
        hash_var,
        env_prefix,
        hash_prefix: options.hash_prefix.clone(),
        trigger_logfile,
        bisect_syntax: options.bisect_syntax,
        verbose: options.verbose,
        batch_exclude: options.batch_exclude,
        multiple: options.multiple,
        initial_suffix,
        restart,
        seed,
        extra_env,
        ..SearchConfig::default()
    };
    let runner = ProcessRunner::new(CommandSpec {
        program,
        args,
        timeout_secs: options.timeout_secs,
    });

    let mut session = Session::new(config, runner);
    session.excludes = excludes;
    let found = session.run_driver()?;

    drop(logfile_dir);
    Ok(found.len())
}

/// Result of splitting the trailing operands into environment words,
/// the test command, and its arguments.
#[derive(Debug, PartialEq, Eq)]
struct OperandScan {
    env_prefix: String,
    extra_env: Vec<(String, String)>,
    program: String,
    args: Vec<String>,
}

/// Leading `KEY=VALUE` operands are environment settings for every
/// trial. Words extending `initial_prefix` merge into the rule-variable
/// prefix (a bare prefix word resets anything inherited from the
/// environment); everything else is passed through verbatim. The first
/// word without `=` starts the command line.
fn scan_operands(operands: &[String], initial_prefix: &str, inherited: String) -> OperandScan {
    let mut env_prefix = inherited;
    let mut extra_env = Vec::new();
    let mut idx = 0;
    while idx < operands.len() {
        let word = &operands[idx];
        if !word.contains('=') {
            break;
        }
        if let Some(tail) = word.strip_prefix(initial_prefix) {
            if tail.is_empty() {
                env_prefix = initial_prefix.to_owned();
            } else {
                env_prefix.push_str(tail);
                env_prefix.push(',');
            }
        } else if let Some((k, v)) = word.split_once('=') {
            extra_env.push((k.to_owned(), v.to_owned()));
        }
        idx += 1;
    }

    let program = operands
        .get(idx)
        .cloned()
        .unwrap_or_else(|| DEFAULT_TEST_COMMAND.to_owned());
    let args = operands.get(idx + 1..).map(<[String]>::to_vec).unwrap_or_default();

    OperandScan {
        env_prefix,
        extra_env,
        program,
        args,
    }
}

/// `-R 1yz` assumes `yz` is known to fail, starts at `1yz`, and tries
/// `0yz` when that does not fail.
fn parse_restart(restart: &str) -> Result<(Suffix, Option<Bit>)> {
    if restart.is_empty() {
        return Ok((Suffix::empty(), None));
    }
    let mut chars = restart.chars();
    let first = chars.next().unwrap_or('0');
    let bit = Bit::try_from(first)?;
    let rest = Suffix::new(chars.as_str())?;
    Ok((rest, Some(bit)))
}

fn var_name(hash_var: &str) -> &str {
    match hash_var.find('=') {
        Some(i) => &hash_var[..i],
        None => hash_var,
    }
}

fn parse_args<I: IntoIterator<Item = OsString>>(args: I) -> std::result::Result<Options, String> {
    let mut it = args.into_iter();
    let _exe = it.next();

    let mut options = Options::default();
    while let Some(arg) = it.next() {
        let word = arg.to_string_lossy().into_owned();
        if word == "--" {
            options.operands.extend(it.map(|a| a.to_string_lossy().into_owned()));
            break;
        }
        if !word.starts_with('-') || word == "-" {
            options.operands.push(word);
            options.operands.extend(it.map(|a| a.to_string_lossy().into_owned()));
            break;
        }

        let (flag, inline) = match word.split_once('=') {
            Some((f, v)) => (f.to_owned(), Some(v.to_owned())),
            None => (word.clone(), None),
        };
        let mut value = |name: &str| -> std::result::Result<String, String> {
            if let Some(v) = inline.clone() {
                return Ok(v);
            }
            it.next()
                .map(|a| a.to_string_lossy().into_owned())
                .ok_or_else(|| format!("flag {name} needs a value"))
        };

        match flag.as_str() {
            "-F" => options.self_test = true,
            "-B" => options.bisect_syntax = true,
            "-BX" => options.batch_exclude = true,
            "-v" => options.verbose = true,
            "-f" => options.use_file = true,
            "-fma" => options.fma = true,
            "-loopvar" => options.loopvar = true,
            "-h" | "-help" | "--help" => options.show_help = true,
            "-E" => options.env_prefix = value("-E")?,
            "-e" => options.hash_var = value("-e")?,
            "-H" => options.hash_prefix = value("-H")?,
            "-R" => options.restart = value("-R")?,
            "-X" => options.excludes = value("-X")?,
            "-n" => {
                let v = value("-n")?;
                options.multiple = v
                    .parse()
                    .map_err(|_| format!("invalid value for -n: '{v}'"))?;
            }
            "-t" => {
                let v = value("-t")?;
                options.timeout_secs = v
                    .parse()
                    .map_err(|_| format!("invalid value for -t: '{v}'"))?;
            }
            "-s" => {
                let v = value("-s")?;
                options.seed = Some(
                    v.parse()
                        .map_err(|_| format!("invalid value for -s: '{v}'"))?,
                );
            }
            other => return Err(format!("unknown flag '{other}'")),
        }
    }
    Ok(options)
}

fn usage() -> String {
    format!(
        r#"Usage of hbisect:
  -B        use bisect syntax for matches
  -BX       for repeated multi-point failure search, exclude all points on a failure location
  -E prefix prefix string for environment-encoded variables (default "GOCOMPILEDEBUG=")
  -F        act as a test program; generates multiple multipoint failures
  -H prefix string prepended to all hash encodings, for special hash interpretation
  -R suffix begin searching at this suffix; it should known-fail for suffix[1:]
  -X list   exclude these suffixes from matching (space, comma, + or - separated)
  -e name   name/prefix of the variable communicating the hash suffix (default "{var}")
  -f        use a file instead of standard out for hash trigger information
  -fma      search for fused-multiply-add floating point rounding problems
  -loopvar  search for loop-variable-scoping-dependent failures
  -n count  stop after finding this many failures (0 for don't stop; default 1)
  -s seed   seed for trial-order randomization (default: time-derived, printed at startup)
  -t secs   timeout in seconds for the test command; 0 = run till done, negative
            means timing out is a pass, not a failure (default {timeout})
  -v        also print the output of the test command

hbisect runs the test executable (default {cmd}) repeatedly with
longer and longer hash suffix constraints supplied through the
environment. A non-default command and args can be specified following
any flags or "--".

The hash suffix is made of 1 and 0 characters, expected to match the
suffix of a hash of something interesting, like a function or variable
name or their combination. Each run of the executable is expected to
print '<name> triggered' lines; the suffixes are chosen to search for
the ones that result in a single trigger line occurring. Multiple
occurrences of exactly the same trigger line are counted once.

By default the trigger lines are expected on standard output, but -f
sets the environment variable {logfile_ev} to name a file where the
test command may write its logging output instead. That helps with
harnesses that swallow standard output; such runs should be a series
of single processes, since parallel runs would overwrite the logfile,
and the programs being debugged should open it in append mode.

Searches can be restarted or partitioned with the -R and -X flags.

The command can be run as its own test with the -F flag, as in
(prints about 100 long lines, demonstrates multi-point failure
detection):

  hbisect hbisect -F
"#,
        var = hbisect_engine::config::DEFAULT_HASH_VAR,
        timeout = DEFAULT_TIMEOUT_SECS,
        cmd = DEFAULT_TEST_COMMAND,
        logfile_ev = hbisect_types::LOGFILE_ENV,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(words: &[&str]) -> std::result::Result<Options, String> {
        let mut args = vec![OsString::from("hbisect")];
        args.extend(words.iter().map(OsString::from));
        parse_args(args)
    }

    fn run_words(words: &[&str]) -> (i32, String, String) {
        let mut args = vec![OsString::from("hbisect")];
        args.extend(words.iter().map(OsString::from));
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run(args, &mut out, &mut err);
        (
            code,
            String::from_utf8(out).expect("stdout is utf-8"),
            String::from_utf8(err).expect("stderr is utf-8"),
        )
    }

    #[test]
    fn help_prints_usage_and_exits_zero() {
        let (code, out, err) = run_words(&["-h"]);
        assert_eq!(code, 0);
        assert!(out.starts_with("Usage of hbisect:"));
        assert!(err.is_empty());
    }

    #[test]
    fn unknown_flag_exits_two_with_usage_on_stderr() {
        let (code, out, err) = run_words(&["-Z"]);
        assert_eq!(code, 2);
        assert!(out.is_empty());
        assert!(err.contains("unknown flag '-Z'"));
        assert!(err.contains("Usage of hbisect:"));
    }

    #[test]
    fn conflicting_presets_exit_two() {
        let (code, out, err) = run_words(&["-fma", "-loopvar"]);
        assert_eq!(code, 2);
        assert!(out.is_empty());
        assert!(err.contains("cannot set both -fma and -loopvar"));
    }

    #[test]
    fn malformed_restart_suffix_exits_two() {
        // Rejected while assembling the configuration, before any
        // trial could run.
        let (code, _, err) = run_words(&["-R", "12"]);
        assert_eq!(code, 2);
        assert!(err.contains("invalid binary suffix"));
    }

    #[test]
    fn self_test_wide_open_fails() {
        // With no rules configured every site matches, so all eight
        // three-letter names trigger and the test program fails.
        env::remove_var("GOCOMPILEDEBUG");
        let (code, _, err) = run_words(&["-F"]);
        assert_eq!(code, 1);
        assert!(err.is_empty());
    }

    #[test]
    fn defaults() {
        let options = parse(&[]).unwrap();
        assert_eq!(options, Options::default());
    }

    #[test]
    fn flags_and_values() {
        let options = parse(&[
            "-B", "-BX", "-v", "-f", "-E", "GODEBUG=", "-e", "myhash", "-H", "pp", "-R", "101",
            "-X", "01,10", "-n", "3", "-t", "-60", "-s", "42",
        ])
        .unwrap();
        assert!(options.bisect_syntax);
        assert!(options.batch_exclude);
        assert!(options.verbose);
        assert!(options.use_file);
        assert_eq!(options.env_prefix, "GODEBUG=");
        assert_eq!(options.hash_var, "myhash");
        assert_eq!(options.hash_prefix, "pp");
        assert_eq!(options.restart, "101");
        assert_eq!(options.excludes, "01,10");
        assert_eq!(options.multiple, 3);
        assert_eq!(options.timeout_secs, -60);
        assert_eq!(options.seed, Some(42));
    }

    #[test]
    fn inline_flag_values() {
        let options = parse(&["-t=30", "-e=loopvarhash"]).unwrap();
        assert_eq!(options.timeout_secs, 30);
        assert_eq!(options.hash_var, "loopvarhash");
    }

    #[test]
    fn first_bare_word_starts_the_command() {
        let options = parse(&["-v", "make.bash", "-t", "5"]).unwrap();
        assert!(options.verbose);
        assert_eq!(options.operands, vec!["make.bash", "-t", "5"]);
        assert_eq!(options.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn double_dash_ends_flags() {
        let options = parse(&["--", "-v", "cmd"]).unwrap();
        assert!(!options.verbose);
        assert_eq!(options.operands, vec!["-v", "cmd"]);
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(parse(&["-Z"]).is_err());
        assert!(parse(&["-n"]).is_err());
        assert!(parse(&["-n", "lots"]).is_err());
    }

    #[test]
    fn operand_scan_splits_env_and_command() {
        let operands = vec![
            "GOFLAGS=-count=1".to_owned(),
            "GOCOMPILEDEBUG=inlstaticinit=0".to_owned(),
            "./test.bash".to_owned(),
            "-short".to_owned(),
        ];
        let scan = scan_operands(&operands, "GOCOMPILEDEBUG=", "GOCOMPILEDEBUG=".to_owned());
        assert_eq!(scan.env_prefix, "GOCOMPILEDEBUG=inlstaticinit=0,");
        assert_eq!(
            scan.extra_env,
            vec![("GOFLAGS".to_owned(), "-count=1".to_owned())]
        );
        assert_eq!(scan.program, "./test.bash");
        assert_eq!(scan.args, vec!["-short".to_owned()]);
    }

    #[test]
    fn bare_prefix_operand_resets_inherited_settings() {
        let operands = vec!["GOCOMPILEDEBUG=".to_owned(), "cmd".to_owned()];
        let scan = scan_operands(
            &operands,
            "GOCOMPILEDEBUG=",
            "GOCOMPILEDEBUG=gcflags=1,".to_owned(),
        );
        assert_eq!(scan.env_prefix, "GOCOMPILEDEBUG=");
        assert_eq!(scan.program, "cmd");
    }

    #[test]
    fn missing_command_falls_back_to_default() {
        let scan = scan_operands(&[], "GOCOMPILEDEBUG=", "GOCOMPILEDEBUG=".to_owned());
        assert_eq!(scan.program, DEFAULT_TEST_COMMAND);
        assert!(scan.args.is_empty());
    }

    #[test]
    fn restart_splits_hint_and_suffix() {
        let (suffix, bit) = parse_restart("101").unwrap();
        assert_eq!(suffix.as_str(), "01");
        assert_eq!(bit, Some(Bit::One));

        let (suffix, bit) = parse_restart("0").unwrap();
        assert!(suffix.is_empty());
        assert_eq!(bit, Some(Bit::Zero));

        let (suffix, bit) = parse_restart("").unwrap();
        assert!(suffix.is_empty());
        assert_eq!(bit, None);

        assert!(parse_restart("2x").is_err());
    }

    #[test]
    fn var_name_cuts_at_equals() {
        assert_eq!(var_name("gossahash"), "gossahash");
        assert_eq!(var_name("gossahash=2"), "gossahash");
    }
}
