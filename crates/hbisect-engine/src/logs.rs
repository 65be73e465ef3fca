//! PASS/FAIL log files.

use std::fs::OpenOptions;
use std::io::{self, Write};

use tracing::warn;

/// Store one trial's output in `filename`, or warn and move on; a log
/// that failed to write must not abort a search that is otherwise
/// making progress. Files are created 0600.
pub fn save_log_file(filename: &str, data: &[u8]) {
    if let Err(err) = write_private(filename, data) {
        warn!(filename, %err, "error saving log file");
    }
}

fn write_private(path: &str, data: &[u8]) -> io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path)?;
    file.write_all(data)
}
