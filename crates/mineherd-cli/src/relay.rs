use std::io::{self, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::{Duration, Instant};

use mineherd_core::Config;

use crate::probe;

/// Base window the child gets to execute a command and flush it to the log.
const SETTLE_BASE: Duration = Duration::from_millis(200);
/// While the log keeps growing, keep waiting in these steps...
const SETTLE_POLL: Duration = Duration::from_millis(100);
/// ...but never longer than this in total.
const SETTLE_MAX: Duration = Duration::from_secs(2);

/// Errors from control-socket operations.
#[derive(Debug)]
pub enum RelayError {
	/// Nothing is listening on the control socket.
	NotRunning,
	/// IO error during communication.
	Io(io::Error),
}

impl std::fmt::Display for RelayError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RelayError::NotRunning => write!(f, "server is not running"),
			RelayError::Io(e) => write!(f, "io error: {}", e),
		}
	}
}

impl std::error::Error for RelayError {}

impl From<io::Error> for RelayError {
	fn from(e: io::Error) -> Self {
		RelayError::Io(e)
	}
}

/// Send one console command and collect the lines it appended to the live
/// log. There is no acknowledgement on the wire: output capture rests on
/// the settling window, so a child slower than `SETTLE_MAX` yields
/// truncated or empty output.
///
/// Returns `Ok(None)` when there was nothing to capture: the server is not
/// running (and `block` is false), or the pre-send line count could not be
/// determined.
pub fn send_command(
	config: &Config,
	cmd: &str,
	args: &[String],
	block: bool,
) -> Result<Option<String>, RelayError> {
	if !block && !probe::is_running(config) {
		return Ok(None);
	}

	let live_log = config.live_log();
	let pre = line_count(&live_log);

	let mut line = cmd.to_string();
	for arg in args {
		line.push(' ');
		line.push_str(arg);
	}
	send_raw(config, &line)?;

	let LineCount::Counted(pre) = pre else {
		// We cannot tell old output from new; skip capture entirely.
		return Ok(None);
	};

	settle(&live_log, pre);
	Ok(Some(lines_after(&live_log, pre)))
}

/// Write one raw line to the control socket and close the connection.
/// Used both for forwarded commands and for the daemon's `stop` sentinel.
pub fn send_raw(config: &Config, line: &str) -> Result<(), RelayError> {
	let mut stream =
		UnixStream::connect(&config.paths.socket).map_err(|_| RelayError::NotRunning)?;
	stream.write_all(line.as_bytes())?;
	stream.write_all(b"\n")?;
	Ok(())
}

/// `say <message>` broadcast to all players.
pub fn say(config: &Config, message: &str) -> Result<(), RelayError> {
	send_command(config, "say", &[message.to_string()], false).map(|_| ())
}

/// `tellraw` with a JSON payload; pass `@a` to address all players.
pub fn tellraw(
	config: &Config,
	payload: &serde_json::Value,
	target: &str,
) -> Result<(), RelayError> {
	let args = vec![target.to_string(), payload.to_string()];
	send_command(config, "tellraw", &args, false).map(|_| ())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineCount {
	Counted(usize),
	/// The file exists but could not be decoded; distinct from zero because
	/// it forces the caller to skip output capture.
	Undetermined,
}

pub fn line_count(path: &Path) -> LineCount {
	match std::fs::read_to_string(path) {
		Ok(content) => LineCount::Counted(content.lines().count()),
		Err(e) if e.kind() == io::ErrorKind::InvalidData => LineCount::Undetermined,
		Err(_) => LineCount::Counted(0),
	}
}

/// Lines strictly after `pre`, joined with newlines.
pub fn lines_after(path: &Path, pre: usize) -> String {
	let content = std::fs::read_to_string(path).unwrap_or_default();
	content.lines().skip(pre).collect::<Vec<_>>().join("\n")
}

/// Wait out the settling window: the base interval always, then as long as
/// the log is still growing, up to the cap.
fn settle(path: &Path, pre: usize) {
	std::thread::sleep(SETTLE_BASE);
	let deadline = Instant::now() + SETTLE_MAX;
	let mut last = match line_count(path) {
		LineCount::Counted(n) => n,
		LineCount::Undetermined => return,
	};
	while last > pre && Instant::now() < deadline {
		std::thread::sleep(SETTLE_POLL);
		match line_count(path) {
			LineCount::Counted(n) if n > last => last = n,
			_ => break,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn line_count_of_missing_file_is_zero() {
		let dir = tempfile::tempdir().unwrap();
		assert_eq!(line_count(&dir.path().join("latest.log")), LineCount::Counted(0));
	}

	#[test]
	fn line_count_of_binary_garbage_is_undetermined() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("latest.log");
		std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
		assert_eq!(line_count(&path), LineCount::Undetermined);
	}

	#[test]
	fn capture_excludes_historical_lines() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("latest.log");
		std::fs::write(&path, "old one\nold two\n").unwrap();
		let LineCount::Counted(pre) = line_count(&path) else {
			panic!("expected a count");
		};
		std::fs::write(&path, "old one\nold two\nnew one\nnew two\n").unwrap();
		assert_eq!(lines_after(&path, pre), "new one\nnew two");
	}

	#[test]
	fn capture_is_empty_when_nothing_was_appended() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("latest.log");
		std::fs::write(&path, "only line\n").unwrap();
		let LineCount::Counted(pre) = line_count(&path) else {
			panic!("expected a count");
		};
		assert_eq!(lines_after(&path, pre), "");
	}

	#[test]
	fn send_raw_to_dead_socket_reports_not_running() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = Config::default();
		config.paths.socket = dir.path().join("control.sock");
		match send_raw(&config, "list") {
			Err(RelayError::NotRunning) => {}
			other => panic!("expected NotRunning, got {:?}", other),
		}
	}
}
