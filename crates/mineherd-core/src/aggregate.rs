use std::collections::VecDeque;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::config::Config;
use crate::record::{self, LogRecord};

/// Unified view over every on-disk log format, oldest source first:
/// the legacy `server.log`, rotated `*.log.gz` archives in ascending name
/// order, then the live `logs/latest.log`. Chronology across files is
/// approximated by that selection order, not by merging timestamps.
///
/// Sources are opened one at a time as iteration reaches them, so a consumer
/// that stops early never pays for decompressing the archives it skipped.
/// A source that cannot be read is skipped; its records are simply absent.
pub fn read_log(config: &Config, reverse: bool) -> LogReader {
	let mut sources = Vec::new();
	sources.push(Source::Legacy(config.legacy_log()));
	for path in rotated_logs(&config.logs_dir()) {
		sources.push(Source::Rotated(path));
	}
	sources.push(Source::Live(config.live_log()));
	if reverse {
		sources.reverse();
	}
	LogReader {
		sources: sources.into(),
		current: Vec::new().into_iter(),
		reverse,
		utc_offset: config.log.utc_offset,
	}
}

enum Source {
	Legacy(PathBuf),
	Rotated(PathBuf),
	Live(PathBuf),
}

pub struct LogReader {
	sources: VecDeque<Source>,
	current: std::vec::IntoIter<LogRecord>,
	reverse: bool,
	utc_offset: i32,
}

impl Iterator for LogReader {
	type Item = LogRecord;

	fn next(&mut self) -> Option<LogRecord> {
		loop {
			if let Some(record) = self.current.next() {
				return Some(record);
			}
			let source = self.sources.pop_front()?;
			self.current = self.load(&source).into_iter();
		}
	}
}

impl LogReader {
	fn load(&self, source: &Source) -> Vec<LogRecord> {
		let result = match source {
			Source::Legacy(path) => read_plain(path).map(|lines| {
				lines.iter().map(|l| record::parse_legacy_line(l)).collect::<Vec<_>>()
			}),
			Source::Rotated(path) => read_gzip(path).map(|lines| {
				let name = path.file_name().unwrap_or_default().to_string_lossy();
				let base = record::file_date(&name, record::today(self.utc_offset));
				lines
					.iter()
					.map(|l| record::parse_short_line(l, base, self.utc_offset))
					.collect::<Vec<_>>()
			}),
			Source::Live(path) => read_plain(path).map(|lines| {
				let base = record::today(self.utc_offset);
				lines
					.iter()
					.map(|l| record::parse_short_line(l, base, self.utc_offset))
					.collect::<Vec<_>>()
			}),
		};
		let mut records = match result {
			Ok(records) => records,
			Err(e) => {
				let path = match source {
					Source::Legacy(p) | Source::Rotated(p) | Source::Live(p) => p,
				};
				tracing::debug!("skipping log source {}: {}", path.display(), e);
				Vec::new()
			}
		};
		if self.reverse {
			records.reverse();
		}
		records
	}
}

fn read_plain(path: &Path) -> std::io::Result<Vec<String>> {
	let content = std::fs::read_to_string(path)?;
	Ok(content.lines().map(str::to_string).collect())
}

fn read_gzip(path: &Path) -> std::io::Result<Vec<String>> {
	let file = std::fs::File::open(path)?;
	let mut content = String::new();
	GzDecoder::new(file).read_to_string(&mut content)?;
	Ok(content.lines().map(str::to_string).collect())
}

/// Rotated archives in ascending name order. An unreadable directory means
/// no archives, not an error.
fn rotated_logs(logs_dir: &Path) -> Vec<PathBuf> {
	let entries = match std::fs::read_dir(logs_dir) {
		Ok(entries) => entries,
		Err(e) => {
			tracing::debug!("skipping rotated logs in {}: {}", logs_dir.display(), e);
			return Vec::new();
		}
	};
	let mut names: Vec<String> = entries
		.flatten()
		.filter_map(|entry| {
			let name = entry.file_name().to_string_lossy().to_string();
			name.ends_with(".log.gz").then_some(name)
		})
		.collect();
	names.sort();
	names.into_iter().map(|n| logs_dir.join(n)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use flate2::write::GzEncoder;
	use flate2::Compression;
	use std::io::Write;

	fn fixture() -> (tempfile::TempDir, Config) {
		let dir = tempfile::tempdir().unwrap();
		let mut config = Config::default();
		config.server.dir = dir.path().to_path_buf();
		std::fs::create_dir_all(config.logs_dir()).unwrap();

		std::fs::write(
			config.legacy_log(),
			"2012-08-14 09:15:00 [INFO] Alice joined the game\nno timestamp here\n",
		)
		.unwrap();

		let gz = std::fs::File::create(config.logs_dir().join("2014-03-01-1.log.gz")).unwrap();
		let mut encoder = GzEncoder::new(gz, Compression::default());
		encoder
			.write_all(b"[10:00:00] [Server thread/INFO]: Bob joined the game\n[10:05:00] [Server thread/INFO]: Bob left the game\n")
			.unwrap();
		encoder.finish().unwrap();

		std::fs::write(
			config.live_log(),
			"[12:00:00] [Server thread/INFO]: Starting minecraft server version 1.7.4\n[12:00:05] [Server thread/INFO]: Done\n",
		)
		.unwrap();

		(dir, config)
	}

	#[test]
	fn forward_order_is_legacy_then_rotated_then_live() {
		let (_dir, config) = fixture();
		let messages: Vec<String> = read_log(&config, false).map(|r| r.message).collect();
		assert_eq!(
			messages,
			vec![
				"Alice joined the game",
				"no timestamp here",
				"Bob joined the game",
				"Bob left the game",
				"Starting minecraft server version 1.7.4",
				"Done",
			]
		);
	}

	#[test]
	fn reverse_yields_same_multiset_per_source() {
		let (_dir, config) = fixture();
		let forward: Vec<String> = read_log(&config, false).map(|r| r.message).collect();
		let mut backward: Vec<String> = read_log(&config, true).map(|r| r.message).collect();
		backward.reverse();
		assert_eq!(forward, backward);
	}

	#[test]
	fn reverse_starts_at_the_live_log_tail() {
		let (_dir, config) = fixture();
		let first = read_log(&config, true).next().unwrap();
		assert_eq!(first.message, "Done");
	}

	#[test]
	fn rotated_date_comes_from_the_filename() {
		let (_dir, config) = fixture();
		let bob = read_log(&config, false)
			.find(|r| r.message == "Bob joined the game")
			.unwrap();
		let ts = bob.timestamp.unwrap();
		assert_eq!(ts.to_rfc3339(), "2014-03-01T10:00:00+00:00");
	}

	#[test]
	fn corrupt_archive_is_skipped_not_fatal() {
		let (_dir, config) = fixture();
		std::fs::write(config.logs_dir().join("2014-04-01-1.log.gz"), b"not gzip at all").unwrap();
		let messages: Vec<String> = read_log(&config, false).map(|r| r.message).collect();
		// The good sources still come through, in order.
		assert!(messages.contains(&"Bob left the game".to_string()));
		assert!(messages.contains(&"Done".to_string()));
	}

	#[test]
	fn missing_sources_yield_an_empty_stream() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = Config::default();
		config.server.dir = dir.path().join("nothing-here");
		assert_eq!(read_log(&config, false).count(), 0);
		assert_eq!(read_log(&config, true).count(), 0);
	}

	#[test]
	fn malformed_lines_survive_round_trip() {
		let (_dir, config) = fixture();
		let raw = read_log(&config, false)
			.find(|r| r.message == "no timestamp here")
			.unwrap();
		assert_eq!(raw.timestamp, None);
		assert_eq!(raw.prefix, None);
	}
}
