use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use mineherd_core::{read_log, Config, ServerStatus};
use regex::Regex;

use crate::probe;
use crate::relay;

static PLAYERS_LINE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\[\d{2}:\d{2}:\d{2}\] \[Server thread/INFO\]:? There are \d+/\d+ players online:\s*(.*)$")
		.unwrap()
});

static PLAYER_NAME: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,16}$").unwrap());

static VERSION_BANNER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^Starting minecraft server version (.+)$").unwrap());

/// Names currently online, in the order the server lists them. Empty when
/// the server is down, unreachable, or the answer could not be captured
/// (after one retry).
pub fn online_players(config: &Config) -> Vec<String> {
	query_players(config, true)
}

fn query_players(config: &Config, retry: bool) -> Vec<String> {
	let output = match relay::send_command(config, "list", &[], false) {
		Ok(Some(output)) => output,
		Ok(None) => {
			return if retry { query_players(config, false) } else { Vec::new() };
		}
		Err(_) => return Vec::new(),
	};
	for line in output.lines() {
		if let Some(players) = parse_players_line(line) {
			return players;
		}
	}
	if retry {
		query_players(config, false)
	} else {
		Vec::new()
	}
}

/// Parse one captured `list` output line. `None` means the line is not a
/// well-formed player listing at all; `Some(vec![])` means nobody is online.
pub fn parse_players_line(line: &str) -> Option<Vec<String>> {
	let caps = PLAYERS_LINE.captures(line)?;
	let names = caps[1].trim();
	if names.is_empty() {
		return Some(Vec::new());
	}
	let players: Vec<String> = names.split(", ").map(str::to_string).collect();
	players
		.iter()
		.all(|name| PLAYER_NAME.is_match(name))
		.then_some(players)
}

/// Server version from the most recent startup banner; scans the log stream
/// backwards and stops at the first hit.
pub fn version(config: &Config) -> Option<String> {
	read_log(config, true)
		.find_map(|record| VERSION_BANNER.captures(&record.message).map(|caps| caps[1].to_string()))
}

/// When `player` last left the game, if the logs still remember it.
pub fn last_seen(config: &Config, player: &str) -> Option<DateTime<Utc>> {
	let needle = format!("{} left the game", player);
	read_log(config, true).find_map(|record| {
		if record.message.starts_with(&needle) {
			record.timestamp
		} else {
			None
		}
	})
}

/// Recompute the full derived status.
pub fn server_status(config: &Config) -> ServerStatus {
	ServerStatus {
		list: online_players(config),
		on: probe::is_running(config),
		version: version(config),
	}
}

/// Recompute and persist the snapshot artifact for external consumers.
pub fn update_status(config: &Config) {
	let snapshot = server_status(config);
	write_snapshot(config, &snapshot);
}

pub fn write_snapshot(config: &Config, snapshot: &ServerStatus) {
	let path = &config.paths.status_json;
	if let Some(parent) = path.parent() {
		let _ = std::fs::create_dir_all(parent);
	}
	match serde_json::to_string_pretty(snapshot) {
		Ok(json) => {
			if let Err(e) = std::fs::write(path, json) {
				eprintln!("warning: failed to write {}: {}", path.display(), e);
			}
		}
		Err(e) => eprintln!("warning: failed to serialize status: {}", e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn two_players_parse_in_order() {
		let players = parse_players_line(
			"[12:00:00] [Server thread/INFO]: There are 2/20 players online: Alice, Bob",
		);
		assert_eq!(players, Some(vec!["Alice".to_string(), "Bob".to_string()]));
	}

	#[test]
	fn empty_listing_is_nobody_online() {
		let players =
			parse_players_line("[12:00:00] [Server thread/INFO]: There are 0/20 players online:");
		assert_eq!(players, Some(Vec::new()));
	}

	#[test]
	fn unrelated_lines_are_rejected() {
		assert_eq!(parse_players_line("[12:00:00] [Server thread/INFO]: Alice joined the game"), None);
		assert_eq!(parse_players_line("not a log line at all"), None);
	}

	#[test]
	fn garbled_names_invalidate_the_listing() {
		let players = parse_players_line(
			"[12:00:00] [Server thread/INFO]: There are 1/20 players online: not a name!!",
		);
		assert_eq!(players, None);
	}

	fn log_fixture(lines: &str) -> (tempfile::TempDir, Config) {
		let dir = tempfile::tempdir().unwrap();
		let mut config = Config::default();
		config.server.dir = dir.path().to_path_buf();
		std::fs::create_dir_all(config.logs_dir()).unwrap();
		std::fs::write(config.live_log(), lines).unwrap();
		(dir, config)
	}

	#[test]
	fn version_comes_from_the_latest_banner() {
		let (_dir, config) = log_fixture(
			"[08:00:00] [Server thread/INFO]: Starting minecraft server version 1.7.2\n\
			 [09:00:00] [Server thread/INFO]: Stopping server\n\
			 [10:00:00] [Server thread/INFO]: Starting minecraft server version 1.7.4\n",
		);
		assert_eq!(version(&config).as_deref(), Some("1.7.4"));
	}

	#[test]
	fn version_is_none_without_a_banner() {
		let (_dir, config) = log_fixture("[08:00:00] [Server thread/INFO]: Done\n");
		assert_eq!(version(&config), None);
	}

	#[test]
	fn last_seen_needs_a_timestamped_departure() {
		let (_dir, config) = log_fixture(
			"Alice left the game\n\
			 [10:30:00] [Server thread/INFO]: Alice left the game\n",
		);
		let ts = last_seen(&config, "Alice").unwrap();
		assert_eq!(ts.format("%H:%M:%S").to_string(), "10:30:00");
		assert_eq!(last_seen(&config, "Bob"), None);
	}
}
