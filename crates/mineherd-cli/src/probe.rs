use std::ffi::OsString;

use mineherd_core::Config;
use sysinfo::{ProcessesToUpdate, System, Uid, Users};

/// True iff the process table holds at least one process owned by the
/// configured service account whose command line mentions the service jar.
/// No side effects; cheap enough to poll in bounded loops.
pub fn is_running(config: &Config) -> bool {
	let mut system = System::new_all();
	system.refresh_processes(ProcessesToUpdate::All, true);

	let Some(uid) = resolve_uid(&config.server.username) else {
		// No such account means nothing can be running as it.
		return false;
	};

	system.processes().values().any(|process| {
		process.user_id() == Some(&uid)
			&& cmdline_matches(process.cmd(), &config.server.service_name)
	})
}

fn resolve_uid(username: &str) -> Option<Uid> {
	let users = Users::new_with_refreshed_list();
	users
		.iter()
		.find(|user| user.name() == username)
		.map(|user| user.id().clone())
}

fn cmdline_matches(cmd: &[OsString], needle: &str) -> bool {
	cmd.iter().any(|arg| arg.to_string_lossy().contains(needle))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cmdline_match_is_a_substring_test() {
		let cmd: Vec<OsString> = ["java", "-Xmx4096M", "-jar", "/srv/mc/minecraft_server.jar", "nogui"]
			.iter()
			.map(OsString::from)
			.collect();
		assert!(cmdline_matches(&cmd, "minecraft_server.jar"));
		assert!(!cmdline_matches(&cmd, "paper_server.jar"));
		assert!(!cmdline_matches(&[], "minecraft_server.jar"));
	}

	#[test]
	fn unknown_account_reports_not_running() {
		let mut config = Config::default();
		config.server.username = "mineherd-no-such-user".to_string();
		assert!(!is_running(&config));
	}
}
