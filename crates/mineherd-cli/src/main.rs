use std::path::{Path, PathBuf};

use mineherd::{backup, daemon, lifecycle, relay, status};
use mineherd_core::Config;
use owo_colors::OwoColorize;

fn main() {
	let mut args: Vec<String> = std::env::args().skip(1).collect();
	let config_path = take_config_flag(&mut args);

	if args.is_empty() {
		print_usage();
		return;
	}

	let config = Config::load(config_path.as_deref());
	if let Err(e) = config.validate() {
		eprintln!("error: invalid config: {}", e);
		std::process::exit(1);
	}

	match args[0].as_str() {
		"help" | "--help" | "-h" => print_usage(),
		"version" | "--version" | "-V" => println!("mineherd {}", env!("CARGO_PKG_VERSION")),
		"start" => {
			if lifecycle::start(&config) {
				eprintln!("[ ok ] server is now running.");
			} else {
				eprintln!("[fail] server could not be started.");
				std::process::exit(1);
			}
		}
		"stop" => {
			if lifecycle::stop(&config) {
				eprintln!("[ ok ] server is stopped.");
			} else {
				eprintln!("[fail] server could not be stopped.");
				std::process::exit(1);
			}
		}
		"restart" => {
			if !lifecycle::restart(&config) {
				std::process::exit(1);
			}
		}
		"status" | "st" => cmd_status(&config),
		"players" => {
			for player in status::online_players(&config) {
				println!("{}", player);
			}
		}
		"command" | "cmd" => cmd_command(&config, &args[1..]),
		"say" => cmd_say(&config, &args[1..]),
		"backup" => {
			if let Err(e) = backup::backup(&config) {
				eprintln!("error: {}", e);
				std::process::exit(1);
			}
		}
		"update" => cmd_update(&config, &args[1..]),
		"saveoff" => lifecycle::saveoff(&config, true),
		"saveon" => lifecycle::saveon(&config, true),
		"daemon" => cmd_daemon(&config, &args[1..]),
		name => {
			eprintln!("unknown command: {}", name);
			eprintln!("run 'mineherd help' for usage");
			std::process::exit(1);
		}
	}
}

fn print_usage() {
	eprintln!("{} {} — game server supervisor", "mineherd".bold(), env!("CARGO_PKG_VERSION"));
	eprintln!();
	eprintln!("usage: {} [--config PATH] <command> [args]", "mineherd".bold());
	eprintln!();

	eprintln!("{}", "server".cyan().bold());
	eprintln!("  {}                      Launch the supervised server", "start".bold());
	eprintln!("  {}                       Save and shut the server down", "stop".bold());
	eprintln!("  {}                    Stop, wait, start", "restart".bold());
	eprintln!("  {}                     Running state, players, version", "status".bold());
	eprintln!();

	eprintln!("{}", "console".cyan().bold());
	eprintln!("  {} <console cmd...>    Run a console command, print its output", "command".bold());
	eprintln!("  {} <message...>            Broadcast to all players", "say".bold());
	eprintln!("  {}                    List online players", "players".bold());
	eprintln!();

	eprintln!("{}", "maintenance".cyan().bold());
	eprintln!("  {}                     Archive the world (saves suspended)", "backup".bold());
	eprintln!("  {} <jar>               Relink the service jar and restart", "update".bold());
	eprintln!("  {} / {}        Suspend / resume world saves", "saveoff".bold(), "saveon".bold());
	eprintln!();

	eprintln!("{}", "system".cyan().bold());
	eprintln!("  {} run                 Run the supervisor in the foreground", "daemon".bold());
}

fn cmd_status(config: &Config) {
	let snapshot = status::server_status(config);
	if snapshot.on {
		println!("{} server is running", "●".green());
		if let Some(version) = &snapshot.version {
			println!("  version: {}", version);
		}
		if snapshot.list.is_empty() {
			println!("  no players online");
		} else {
			println!("  {} online: {}", snapshot.list.len(), snapshot.list.join(", "));
		}
	} else {
		println!("{} server is not running", "●".red());
	}
	status::write_snapshot(config, &snapshot);
}

fn cmd_command(config: &Config, args: &[String]) {
	if args.is_empty() {
		eprintln!("usage: mineherd command <console command...>");
		std::process::exit(1);
	}
	match relay::send_command(config, &args[0], &args[1..], false) {
		Ok(Some(output)) => {
			for line in output.lines() {
				println!("{}", line);
			}
		}
		Ok(None) => {
			eprintln!("server is not running");
			std::process::exit(1);
		}
		Err(e) => {
			eprintln!("error: {}", e);
			std::process::exit(1);
		}
	}
}

fn cmd_say(config: &Config, args: &[String]) {
	if args.is_empty() {
		eprintln!("usage: mineherd say <message...>");
		std::process::exit(1);
	}
	if let Err(e) = relay::say(config, &args.join(" ")) {
		eprintln!("error: {}", e);
		std::process::exit(1);
	}
}

fn cmd_update(config: &Config, args: &[String]) {
	let Some(jar) = args.first() else {
		eprintln!("usage: mineherd update <path-to-server-jar>");
		std::process::exit(1);
	};
	if let Err(e) = lifecycle::update(config, Path::new(jar)) {
		eprintln!("error: {}", e);
		std::process::exit(1);
	}
}

fn cmd_daemon(config: &Config, args: &[String]) {
	match args.first().map(|s| s.as_str()) {
		Some("run") => {
			tokio::runtime::Runtime::new()
				.expect("failed to build tokio runtime")
				.block_on(daemon::run(config));
		}
		_ => {
			eprintln!("usage: mineherd daemon run");
			std::process::exit(1);
		}
	}
}

fn take_config_flag(args: &mut Vec<String>) -> Option<PathBuf> {
	if let Some(pos) = args.iter().position(|a| a == "--config") {
		if pos + 1 < args.len() {
			let path = args.remove(pos + 1);
			args.remove(pos);
			return Some(PathBuf::from(path));
		}
		eprintln!("error: --config requires a path");
		std::process::exit(1);
	}
	if let Some(pos) = args.iter().position(|a| a.starts_with("--config=")) {
		let value = args.remove(pos);
		return Some(PathBuf::from(value.trim_start_matches("--config=")));
	}
	None
}
