use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use mineherd_core::Config;

use crate::daemon;
use crate::probe;
use crate::relay;
use crate::status;

const STOP_WARNING: &str = "SERVER SHUTTING DOWN IN 10 SECONDS. Saving map...";

/// Window for `save-all` to finish before shutdown or backup work proceeds.
const SAVE_SETTLE: Duration = Duration::from_secs(10);
/// Players get this long to read an upgrade announcement.
const UPDATE_NOTICE: Duration = Duration::from_secs(5);
/// Prober poll cadence for launch/exit settling (35 polls ≈ 7 s).
const PROBE_INTERVAL: Duration = Duration::from_millis(200);
const PROBE_POLLS: u32 = 35;
/// Bounded retries while waiting for a stop to land during restart.
const STOP_RETRIES: u32 = 6;
const STOP_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Launch the supervisor daemon and report whether the server came up.
/// A server that is already running is a failure, not a second instance.
pub fn start(config: &Config) -> bool {
	start_with_message(config, "starting server...")
}

pub fn start_with_message(config: &Config, message: &str) -> bool {
	if probe::is_running(config) {
		eprintln!("server is already running");
		return false;
	}
	eprintln!("{}", message);
	if let Err(e) = spawn_daemon(config) {
		eprintln!("error: failed to launch supervisor: {}", e);
		return false;
	}
	wait_until(|| probe::is_running(config));
	status::update_status(config);
	probe::is_running(config)
}

/// Ask the supervisor to shut the server down. Idempotent: a server that
/// was not running still counts as stopped.
pub fn stop(config: &Config) -> bool {
	if !probe::is_running(config) {
		eprintln!("server was not running");
		status::update_status(config);
		return true;
	}
	eprintln!("stopping server...");
	let _ = relay::say(config, STOP_WARNING);
	let _ = relay::send_command(config, "save-all", &[], false);
	std::thread::sleep(SAVE_SETTLE);
	// The sentinel goes over the same connection mechanism as commands, but
	// the supervisor intercepts it instead of forwarding it.
	let _ = relay::send_raw(config, daemon::STOP_SENTINEL);
	wait_until(|| !probe::is_running(config));
	status::update_status(config);
	!probe::is_running(config)
}

pub fn restart(config: &Config) -> bool {
	stop(config);
	let mut stopped = false;
	for _ in 0..STOP_RETRIES {
		if probe::is_running(config) {
			std::thread::sleep(STOP_RETRY_DELAY);
		} else {
			stopped = true;
			break;
		}
	}
	if !stopped && probe::is_running(config) {
		eprintln!("the server could not be stopped");
		return false;
	}
	start_with_message(config, "server stopped, starting again...")
}

/// Suspend world saves so an external snapshot sees a quiescent world.
/// Pairs with `saveon`; only acts while the server is running.
pub fn saveoff(config: &Config, announce: bool) {
	if !probe::is_running(config) {
		eprintln!("server is not running, not suspending saves");
		return;
	}
	eprintln!("suspending saves...");
	if announce {
		let _ = relay::say(config, "Server backup starting. Server going readonly...");
	}
	let _ = relay::send_command(config, "save-off", &[], false);
	let _ = relay::send_command(config, "save-all", &[], false);
	nix::unistd::sync();
	std::thread::sleep(SAVE_SETTLE);
}

pub fn saveon(config: &Config, announce: bool) {
	if !probe::is_running(config) {
		eprintln!("server is not running, not resuming saves");
		return;
	}
	eprintln!("resuming saves...");
	let _ = relay::send_command(config, "save-on", &[], false);
	if announce {
		let _ = relay::say(config, "Server backup ended. Server going readwrite...");
	}
}

/// Run `f` between `saveoff` and `saveon`. The bracket holds even when `f`
/// fails, so a botched collaborator never leaves saves suspended.
pub fn with_saves_suspended<T>(config: &Config, announce: bool, f: impl FnOnce() -> T) -> T {
	saveoff(config, announce);
	let out = f();
	saveon(config, announce);
	out
}

/// Run `f` with the server stopped, restarting it afterwards only if it was
/// running before.
pub fn with_server_stopped<T>(config: &Config, f: impl FnOnce() -> T) -> Result<T, String> {
	let was_running = probe::is_running(config);
	if was_running && !stop(config) {
		return Err("server could not be stopped".to_string());
	}
	let out = f();
	if was_running && !start_with_message(config, "server updated, starting again...") {
		return Err("server did not come back up".to_string());
	}
	Ok(out)
}

/// Swap the service jar symlink to an already-downloaded jar, stopping and
/// restarting around the swap. Fetching the jar is someone else's job.
pub fn update(config: &Config, jar: &Path) -> Result<(), String> {
	if !jar.exists() {
		return Err(format!("no such jar: {}", jar.display()));
	}
	if probe::is_running(config) {
		let name = jar.file_name().unwrap_or_default().to_string_lossy();
		let _ = relay::say(
			config,
			&format!("Server will be upgrading to {} and therefore restart", name),
		);
		std::thread::sleep(UPDATE_NOTICE);
	}
	with_server_stopped(config, || relink_service(config, jar))?
}

fn relink_service(config: &Config, jar: &Path) -> Result<(), String> {
	let service = config.service_path();
	if service.symlink_metadata().is_ok() {
		std::fs::remove_file(&service)
			.map_err(|e| format!("failed to remove {}: {}", service.display(), e))?;
	}
	std::os::unix::fs::symlink(jar, &service)
		.map_err(|e| format!("failed to link {}: {}", service.display(), e))?;
	eprintln!("service jar now points at {}", jar.display());
	Ok(())
}

fn spawn_daemon(config: &Config) -> std::io::Result<()> {
	let binary = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("mineherd"));
	let mut cmd = std::process::Command::new(binary);
	cmd.args(["daemon", "run"]);
	if let Some(source) = &config.source {
		cmd.arg("--config").arg(source);
	}
	cmd.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null());
	cmd.spawn()?;
	Ok(())
}

fn wait_until(cond: impl Fn() -> bool) -> bool {
	for _ in 0..PROBE_POLLS {
		if cond() {
			return true;
		}
		std::thread::sleep(PROBE_INTERVAL);
	}
	cond()
}
