use std::path::PathBuf;
use std::process::Command;

use chrono::Utc;
use mineherd_core::Config;

use crate::lifecycle;

/// Archive the world directory inside the `saveoff`/`saveon` bracket, then
/// compress the result once saves are flowing again. The archive format
/// belongs to the external tools; this only guarantees the world is
/// quiescent while `tar` reads it.
pub fn backup(config: &Config) -> Result<PathBuf, String> {
	let tarball = lifecycle::with_saves_suspended(config, true, || archive_world(config))?;
	eprintln!("compressing backup...");
	let status = Command::new("gzip")
		.arg("-f")
		.arg(&tarball)
		.status()
		.map_err(|e| format!("failed to run gzip: {}", e))?;
	if !status.success() {
		return Err(format!("gzip exited with {}", status));
	}
	let archive = PathBuf::from(format!("{}.gz", tarball.display()));
	eprintln!("backup written to {}", archive.display());
	Ok(archive)
}

fn archive_world(config: &Config) -> Result<PathBuf, String> {
	let world = config.world_dir();
	if !world.exists() {
		return Err(format!("no world directory at {}", world.display()));
	}
	std::fs::create_dir_all(&config.paths.backup_dir)
		.map_err(|e| format!("failed to create {}: {}", config.paths.backup_dir.display(), e))?;
	let stamp = Utc::now().format("%Y-%m-%d_%Hh%M");
	let tarball = config
		.paths
		.backup_dir
		.join(format!("{}_{}.tar", config.server.world, stamp));
	eprintln!("archiving world {}...", config.server.world);
	let status = Command::new("tar")
		.arg("-C")
		.arg(&config.server.dir)
		.arg("-cf")
		.arg(&tarball)
		.arg(&config.server.world)
		.status()
		.map_err(|e| format!("failed to run tar: {}", e))?;
	if !status.success() {
		return Err(format!("tar exited with {}", status));
	}
	Ok(tarball)
}
