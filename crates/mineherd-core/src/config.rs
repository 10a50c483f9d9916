use serde::Deserialize;
use std::path::{Path, PathBuf};

// ── Config (~/.config/mineherd/config.toml) ─────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
	#[serde(default)]
	pub server: ServerConfig,
	#[serde(default)]
	pub java: JavaConfig,
	#[serde(default)]
	pub paths: PathsConfig,
	#[serde(default)]
	pub log: LogConfig,
	/// File this config was loaded from, if any. Propagated to the daemon.
	#[serde(skip)]
	pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
	/// Working directory of the game server (holds `logs/`, `server.log`, the world).
	#[serde(default = "default_server_dir")]
	pub dir: PathBuf,
	/// Jar name the server runs as; also the process-table match fragment.
	#[serde(default = "default_service_name")]
	pub service_name: String,
	/// Service account the server process runs under.
	#[serde(default = "default_username")]
	pub username: String,
	/// World directory name under `dir`.
	#[serde(default = "default_world")]
	pub world: String,
	/// Path of the jar symlink the invocation runs. Defaults to `dir/service_name`.
	pub service_path: Option<PathBuf>,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			dir: default_server_dir(),
			service_name: default_service_name(),
			username: default_username(),
			world: default_world(),
			service_path: None,
		}
	}
}

fn default_server_dir() -> PathBuf { PathBuf::from("/srv/mineherd/server") }
fn default_service_name() -> String { "minecraft_server.jar".to_string() }
fn default_username() -> String { "mineherd".to_string() }
fn default_world() -> String { "world".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct JavaConfig {
	#[serde(default = "default_min_heap")]
	pub min_heap: u32,
	#[serde(default = "default_max_heap")]
	pub max_heap: u32,
	#[serde(default = "default_cpu_count")]
	pub cpu_count: u32,
	#[serde(default = "default_jar_options")]
	pub jar_options: Vec<String>,
}

impl Default for JavaConfig {
	fn default() -> Self {
		Self {
			min_heap: default_min_heap(),
			max_heap: default_max_heap(),
			cpu_count: default_cpu_count(),
			jar_options: default_jar_options(),
		}
	}
}

fn default_min_heap() -> u32 { 2048 }
fn default_max_heap() -> u32 { 4096 }
fn default_cpu_count() -> u32 { 1 }
fn default_jar_options() -> Vec<String> { vec!["nogui".to_string()] }

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
	/// Control socket the supervisor daemon listens on.
	#[serde(default = "default_socket")]
	pub socket: PathBuf,
	#[serde(default = "default_backup_dir")]
	pub backup_dir: PathBuf,
	/// Status snapshot artifact for external consumers.
	#[serde(default = "default_status_json")]
	pub status_json: PathBuf,
	/// Where versioned server jars live; `update` links `service_path` into here.
	#[serde(default = "default_jar_dir")]
	pub jar_dir: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		Self {
			socket: default_socket(),
			backup_dir: default_backup_dir(),
			status_json: default_status_json(),
			jar_dir: default_jar_dir(),
		}
	}
}

fn default_socket() -> PathBuf { state_dir().join("control.sock") }
fn default_backup_dir() -> PathBuf { state_dir().join("backups") }
fn default_status_json() -> PathBuf { state_dir().join("status.json") }
fn default_jar_dir() -> PathBuf { state_dir().join("jars") }

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
	/// Offset (whole hours from UTC) the server writes its short timestamps in.
	#[serde(default)]
	pub utc_offset: i32,
}

impl Default for LogConfig {
	fn default() -> Self {
		Self { utc_offset: 0 }
	}
}

impl Config {
	/// Load from `path` if given, else from the default config file.
	/// A missing or malformed file yields defaults with a warning.
	pub fn load(path: Option<&Path>) -> Config {
		let (path, explicit) = match path {
			Some(p) => (p.to_path_buf(), true),
			None => (config_dir().join("config.toml"), false),
		};
		if path.exists() {
			match std::fs::read_to_string(&path) {
				Ok(content) => match toml::from_str::<Config>(&content) {
					Ok(mut config) => {
						config.source = Some(path);
						return config;
					}
					Err(e) => eprintln!("warning: failed to parse {}: {}", path.display(), e),
				},
				Err(e) => eprintln!("warning: failed to read {}: {}", path.display(), e),
			}
		} else if explicit {
			eprintln!("warning: config file not found: {}", path.display());
		}
		Config::default()
	}

	pub fn validate(&self) -> Result<(), String> {
		if self.server.service_name.is_empty() {
			return Err("server.service_name must not be empty".to_string());
		}
		if self.server.world.is_empty() {
			return Err("server.world must not be empty".to_string());
		}
		if self.java.max_heap < self.java.min_heap {
			return Err(format!(
				"java.max_heap ({}) is below java.min_heap ({})",
				self.java.max_heap, self.java.min_heap
			));
		}
		if self.log.utc_offset.abs() > 14 {
			return Err(format!("log.utc_offset ({}) is not a valid hour offset", self.log.utc_offset));
		}
		Ok(())
	}

	pub fn service_path(&self) -> PathBuf {
		self.server
			.service_path
			.clone()
			.unwrap_or_else(|| self.server.dir.join(&self.server.service_name))
	}

	/// Full launch argv for the server child, program first.
	pub fn invocation(&self) -> Vec<String> {
		let mut argv = vec![
			"java".to_string(),
			format!("-Xmx{}M", self.java.max_heap),
			format!("-Xms{}M", self.java.min_heap),
			format!("-XX:ParallelGCThreads={}", self.java.cpu_count),
			"-jar".to_string(),
			self.service_path().display().to_string(),
		];
		argv.extend(self.java.jar_options.iter().cloned());
		argv
	}

	// Fixed on-disk contract with the server process; nothing configurable
	// besides the server dir may move these.
	pub fn logs_dir(&self) -> PathBuf {
		self.server.dir.join("logs")
	}

	pub fn live_log(&self) -> PathBuf {
		self.logs_dir().join("latest.log")
	}

	pub fn legacy_log(&self) -> PathBuf {
		self.server.dir.join("server.log")
	}

	pub fn world_dir(&self) -> PathBuf {
		self.server.dir.join(&self.server.world)
	}
}

// ── XDG directories ──────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
	if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
		PathBuf::from(dir).join("mineherd")
	} else if let Some(home) = home_dir() {
		home.join(".config").join("mineherd")
	} else {
		PathBuf::from("/tmp").join("mineherd").join("config")
	}
}

pub fn state_dir() -> PathBuf {
	if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
		PathBuf::from(dir).join("mineherd")
	} else if let Some(home) = home_dir() {
		home.join(".local").join("state").join("mineherd")
	} else {
		PathBuf::from("/tmp").join("mineherd")
	}
}

fn home_dir() -> Option<PathBuf> {
	std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		let config = Config::default();
		assert!(config.validate().is_ok());
		assert_eq!(config.server.service_name, "minecraft_server.jar");
		assert_eq!(config.java.jar_options, vec!["nogui"]);
		assert_eq!(config.live_log(), PathBuf::from("/srv/mineherd/server/logs/latest.log"));
		assert_eq!(config.legacy_log(), PathBuf::from("/srv/mineherd/server/server.log"));
	}

	#[test]
	fn partial_toml_fills_defaults() {
		let config: Config = toml::from_str(
			r#"
			[server]
			dir = "/opt/mc"
			username = "mc"

			[java]
			max_heap = 8192
			"#,
		)
		.unwrap();
		assert_eq!(config.server.dir, PathBuf::from("/opt/mc"));
		assert_eq!(config.server.username, "mc");
		assert_eq!(config.server.world, "world");
		assert_eq!(config.java.max_heap, 8192);
		assert_eq!(config.java.min_heap, 2048);
		assert_eq!(config.log.utc_offset, 0);
	}

	#[test]
	fn service_path_defaults_to_dir_join_name() {
		let config = Config::default();
		assert_eq!(
			config.service_path(),
			PathBuf::from("/srv/mineherd/server/minecraft_server.jar")
		);
		let mut config = Config::default();
		config.server.service_path = Some(PathBuf::from("/elsewhere/server.jar"));
		assert_eq!(config.service_path(), PathBuf::from("/elsewhere/server.jar"));
	}

	#[test]
	fn invocation_reflects_heap_settings() {
		let mut config = Config::default();
		config.java.max_heap = 1024;
		config.java.min_heap = 512;
		let argv = config.invocation();
		assert_eq!(argv[0], "java");
		assert!(argv.contains(&"-Xmx1024M".to_string()));
		assert!(argv.contains(&"-Xms512M".to_string()));
		assert_eq!(argv.last().unwrap(), "nogui");
	}

	#[test]
	fn heap_validation_rejects_inverted_bounds() {
		let mut config = Config::default();
		config.java.max_heap = 256;
		config.java.min_heap = 512;
		assert!(config.validate().is_err());
	}
}
