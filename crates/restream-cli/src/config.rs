use restream::ExecConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ── Global config (~/.config/restream/config.toml) ──────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
	#[serde(default = "default_log_level")]
	pub log_level: String,
	#[serde(default)]
	pub exec: ExecConfig,
	#[serde(default)]
	pub plugins: PluginsConfig,
}

impl Default for GlobalConfig {
	fn default() -> Self {
		Self {
			log_level: default_log_level(),
			exec: ExecConfig::default(),
			plugins: PluginsConfig::default(),
		}
	}
}

fn default_log_level() -> String { "info".to_string() }

/// Per-plugin overrides of the built-in "enabled" defaults for `log` mode.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PluginsConfig {
	pub ansiescape: Option<bool>,
	pub json: Option<bool>,
	pub consolidate_lines: Option<bool>,
}

impl PluginsConfig {
	pub fn get(&self, name: &str) -> Option<bool> {
		match name {
			"ansiescape" => self.ansiescape,
			"json" => self.json,
			"consolidate-lines" => self.consolidate_lines,
			_ => None,
		}
	}
}

pub fn config_dir() -> PathBuf {
	if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
		PathBuf::from(dir).join("restream")
	} else if let Ok(home) = std::env::var("HOME") {
		PathBuf::from(home).join(".config").join("restream")
	} else {
		PathBuf::from("/tmp").join("restream").join("config")
	}
}

pub fn config_path() -> PathBuf {
	config_dir().join("config.toml")
}

/// Loads the config file. An explicit path must exist; the default location
/// is optional.
pub fn load(explicit: Option<&Path>) -> Result<GlobalConfig, String> {
	let path = match explicit {
		Some(path) => path.to_path_buf(),
		None => {
			let path = config_path();
			if !path.exists() {
				return Ok(GlobalConfig::default());
			}
			path
		}
	};

	let content = std::fs::read_to_string(&path)
		.map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
	parse(&content).map_err(|e| format!("invalid config {}: {}", path.display(), e))
}

pub fn parse(content: &str) -> Result<GlobalConfig, toml::de::Error> {
	toml::from_str(content)
}
