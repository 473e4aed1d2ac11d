use crate::cli::PluginFlags;
use crate::config::PluginsConfig;

/// A plugin the command line knows about and how it is enabled by default.
#[derive(Debug, Clone, Copy)]
pub struct PluginOption {
	pub plugin: Plugin,
	/// Default in `log` mode.
	pub enabled: bool,
	/// Can be toggled in `preset` mode.
	pub preset: bool,
	/// Default in `preset` mode.
	pub preset_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plugin {
	AnsiEscape,
	Json,
	ConsolidateLines,
}

impl Plugin {
	pub fn name(self) -> &'static str {
		match self {
			Plugin::AnsiEscape => "ansiescape",
			Plugin::Json => "json",
			Plugin::ConsolidateLines => "consolidate-lines",
		}
	}
}

pub const PLUGIN_OPTIONS: &[PluginOption] = &[
	PluginOption { plugin: Plugin::AnsiEscape, enabled: true, preset: true, preset_enabled: true },
	PluginOption { plugin: Plugin::Json, enabled: true, preset: false, preset_enabled: false },
	PluginOption { plugin: Plugin::ConsolidateLines, enabled: false, preset: false, preset_enabled: false },
];

/// Works out the enabled plugin list. In preset mode only preset-capable
/// plugins can be toggled, and the preset itself adds its own plugins.
pub fn resolve(
	preset: Option<&str>,
	flags: &PluginFlags,
	config: &PluginsConfig,
) -> Result<Vec<Plugin>, String> {
	let mut enabled = Vec::new();

	for opt in PLUGIN_OPTIONS {
		let name = opt.plugin.name();
		let on = match preset {
			Some(_) if !opt.preset => false,
			Some(_) => flags.get(name).unwrap_or(opt.preset_enabled),
			None => flags.get(name).or(config.get(name)).unwrap_or(opt.enabled),
		};
		if on {
			enabled.push(opt.plugin);
		}
	}

	if let Some(preset) = preset {
		match preset {
			"default" => enabled.push(Plugin::Json),
			other => return Err(format!("unknown preset '{}'", other)),
		}
	}

	Ok(unique(enabled))
}

/// Removes duplicates, keeping the first occurrence.
pub fn unique(plugins: Vec<Plugin>) -> Vec<Plugin> {
	let mut list = Vec::with_capacity(plugins.len());
	for plugin in plugins {
		if !list.contains(&plugin) {
			list.push(plugin);
		}
	}
	list
}

/// Strips ANSI escape sequences (CSI and OSC) from a line.
pub fn strip_ansi(line: &str) -> String {
	let mut out = String::with_capacity(line.len());
	let mut chars = line.chars().peekable();

	while let Some(c) = chars.next() {
		if c != '\u{1b}' {
			out.push(c);
			continue;
		}
		match chars.peek() {
			Some('[') => {
				chars.next();
				// parameters and intermediates, then one final byte in @..~
				for c in chars.by_ref() {
					if ('@'..='~').contains(&c) {
						break;
					}
				}
			}
			Some(']') => {
				chars.next();
				// terminated by BEL or ESC \
				while let Some(c) = chars.next() {
					if c == '\u{7}' {
						break;
					}
					if c == '\u{1b}' && chars.peek() == Some(&'\\') {
						chars.next();
						break;
					}
				}
			}
			Some(_) => {
				chars.next();
			}
			None => {}
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn flags(ansiescape: Option<bool>, json: Option<bool>, consolidate: Option<bool>) -> PluginFlags {
		PluginFlags {
			ansiescape,
			json,
			consolidate_lines: consolidate,
		}
	}

	#[test]
	fn log_mode_defaults() {
		let plugins = resolve(None, &PluginFlags::default(), &PluginsConfig::default()).unwrap();
		assert_eq!(plugins, vec![Plugin::AnsiEscape, Plugin::Json]);
	}

	#[test]
	fn flags_beat_config() {
		let config = PluginsConfig {
			json: Some(false),
			consolidate_lines: Some(true),
			..Default::default()
		};
		let plugins = resolve(None, &flags(None, Some(true), None), &config).unwrap();
		assert_eq!(plugins, vec![Plugin::AnsiEscape, Plugin::Json, Plugin::ConsolidateLines]);

		let plugins = resolve(None, &PluginFlags::default(), &config).unwrap();
		assert_eq!(plugins, vec![Plugin::AnsiEscape, Plugin::ConsolidateLines]);
	}

	#[test]
	fn default_preset_adds_json_once() {
		let plugins = resolve(Some("default"), &flags(None, Some(true), None), &PluginsConfig::default())
			.unwrap();
		assert_eq!(plugins, vec![Plugin::AnsiEscape, Plugin::Json]);

		let plugins =
			resolve(Some("default"), &flags(Some(false), None, Some(true)), &PluginsConfig::default())
				.unwrap();
		assert_eq!(plugins, vec![Plugin::Json]);
	}

	#[test]
	fn unknown_preset() {
		let err = resolve(Some("fancy"), &PluginFlags::default(), &PluginsConfig::default()).unwrap_err();
		assert_eq!(err, "unknown preset 'fancy'");
	}

	#[test]
	fn unique_keeps_order() {
		let list = unique(vec![Plugin::Json, Plugin::AnsiEscape, Plugin::Json]);
		assert_eq!(list, vec![Plugin::Json, Plugin::AnsiEscape]);
	}

	#[test]
	fn strips_colors_and_titles() {
		assert_eq!(strip_ansi("\u{1b}[1;31mERROR\u{1b}[0m boom"), "ERROR boom");
		assert_eq!(strip_ansi("\u{1b}]0;title\u{7}text"), "text");
		assert_eq!(strip_ansi("\u{1b}]8;;http://x\u{1b}\\link"), "link");
		assert_eq!(strip_ansi("plain"), "plain");
	}
}
