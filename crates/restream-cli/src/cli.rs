use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "restream", version, about = "Format logs from a file, stdin or a command that is restarted when it exits")]
pub struct Cli {
	/// Restart the command when it exits cleanly
	#[arg(long, global = true, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
	pub restart: Option<bool>,

	/// Set application name
	#[arg(short, long, global = true)]
	pub application: Option<String>,

	/// Start line (0 = first line, 1 = second line)
	#[arg(short = 's', long, global = true, default_value_t = 0)]
	pub start_line: usize,

	/// Amount of lines to process (0 = all)
	#[arg(short = 'm', long, global = true, default_value_t = 0)]
	pub line_amount: usize,

	/// Config file (default: ~/.config/restream/config.toml)
	#[arg(long, global = true, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Log level for restream's own messages
	#[arg(long, global = true, value_name = "LEVEL")]
	pub log_level: Option<String>,

	#[command(subcommand)]
	pub mode: Mode,
}

#[derive(Debug, Subcommand)]
pub enum Mode {
	/// Run using configurable plugins
	#[command(visible_alias = "l")]
	Log(LogArgs),
	/// Run using preset plugins
	#[command(visible_alias = "p")]
	Preset(PresetArgs),
}

#[derive(Debug, Args)]
pub struct LogArgs {
	#[command(flatten)]
	pub plugins: PluginFlags,

	#[command(flatten)]
	pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct PresetArgs {
	/// Preset name
	pub name: String,

	/// Enable 'ansiescape' plugin
	#[arg(long = "enable-ansiescape", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
	pub ansiescape: Option<bool>,

	#[command(flatten)]
	pub source: SourceArgs,
}

impl PresetArgs {
	pub fn plugin_flags(&self) -> PluginFlags {
		PluginFlags {
			ansiescape: self.ansiescape,
			..Default::default()
		}
	}
}

#[derive(Debug, Clone, Args, Default)]
pub struct PluginFlags {
	/// Enable 'ansiescape' plugin
	#[arg(long = "enable-ansiescape", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
	pub ansiescape: Option<bool>,

	/// Enable 'json' plugin
	#[arg(long = "enable-json", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
	pub json: Option<bool>,

	/// Enable 'consolidate-lines' plugin
	#[arg(long = "enable-consolidate-lines", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
	pub consolidate_lines: Option<bool>,
}

impl PluginFlags {
	pub fn get(&self, name: &str) -> Option<bool> {
		match name {
			"ansiescape" => self.ansiescape,
			"json" => self.json,
			"consolidate-lines" => self.consolidate_lines,
			_ => None,
		}
	}
}

#[derive(Debug, Args)]
pub struct SourceArgs {
	/// File to read, or '-' for stdin
	pub input: Option<String>,

	/// Command to run and follow, after '--'
	#[arg(last = true, value_name = "COMMAND")]
	pub command: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Source {
	Stdin,
	File(PathBuf),
	Command { program: String, args: Vec<String> },
}

impl SourceArgs {
	pub fn source(&self) -> Result<Source, String> {
		match (&self.input, self.command.split_first()) {
			(Some(_), Some(_)) => Err("command to execute must be the last parameter".to_string()),
			(None, None) => Err("missing input: give a file, '-' for stdin, or a command after '--'".to_string()),
			(None, Some((program, args))) => Ok(Source::Command {
				program: program.clone(),
				args: args.to_vec(),
			}),
			(Some(input), None) if input == "-" => Ok(Source::Stdin),
			(Some(input), None) => Ok(Source::File(PathBuf::from(input))),
		}
	}
}
