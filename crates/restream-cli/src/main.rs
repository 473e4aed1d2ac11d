mod cli;
mod config;
mod output;
mod plugins;
mod processor;
mod signals;

use clap::Parser;
use cli::{Cli, Mode, Source};
use config::GlobalConfig;
use output::DefaultOutput;
use processor::{Output, Processor};
use restream::{cancellation, CommandLine, ExecError, ExecReader, StopSignal};
use std::io::{self, IsTerminal};
use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
	#[error("{0}")]
	Usage(String),
	#[error(transparent)]
	Exec(#[from] ExecError),
	#[error(transparent)]
	Io(#[from] io::Error),
}

impl CliError {
	/// The failed command's own exit code when there is one.
	fn exit_code(&self) -> i32 {
		let code = match self {
			CliError::Exec(err) => err.exit_code(),
			CliError::Io(err) => ExecError::from_io(err).and_then(ExecError::exit_code),
			CliError::Usage(_) => None,
		};
		code.unwrap_or(1)
	}
}

fn main() {
	let cli = Cli::parse();
	if let Err(err) = run(cli) {
		eprintln!("error: {}", err);
		std::process::exit(err.exit_code());
	}
}

fn run(cli: Cli) -> Result<(), CliError> {
	let config = config::load(cli.config.as_deref()).map_err(CliError::Usage)?;
	let logger = init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level))?;

	let (preset, flags, source) = match &cli.mode {
		Mode::Log(args) => (None, args.plugins.clone(), &args.source),
		Mode::Preset(args) => (Some(args.name.as_str()), args.plugin_flags(), &args.source),
	};
	let source = source.source().map_err(CliError::Usage)?;
	let plugins = plugins::resolve(preset, &flags, &config.plugins).map_err(CliError::Usage)?;
	tracing::debug!(plugins = ?plugins, "plugins enabled");

	let processor = Processor::new(plugins)
		.application(cli.application.clone())
		.lines(cli.start_line, cli.line_amount);

	let stdout = io::stdout();
	let color = stdout.is_terminal();
	let mut output = DefaultOutput::new(stdout.lock(), color);

	match source {
		Source::Stdin => processor.process(io::stdin().lock(), &mut output)?,
		Source::File(path) => {
			let file = std::fs::File::open(&path)
				.map_err(|e| CliError::Usage(format!("failed to open {}: {}", path.display(), e)))?;
			processor.process(file, &mut output)?;
		}
		Source::Command { program, args } => {
			run_command(&cli, &config, logger, CommandLine::new(program, args), &processor, &mut output)?;
		}
	}
	Ok(())
}

fn run_command<O: Output>(
	cli: &Cli,
	config: &GlobalConfig,
	logger: Dispatch,
	command: CommandLine,
	processor: &Processor,
	output: &mut O,
) -> Result<(), CliError> {
	let mut exec = config.exec.clone();
	if let Some(restart) = cli.restart {
		exec.restart_on_close = restart;
	}

	let (cancel, cancel_rx) = cancellation();
	let reader = ExecReader::builder(command.clone())
		.with_config(exec)
		.with_cancellation(cancel_rx)
		.with_logger(logger)
		.start()?;
	let killer = reader.kill_handle();
	signals::forward(killer.clone(), cancel)?;

	let result = processor.process(reader, output);
	// The line limit or a cancellation can leave the command running.
	killer.kill(StopSignal::Terminate);
	result?;

	tracing::info!(command = %command, "process finished");
	Ok(())
}

fn init_logging(level: &str) -> Result<Dispatch, CliError> {
	let level: LevelFilter = level
		.parse()
		.map_err(|_| CliError::Usage(format!("invalid log level '{}'", level)))?;

	let subscriber = tracing_subscriber::fmt()
		.with_max_level(level)
		.with_writer(io::stderr)
		.finish();
	let dispatch = Dispatch::new(subscriber);
	tracing::dispatcher::set_global_default(dispatch.clone())
		.map_err(|e| CliError::Usage(e.to_string()))?;
	Ok(dispatch)
}
