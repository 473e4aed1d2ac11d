use std::fmt;
use std::io;
use std::os::fd::OwnedFd;
use std::process::Stdio;

use tokio::net::unix::pipe;
use tokio::process::{Child, Command};

use crate::error::ExecError;

/// Program and arguments of the supervised command. Fixed for the lifetime of
/// a reader; every relaunch runs exactly this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
	pub program: String,
	pub args: Vec<String>,
}

impl CommandLine {
	pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			program: program.into(),
			args: args.into_iter().map(Into::into).collect(),
		}
	}

	/// Runs `script` through `sh -c`.
	pub fn shell(script: impl Into<String>) -> Self {
		Self::new("sh", ["-c".to_string(), script.into()])
	}
}

impl fmt::Display for CommandLine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.program)?;
		for arg in &self.args {
			write!(f, " {}", arg)?;
		}
		Ok(())
	}
}

/// A launched child together with the read end of its output pipe.
pub(crate) struct RunningProcess {
	pub child: Child,
	pub output: pipe::Receiver,
	pub pid: u32,
}

/// Starts `command` with stdout and stderr sharing one pipe, so output
/// interleaves the way it would on a terminal. The child leads its own process
/// group, which lets a forwarded signal reach everything it spawned.
///
/// Must be called from inside a tokio runtime.
pub(crate) fn launch(command: &CommandLine) -> Result<RunningProcess, ExecError> {
	let launch_err = |source: io::Error| ExecError::Launch {
		command: command.to_string(),
		source,
	};

	let (read_end, write_end) = io::pipe().map_err(launch_err)?;
	let stderr_end = write_end.try_clone().map_err(launch_err)?;

	let mut cmd = Command::new(&command.program);
	cmd.args(&command.args)
		.stdin(Stdio::null())
		.stdout(Stdio::from(write_end))
		.stderr(Stdio::from(stderr_end))
		.process_group(0);

	let child = cmd.spawn().map_err(launch_err)?;
	// Our copies of the write end must go, or the pipe never reports EOF.
	drop(cmd);

	let output = pipe::Receiver::from_owned_fd(OwnedFd::from(read_end)).map_err(launch_err)?;
	let pid = child.id().unwrap_or(0);

	Ok(RunningProcess { child, output, pid })
}
