use std::io::{self, Read};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::{debug, error, warn, Dispatch};

use crate::config::ExecConfig;
use crate::error::ExecError;
use crate::launcher::{self, CommandLine, RunningProcess};
use crate::signal::{self, KillHandle, Shared};
use crate::tail::OutputTail;

/// Where the reader currently is in the supervision cycle.
enum State {
	/// Child alive, bytes flow to the caller.
	Running(RunningProcess),
	/// Output hit EOF, waiting on the exit status.
	Draining(Child),
	/// Waiting out the restart delay before relaunching.
	Backoff,
	/// Terminal. Reads return EOF.
	Stopped,
	/// Terminal. The failure was already reported once.
	Failed,
}

impl State {
	fn name(&self) -> &'static str {
		match self {
			State::Running(_) => "running",
			State::Draining(_) => "draining",
			State::Backoff => "backoff",
			State::Stopped => "stopped",
			State::Failed => "failed",
		}
	}
}

/// What a finished run turns into once the kill flag and restart policy have
/// been consulted.
#[derive(Debug, PartialEq, Eq)]
enum ExitAction {
	Stop,
	Restart,
	Fail(i32),
}

/// The decision table for a run that reached EOF. A requested stop always wins
/// over a failure.
fn classify(killed: bool, exit_code: Option<i32>, restart_on_close: bool) -> ExitAction {
	if killed {
		return ExitAction::Stop;
	}
	match exit_code {
		Some(code) if code > 0 => ExitAction::Fail(code),
		_ if restart_on_close => ExitAction::Restart,
		_ => ExitAction::Stop,
	}
}

/// Configures and starts an [`ExecReader`].
pub struct ExecBuilder {
	command: CommandLine,
	config: ExecConfig,
	cancel: Option<watch::Receiver<bool>>,
	logger: Dispatch,
}

impl ExecBuilder {
	pub fn new(command: CommandLine) -> Self {
		Self {
			command,
			config: ExecConfig::default(),
			cancel: None,
			logger: Dispatch::none(),
		}
	}

	pub fn with_config(mut self, config: ExecConfig) -> Self {
		self.config = config;
		self
	}

	pub fn restart_on_close(mut self, restart: bool) -> Self {
		self.config.restart_on_close = restart;
		self
	}

	pub fn restart_delay(mut self, delay: Duration) -> Self {
		self.config.restart_delay = delay;
		self
	}

	/// Stops the reader at its next suspension point once the channel holds
	/// `true`. The child itself is left alone.
	pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
		self.cancel = Some(cancel);
		self
	}

	/// Where supervision events go. Nothing is logged by default.
	pub fn with_logger(mut self, logger: Dispatch) -> Self {
		self.logger = logger;
		self
	}

	/// Launches the command for the first time. A launch failure is returned
	/// as is and never retried.
	pub fn start(self) -> Result<ExecReader, ExecError> {
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
			.map_err(|source| ExecError::Launch {
				command: self.command.to_string(),
				source,
			})?;

		// With its sender gone this channel can never report a cancellation.
		let cancel = self.cancel.unwrap_or_else(|| watch::channel(false).1);

		let mut supervisor = Supervisor {
			command: self.command,
			tail: OutputTail::new(self.config.tail_capacity),
			config: self.config,
			shared: Arc::new(Shared::default()),
			cancel,
			logger: self.logger,
			state: State::Stopped,
		};
		let run = {
			let _guard = runtime.enter();
			supervisor.launch()?
		};
		supervisor.state = State::Running(run);

		Ok(ExecReader { supervisor, runtime })
	}
}

/// A blocking byte stream over a supervised command's merged stdout/stderr.
///
/// When the command exits cleanly and restarting is enabled, the reader waits
/// out the restart delay and launches it again; the relaunch surfaces as a
/// single `io::ErrorKind::Interrupted` read, which every `std::io` helper
/// retries. A nonzero exit ends the stream with [`ExecError::ProcessFailure`].
/// Stopping through a [`KillHandle`] or the cancellation channel ends it with
/// plain EOF.
///
/// The reader drives its own single-threaded runtime, so it must not be used
/// from inside another tokio runtime. Dropping it does not kill a live child;
/// use [`ExecReader::kill_handle`] first.
pub struct ExecReader {
	// Declared first so the child and pipe are released before the runtime.
	supervisor: Supervisor,
	runtime: Runtime,
}

impl ExecReader {
	pub fn builder(command: CommandLine) -> ExecBuilder {
		ExecBuilder::new(command)
	}

	pub fn kill_handle(&self) -> KillHandle {
		KillHandle::new(Arc::clone(&self.supervisor.shared))
	}

	pub fn command(&self) -> &CommandLine {
		&self.supervisor.command
	}

	/// Output captured from the current run so far.
	pub fn tail(&self) -> &OutputTail {
		&self.supervisor.tail
	}

	pub fn is_finished(&self) -> bool {
		matches!(self.supervisor.state, State::Stopped | State::Failed)
	}
}

impl Read for ExecReader {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let ExecReader { supervisor, runtime } = self;
		runtime.block_on(supervisor.read(buf)).map_err(io::Error::from)
	}
}

struct Supervisor {
	command: CommandLine,
	config: ExecConfig,
	tail: OutputTail,
	shared: Arc<Shared>,
	cancel: watch::Receiver<bool>,
	logger: Dispatch,
	state: State,
}

impl Supervisor {
	fn log<T>(&self, f: impl FnOnce() -> T) -> T {
		tracing::dispatcher::with_default(&self.logger, f)
	}

	fn launch(&mut self) -> Result<RunningProcess, ExecError> {
		let run = launcher::launch(&self.command)?;
		self.tail.reset();
		if run.pid != 0 {
			self.shared.register(run.pid);
		}
		self.log(|| debug!(command = %self.command, pid = run.pid, "launched command"));
		Ok(run)
	}

	async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ExecError> {
		// The pipe answers an empty buffer with Ok(0), which is not EOF.
		if buf.is_empty() {
			return Ok(0);
		}
		loop {
			match std::mem::replace(&mut self.state, State::Stopped) {
				State::Running(mut run) => {
					let res = tokio::select! {
						biased;
						_ = signal::cancelled(&mut self.cancel) => {
							self.log(|| debug!(state = "running", "cancelled, leaving command running"));
							return Ok(0);
						}
						res = run.output.read(buf) => res,
					};
					match res {
						Ok(0) => self.state = State::Draining(run.child),
						Ok(n) => {
							self.tail.append(&buf[..n]);
							self.state = State::Running(run);
							return Ok(n);
						}
						// The run stays current and is not relaunched. A pipe
						// read has no error a test can provoke from the child.
						Err(e) => {
							self.state = State::Running(run);
							return Err(ExecError::Stream(e));
						}
					}
				}
				State::Draining(mut child) => {
					let status = tokio::select! {
						biased;
						_ = signal::cancelled(&mut self.cancel) => {
							self.log(|| debug!(state = "draining", "cancelled while waiting for exit"));
							return Ok(0);
						}
						status = child.wait() => status,
					};
					self.shared.unregister();
					match self.on_exit(status) {
						ExitAction::Stop => self.state = State::Stopped,
						ExitAction::Restart => self.state = State::Backoff,
						ExitAction::Fail(exit_code) => {
							self.state = State::Failed;
							return Err(ExecError::ProcessFailure {
								command: self.command.to_string(),
								exit_code,
								output: self.tail.render(),
							});
						}
					}
				}
				State::Backoff => {
					let delay = self.config.restart_delay;
					tokio::select! {
						biased;
						_ = self.shared.killed() => {}
						_ = signal::cancelled(&mut self.cancel) => {
							self.log(|| debug!(state = "backoff", "cancelled, not restarting"));
							return Ok(0);
						}
						_ = tokio::time::sleep(delay) => {}
					}
					if self.shared.is_killed() {
						self.log(|| debug!(state = "backoff", "stop requested, not restarting"));
						continue;
					}
					match self.launch() {
						Ok(run) => {
							self.state = State::Running(run);
							return Err(ExecError::Relaunched);
						}
						Err(e) => {
							self.state = State::Failed;
							return Err(e);
						}
					}
				}
				State::Stopped => return Ok(0),
				State::Failed => {
					self.state = State::Failed;
					return Err(ExecError::Exhausted);
				}
			}
		}
	}

	fn on_exit(&self, status: io::Result<ExitStatus>) -> ExitAction {
		let killed = self.shared.is_killed();
		let exit_code = match &status {
			Ok(status) => status.code(),
			Err(_) => None,
		};
		let action = classify(killed, exit_code, self.config.restart_on_close);

		self.log(|| {
			if killed {
				debug!(command = %self.command, "command stopped on request");
				return;
			}
			match &status {
				Ok(status) if status.code().is_none() => {
					error!(command = %self.command, %status, "command terminated by signal")
				}
				Err(e) => error!(command = %self.command, error = %e, "error waiting for command"),
				Ok(_) => {}
			}
			match action {
				ExitAction::Restart => warn!(
					command = %self.command,
					delay_ms = self.config.restart_delay.as_millis() as u64,
					"exec process disconnecting, running again"
				),
				ExitAction::Stop => debug!(command = %self.command, "command finished"),
				ExitAction::Fail(code) => debug!(command = %self.command, code, "command failed"),
			}
		});

		action
	}
}

impl std::fmt::Debug for ExecReader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ExecReader")
			.field("command", &self.supervisor.command)
			.field("state", &self.supervisor.state.name())
			.field("killed", &self.supervisor.shared.is_killed())
			.finish()
	}
}
