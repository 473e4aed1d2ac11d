use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::sync::{watch, Notify};

/// Signals the bridge knows how to forward to a supervised command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
	Interrupt,
	Terminate,
	HangUp,
}

impl From<StopSignal> for Signal {
	fn from(sig: StopSignal) -> Self {
		match sig {
			StopSignal::Interrupt => Signal::SIGINT,
			StopSignal::Terminate => Signal::SIGTERM,
			StopSignal::HangUp => Signal::SIGHUP,
		}
	}
}

impl TryFrom<Signal> for StopSignal {
	type Error = Signal;

	fn try_from(sig: Signal) -> Result<Self, Self::Error> {
		match sig {
			Signal::SIGINT => Ok(StopSignal::Interrupt),
			Signal::SIGTERM => Ok(StopSignal::Terminate),
			Signal::SIGHUP => Ok(StopSignal::HangUp),
			other => Err(other),
		}
	}
}

impl std::fmt::Display for StopSignal {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(Signal::from(*self).as_str())
	}
}

const NO_PID: u32 = 0;

/// State touched by both the reader and `kill` callers. Everything here is
/// atomic so `kill` never has to wait for the reader.
#[derive(Debug, Default)]
pub(crate) struct Shared {
	killed: AtomicBool,
	signal: AtomicI32,
	pid: AtomicU32,
	wake: Notify,
}

impl Shared {
	pub(crate) fn is_killed(&self) -> bool {
		self.killed.load(Ordering::SeqCst)
	}

	/// Publishes a freshly launched child. If a kill landed while the child was
	/// being spawned it never saw this pid, so the signal is sent here instead.
	pub(crate) fn register(&self, pid: u32) {
		self.pid.store(pid, Ordering::SeqCst);
		if self.is_killed() {
			if let Ok(sig) = Signal::try_from(self.signal.load(Ordering::SeqCst)) {
				deliver(pid, sig);
			}
		}
	}

	pub(crate) fn unregister(&self) {
		self.pid.store(NO_PID, Ordering::SeqCst);
	}

	/// Resolves once the kill flag is set.
	pub(crate) async fn killed(&self) {
		loop {
			let notified = self.wake.notified();
			if self.is_killed() {
				return;
			}
			notified.await;
		}
	}
}

fn deliver(pid: u32, sig: Signal) {
	// ESRCH just means the group is already gone.
	let _ = killpg(Pid::from_raw(pid as i32), sig);
}

/// Handle used to stop a supervised command from any thread.
///
/// Killing is sticky: once requested, the reader never relaunches the command
/// again and reports end-of-stream instead of a failure.
#[derive(Debug, Clone)]
pub struct KillHandle {
	shared: Arc<Shared>,
}

impl KillHandle {
	pub(crate) fn new(shared: Arc<Shared>) -> Self {
		Self { shared }
	}

	pub fn kill(&self, signal: StopSignal) {
		let sig = Signal::from(signal);
		self.shared.signal.store(sig as i32, Ordering::SeqCst);
		self.shared.killed.store(true, Ordering::SeqCst);
		self.shared.wake.notify_waiters();

		let pid = self.shared.pid.load(Ordering::SeqCst);
		if pid != NO_PID {
			deliver(pid, sig);
		}
	}

	pub fn is_killed(&self) -> bool {
		self.shared.is_killed()
	}
}

/// Creates a cancellation channel. Sending `true` (or calling [`Cancel::cancel`])
/// makes the reader stop at its next suspension point.
pub fn cancellation() -> (Cancel, watch::Receiver<bool>) {
	let (tx, rx) = watch::channel(false);
	(Cancel { tx }, rx)
}

#[derive(Debug, Clone)]
pub struct Cancel {
	tx: watch::Sender<bool>,
}

impl Cancel {
	pub fn cancel(&self) {
		self.tx.send_replace(true);
	}
}

/// Resolves once `rx` holds `true`. A closed channel never cancels.
pub(crate) async fn cancelled(rx: &mut watch::Receiver<bool>) {
	if rx.wait_for(|cancelled| *cancelled).await.is_err() {
		std::future::pending::<()>().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[test]
	fn stop_signal_names() {
		assert_eq!(StopSignal::Interrupt.to_string(), "SIGINT");
		assert_eq!(StopSignal::Terminate.to_string(), "SIGTERM");
		assert_eq!(StopSignal::HangUp.to_string(), "SIGHUP");
		assert_eq!(StopSignal::try_from(Signal::SIGHUP), Ok(StopSignal::HangUp));
		assert!(StopSignal::try_from(Signal::SIGUSR1).is_err());
	}

	#[test]
	fn kill_is_sticky_and_idempotent() {
		let shared = Arc::new(Shared::default());
		let handle = KillHandle::new(Arc::clone(&shared));
		assert!(!handle.is_killed());

		handle.kill(StopSignal::Terminate);
		handle.kill(StopSignal::Terminate);
		handle.clone().kill(StopSignal::Interrupt);
		assert!(shared.is_killed());
	}

	#[test]
	fn kill_without_child_does_not_signal() {
		let shared = Arc::new(Shared::default());
		KillHandle::new(Arc::clone(&shared)).kill(StopSignal::HangUp);
		assert_eq!(shared.pid.load(Ordering::SeqCst), NO_PID);
	}

	#[test]
	fn kill_before_register_reaches_new_child() {
		use std::os::unix::process::{CommandExt, ExitStatusExt};
		use std::time::Instant;

		let shared = Arc::new(Shared::default());
		KillHandle::new(Arc::clone(&shared)).kill(StopSignal::Terminate);

		let mut child = std::process::Command::new("sleep")
			.arg("30")
			.process_group(0)
			.spawn()
			.unwrap();
		shared.register(child.id());

		let deadline = Instant::now() + Duration::from_secs(5);
		let status = loop {
			if let Some(status) = child.try_wait().unwrap() {
				break status;
			}
			if Instant::now() > deadline {
				let _ = child.kill();
				panic!("child outlived a pending kill");
			}
			std::thread::sleep(Duration::from_millis(10));
		};
		assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
	}

	#[tokio::test]
	async fn killed_wakes_waiter() {
		let shared = Arc::new(Shared::default());
		let handle = KillHandle::new(Arc::clone(&shared));

		let waiter = tokio::spawn({
			let shared = Arc::clone(&shared);
			async move { shared.killed().await }
		});
		tokio::time::sleep(Duration::from_millis(20)).await;
		handle.kill(StopSignal::Terminate);

		tokio::time::timeout(Duration::from_secs(1), waiter)
			.await
			.expect("waiter woke")
			.unwrap();
	}

	#[tokio::test]
	async fn killed_resolves_when_already_set() {
		let shared = Arc::new(Shared::default());
		KillHandle::new(Arc::clone(&shared)).kill(StopSignal::Interrupt);
		tokio::time::timeout(Duration::from_millis(100), shared.killed())
			.await
			.expect("already killed");
	}

	#[tokio::test]
	async fn cancellation_fires_and_dropped_sender_never_does() {
		let (cancel, mut rx) = cancellation();
		cancel.cancel();
		tokio::time::timeout(Duration::from_millis(100), cancelled(&mut rx))
			.await
			.expect("cancelled");

		let (cancel, mut rx) = cancellation();
		drop(cancel);
		let res = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut rx)).await;
		assert!(res.is_err());
	}
}
