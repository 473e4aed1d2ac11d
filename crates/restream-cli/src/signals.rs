use restream::{Cancel, KillHandle, StopSignal};
use std::io;
use tokio::signal::unix::{signal, SignalKind};

/// Forwards SIGINT, SIGTERM and SIGHUP to the supervised command. A second
/// signal also cancels the reader, for children that ignore the first one.
///
/// Handlers are installed before this returns, so no signal sent afterwards
/// falls through to the default disposition.
pub fn forward(killer: KillHandle, cancel: Cancel) -> io::Result<()> {
	let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

	let (mut interrupt, mut terminate, mut hangup) = {
		let _guard = runtime.enter();
		(
			signal(SignalKind::interrupt())?,
			signal(SignalKind::terminate())?,
			signal(SignalKind::hangup())?,
		)
	};

	std::thread::Builder::new().name("restream-signals".into()).spawn(move || {
		runtime.block_on(async move {
			let mut received = 0u32;
			loop {
				let sig = tokio::select! {
					Some(()) = interrupt.recv() => StopSignal::Interrupt,
					Some(()) = terminate.recv() => StopSignal::Terminate,
					Some(()) = hangup.recv() => StopSignal::HangUp,
					else => break,
				};
				received += 1;
				tracing::warn!(signal = %sig, "received signal");
				killer.kill(sig);
				if received > 1 {
					tracing::debug!("cancelling reader");
					cancel.cancel();
				}
			}
		})
	})?;

	Ok(())
}
