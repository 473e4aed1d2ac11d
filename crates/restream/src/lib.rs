//! # restream
//!
//! Turn a command's output into one continuous byte stream.
//!
//! [`ExecReader`] launches a command with stdout and stderr merged into a
//! single pipe and implements [`std::io::Read`] over it. When the command
//! exits cleanly it is relaunched after a fixed delay, so a line-oriented
//! consumer can keep reading without knowing a process is being supervised.
//! A nonzero exit ends the stream with an error that carries the exit code
//! and the first bytes the command printed. A [`KillHandle`] forwards stop
//! signals from any thread and turns the stream's end into plain EOF.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::io::{BufRead, BufReader};
//! use restream::{CommandLine, ExecReader, StopSignal};
//!
//! let reader = ExecReader::builder(CommandLine::new("tail", ["-f", "/var/log/syslog"]))
//!     .restart_on_close(true)
//!     .start()
//!     .unwrap();
//!
//! let killer = reader.kill_handle();
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!     killer.kill(StopSignal::Terminate);
//! });
//!
//! for line in BufReader::new(reader).lines() {
//!     println!("{}", line.unwrap());
//! }
//! ```

pub mod config;
pub mod error;
pub mod launcher;
pub mod signal;
pub mod supervisor;
pub mod tail;

pub use config::ExecConfig;
pub use error::ExecError;
pub use launcher::CommandLine;
pub use signal::{cancellation, Cancel, KillHandle, StopSignal};
pub use supervisor::{ExecBuilder, ExecReader};
pub use tail::OutputTail;
