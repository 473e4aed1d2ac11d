use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
	#[error("error starting command `{command}`: {source}")]
	Launch {
		command: String,
		#[source]
		source: io::Error,
	},

	#[error("error reading command output: {0}")]
	Stream(#[source] io::Error),

	#[error("error executing command `{command}` (exit code: {exit_code}){}", output_excerpt(.output))]
	ProcessFailure {
		command: String,
		exit_code: i32,
		output: Option<String>,
	},

	#[error("command relaunched, read again")]
	Relaunched,

	#[error("command already failed, no more output")]
	Exhausted,
}

fn output_excerpt(output: &Option<String>) -> String {
	match output {
		Some(text) => format!("(output: '{}')", text.trim_end()),
		None => "(output truncated)".to_string(),
	}
}

impl ExecError {
	/// Recovers the `ExecError` carried inside an `io::Error` returned by
	/// [`crate::ExecReader`]'s `Read` implementation.
	pub fn from_io(err: &io::Error) -> Option<&ExecError> {
		err.get_ref().and_then(|inner| inner.downcast_ref::<ExecError>())
	}

	/// Exit code of the failed command, if this is a process failure.
	pub fn exit_code(&self) -> Option<i32> {
		match self {
			ExecError::ProcessFailure { exit_code, .. } => Some(*exit_code),
			_ => None,
		}
	}
}

impl From<ExecError> for io::Error {
	fn from(err: ExecError) -> io::Error {
		let kind = match &err {
			ExecError::Stream(source) => source.kind(),
			ExecError::Launch { source, .. } => source.kind(),
			ExecError::Relaunched => io::ErrorKind::Interrupted,
			_ => io::ErrorKind::Other,
		};
		io::Error::new(kind, err)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn failure_message_carries_code_and_output() {
		let err = ExecError::ProcessFailure {
			command: "sh -c exit 2".into(),
			exit_code: 2,
			output: Some("boom\n".into()),
		};
		let msg = err.to_string();
		assert!(msg.contains("exit code: 2"), "{msg}");
		assert!(msg.contains("'boom'"), "{msg}");
	}

	#[test]
	fn failure_message_without_output() {
		let err = ExecError::ProcessFailure {
			command: "noisy".into(),
			exit_code: 1,
			output: None,
		};
		assert!(err.to_string().ends_with("(output truncated)"));
	}

	#[test]
	fn survives_io_error_round_trip() {
		let io_err: io::Error = ExecError::ProcessFailure {
			command: "x".into(),
			exit_code: 3,
			output: None,
		}
		.into();
		assert_eq!(io_err.kind(), io::ErrorKind::Other);
		let inner = ExecError::from_io(&io_err).expect("exec error inside");
		assert_eq!(inner.exit_code(), Some(3));
	}

	#[test]
	fn relaunch_reads_as_interrupted() {
		let io_err: io::Error = ExecError::Relaunched.into();
		assert_eq!(io_err.kind(), io::ErrorKind::Interrupted);
	}

	#[test]
	fn stream_error_keeps_kind() {
		let io_err: io::Error =
			ExecError::Stream(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).into();
		assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
		assert!(matches!(ExecError::from_io(&io_err), Some(ExecError::Stream(_))));
	}
}
