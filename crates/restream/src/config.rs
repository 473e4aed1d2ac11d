use std::time::Duration;

use serde::Deserialize;

use crate::tail::DEFAULT_TAIL_CAPACITY;

/// Restart policy and diagnostics settings for an [`crate::ExecReader`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecConfig {
	/// Relaunch the command after it exits cleanly. When off, the first exit
	/// ends the stream.
	#[serde(default = "default_true")]
	pub restart_on_close: bool,
	#[serde(
		default = "default_restart_delay",
		rename = "restart_delay_ms",
		deserialize_with = "duration_from_millis"
	)]
	pub restart_delay: Duration,
	/// Must be at least one byte, or every failure would read as truncated.
	#[serde(default = "default_tail_capacity", deserialize_with = "nonzero_capacity")]
	pub tail_capacity: usize,
}

impl Default for ExecConfig {
	fn default() -> Self {
		Self {
			restart_on_close: true,
			restart_delay: default_restart_delay(),
			tail_capacity: default_tail_capacity(),
		}
	}
}

fn default_true() -> bool { true }
fn default_restart_delay() -> Duration { Duration::from_secs(5) }
fn default_tail_capacity() -> usize { DEFAULT_TAIL_CAPACITY }

fn duration_from_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
	D: serde::Deserializer<'de>,
{
	u64::deserialize(deserializer).map(Duration::from_millis)
}

fn nonzero_capacity<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let capacity = usize::deserialize(deserializer)?;
	if capacity == 0 {
		return Err(serde::de::Error::invalid_value(
			serde::de::Unexpected::Unsigned(0),
			&"a tail capacity of at least one byte",
		));
	}
	Ok(capacity)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::de::value::{Error as ValueError, MapDeserializer};

	#[test]
	fn defaults() {
		let cfg = ExecConfig::default();
		assert!(cfg.restart_on_close);
		assert_eq!(cfg.restart_delay, Duration::from_secs(5));
		assert_eq!(cfg.tail_capacity, 200);
	}

	#[test]
	fn deserializes_partial_map() {
		let entries = vec![("restart_delay_ms", 250u64)];
		let cfg = ExecConfig::deserialize(MapDeserializer::<_, ValueError>::new(entries.into_iter()))
			.unwrap();
		assert_eq!(cfg.restart_delay, Duration::from_millis(250));
		assert!(cfg.restart_on_close);
		assert_eq!(cfg.tail_capacity, 200);
	}

	#[test]
	fn rejects_zero_tail_capacity() {
		let entries = vec![("tail_capacity", 0u64)];
		let err = ExecConfig::deserialize(MapDeserializer::<_, ValueError>::new(entries.into_iter()))
			.unwrap_err();
		assert!(err.to_string().contains("at least one byte"), "{err}");

		let entries = vec![("tail_capacity", 1u64)];
		let cfg = ExecConfig::deserialize(MapDeserializer::<_, ValueError>::new(entries.into_iter()))
			.unwrap();
		assert_eq!(cfg.tail_capacity, 1);
	}
}
