use crate::processor::{Item, Output, Timestamp};
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Writes one formatted line per item:
/// `<ts> | <app> | [<level>] (<format>) {{<category>}} <message>`
pub struct DefaultOutput<W: Write> {
	out: W,
	color: bool,
}

impl<W: Write> DefaultOutput<W> {
	pub fn new(out: W, color: bool) -> Self {
		Self { out, color }
	}

	pub fn into_inner(self) -> W {
		self.out
	}

	fn level(&self, level: &str) -> String {
		let tag = format!("[{}]", level);
		if !self.color {
			return tag;
		}
		match level.to_ascii_lowercase().as_str() {
			"error" | "fatal" | "critical" | "panic" => tag.red().to_string(),
			"warn" | "warning" => tag.yellow().to_string(),
			"info" => tag.green().to_string(),
			"debug" | "trace" => tag.dimmed().to_string(),
			_ => tag,
		}
	}
}

pub fn format_item(item: &Item, level: &str) -> String {
	let meta = &item.metadata;
	let mut out = String::new();

	if let Some(ts) = &meta.timestamp {
		out.push_str(&format_timestamp(ts));
		out.push(' ');
	}
	if let Some(app) = meta.application.as_deref().filter(|a| !a.is_empty()) {
		out.push_str(&format!("| {} | ", app));
	}
	out.push_str(level);
	out.push(' ');
	if let Some(format) = meta.format.as_deref().filter(|f| !f.is_empty()) {
		out.push_str(&format!("({}) ", format));
	}
	if let Some(category) = meta.category.as_deref().filter(|c| !c.is_empty()) {
		out.push_str(&format!("{{{{{}}}}} ", category));
	}

	if let Some(msg) = meta.message.as_deref().filter(|m| !m.is_empty()) {
		out.push_str(msg);
	} else if !item.line.is_empty() {
		out.push_str(&item.line);
	} else if !item.data.is_empty() {
		out.push_str("| ");
		out.push_str(&serde_json::Value::Object(item.data.clone()).to_string());
	}
	out
}

impl<W: Write> Output for DefaultOutput<W> {
	fn on_item(&mut self, item: &Item) -> io::Result<bool> {
		let level = item.metadata.level.as_deref().filter(|l| !l.is_empty()).unwrap_or("unknown");
		let line = format_item(item, &self.level(level));
		writeln!(self.out, "{}", line)?;
		Ok(true)
	}

	fn on_flush(&mut self) -> io::Result<()> {
		self.out.flush()
	}

	fn on_close(&mut self) -> io::Result<()> {
		Ok(())
	}
}

pub fn format_timestamp(ts: &Timestamp) -> String {
	match ts {
		Timestamp::Text(s) => s.clone(),
		Timestamp::Epoch(v) if !v.is_finite() || *v < 0.0 => v.to_string(),
		Timestamp::Epoch(v) => {
			// Values this large can only be milliseconds.
			let millis = if *v > 1e11 { *v } else { *v * 1000.0 };
			let millis = millis.round() as u64;
			let (year, month, day, hour, minute, second) = secs_to_datetime(millis / 1000);
			format!(
				"{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
				year,
				month,
				day,
				hour,
				minute,
				second,
				millis % 1000
			)
		}
	}
}

/// Civil UTC date and time for seconds since the unix epoch.
pub fn secs_to_datetime(secs: u64) -> (u32, u32, u32, u32, u32, u32) {
	let days = (secs / 86400) as i64;
	let time_of_day = secs % 86400;
	let hour = (time_of_day / 3600) as u32;
	let minute = ((time_of_day % 3600) / 60) as u32;
	let second = (time_of_day % 60) as u32;

	let z = days + 719468;
	let era = if z >= 0 { z } else { z - 146096 } / 146097;
	let doe = (z - era * 146097) as u32;
	let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
	let y = yoe as i64 + era * 400;
	let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
	let mp = (5 * doy + 2) / 153;
	let d = doy - (153 * mp + 2) / 5 + 1;
	let m = if mp < 10 { mp + 3 } else { mp - 9 };
	let y = if m <= 2 { y + 1 } else { y };

	(y as u32, m, d, hour, minute, second)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::processor::Metadata;

	fn render(item: &Item) -> String {
		let mut output = DefaultOutput::new(Vec::new(), false);
		assert!(output.on_item(item).unwrap());
		String::from_utf8(output.into_inner()).unwrap()
	}

	#[test]
	fn plain_line() {
		let item = Item {
			line: "hello".into(),
			..Default::default()
		};
		assert_eq!(render(&item), "[unknown] hello\n");
	}

	#[test]
	fn all_fields() {
		let item = Item {
			line: String::new(),
			data: Default::default(),
			metadata: Metadata {
				level: Some("info".into()),
				message: Some("started".into()),
				timestamp: Some(Timestamp::Text("yesterday".into())),
				application: Some("api".into()),
				category: Some("http".into()),
				format: Some("json".into()),
			},
		};
		assert_eq!(render(&item), "yesterday | api | [info] (json) {{http}} started\n");
	}

	#[test]
	fn data_without_message() {
		let mut data = serde_json::Map::new();
		data.insert("a".into(), serde_json::json!(1));
		let item = Item {
			data,
			..Default::default()
		};
		assert_eq!(render(&item), "[unknown] | {\"a\":1}\n");
	}

	#[test]
	fn epoch_seconds_and_millis() {
		assert_eq!(format_timestamp(&Timestamp::Epoch(0.0)), "1970-01-01 00:00:00.000");
		assert_eq!(format_timestamp(&Timestamp::Epoch(1_700_000_000.25)), "2023-11-14 22:13:20.250");
		assert_eq!(format_timestamp(&Timestamp::Epoch(1_700_000_000_123.0)), "2023-11-14 22:13:20.123");
		assert_eq!(format_timestamp(&Timestamp::Epoch(-5.0)), "-5");
	}

	#[test]
	fn leap_day() {
		// 2024-02-29 12:34:56 UTC
		assert_eq!(secs_to_datetime(1_709_210_096), (2024, 2, 29, 12, 34, 56));
	}

	#[test]
	fn colored_level() {
		let output = DefaultOutput::new(Vec::new(), true);
		let level = output.level("error");
		assert!(level.contains("[error]"));
		assert_ne!(level, "[error]");
		assert_eq!(output.level("custom"), "[custom]");
	}
}
