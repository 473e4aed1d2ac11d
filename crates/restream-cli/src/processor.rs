use crate::plugins::{strip_ansi, Plugin};
use serde_json::{Map, Value};
use std::io::{self, BufRead, BufReader, Read};

#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
	/// Seconds or milliseconds since the unix epoch, as found in the source.
	Epoch(f64),
	Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
	pub level: Option<String>,
	pub message: Option<String>,
	pub timestamp: Option<Timestamp>,
	pub application: Option<String>,
	pub category: Option<String>,
	pub format: Option<String>,
}

/// One unit of processed output. Structured lines move their content from
/// `line` into `data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
	pub line: String,
	pub data: Map<String, Value>,
	pub metadata: Metadata,
}

pub trait Output {
	/// Returns false to stop processing.
	fn on_item(&mut self, item: &Item) -> io::Result<bool>;
	fn on_flush(&mut self) -> io::Result<()>;
	fn on_close(&mut self) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct Processor {
	plugins: Vec<Plugin>,
	application: Option<String>,
	start_line: usize,
	line_amount: usize,
}

impl Processor {
	pub fn new(plugins: Vec<Plugin>) -> Self {
		Self {
			plugins,
			..Default::default()
		}
	}

	pub fn application(mut self, application: Option<String>) -> Self {
		self.application = application;
		self
	}

	/// Skips the first `start` lines (0 = first line) and stops after
	/// `amount` lines (0 = all).
	pub fn lines(mut self, start: usize, amount: usize) -> Self {
		self.start_line = start;
		self.line_amount = amount;
		self
	}

	fn enabled(&self, plugin: Plugin) -> bool {
		self.plugins.contains(&plugin)
	}

	pub fn process<R: Read, O: Output>(&self, source: R, output: &mut O) -> io::Result<()> {
		let result = self.run(source, output);
		output.on_flush()?;
		output.on_close()?;
		result
	}

	fn run<R: Read, O: Output>(&self, source: R, output: &mut O) -> io::Result<()> {
		let mut reader = BufReader::new(source);
		let mut buf = Vec::new();
		let mut line_no = 0;
		let mut taken = 0;
		let mut consolidated: Option<Vec<String>> = self.enabled(Plugin::ConsolidateLines).then(Vec::new);

		loop {
			if self.line_amount > 0 && taken >= self.line_amount {
				break;
			}
			buf.clear();
			// Relaunches of a supervised command arrive as Interrupted and
			// are retried by read_until.
			if reader.read_until(b'\n', &mut buf)? == 0 {
				break;
			}
			line_no += 1;
			if line_no <= self.start_line {
				continue;
			}
			taken += 1;

			let mut line = String::from_utf8_lossy(&buf).trim_end_matches(['\r', '\n']).to_string();
			if self.enabled(Plugin::AnsiEscape) {
				line = strip_ansi(&line);
			}

			match consolidated.as_mut() {
				Some(lines) => lines.push(line),
				None => {
					if !output.on_item(&self.item(line))? {
						return Ok(());
					}
				}
			}
		}

		if let Some(lines) = consolidated {
			if !lines.is_empty() {
				output.on_item(&self.item(lines.join("\n")))?;
			}
		}
		Ok(())
	}

	fn item(&self, line: String) -> Item {
		let mut item = Item {
			line,
			..Default::default()
		};
		if self.enabled(Plugin::Json) {
			parse_json(&mut item);
		}
		if let Some(app) = &self.application {
			item.metadata.application = Some(app.clone());
		}
		item
	}
}

/// Extracts well-known fields from a line holding a JSON object.
fn parse_json(item: &mut Item) {
	let trimmed = item.line.trim();
	if !trimmed.starts_with('{') {
		return;
	}
	let Ok(data) = serde_json::from_str::<Map<String, Value>>(trimmed) else {
		return;
	};

	let text = |keys: &[&str]| {
		keys.iter().find_map(|k| match data.get(*k) {
			Some(Value::String(s)) => Some(s.clone()),
			Some(Value::Number(n)) => Some(n.to_string()),
			_ => None,
		})
	};

	let meta = &mut item.metadata;
	meta.level = text(&["level"]);
	meta.message = text(&["message", "msg"]);
	meta.application = text(&["application", "app"]);
	meta.category = text(&["category", "logger"]);
	meta.timestamp = ["timestamp", "time", "ts"].iter().find_map(|k| match data.get(*k) {
		Some(Value::Number(n)) => n.as_f64().map(Timestamp::Epoch),
		Some(Value::String(s)) => Some(Timestamp::Text(s.clone())),
		_ => None,
	});
	meta.format = Some("json".to_string());

	item.line.clear();
	item.data = data;
}
