/// Default number of bytes kept from the start of each run.
pub const DEFAULT_TAIL_CAPACITY: usize = 200;

/// Bounded capture of a run's first bytes, used to give failure messages some
/// context. Once full, further bytes are dropped.
#[derive(Debug, Clone)]
pub struct OutputTail {
	buf: Vec<u8>,
	capacity: usize,
}

impl OutputTail {
	pub fn new(capacity: usize) -> Self {
		Self {
			buf: Vec::with_capacity(capacity),
			capacity,
		}
	}

	pub fn append(&mut self, data: &[u8]) {
		let room = self.capacity - self.buf.len();
		let take = data.len().min(room);
		self.buf.extend_from_slice(&data[..take]);
	}

	pub fn reset(&mut self) {
		self.buf.clear();
	}

	pub fn len(&self) -> usize {
		self.buf.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	pub fn is_full(&self) -> bool {
		self.buf.len() >= self.capacity
	}

	/// Captured text, or `None` when the buffer filled up. A full buffer means
	/// output was cut, and a cut excerpt is left out of messages entirely.
	pub fn render(&self) -> Option<String> {
		if self.is_full() {
			return None;
		}
		Some(String::from_utf8_lossy(&self.buf).into_owned())
	}
}

impl Default for OutputTail {
	fn default() -> Self {
		Self::new(DEFAULT_TAIL_CAPACITY)
	}
}
