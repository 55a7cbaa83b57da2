//! Framed message channel over a byte stream pair.

use std::fmt;
use std::io::{BufReader, BufWriter, Read, Write};

use parking_lot::Mutex;
use procdb_invocation::TransportError;

use crate::frame::{read_frame, write_frame};
use crate::wire::WireMessage;

type Reader = BufReader<Box<dyn Read + Send>>;
type Writer = BufWriter<Box<dyn Write + Send>>;

/// Bidirectional frame channel over a byte reader and writer.
///
/// Reading and writing lock independently, and each lock is held for one
/// frame only.
pub struct Channel {
	reader: Mutex<Reader>,
	writer: Mutex<Writer>,
}

impl Channel {
	/// Wraps a reader and writer pair.
	pub fn new(reader: impl Read + Send + 'static, writer: impl Write + Send + 'static) -> Self {
		Self {
			reader: Mutex::new(BufReader::new(Box::new(reader))),
			writer: Mutex::new(BufWriter::new(Box::new(writer))),
		}
	}

	/// Channel over this process's stdin and stdout.
	pub fn stdio() -> Self {
		Self::new(std::io::stdin(), std::io::stdout())
	}

	/// Writes and flushes one message.
	pub fn send(&self, msg: &WireMessage) -> Result<(), TransportError> {
		tracing::trace!(msg = msg.label(), "send");
		let mut writer = self.writer.lock();
		write_frame(&mut *writer, msg)?;
		writer.flush()?;
		Ok(())
	}

	/// Reads one message; `None` once the peer has closed the stream.
	pub fn recv(&self) -> Result<Option<WireMessage>, TransportError> {
		let msg: Option<WireMessage> = read_frame(&mut *self.reader.lock())?;
		if let Some(msg) = &msg {
			tracing::trace!(msg = msg.label(), "recv");
		}
		Ok(msg)
	}

	/// Like [`Channel::recv`], treating end of stream as a disconnect.
	pub fn expect(&self) -> Result<WireMessage, TransportError> {
		self.recv()?.ok_or(TransportError::Disconnected)
	}
}

impl fmt::Debug for Channel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Channel").finish_non_exhaustive()
	}
}
