//! Length-prefixed postcard framing.

use std::io::{ErrorKind, Read, Write};

use procdb_invocation::TransportError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Largest accepted frame body, in bytes.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Encodes `msg` and writes it as one frame. Does not flush.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> Result<(), TransportError> {
	let buf = postcard::to_allocvec(msg).map_err(|e| TransportError::Codec(e.to_string()))?;
	let len = u32::try_from(buf.len())
		.ok()
		.filter(|len| *len <= MAX_FRAME_LEN)
		.ok_or_else(|| TransportError::Codec(format!("frame of {} bytes exceeds limit", buf.len())))?;
	writer.write_all(&len.to_le_bytes())?;
	writer.write_all(&buf)?;
	Ok(())
}

/// Reads one frame.
///
/// Returns `Ok(None)` when the stream ends before a length prefix, which is
/// how a peer that exited cleanly looks. A stream that ends inside a frame is
/// [`TransportError::Disconnected`].
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>, TransportError> {
	let mut prefix = [0u8; 4];
	match reader.read_exact(&mut prefix) {
		Ok(()) => {}
		Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
		Err(e) => return Err(e.into()),
	}
	let len = u32::from_le_bytes(prefix);
	if len > MAX_FRAME_LEN {
		return Err(TransportError::Protocol(format!("frame length {len} exceeds limit")));
	}
	let mut buf = vec![0u8; len as usize];
	reader.read_exact(&mut buf).map_err(|e| match e.kind() {
		ErrorKind::UnexpectedEof => TransportError::Disconnected,
		_ => e.into(),
	})?;
	postcard::from_bytes(&buf).map(Some).map_err(|e| TransportError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use procdb_invocation::{Arg, ArgKind, ArgList, ProcDecl, ProcKind};

	use super::*;
	use crate::wire::WireMessage;

	#[test]
	fn frames_are_length_prefixed_and_sequential() {
		let run = WireMessage::ProcRun {
			name: "demo-sum".into(),
			args: vec![Arg::Int32(2), Arg::int32_array(vec![3, 4])].into(),
		};
		let install = WireMessage::ProcInstall(ProcDecl::new("demo-temp", ProcKind::Temporary).arg("x", ArgKind::Float, ""));

		let mut buf = Vec::new();
		write_frame(&mut buf, &run).unwrap();
		let first_len = u32::from_le_bytes(buf[..4].try_into().unwrap()) as usize;
		assert_eq!(buf.len(), 4 + first_len);
		write_frame(&mut buf, &install).unwrap();
		write_frame(&mut buf, &WireMessage::Quit).unwrap();

		let mut reader = Cursor::new(buf);
		assert_eq!(read_frame::<_, WireMessage>(&mut reader).unwrap(), Some(run));
		assert_eq!(read_frame::<_, WireMessage>(&mut reader).unwrap(), Some(install));
		assert_eq!(read_frame::<_, WireMessage>(&mut reader).unwrap(), Some(WireMessage::Quit));
		assert_eq!(read_frame::<_, WireMessage>(&mut reader).unwrap(), None);
	}

	#[test]
	fn truncated_body_is_a_disconnect() {
		let mut buf = Vec::new();
		let values: ArgList = vec![Arg::string("long enough to truncate")].into();
		write_frame(&mut buf, &WireMessage::ProcReturn { values }).unwrap();
		buf.truncate(buf.len() - 3);

		let err = read_frame::<_, WireMessage>(&mut Cursor::new(buf)).unwrap_err();
		assert!(matches!(err, TransportError::Disconnected));
	}

	#[test]
	fn oversized_prefix_is_rejected() {
		let buf = (MAX_FRAME_LEN + 1).to_le_bytes().to_vec();
		let err = read_frame::<_, WireMessage>(&mut Cursor::new(buf)).unwrap_err();
		assert!(matches!(err, TransportError::Protocol(_)));
	}

	#[test]
	fn garbage_body_is_a_codec_error() {
		let mut buf = 2u32.to_le_bytes().to_vec();
		buf.extend_from_slice(&[0xff, 0xff]);
		let err = read_frame::<_, WireMessage>(&mut Cursor::new(buf)).unwrap_err();
		assert!(matches!(err, TransportError::Codec(_)));
	}
}
