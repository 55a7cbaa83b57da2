//! Query phase: collecting the declarations an executable announces.

use std::path::Path;

use procdb_invocation::{ProcDecl, TransportError};
use tracing::{debug, warn};

use crate::connection::spawn;
use crate::wire::WireMessage;

/// Runs the announcement phase of the executable at `path`.
///
/// Spawns it with the query flag, sends `Query` and collects every
/// `ProcInstall` until `Quit` or end of stream.
pub fn query_extension(path: &Path, args: &[String]) -> Result<Vec<ProcDecl>, TransportError> {
	let (mut child, channel) = spawn(path, args, crate::QUERY_FLAG)?;
	let result = collect(&channel);
	drop(channel);
	match child.wait() {
		Ok(status) if !status.success() => warn!(path = %path.display(), %status, "extension query exited with failure"),
		Ok(_) => {}
		Err(err) => warn!(path = %path.display(), error = %err, "failed to wait on extension"),
	}
	let decls = result?;
	debug!(path = %path.display(), procedures = decls.len(), "queried extension");
	Ok(decls)
}

fn collect(channel: &crate::Channel) -> Result<Vec<ProcDecl>, TransportError> {
	channel.send(&WireMessage::Query)?;
	let mut decls = Vec::new();
	loop {
		match channel.recv()? {
			Some(WireMessage::ProcInstall(decl)) => decls.push(decl),
			Some(WireMessage::Quit) | None => return Ok(decls),
			Some(other) => {
				return Err(TransportError::Protocol(format!("unexpected {} during query", other.label())));
			}
		}
	}
}
