//! One spawned extension process and the conversation with it.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use procdb_invocation::{ArgList, Caller, Host, SessionId, TransportError};
use tracing::{debug, warn};

use crate::channel::Channel;
use crate::temporary::TemporaryBackend;
use crate::wire::WireMessage;

/// Spawns `path` with `args` followed by `flag`, wiring stdin/stdout into a
/// [`Channel`] and forwarding stderr lines to the log.
pub(crate) fn spawn(path: &Path, args: &[String], flag: &str) -> Result<(Child, Channel), TransportError> {
	let mut child = Command::new(path)
		.args(args)
		.arg(flag)
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.map_err(|source| TransportError::Spawn {
			path: path.to_path_buf(),
			source,
		})?;

	let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
		let _ = child.kill();
		let _ = child.wait();
		return Err(TransportError::Protocol("child stdio was not captured".into()));
	};
	if let Some(stderr) = child.stderr.take() {
		let plugin = path.display().to_string();
		std::thread::spawn(move || {
			for line in BufReader::new(stderr).lines() {
				match line {
					Ok(line) => warn!(%plugin, "{line}"),
					Err(_) => break,
				}
			}
		});
	}
	debug!(path = %path.display(), flag, pid = child.id(), "spawned extension");
	Ok((child, Channel::new(stdout, stdin)))
}

/// What ended a conversation.
pub(crate) enum Outcome {
	/// The awaited return arrived.
	Returned(ArgList),
	/// The extension acknowledged and stays resident.
	Acked,
}

/// Which answer the host is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Awaiting {
	ProcReturn,
	TempProcReturn,
}

/// A running extension process bound to a session.
pub(crate) struct Connection {
	pub(crate) path: PathBuf,
	pub(crate) session: SessionId,
	pub(crate) channel: Channel,
	/// Serializes conversations. Re-entrant so that a nested call on the
	/// same thread can reach this process's temporary procedures.
	turn: ReentrantMutex<()>,
	child: Mutex<Option<Child>>,
}

impl Connection {
	pub(crate) fn open(path: &Path, args: &[String], session: SessionId) -> Result<Arc<Self>, TransportError> {
		let (child, channel) = spawn(path, args, crate::RUN_FLAG)?;
		Ok(Arc::new(Self {
			path: path.to_path_buf(),
			session,
			channel,
			turn: ReentrantMutex::new(()),
			child: Mutex::new(Some(child)),
		}))
	}

	/// Sends `request` and serves the extension until the awaited answer arrives.
	///
	/// Nested `ProcRun` requests are dispatched through `host` as the
	/// connection's session; `ProcInstall`/`ProcUninstall` manage the
	/// session's temporary procedures.
	pub(crate) fn converse(self: &Arc<Self>, host: &dyn Host, request: &WireMessage, awaiting: Awaiting) -> Result<Outcome, TransportError> {
		let _turn = self.turn.lock();
		self.channel.send(request)?;
		loop {
			match self.channel.expect()? {
				WireMessage::ProcRun { name, args } => {
					debug!(session = %self.session, %name, "nested call from extension");
					let result = host.execute_as(Caller::Session(self.session), &name, &args);
					self.channel.send(&WireMessage::ProcReturn {
						values: result.into_slots(),
					})?;
				}
				WireMessage::ProcInstall(decl) => {
					let name = decl.name.clone();
					let backend = Arc::new(TemporaryBackend::new(self.clone()));
					match host.install_temporary(self.session, decl, backend) {
						Ok(()) => debug!(session = %self.session, %name, "temporary procedure installed"),
						Err(err) => warn!(session = %self.session, %name, error = %err, "rejected temporary procedure"),
					}
				}
				WireMessage::ProcUninstall { name } => {
					if !host.uninstall_temporary(self.session, &name) {
						warn!(session = %self.session, %name, "uninstall of unknown temporary procedure");
					}
				}
				WireMessage::ProcReturn { values } if awaiting == Awaiting::ProcReturn => return Ok(Outcome::Returned(values)),
				WireMessage::TempProcReturn { values } if awaiting == Awaiting::TempProcReturn => return Ok(Outcome::Returned(values)),
				WireMessage::ExtensionAck if awaiting == Awaiting::ProcReturn => return Ok(Outcome::Acked),
				WireMessage::Quit => return Err(TransportError::Disconnected),
				other => {
					return Err(TransportError::Protocol(format!(
						"unexpected {} while waiting for {awaiting:?}",
						other.label()
					)));
				}
			}
		}
	}

	/// Whether the process is still running.
	pub(crate) fn is_alive(&self) -> bool {
		match self.child.lock().as_mut() {
			Some(child) => matches!(child.try_wait(), Ok(None)),
			None => false,
		}
	}

	/// Gives up on a process whose conversation failed: kills it and ends its
	/// session, which unregisters the temporary procedures it installed.
	pub(crate) fn abandon(&self, host: &dyn Host, error: &TransportError) {
		warn!(path = %self.path.display(), session = %self.session, %error, "extension connection lost");
		self.kill();
		host.end_session(self.session);
	}

	/// Asks the process to quit and reaps it.
	pub(crate) fn close(&self) {
		let _ = self.channel.send(&WireMessage::Quit);
		if let Some(mut child) = self.child.lock().take() {
			match child.wait() {
				Ok(status) => debug!(path = %self.path.display(), %status, "extension exited"),
				Err(err) => warn!(path = %self.path.display(), error = %err, "failed to wait on extension"),
			}
		}
	}

	/// Kills the process without waiting for a clean exit.
	pub(crate) fn kill(&self) {
		if let Some(mut child) = self.child.lock().take() {
			let _ = child.kill();
			let _ = child.wait();
		}
	}
}

impl Drop for Connection {
	fn drop(&mut self) {
		self.kill();
	}
}
