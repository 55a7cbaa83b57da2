//! Host backend that runs procedures in spawned extension processes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use procdb_invocation::{Arg, Backend, CallContext, ReturnValues, SessionGuard, TransportError};
use tracing::{debug, info};

use crate::connection::{Awaiting, Connection, Outcome};
use crate::wire::WireMessage;

/// Backend that runs procedures by spawning an executable.
///
/// Every run starts a fresh process with its own session, sends `ProcRun`
/// and serves the process until it answers. When the process answers with
/// `ExtensionAck` instead, it stays resident with its session (and the
/// temporary procedures it installed) until [`Backend::shutdown`] or until
/// the process exits. A resident process found dead is cleaned up and the
/// next run starts it again.
///
/// One backend is typically shared by every procedure an executable declares.
pub struct ProcessBackend {
	path: PathBuf,
	args: Vec<String>,
	resident: Mutex<Vec<Resident>>,
}

struct Resident {
	procedure: String,
	conn: Arc<Connection>,
}

impl ProcessBackend {
	/// Backend for the executable at `path`.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self::with_args(path, Vec::new())
	}

	/// Backend for `path`, passing `args` before the mode flag on every spawn.
	pub fn with_args(path: impl Into<PathBuf>, args: Vec<String>) -> Self {
		Self {
			path: path.into(),
			args,
			resident: Mutex::new(Vec::new()),
		}
	}

	/// Executable path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Drops resident entries whose process has exited. Returns whether
	/// `procedure` is still resident, plus the connections that died.
	fn check_resident(&self, procedure: &str) -> (bool, Vec<Arc<Connection>>) {
		let mut resident = self.resident.lock();
		let mut dead = Vec::new();
		resident.retain(|r| {
			if r.conn.is_alive() {
				return true;
			}
			debug!(procedure = %r.procedure, session = %r.conn.session, "resident extension exited");
			dead.push(r.conn.clone());
			false
		});
		(resident.iter().any(|r| r.procedure == procedure), dead)
	}

	/// Names of procedures whose process is currently resident.
	pub fn resident(&self) -> Vec<String> {
		self.resident.lock().iter().map(|r| r.procedure.clone()).collect()
	}
}

impl Backend for ProcessBackend {
	fn run(&self, ctx: &CallContext<'_>, args: &[Arg]) -> Result<ReturnValues, TransportError> {
		let (running, dead) = self.check_resident(ctx.procedure);
		for conn in dead {
			conn.abandon(ctx.host, &TransportError::Disconnected);
		}
		if running {
			debug!(procedure = ctx.procedure, "extension already running");
			return Ok(ReturnValues::success([]));
		}

		let guard = SessionGuard::open(ctx.host);
		let session = guard.id();
		let conn = Connection::open(&self.path, &self.args, session)?;

		let request = WireMessage::ProcRun {
			name: ctx.procedure.to_string(),
			args: args.to_vec().into(),
		};
		match conn.converse(ctx.host, &request, Awaiting::ProcReturn) {
			Ok(Outcome::Returned(values)) => {
				drop(guard);
				conn.close();
				ReturnValues::from_slots(values).ok_or_else(|| TransportError::Protocol("return values do not start with a status".into()))
			}
			Ok(Outcome::Acked) => {
				let session = guard.keep();
				info!(procedure = ctx.procedure, %session, "extension resident");
				self.resident.lock().push(Resident {
					procedure: ctx.procedure.to_string(),
					conn,
				});
				Ok(ReturnValues::success([]))
			}
			Err(err) => {
				drop(guard);
				conn.kill();
				Err(err)
			}
		}
	}

	fn shutdown(&self) {
		let resident = std::mem::take(&mut *self.resident.lock());
		for r in resident {
			debug!(procedure = %r.procedure, "stopping resident extension");
			r.conn.close();
		}
	}
}

impl fmt::Debug for ProcessBackend {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProcessBackend")
			.field("path", &self.path)
			.field("args", &self.args)
			.finish_non_exhaustive()
	}
}
