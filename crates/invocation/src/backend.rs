//! The seam between the dispatcher and procedure implementations.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::arg::Arg;
use crate::decl::ProcDecl;
use crate::list::ArgList;
use crate::spec::SpecError;
use crate::values::ReturnValues;

/// Identity of one connected external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session-{}", self.0)
	}
}

/// Who issued a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Caller {
	/// Host-side code: built-ins, the CLI, the application shell.
	#[default]
	Core,
	/// An external process, calling back through its session.
	Session(SessionId),
}

/// Dispatching side of the procedure database, as seen by backends.
///
/// Backends receive a `&dyn Host` through [`CallContext`] so they can make
/// re-entrant calls and manage temporary procedures without depending on
/// the registry crate.
pub trait Host: Send + Sync {
	/// Dispatches `name` on behalf of `caller`.
	fn execute_as(&self, caller: Caller, name: &str, args: &ArgList) -> ReturnValues;

	/// Allocates a session for a newly connected process.
	fn open_session(&self) -> SessionId;

	/// Registers a temporary procedure owned by `session`.
	fn install_temporary(&self, session: SessionId, decl: ProcDecl, backend: Arc<dyn Backend>) -> Result<(), SpecError>;

	/// Removes one temporary procedure owned by `session`. Returns false if it was not installed.
	fn uninstall_temporary(&self, session: SessionId, name: &str) -> bool;

	/// Ends `session` and unregisters every temporary procedure it owns.
	///
	/// Returns the number of procedures removed.
	fn end_session(&self, session: SessionId) -> usize;
}

/// Ends a session when dropped unless [`SessionGuard::keep`] was called.
///
/// Process backends open one per connection so that every early return or
/// failure removes the temporary procedures the process installed.
pub struct SessionGuard<'a> {
	host: &'a dyn Host,
	id: SessionId,
	armed: bool,
}

impl<'a> SessionGuard<'a> {
	pub fn open(host: &'a dyn Host) -> Self {
		Self {
			host,
			id: host.open_session(),
			armed: true,
		}
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	/// Leaves the session open past the guard's lifetime.
	pub fn keep(mut self) -> SessionId {
		self.armed = false;
		self.id
	}
}

impl Drop for SessionGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			let removed = self.host.end_session(self.id);
			tracing::debug!(session = %self.id, removed, "session ended");
		}
	}
}

impl fmt::Debug for SessionGuard<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionGuard").field("id", &self.id).field("armed", &self.armed).finish()
	}
}

/// Per-call context handed to a backend.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
	pub host: &'a dyn Host,
	pub caller: Caller,
	/// Canonical name of the procedure being run.
	pub procedure: &'a str,
}

impl<'a> CallContext<'a> {
	pub fn new(host: &'a dyn Host, caller: Caller, procedure: &'a str) -> Self {
		Self { host, caller, procedure }
	}

	/// Makes a nested call with the same caller identity.
	pub fn execute(&self, name: &str, args: &ArgList) -> ReturnValues {
		self.host.execute_as(self.caller, name, args)
	}
}

impl fmt::Debug for CallContext<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CallContext")
			.field("caller", &self.caller)
			.field("procedure", &self.procedure)
			.finish_non_exhaustive()
	}
}

/// Failure to reach or talk to an out-of-process implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
	#[error("failed to spawn {path:?}: {source}")]
	Spawn {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
	#[error("codec error: {0}")]
	Codec(String),
	#[error("protocol violation: {0}")]
	Protocol(String),
	#[error("peer disconnected")]
	Disconnected,
}

/// Execution strategy for a procedure record.
pub trait Backend: Send + Sync {
	/// Runs the procedure with already type-checked arguments.
	///
	/// In-process backends never fail at this level; their failures are
	/// statuses inside the returned values.
	fn run(&self, ctx: &CallContext<'_>, args: &[Arg]) -> Result<ReturnValues, TransportError>;

	/// Releases long-lived resources such as a resident process.
	fn shutdown(&self) {}
}

/// In-process backend wrapping a closure.
pub struct InProcess<F>(pub F);

impl<F> InProcess<F>
where
	F: Fn(&CallContext<'_>, &[Arg]) -> ReturnValues + Send + Sync + 'static,
{
	pub fn new(f: F) -> Self {
		Self(f)
	}

	pub fn shared(f: F) -> Arc<dyn Backend> {
		Arc::new(Self(f))
	}
}

impl<F> Backend for InProcess<F>
where
	F: Fn(&CallContext<'_>, &[Arg]) -> ReturnValues + Send + Sync,
{
	fn run(&self, ctx: &CallContext<'_>, args: &[Arg]) -> Result<ReturnValues, TransportError> {
		Ok((self.0)(ctx, args))
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU64, Ordering};

	use super::*;

	#[derive(Default)]
	struct CountingHost {
		opened: AtomicU64,
		ended: AtomicU64,
	}

	impl Host for CountingHost {
		fn execute_as(&self, _caller: Caller, name: &str, _args: &ArgList) -> ReturnValues {
			ReturnValues::calling_error(format!("procedure '{name}' not found"))
		}

		fn open_session(&self) -> SessionId {
			SessionId(self.opened.fetch_add(1, Ordering::Relaxed) + 1)
		}

		fn install_temporary(&self, _session: SessionId, _decl: ProcDecl, _backend: Arc<dyn Backend>) -> Result<(), SpecError> {
			Ok(())
		}

		fn uninstall_temporary(&self, _session: SessionId, _name: &str) -> bool {
			false
		}

		fn end_session(&self, _session: SessionId) -> usize {
			self.ended.fetch_add(1, Ordering::Relaxed);
			0
		}
	}

	#[test]
	fn guard_ends_session_on_drop() {
		let host = CountingHost::default();
		{
			let guard = SessionGuard::open(&host);
			assert_eq!(guard.id(), SessionId(1));
		}
		assert_eq!(host.ended.load(Ordering::Relaxed), 1);
	}

	#[test]
	fn kept_session_stays_open() {
		let host = CountingHost::default();
		let id = SessionGuard::open(&host).keep();
		assert_eq!(id, SessionId(1));
		assert_eq!(host.ended.load(Ordering::Relaxed), 0);
	}

	#[test]
	fn context_forwards_caller_identity() {
		let host = CountingHost::default();
		let ctx = CallContext::new(&host, Caller::Session(SessionId(7)), "demo");
		let result = ctx.execute("missing", &ArgList::new());
		assert!(result.status().is_error());
		assert_eq!(result.error_message(), Some("procedure 'missing' not found"));
	}
}
