//! Extension-side client.
//!
//! An extension executable builds a [`Plugin`] over its stdio and hands it
//! its declarations and a run handler:
//!
//! ```no_run
//! use procdb_invocation::{Arg, ArgKind, ProcDecl, ProcKind, ReturnValues};
//! use procdb_rpc::plugin::Plugin;
//!
//! let decls = [ProcDecl::new("hello", ProcKind::Plugin).ret("greeting", ArgKind::String, "")];
//! Plugin::stdio()
//! 	.main(&decls, |_plugin, _name, _args| ReturnValues::success([Arg::string("hi")]))
//! 	.expect("host conversation");
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use procdb_invocation::{Arg, ArgList, ProcDecl, ProcKind, ReturnValues, TransportError};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::channel::Channel;
use crate::wire::WireMessage;

/// Handler for a temporary procedure.
pub type TempHandler = Arc<dyn Fn(&Plugin, &[Arg]) -> ReturnValues + Send + Sync>;

/// Blocking client used inside an extension process.
pub struct Plugin {
	channel: Channel,
	temporaries: Mutex<FxHashMap<String, TempHandler>>,
	acked: AtomicBool,
}

impl Plugin {
	/// Client over arbitrary streams (the host's end of the pipes).
	pub fn new(channel: Channel) -> Self {
		Self {
			channel,
			temporaries: Mutex::new(FxHashMap::default()),
			acked: AtomicBool::new(false),
		}
	}

	/// Client over this process's stdin and stdout.
	pub fn stdio() -> Self {
		Self::new(Channel::stdio())
	}

	/// Answers the host's first message.
	///
	/// `Query` announces `procedures`; `ProcRun` invokes `run` and sends its
	/// result back, unless the handler acknowledged as an extension, in which
	/// case the host is no longer waiting for one.
	pub fn main<F>(&self, procedures: &[ProcDecl], run: F) -> Result<(), TransportError>
	where
		F: FnOnce(&Plugin, &str, &[Arg]) -> ReturnValues,
	{
		match self.channel.recv()? {
			None => Ok(()),
			Some(WireMessage::Query) => {
				for decl in procedures {
					self.channel.send(&WireMessage::ProcInstall(decl.clone()))?;
				}
				self.channel.send(&WireMessage::Quit)
			}
			Some(WireMessage::ProcRun { name, args }) => {
				debug!(%name, "run requested");
				let values = run(self, &name, &args);
				if self.acked.load(Ordering::Acquire) {
					return Ok(());
				}
				self.channel.send(&WireMessage::ProcReturn {
					values: values.into_slots(),
				})
			}
			Some(other) => Err(TransportError::Protocol(format!("unexpected {} as first message", other.label()))),
		}
	}

	/// Calls a procedure in the host, serving temporary procedure runs while waiting.
	pub fn call(&self, name: &str, args: impl Into<ArgList>) -> Result<ReturnValues, TransportError> {
		self.channel.send(&WireMessage::ProcRun {
			name: name.to_string(),
			args: args.into(),
		})?;
		loop {
			match self.channel.expect()? {
				WireMessage::ProcReturn { values } => {
					return ReturnValues::from_slots(values).ok_or_else(|| TransportError::Protocol("return values do not start with a status".into()));
				}
				WireMessage::TempProcRun { name, args } => self.serve_temporary(&name, &args)?,
				WireMessage::Quit => return Err(TransportError::Disconnected),
				other => return Err(TransportError::Protocol(format!("unexpected {} while waiting for ProcReturn", other.label()))),
			}
		}
	}

	/// Installs a temporary procedure owned by this process's session.
	///
	/// The declaration's kind is forced to `Temporary`.
	pub fn install_temporary<F>(&self, mut decl: ProcDecl, handler: F) -> Result<(), TransportError>
	where
		F: Fn(&Plugin, &[Arg]) -> ReturnValues + Send + Sync + 'static,
	{
		decl.kind = ProcKind::Temporary;
		self.temporaries.lock().insert(decl.name.clone(), Arc::new(handler));
		self.channel.send(&WireMessage::ProcInstall(decl))
	}

	/// Removes a temporary procedure installed by this process.
	pub fn uninstall_temporary(&self, name: &str) -> Result<(), TransportError> {
		self.temporaries.lock().remove(name);
		self.channel.send(&WireMessage::ProcUninstall { name: name.to_string() })
	}

	/// Tells the host the main procedure succeeded and this process stays resident.
	pub fn extension_ack(&self) -> Result<(), TransportError> {
		self.acked.store(true, Ordering::Release);
		self.channel.send(&WireMessage::ExtensionAck)
	}

	/// Serves temporary procedure runs until the host sends `Quit` or closes the stream.
	pub fn serve_temporaries(&self) -> Result<(), TransportError> {
		loop {
			match self.channel.recv()? {
				Some(WireMessage::TempProcRun { name, args }) => self.serve_temporary(&name, &args)?,
				Some(WireMessage::Quit) | None => return Ok(()),
				Some(other) => return Err(TransportError::Protocol(format!("unexpected {} while serving", other.label()))),
			}
		}
	}

	fn serve_temporary(&self, name: &str, args: &[Arg]) -> Result<(), TransportError> {
		let handler = self.temporaries.lock().get(name).cloned();
		let values = match handler {
			Some(handler) => handler(self, args),
			None => ReturnValues::calling_error(format!("procedure '{name}' is not installed in this process")),
		};
		self.channel.send(&WireMessage::TempProcReturn {
			values: values.into_slots(),
		})
	}
}

impl fmt::Debug for Plugin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Plugin")
			.field("temporaries", &self.temporaries.lock().len())
			.field("acked", &self.acked.load(Ordering::Relaxed))
			.finish_non_exhaustive()
	}
}
