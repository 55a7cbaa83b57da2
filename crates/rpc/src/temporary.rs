//! Host backend for temporary procedures installed by a running extension.

use std::fmt;
use std::sync::Arc;

use procdb_invocation::{Arg, Backend, CallContext, ReturnValues, TransportError};

use crate::connection::{Awaiting, Connection, Outcome};
use crate::wire::WireMessage;

/// Backend for a temporary procedure: forwards runs to the process that
/// installed it, over that process's existing channel.
pub struct TemporaryBackend {
	conn: Arc<Connection>,
}

impl TemporaryBackend {
	pub(crate) fn new(conn: Arc<Connection>) -> Self {
		Self { conn }
	}
}

impl Backend for TemporaryBackend {
	fn run(&self, ctx: &CallContext<'_>, args: &[Arg]) -> Result<ReturnValues, TransportError> {
		let request = WireMessage::TempProcRun {
			name: ctx.procedure.to_string(),
			args: args.to_vec().into(),
		};
		let outcome = self.conn.converse(ctx.host, &request, Awaiting::TempProcReturn).inspect_err(|err| self.conn.abandon(ctx.host, err))?;
		match outcome {
			Outcome::Returned(values) => {
				ReturnValues::from_slots(values).ok_or_else(|| TransportError::Protocol("return values do not start with a status".into()))
			}
			Outcome::Acked => Err(TransportError::Protocol("unexpected ExtensionAck".into())),
		}
	}
}

impl fmt::Debug for TemporaryBackend {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TemporaryBackend")
			.field("path", &self.conn.path)
			.field("session", &self.conn.session)
			.finish()
	}
}
