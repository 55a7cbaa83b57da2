//! Messages exchanged between the host and an extension process.

use procdb_invocation::{ArgList, ProcDecl};
use serde::{Deserialize, Serialize};

/// One frame exchanged between host and extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireMessage {
	/// Host → extension: announce your procedures, then send `Quit`.
	Query,
	/// Extension → host: a procedure declaration.
	///
	/// During a query this announces a persistent procedure; during a run it
	/// installs a temporary procedure owned by the running session.
	ProcInstall(ProcDecl),
	/// Extension → host: remove a temporary procedure this session installed.
	ProcUninstall {
		/// Name of the temporary procedure.
		name: String,
	},
	/// Run a procedure.
	///
	/// Host → extension starts the extension's own procedure; extension → host
	/// is a nested call dispatched through the database.
	ProcRun {
		/// Procedure name.
		name: String,
		/// Argument slots, already checked against the declared shape.
		args: ArgList,
	},
	/// Answer to `ProcRun`; slot 0 is the status.
	ProcReturn {
		/// Result slots.
		values: ArgList,
	},
	/// Host → extension: run a temporary procedure the extension installed.
	TempProcRun {
		/// Temporary procedure name.
		name: String,
		/// Argument slots.
		args: ArgList,
	},
	/// Answer to `TempProcRun`.
	TempProcReturn {
		/// Result slots.
		values: ArgList,
	},
	/// Extension → host: the extension's main procedure succeeded and the
	/// process stays resident to serve temporary procedures.
	ExtensionAck,
	/// End of conversation. Either side may send it.
	Quit,
}

impl WireMessage {
	/// Short variant name for diagnostics.
	pub fn label(&self) -> &'static str {
		match self {
			Self::Query => "Query",
			Self::ProcInstall(_) => "ProcInstall",
			Self::ProcUninstall { .. } => "ProcUninstall",
			Self::ProcRun { .. } => "ProcRun",
			Self::ProcReturn { .. } => "ProcReturn",
			Self::TempProcRun { .. } => "TempProcRun",
			Self::TempProcReturn { .. } => "TempProcReturn",
			Self::ExtensionAck => "ExtensionAck",
			Self::Quit => "Quit",
		}
	}
}
