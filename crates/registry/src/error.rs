//! Errors for calls rejected before dispatch reaches an implementation.

use procdb_invocation::{ArgError, ArgKind, BuildError, ReturnValues};

/// A call rejected before the implementation runs.
///
/// Every variant becomes a `CALLING_ERROR` result whose message slot is the
/// `Display` text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
	/// No record under the requested name (after any compat remap).
	#[error("procedure '{name}' not found")]
	NotFound { name: String },
	#[error("procedure '{procedure}': expected {expected} arguments, got {got}")]
	ArgCount {
		procedure: String,
		expected: usize,
		got: usize,
	},
	#[error("procedure '{procedure}': argument #{index} ('{arg}') type mismatch: expected {expected}, got {got}")]
	TypeMismatch {
		procedure: String,
		index: usize,
		arg: String,
		expected: ArgKind,
		got: ArgKind,
	},
	#[error("procedure '{procedure}': {source}")]
	Pairing {
		procedure: String,
		#[source]
		source: ArgError,
	},
	#[error("procedure '{procedure}': {source}")]
	Build {
		procedure: String,
		#[source]
		source: BuildError,
	},
}

impl From<CallError> for ReturnValues {
	fn from(err: CallError) -> Self {
		ReturnValues::calling_error(err.to_string())
	}
}
