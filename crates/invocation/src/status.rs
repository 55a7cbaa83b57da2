//! Procedure status codes.

use serde::{Deserialize, Serialize};

/// Status carried in the first slot of every return value list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter, strum::IntoStaticStr)]
#[repr(u8)]
pub enum Status {
	/// The procedure ran and failed, or a process-backed call lost its transport.
	#[strum(serialize = "EXECUTION_ERROR")]
	ExecutionError = 0,
	/// The call itself was malformed (unknown name, wrong argument shape).
	#[strum(serialize = "CALLING_ERROR")]
	CallingError = 1,
	/// The procedure declined; the dispatcher tries the next registrant.
	#[strum(serialize = "PASS_THROUGH")]
	PassThrough = 2,
	#[strum(serialize = "SUCCESS")]
	Success = 3,
	/// A human operator cancelled the procedure.
	#[strum(serialize = "CANCEL")]
	Cancel = 4,
}

impl Status {
	/// Returns the stable numeric code.
	#[inline]
	pub const fn code(self) -> u8 {
		self as u8
	}

	/// Looks up a status by numeric code.
	pub fn from_code(code: i64) -> Option<Self> {
		Some(match code {
			0 => Self::ExecutionError,
			1 => Self::CallingError,
			2 => Self::PassThrough,
			3 => Self::Success,
			4 => Self::Cancel,
			_ => return None,
		})
	}

	#[inline]
	pub const fn is_success(self) -> bool {
		matches!(self, Self::Success)
	}

	/// Returns true for statuses that represent a failure (not success, not pass-through).
	#[inline]
	pub const fn is_error(self) -> bool {
		matches!(self, Self::ExecutionError | Self::CallingError)
	}
}
