//! Procedure results.

use crate::arg::Arg;
use crate::list::{ArgList, Released};
use crate::status::Status;

/// Notice attached when a call was served under a deprecated name.
///
/// The notice travels beside the slots; it never occupies one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deprecation {
	pub requested: String,
	pub canonical: String,
}

/// Result list of one procedure call.
///
/// Slot 0 is always an [`Arg::Status`]. On success the remaining slots
/// follow the procedure's declared return specs; on failure slot 1 may hold
/// a `STRING` message.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnValues {
	args: ArgList,
	deprecation: Option<Deprecation>,
}

impl ReturnValues {
	/// Builds a `Success` result followed by `values`.
	pub fn success(values: impl IntoIterator<Item = Arg>) -> Self {
		let mut args = ArgList::new();
		args.push(Arg::Status(Status::Success));
		args.extend(values);
		Self { args, deprecation: None }
	}

	pub fn status_only(status: Status) -> Self {
		Self {
			args: vec![Arg::Status(status)].into(),
			deprecation: None,
		}
	}

	/// Builds `[status, message]`.
	pub fn error(status: Status, message: impl Into<String>) -> Self {
		Self {
			args: vec![Arg::Status(status), Arg::string(message)].into(),
			deprecation: None,
		}
	}

	pub fn calling_error(message: impl Into<String>) -> Self {
		Self::error(Status::CallingError, message)
	}

	pub fn execution_error(message: impl Into<String>) -> Self {
		Self::error(Status::ExecutionError, message)
	}

	pub fn pass_through() -> Self {
		Self::status_only(Status::PassThrough)
	}

	pub fn cancel() -> Self {
		Self::status_only(Status::Cancel)
	}

	/// Wraps raw slots received from elsewhere. Returns `None` unless slot 0 is a status.
	pub fn from_slots(args: ArgList) -> Option<Self> {
		match args.first() {
			Some(Arg::Status(_)) => Some(Self { args, deprecation: None }),
			_ => None,
		}
	}

	pub fn status(&self) -> Status {
		self.args.first().and_then(Arg::as_status).unwrap_or(Status::ExecutionError)
	}

	pub fn is_success(&self) -> bool {
		self.status().is_success()
	}

	/// Slots after the status.
	pub fn values(&self) -> &[Arg] {
		self.args.get(1..).unwrap_or_default()
	}

	pub fn value(&self, index: usize) -> Option<&Arg> {
		self.values().get(index)
	}

	/// Message carried by a non-success result, if any.
	pub fn error_message(&self) -> Option<&str> {
		if self.is_success() {
			return None;
		}
		self.value(0).and_then(Arg::as_str)
	}

	/// All slots, status included.
	pub fn slots(&self) -> &ArgList {
		&self.args
	}

	pub fn into_slots(self) -> ArgList {
		self.args
	}

	pub fn with_deprecation(mut self, notice: Deprecation) -> Self {
		self.deprecation = Some(notice);
		self
	}

	pub fn deprecation(&self) -> Option<&Deprecation> {
		self.deprecation.as_ref()
	}

	pub fn destroy(self) -> Released {
		self.args.destroy()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn slot_zero_is_always_status() {
		let ok = ReturnValues::success([Arg::Int32(640)]);
		assert_eq!(ok.status(), Status::Success);
		assert_eq!(ok.values(), &[Arg::Int32(640)]);
		assert_eq!(ok.error_message(), None);

		let err = ReturnValues::calling_error("procedure 'x' not found");
		assert_eq!(err.slots().len(), 2);
		assert_eq!(err.error_message(), Some("procedure 'x' not found"));
	}

	#[test]
	fn from_slots_requires_status_first() {
		assert!(ReturnValues::from_slots(vec![Arg::Int32(1)].into()).is_none());
		assert!(ReturnValues::from_slots(ArgList::new()).is_none());
		let values = ReturnValues::from_slots(vec![Arg::Status(Status::Cancel)].into()).expect("status slot");
		assert_eq!(values.status(), Status::Cancel);
		assert!(values.values().is_empty());
	}
}
