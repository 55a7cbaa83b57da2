//! Ordered argument lists with reverse-order release.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::arg::{Arg, ArgError};

/// Totals reported by [`ArgList::destroy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Released {
	/// Slots walked.
	pub slots: usize,
	/// Owned heap payloads released. Borrowed `'static` payloads are not counted.
	pub payloads: usize,
	/// Array elements released, as counted by each array's preceding `INT32` slot.
	pub elements: usize,
}

/// Ordered list of argument slots.
///
/// Slots are released last-to-first, whether through [`ArgList::destroy`] or
/// on drop. Callers that only want to inspect a list without releasing it
/// borrow it as `&[Arg]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgList {
	slots: Vec<Arg>,
}

impl ArgList {
	pub const fn new() -> Self {
		Self { slots: Vec::new() }
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			slots: Vec::with_capacity(capacity),
		}
	}

	pub fn push(&mut self, arg: Arg) {
		self.slots.push(arg);
	}

	/// Checks that every array slot is immediately preceded by an `INT32`
	/// count equal to its length.
	pub fn check_pairing(&self) -> Result<(), ArgError> {
		check_pairing(&self.slots)
	}

	/// Releases every slot in reverse order and reports what was freed.
	///
	/// Each array's element count is taken from the slot before it, which
	/// is why the walk runs backwards.
	pub fn destroy(mut self) -> Released {
		release(std::mem::take(&mut self.slots))
	}

	/// Moves the slots out without releasing them.
	pub fn into_vec(mut self) -> Vec<Arg> {
		std::mem::take(&mut self.slots)
	}
}

/// Validates the count/array pairing over a borrowed slot sequence.
pub fn check_pairing(slots: &[Arg]) -> Result<(), ArgError> {
	for (index, arg) in slots.iter().enumerate() {
		let Some(len) = arg.array_len() else {
			continue;
		};
		let count = match index.checked_sub(1).map(|prev| &slots[prev]) {
			Some(Arg::Int32(count)) => i64::from(*count),
			_ => return Err(ArgError::MissingCount { index, kind: arg.kind() }),
		};
		if usize::try_from(count).ok() != Some(len) {
			return Err(ArgError::CountMismatch { index, count, len });
		}
	}
	Ok(())
}

fn release(mut slots: Vec<Arg>) -> Released {
	let mut released = Released::default();
	while let Some(arg) = slots.pop() {
		released.slots += 1;
		if !arg.owns_payload() {
			continue;
		}
		released.payloads += 1;
		if let Some(len) = arg.array_len() {
			let count = match slots.last() {
				Some(Arg::Int32(count)) => usize::try_from(*count).unwrap_or(0),
				_ => len,
			};
			released.elements += count.min(len);
		}
	}
	if released.payloads > 0 {
		tracing::trace!(slots = released.slots, payloads = released.payloads, "released argument list");
	}
	released
}

impl Drop for ArgList {
	fn drop(&mut self) {
		if !self.slots.is_empty() {
			release(std::mem::take(&mut self.slots));
		}
	}
}

impl Deref for ArgList {
	type Target = [Arg];

	fn deref(&self) -> &[Arg] {
		&self.slots
	}
}

impl AsRef<[Arg]> for ArgList {
	fn as_ref(&self) -> &[Arg] {
		&self.slots
	}
}

impl From<Vec<Arg>> for ArgList {
	fn from(slots: Vec<Arg>) -> Self {
		Self { slots }
	}
}

impl FromIterator<Arg> for ArgList {
	fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
		Self {
			slots: iter.into_iter().collect(),
		}
	}
}

impl Extend<Arg> for ArgList {
	fn extend<I: IntoIterator<Item = Arg>>(&mut self, iter: I) {
		self.slots.extend(iter);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::kind::ArgKind;

	#[test]
	fn destroy_releases_each_owned_payload_once() {
		let list: ArgList = vec![
			Arg::Image(1),
			Arg::string("owned"),
			Arg::Int32(3),
			Arg::int32_array(vec![1, 2, 3]),
			Arg::Int32(2),
			Arg::string_array(["a", "b"]),
			Arg::static_str("borrowed"),
		]
		.into();

		let released = list.destroy();
		assert_eq!(released.slots, 7);
		assert_eq!(released.payloads, 3);
		assert_eq!(released.elements, 5);
	}

	#[test]
	fn destroy_skips_borrowed_arrays() {
		let list: ArgList = vec![Arg::Int32(2), Arg::static_bytes(b"hi")].into();
		let released = list.destroy();
		assert_eq!(released.payloads, 0);
		assert_eq!(released.elements, 0);
	}

	#[test]
	fn pairing_requires_preceding_count() {
		let list: ArgList = vec![Arg::string("x"), Arg::float_array(vec![1.0])].into();
		assert_eq!(
			list.check_pairing(),
			Err(ArgError::MissingCount {
				index: 1,
				kind: ArgKind::FloatArray
			})
		);

		let first: ArgList = vec![Arg::bytes(vec![1])].into();
		assert!(matches!(first.check_pairing(), Err(ArgError::MissingCount { index: 0, .. })));
	}

	#[test]
	fn pairing_rejects_count_mismatch() {
		let list: ArgList = vec![Arg::Int32(4), Arg::int16_array(vec![1, 2])].into();
		assert_eq!(
			list.check_pairing(),
			Err(ArgError::CountMismatch { index: 1, count: 4, len: 2 })
		);

		let negative: ArgList = vec![Arg::Int32(-1), Arg::string_array(Vec::<String>::new())].into();
		assert!(negative.check_pairing().is_err());
	}

	#[test]
	fn into_vec_keeps_slots() {
		let list: ArgList = [Arg::Int32(1), Arg::string("a")].into_iter().collect();
		let slots = list.into_vec();
		assert_eq!(slots.len(), 2);
		assert_eq!(slots[1].as_str(), Some("a"));
	}
}
