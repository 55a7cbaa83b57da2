//! Spec-checked argument list construction.

use std::sync::Arc;

use crate::arg::{Arg, ArgError, Parasite, Rgba};
use crate::kind::ArgKind;
use crate::list::ArgList;
use crate::spec::ArgSpec;

/// Error raised while building an argument list against declared specs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
	#[error("too many arguments: procedure takes {expected}")]
	TooMany { expected: usize },
	#[error("argument #{index} ('{name}') type mismatch: expected {expected}, got {got}")]
	KindMismatch {
		index: usize,
		name: String,
		expected: ArgKind,
		got: ArgKind,
	},
	#[error("too few arguments: expected {expected}, got {got}")]
	Missing { expected: usize, got: usize },
	#[error(transparent)]
	Arg(#[from] ArgError),
}

/// Builds an [`ArgList`] one slot at a time, checking each against the
/// declared specs.
///
/// Chained methods take `self` by value and remember the first error;
/// [`ArgListBuilder::finish`] reports it. The `array_*` helpers push the
/// `INT32` count and the array together.
#[derive(Debug, Clone)]
pub struct ArgListBuilder {
	specs: Arc<[ArgSpec]>,
	slots: Vec<Arg>,
	error: Option<BuildError>,
}

impl ArgListBuilder {
	pub fn new(specs: impl Into<Arc<[ArgSpec]>>) -> Self {
		let specs = specs.into();
		Self {
			slots: Vec::with_capacity(specs.len()),
			specs,
			error: None,
		}
	}

	/// Spec for the next slot, if any remain.
	pub fn next_spec(&self) -> Option<&ArgSpec> {
		self.specs.get(self.slots.len())
	}

	pub fn try_push(&mut self, arg: Arg) -> Result<(), BuildError> {
		let index = self.slots.len();
		let Some(spec) = self.specs.get(index) else {
			return Err(BuildError::TooMany { expected: self.specs.len() });
		};
		if spec.kind != arg.kind() {
			return Err(BuildError::KindMismatch {
				index,
				name: spec.name.clone(),
				expected: spec.kind,
				got: arg.kind(),
			});
		}
		self.slots.push(arg);
		Ok(())
	}

	pub fn push(mut self, arg: Arg) -> Self {
		if self.error.is_none()
			&& let Err(err) = self.try_push(arg)
		{
			self.error = Some(err);
		}
		self
	}

	pub fn int32(self, value: i32) -> Self {
		self.push(Arg::Int32(value))
	}

	pub fn int16(self, value: i16) -> Self {
		self.push(Arg::Int16(value))
	}

	pub fn int8(self, value: u8) -> Self {
		self.push(Arg::Int8(value))
	}

	pub fn float(self, value: f64) -> Self {
		self.push(Arg::Float(value))
	}

	pub fn string(self, value: impl Into<String>) -> Self {
		self.push(Arg::string(value))
	}

	pub fn color(self, value: Rgba) -> Self {
		self.push(Arg::Color(value))
	}

	pub fn parasite(self, value: Parasite) -> Self {
		self.push(Arg::Parasite(value))
	}

	/// Pushes an integer-like slot whose kind is taken from the next spec.
	///
	/// Convenient for handles: `.int(image_id)` fills an `IMAGE` slot.
	pub fn int(mut self, value: i64) -> Self {
		if self.error.is_some() {
			return self;
		}
		let Some(kind) = self.next_spec().map(|spec| spec.kind) else {
			self.error = Some(BuildError::TooMany { expected: self.specs.len() });
			return self;
		};
		match Arg::from_int(kind, value) {
			Ok(arg) => self.push(arg),
			Err(err) => {
				self.error = Some(err.into());
				self
			}
		}
	}

	fn counted(self, len: usize, array: Arg) -> Self {
		let count = i32::try_from(len).unwrap_or(i32::MAX);
		self.int32(count).push(array)
	}

	pub fn array_int32(self, values: impl Into<Vec<i32>>) -> Self {
		let values = values.into();
		self.counted(values.len(), Arg::int32_array(values))
	}

	pub fn array_int16(self, values: impl Into<Vec<i16>>) -> Self {
		let values = values.into();
		self.counted(values.len(), Arg::int16_array(values))
	}

	pub fn array_bytes(self, values: impl Into<Vec<u8>>) -> Self {
		let values = values.into();
		self.counted(values.len(), Arg::bytes(values))
	}

	pub fn array_float(self, values: impl Into<Vec<f64>>) -> Self {
		let values = values.into();
		self.counted(values.len(), Arg::float_array(values))
	}

	pub fn array_string<I, S>(self, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let arg = Arg::string_array(values);
		let len = arg.array_len().unwrap_or(0);
		self.counted(len, arg)
	}

	pub fn array_color(self, values: impl Into<Vec<Rgba>>) -> Self {
		let values = values.into();
		self.counted(values.len(), Arg::color_array(values))
	}

	/// Returns the finished list, or the first error encountered.
	pub fn finish(self) -> Result<ArgList, BuildError> {
		if let Some(err) = self.error {
			return Err(err);
		}
		if self.slots.len() < self.specs.len() {
			return Err(BuildError::Missing {
				expected: self.specs.len(),
				got: self.slots.len(),
			});
		}
		let list = ArgList::from(self.slots);
		list.check_pairing()?;
		Ok(list)
	}
}
