//! Argument kinds.

use serde::{Deserialize, Serialize};

/// Closed set of argument kinds understood by the procedure database.
///
/// Each kind has a stable numeric code (used by introspection procedures and
/// the wire protocol) and an upper-case display name (used in diagnostics and
/// dumps).
///
/// # Invariants
///
/// - Every array kind is immediately preceded by an [`ArgKind::Int32`] count,
///   both in declared shapes and in argument lists.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	PartialOrd,
	Ord,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumIter,
	strum::EnumString,
	strum::IntoStaticStr
)]
#[repr(u8)]
pub enum ArgKind {
	/// 32-bit signed integer.
	#[strum(serialize = "INT32")]
	Int32 = 0,
	/// 16-bit signed integer.
	#[strum(serialize = "INT16")]
	Int16 = 1,
	/// 8-bit unsigned integer.
	#[strum(serialize = "INT8")]
	Int8 = 2,
	/// Double precision float.
	#[strum(serialize = "FLOAT")]
	Float = 3,
	/// UTF-8 string.
	#[strum(serialize = "STRING")]
	String = 4,
	#[strum(serialize = "INT32ARRAY")]
	Int32Array = 5,
	#[strum(serialize = "INT16ARRAY")]
	Int16Array = 6,
	/// Opaque byte array.
	#[strum(serialize = "INT8ARRAY")]
	Int8Array = 7,
	#[strum(serialize = "FLOATARRAY")]
	FloatArray = 8,
	#[strum(serialize = "STRINGARRAY")]
	StringArray = 9,
	/// Fixed-size RGBA color.
	#[strum(serialize = "COLOR")]
	Color = 10,
	#[strum(serialize = "ITEM")]
	Item = 11,
	#[strum(serialize = "DISPLAY")]
	Display = 12,
	#[strum(serialize = "IMAGE")]
	Image = 13,
	#[strum(serialize = "LAYER")]
	Layer = 14,
	#[strum(serialize = "CHANNEL")]
	Channel = 15,
	#[strum(serialize = "DRAWABLE")]
	Drawable = 16,
	#[strum(serialize = "SELECTION")]
	Selection = 17,
	#[strum(serialize = "COLORARRAY")]
	ColorArray = 18,
	#[strum(serialize = "PATH")]
	Path = 19,
	/// Named, flagged binary blob attached to a domain object.
	#[strum(serialize = "PARASITE")]
	Parasite = 20,
	/// Procedure status code.
	#[strum(serialize = "STATUS")]
	Status = 21,
}

impl ArgKind {
	/// Returns the stable numeric code of this kind.
	#[inline]
	pub const fn code(self) -> u8 {
		self as u8
	}

	/// Looks up a kind by numeric code.
	pub fn from_code(code: u8) -> Option<Self> {
		use strum::IntoEnumIterator;
		Self::iter().find(|kind| kind.code() == code)
	}

	/// Returns the upper-case display name (e.g. `"INT32ARRAY"`).
	pub fn name(self) -> &'static str {
		self.into()
	}

	/// Returns true for kinds that must be preceded by an `Int32` count.
	pub const fn is_array(self) -> bool {
		matches!(
			self,
			Self::Int32Array | Self::Int16Array | Self::Int8Array | Self::FloatArray | Self::StringArray | Self::ColorArray
		)
	}

	/// Returns true for handle kinds that identify a domain object by integer ID.
	///
	/// Handle validity is the callee's concern; the dispatcher only checks the tag.
	pub const fn is_handle(self) -> bool {
		matches!(
			self,
			Self::Item | Self::Display | Self::Image | Self::Layer | Self::Channel | Self::Drawable | Self::Selection | Self::Path
		)
	}

	/// Returns true for kinds whose value is an integer in canonical storage.
	///
	/// These are the kinds accepted by [`crate::Arg::from_int`].
	pub const fn is_integer_like(self) -> bool {
		matches!(self, Self::Int32 | Self::Int16 | Self::Int8 | Self::Status) || self.is_handle()
	}
}
