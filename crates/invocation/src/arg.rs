//! Typed argument slots.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kind::ArgKind;
use crate::status::Status;

/// RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgba {
	pub r: f64,
	pub g: f64,
	pub b: f64,
	pub a: f64,
}

impl Rgba {
	pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
		Self { r, g, b, a }
	}
}

/// Named binary blob with persistence flags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Parasite {
	pub name: String,
	pub flags: u32,
	pub data: Vec<u8>,
}

/// Errors raised while constructing or validating argument slots.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgError {
	/// The integer does not fit the kind's storage width.
	#[error("value {value} out of range for {kind}")]
	OutOfRange { kind: ArgKind, value: i64 },
	/// The kind has no integer representation.
	#[error("{kind} is not an integer kind")]
	NotIntegral { kind: ArgKind },
	/// An array slot is not immediately preceded by an `INT32` count.
	#[error("argument #{index} ({kind}) is not preceded by an INT32 count")]
	MissingCount { index: usize, kind: ArgKind },
	/// An array's length disagrees with its count slot.
	#[error("argument #{index}: count says {count} elements, array holds {len}")]
	CountMismatch { index: usize, count: i64, len: usize },
	/// Text could not be parsed as a value of the kind.
	#[error("cannot parse {text:?} as {kind}")]
	Parse { kind: ArgKind, text: String },
}

/// One argument slot: a kind tag and its value.
///
/// String and array payloads are `Cow<'static, _>`. Regular constructors copy
/// into a fresh owned buffer; the `static_*` constructors borrow compile-time
/// constants without copying, and such payloads are never released by
/// [`crate::ArgList::destroy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
	Int32(i32),
	Int16(i16),
	Int8(u8),
	Float(f64),
	String(Cow<'static, str>),
	Int32Array(Cow<'static, [i32]>),
	Int16Array(Cow<'static, [i16]>),
	Int8Array(Cow<'static, [u8]>),
	FloatArray(Cow<'static, [f64]>),
	StringArray(Vec<String>),
	Color(Rgba),
	Item(i32),
	Display(i32),
	Image(i32),
	Layer(i32),
	Channel(i32),
	Drawable(i32),
	Selection(i32),
	ColorArray(Cow<'static, [Rgba]>),
	Path(i32),
	Parasite(Parasite),
	Status(Status),
}

impl Arg {
	/// Returns the kind tag of this slot.
	pub fn kind(&self) -> ArgKind {
		match self {
			Self::Int32(_) => ArgKind::Int32,
			Self::Int16(_) => ArgKind::Int16,
			Self::Int8(_) => ArgKind::Int8,
			Self::Float(_) => ArgKind::Float,
			Self::String(_) => ArgKind::String,
			Self::Int32Array(_) => ArgKind::Int32Array,
			Self::Int16Array(_) => ArgKind::Int16Array,
			Self::Int8Array(_) => ArgKind::Int8Array,
			Self::FloatArray(_) => ArgKind::FloatArray,
			Self::StringArray(_) => ArgKind::StringArray,
			Self::Color(_) => ArgKind::Color,
			Self::Item(_) => ArgKind::Item,
			Self::Display(_) => ArgKind::Display,
			Self::Image(_) => ArgKind::Image,
			Self::Layer(_) => ArgKind::Layer,
			Self::Channel(_) => ArgKind::Channel,
			Self::Drawable(_) => ArgKind::Drawable,
			Self::Selection(_) => ArgKind::Selection,
			Self::ColorArray(_) => ArgKind::ColorArray,
			Self::Path(_) => ArgKind::Path,
			Self::Parasite(_) => ArgKind::Parasite,
			Self::Status(_) => ArgKind::Status,
		}
	}

	/// Creates a string slot holding a fresh copy of `s`.
	pub fn string(s: impl Into<String>) -> Self {
		Self::String(Cow::Owned(s.into()))
	}

	/// Creates a string slot that borrows a literal without copying.
	pub const fn static_str(s: &'static str) -> Self {
		Self::String(Cow::Borrowed(s))
	}

	pub fn int32_array(values: impl Into<Vec<i32>>) -> Self {
		Self::Int32Array(Cow::Owned(values.into()))
	}

	pub const fn static_int32_array(values: &'static [i32]) -> Self {
		Self::Int32Array(Cow::Borrowed(values))
	}

	pub fn int16_array(values: impl Into<Vec<i16>>) -> Self {
		Self::Int16Array(Cow::Owned(values.into()))
	}

	pub fn bytes(values: impl Into<Vec<u8>>) -> Self {
		Self::Int8Array(Cow::Owned(values.into()))
	}

	pub const fn static_bytes(values: &'static [u8]) -> Self {
		Self::Int8Array(Cow::Borrowed(values))
	}

	pub fn float_array(values: impl Into<Vec<f64>>) -> Self {
		Self::FloatArray(Cow::Owned(values.into()))
	}

	pub fn string_array<I, S>(values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::StringArray(values.into_iter().map(Into::into).collect())
	}

	pub fn color_array(values: impl Into<Vec<Rgba>>) -> Self {
		Self::ColorArray(Cow::Owned(values.into()))
	}

	/// Compatibility constructor: builds any integer-like slot from one canonical `i64`.
	///
	/// Legacy width classes (`INT32`, `INT16`, `INT8`, handles, `STATUS`) all share
	/// this input representation but keep distinct tags for type checking.
	pub fn from_int(kind: ArgKind, value: i64) -> Result<Self, ArgError> {
		let out_of_range = || ArgError::OutOfRange { kind, value };
		let as_i32 = || i32::try_from(value).map_err(|_| out_of_range());
		Ok(match kind {
			ArgKind::Int32 => Self::Int32(as_i32()?),
			ArgKind::Int16 => Self::Int16(i16::try_from(value).map_err(|_| out_of_range())?),
			ArgKind::Int8 => Self::Int8(u8::try_from(value).map_err(|_| out_of_range())?),
			ArgKind::Item => Self::Item(as_i32()?),
			ArgKind::Display => Self::Display(as_i32()?),
			ArgKind::Image => Self::Image(as_i32()?),
			ArgKind::Layer => Self::Layer(as_i32()?),
			ArgKind::Channel => Self::Channel(as_i32()?),
			ArgKind::Drawable => Self::Drawable(as_i32()?),
			ArgKind::Selection => Self::Selection(as_i32()?),
			ArgKind::Path => Self::Path(as_i32()?),
			ArgKind::Status => Self::Status(Status::from_code(value).ok_or_else(out_of_range)?),
			ArgKind::Float
			| ArgKind::String
			| ArgKind::Int32Array
			| ArgKind::Int16Array
			| ArgKind::Int8Array
			| ArgKind::FloatArray
			| ArgKind::StringArray
			| ArgKind::Color
			| ArgKind::ColorArray
			| ArgKind::Parasite => return Err(ArgError::NotIntegral { kind }),
		})
	}

	/// Reads any integer-like slot back in canonical `i64` form.
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int32(v)
			| Self::Item(v)
			| Self::Display(v)
			| Self::Image(v)
			| Self::Layer(v)
			| Self::Channel(v)
			| Self::Drawable(v)
			| Self::Selection(v)
			| Self::Path(v) => Some(i64::from(*v)),
			Self::Int16(v) => Some(i64::from(*v)),
			Self::Int8(v) => Some(i64::from(*v)),
			Self::Status(s) => Some(i64::from(s.code())),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<f64> {
		match self {
			Self::Float(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_status(&self) -> Option<Status> {
		match self {
			Self::Status(s) => Some(*s),
			_ => None,
		}
	}

	/// Returns the element count of an array slot.
	pub fn array_len(&self) -> Option<usize> {
		match self {
			Self::Int32Array(v) => Some(v.len()),
			Self::Int16Array(v) => Some(v.len()),
			Self::Int8Array(v) => Some(v.len()),
			Self::FloatArray(v) => Some(v.len()),
			Self::StringArray(v) => Some(v.len()),
			Self::ColorArray(v) => Some(v.len()),
			_ => None,
		}
	}

	/// Returns true when this slot owns a heap payload that must be released.
	///
	/// Borrowed `'static` payloads and scalar kinds return false.
	pub fn owns_payload(&self) -> bool {
		match self {
			Self::String(s) => matches!(s, Cow::Owned(_)),
			Self::Int32Array(v) => matches!(v, Cow::Owned(_)),
			Self::Int16Array(v) => matches!(v, Cow::Owned(_)),
			Self::Int8Array(v) => matches!(v, Cow::Owned(_)),
			Self::FloatArray(v) => matches!(v, Cow::Owned(_)),
			Self::ColorArray(v) => matches!(v, Cow::Owned(_)),
			Self::StringArray(_) | Self::Parasite(_) => true,
			Self::Int32(_)
			| Self::Int16(_)
			| Self::Int8(_)
			| Self::Float(_)
			| Self::Color(_)
			| Self::Item(_)
			| Self::Display(_)
			| Self::Image(_)
			| Self::Layer(_)
			| Self::Channel(_)
			| Self::Drawable(_)
			| Self::Selection(_)
			| Self::Path(_)
			| Self::Status(_) => false,
		}
	}

	/// Parses a textual value for `kind`.
	///
	/// Arrays are comma separated; colors are `r,g,b[,a]`; parasites are
	/// `name:flags:text`. Used by command-line front ends.
	pub fn parse(kind: ArgKind, text: &str) -> Result<Self, ArgError> {
		let fail = || ArgError::Parse {
			kind,
			text: text.to_string(),
		};
		let items = || text.split(',').map(str::trim).filter(|s| !s.is_empty());

		if kind.is_integer_like() {
			let value: i64 = text.trim().parse().map_err(|_| fail())?;
			return Self::from_int(kind, value);
		}

		Ok(match kind {
			ArgKind::Float => Self::Float(text.trim().parse().map_err(|_| fail())?),
			ArgKind::String => Self::string(text),
			ArgKind::Int32Array => Self::int32_array(items().map(str::parse).collect::<Result<Vec<i32>, _>>().map_err(|_| fail())?),
			ArgKind::Int16Array => Self::int16_array(items().map(str::parse).collect::<Result<Vec<i16>, _>>().map_err(|_| fail())?),
			ArgKind::Int8Array => Self::bytes(items().map(str::parse).collect::<Result<Vec<u8>, _>>().map_err(|_| fail())?),
			ArgKind::FloatArray => Self::float_array(items().map(str::parse).collect::<Result<Vec<f64>, _>>().map_err(|_| fail())?),
			ArgKind::StringArray => Self::string_array(items()),
			ArgKind::Color => Self::Color(parse_color(text).ok_or_else(fail)?),
			ArgKind::ColorArray => {
				let colors = text.split(';').map(parse_color).collect::<Option<Vec<_>>>().ok_or_else(fail)?;
				Self::color_array(colors)
			}
			ArgKind::Parasite => {
				let mut parts = text.splitn(3, ':');
				let name = parts.next().filter(|s| !s.is_empty()).ok_or_else(fail)?;
				let flags = parts.next().unwrap_or("0").parse().map_err(|_| fail())?;
				let data = parts.next().unwrap_or_default().as_bytes().to_vec();
				Self::Parasite(Parasite {
					name: name.to_string(),
					flags,
					data,
				})
			}
			_ => return Err(fail()),
		})
	}
}

/// Renders the value in the text form accepted by [`Arg::parse`].
impl fmt::Display for Arg {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
			for (i, item) in items.iter().enumerate() {
				if i > 0 {
					f.write_str(sep)?;
				}
				write!(f, "{item}")?;
			}
			Ok(())
		}

		match self {
			Self::Float(v) => write!(f, "{v}"),
			Self::String(s) => f.write_str(s),
			Self::Int32Array(v) => join(f, v, ","),
			Self::Int16Array(v) => join(f, v, ","),
			Self::Int8Array(v) => join(f, v, ","),
			Self::FloatArray(v) => join(f, v, ","),
			Self::StringArray(v) => join(f, v, ","),
			Self::Color(c) => write!(f, "{c}"),
			Self::ColorArray(v) => join(f, v, ";"),
			Self::Parasite(p) => write!(f, "{}:{}:{}", p.name, p.flags, String::from_utf8_lossy(&p.data)),
			other => match other.as_int() {
				Some(v) => write!(f, "{v}"),
				None => Ok(()),
			},
		}
	}
}

impl fmt::Display for Rgba {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{},{},{},{}", self.r, self.g, self.b, self.a)
	}
}

fn parse_color(text: &str) -> Option<Rgba> {
	let parts = text.split(',').map(|s| s.trim().parse::<f64>().ok()).collect::<Option<Vec<_>>>()?;
	match parts.as_slice() {
		[r, g, b] => Some(Rgba::new(*r, *g, *b, 1.0)),
		[r, g, b, a] => Some(Rgba::new(*r, *g, *b, *a)),
		_ => None,
	}
}
