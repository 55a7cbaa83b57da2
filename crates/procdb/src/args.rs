//! Command-line text to typed argument lists.

use procdb_invocation::{Arg, ArgError, ArgKind, ArgList, ArgListBuilder, ArgSpec, BuildError};

#[derive(Debug, thiserror::Error)]
pub enum ParseArgsError {
	#[error("missing value for argument '{name}'")]
	Missing { name: String },
	#[error("too many values: procedure takes {expected}")]
	TooMany { expected: usize },
	#[error("argument '{name}': {source}")]
	Value {
		name: String,
		#[source]
		source: ArgError,
	},
	#[error(transparent)]
	Build(#[from] BuildError),
}

/// Parses one text per declared argument.
///
/// An `INT32` count that precedes an array takes no text of its own: it is
/// filled in from the parsed array's length. `expected` in errors counts the
/// texts the procedure takes.
pub fn parse_call_args<S: AsRef<str>>(specs: &[ArgSpec], texts: &[S]) -> Result<ArgList, ParseArgsError> {
	let mut builder = ArgListBuilder::new(specs.to_vec());
	let mut texts = texts.iter().map(AsRef::as_ref);
	let mut taken = 0;
	let mut i = 0;
	while let Some(spec) = specs.get(i) {
		let array = specs.get(i + 1).filter(|next| spec.kind == ArgKind::Int32 && next.kind.is_array());
		let target = array.unwrap_or(spec);
		let text = texts.next().ok_or_else(|| ParseArgsError::Missing { name: target.name.clone() })?;
		taken += 1;
		let value = Arg::parse(target.kind, text).map_err(|source| ParseArgsError::Value {
			name: target.name.clone(),
			source,
		})?;
		if array.is_some() {
			let len = value.array_len().unwrap_or_default();
			let count = Arg::from_int(ArgKind::Int32, len as i64).map_err(|source| ParseArgsError::Value {
				name: spec.name.clone(),
				source,
			})?;
			builder.try_push(count)?;
			i += 1;
		}
		builder.try_push(value)?;
		i += 1;
	}
	if texts.next().is_some() {
		return Err(ParseArgsError::TooMany { expected: taken });
	}
	Ok(builder.finish()?)
}
