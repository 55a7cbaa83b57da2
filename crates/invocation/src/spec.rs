//! Declared argument shapes and name rules.

use serde::{Deserialize, Serialize};

use crate::kind::ArgKind;

/// One declared argument or return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
	pub name: String,
	pub kind: ArgKind,
	pub description: String,
}

impl ArgSpec {
	pub fn new(name: impl Into<String>, kind: ArgKind, description: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind,
			description: description.into(),
		}
	}

	pub fn int32(name: impl Into<String>, description: impl Into<String>) -> Self {
		Self::new(name, ArgKind::Int32, description)
	}

	pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
		Self::new(name, ArgKind::String, description)
	}

	pub fn float(name: impl Into<String>, description: impl Into<String>) -> Self {
		Self::new(name, ArgKind::Float, description)
	}
}

/// Declaration errors caught at registration time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
	#[error("invalid procedure name {name:?}: {reason}")]
	InvalidName { name: String, reason: &'static str },
	#[error("{list} #{index} ('{name}') is {kind} but is not preceded by an INT32 count")]
	UnpairedArray {
		list: &'static str,
		index: usize,
		name: String,
		kind: ArgKind,
	},
}

/// Checks the canonical procedure name form.
///
/// The first character is an ASCII lowercase letter; the rest are ASCII
/// lowercase letters, digits or `-`.
pub fn validate_name(name: &str) -> Result<(), SpecError> {
	let invalid = |reason| SpecError::InvalidName {
		name: name.to_string(),
		reason,
	};
	let mut chars = name.chars();
	match chars.next() {
		None => return Err(invalid("name is empty")),
		Some(c) if !c.is_ascii_lowercase() => return Err(invalid("must start with a lowercase ASCII letter")),
		Some(_) => {}
	}
	if chars.any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')) {
		return Err(invalid("only lowercase ASCII letters, digits and '-' are allowed"));
	}
	Ok(())
}

/// Checks that every array spec is immediately preceded by an `INT32` spec.
///
/// `list` names the sequence in diagnostics (`"argument"` or `"return value"`).
pub fn validate_specs(list: &'static str, specs: &[ArgSpec]) -> Result<(), SpecError> {
	for (index, spec) in specs.iter().enumerate() {
		if !spec.kind.is_array() {
			continue;
		}
		let paired = index.checked_sub(1).is_some_and(|prev| specs[prev].kind == ArgKind::Int32);
		if !paired {
			return Err(SpecError::UnpairedArray {
				list,
				index,
				name: spec.name.clone(),
				kind: spec.kind,
			});
		}
	}
	Ok(())
}
