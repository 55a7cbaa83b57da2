//! Procedure declarations: identity, shape and documentation.

use serde::{Deserialize, Serialize};

use crate::kind::ArgKind;
use crate::spec::{ArgSpec, SpecError, validate_name, validate_specs};

/// How a procedure is implemented and how long it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter, strum::IntoStaticStr)]
#[repr(u8)]
pub enum ProcKind {
	/// Runs in the host process.
	#[strum(serialize = "Internal Procedure")]
	Internal = 0,
	/// Runs in a child process spawned per call.
	#[strum(serialize = "Plug-In")]
	Plugin = 1,
	/// Runs in a child process that may stay resident after acknowledging.
	#[strum(serialize = "Extension")]
	Extension = 2,
	/// Installed by a running process; lives until that process's session ends.
	#[strum(serialize = "Temporary Procedure")]
	Temporary = 3,
}

impl ProcKind {
	#[inline]
	pub const fn code(self) -> u8 {
		self as u8
	}

	pub fn label(self) -> &'static str {
		self.into()
	}

	pub const fn is_process_backed(self) -> bool {
		!matches!(self, Self::Internal)
	}
}

/// Documentation and attribution metadata.
///
/// Missing fields are empty strings; query patterns treat them as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcMeta {
	pub blurb: String,
	pub help: String,
	pub authors: String,
	pub copyright: String,
	pub date: String,
	pub category: String,
	pub menu_label: Option<String>,
	pub image_types: Option<String>,
	/// Canonical replacement when this procedure itself is deprecated.
	pub deprecated: Option<String>,
}

/// Complete declaration of a procedure, independent of how it executes.
///
/// This is what extensions announce over the wire and what the registry
/// wraps together with a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcDecl {
	pub name: String,
	pub kind: ProcKind,
	pub meta: ProcMeta,
	pub args: Vec<ArgSpec>,
	pub returns: Vec<ArgSpec>,
}

impl ProcDecl {
	pub fn new(name: impl Into<String>, kind: ProcKind) -> Self {
		Self {
			name: name.into(),
			kind,
			meta: ProcMeta::default(),
			args: Vec::new(),
			returns: Vec::new(),
		}
	}

	pub fn blurb(mut self, blurb: impl Into<String>) -> Self {
		self.meta.blurb = blurb.into();
		self
	}

	pub fn help(mut self, help: impl Into<String>) -> Self {
		self.meta.help = help.into();
		self
	}

	pub fn attribution(mut self, authors: impl Into<String>, copyright: impl Into<String>, date: impl Into<String>) -> Self {
		self.meta.authors = authors.into();
		self.meta.copyright = copyright.into();
		self.meta.date = date.into();
		self
	}

	pub fn category(mut self, category: impl Into<String>) -> Self {
		self.meta.category = category.into();
		self
	}

	pub fn menu_label(mut self, label: impl Into<String>) -> Self {
		self.meta.menu_label = Some(label.into());
		self
	}

	pub fn image_types(mut self, types: impl Into<String>) -> Self {
		self.meta.image_types = Some(types.into());
		self
	}

	pub fn deprecated(mut self, replacement: impl Into<String>) -> Self {
		self.meta.deprecated = Some(replacement.into());
		self
	}

	pub fn arg(mut self, name: impl Into<String>, kind: ArgKind, description: impl Into<String>) -> Self {
		self.args.push(ArgSpec::new(name, kind, description));
		self
	}

	pub fn ret(mut self, name: impl Into<String>, kind: ArgKind, description: impl Into<String>) -> Self {
		self.returns.push(ArgSpec::new(name, kind, description));
		self
	}

	/// Checks the name form and the count/array pairing of both shapes.
	pub fn validate(&self) -> Result<(), SpecError> {
		validate_name(&self.name)?;
		validate_specs("argument", &self.args)?;
		validate_specs("return value", &self.returns)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_labels_follow_legacy_wording() {
		assert_eq!(ProcKind::Internal.to_string(), "Internal Procedure");
		assert_eq!(ProcKind::Plugin.label(), "Plug-In");
		assert_eq!(ProcKind::Temporary.code(), 3);
		assert!(ProcKind::Extension.is_process_backed());
	}

	#[test]
	fn validate_checks_both_shapes() {
		let decl = ProcDecl::new("file-load-thing", ProcKind::Plugin)
			.arg("n", ArgKind::Int32, "count")
			.arg("data", ArgKind::Int8Array, "payload")
			.ret("names", ArgKind::StringArray, "unpaired");
		let err = decl.validate().unwrap_err();
		assert!(matches!(err, SpecError::UnpairedArray { list: "return value", index: 0, .. }));

		assert!(ProcDecl::new("Bad", ProcKind::Internal).validate().is_err());
	}
}
