//! Per-procedure introspection.

use procdb_invocation::ArgSpec;
use serde::Serialize;

use crate::pdb::Pdb;
use crate::procedure::Procedure;

/// Serializable view of one argument or return spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgInfo {
	pub name: String,
	/// Display name of the kind, e.g. `"INT32ARRAY"`.
	pub kind: &'static str,
	pub code: u8,
	pub description: String,
}

impl From<&ArgSpec> for ArgInfo {
	fn from(spec: &ArgSpec) -> Self {
		Self {
			name: spec.name.clone(),
			kind: spec.kind.name(),
			code: spec.kind.code(),
			description: spec.description.clone(),
		}
	}
}

/// Everything known about the most recent registration under a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcInfo {
	pub name: String,
	pub proc_type: &'static str,
	pub proc_type_code: u8,
	pub blurb: String,
	pub help: String,
	pub authors: String,
	pub copyright: String,
	pub date: String,
	pub category: String,
	pub menu_label: Option<String>,
	pub image_types: Option<String>,
	pub deprecated: Option<String>,
	pub args: Vec<ArgInfo>,
	pub returns: Vec<ArgInfo>,
	/// Number of records registered under the name.
	pub registrations: usize,
}

impl ProcInfo {
	pub(crate) fn new(procedure: &Procedure, registrations: usize) -> Self {
		let meta = procedure.meta();
		Self {
			name: procedure.name().to_string(),
			proc_type: procedure.kind().label(),
			proc_type_code: procedure.kind().code(),
			blurb: meta.blurb.clone(),
			help: meta.help.clone(),
			authors: meta.authors.clone(),
			copyright: meta.copyright.clone(),
			date: meta.date.clone(),
			category: meta.category.clone(),
			menu_label: meta.menu_label.clone(),
			image_types: meta.image_types.clone(),
			deprecated: meta.deprecated.clone(),
			args: procedure.args().iter().map(ArgInfo::from).collect(),
			returns: procedure.returns().iter().map(ArgInfo::from).collect(),
			registrations,
		}
	}
}

impl Pdb {
	/// Describes the record that dispatch would try first for `name`.
	pub fn describe(&self, name: &str) -> Option<ProcInfo> {
		let list = self.index.lookup(name)?;
		let head = list.first()?;
		Some(ProcInfo::new(head, list.len()))
	}

	/// Declared argument `index` of `name`.
	pub fn proc_arg(&self, name: &str, index: usize) -> Option<ArgSpec> {
		let list = self.index.lookup(name)?;
		list.first()?.args().get(index).cloned()
	}

	/// Declared return value `index` of `name`.
	pub fn proc_val(&self, name: &str, index: usize) -> Option<ArgSpec> {
		let list = self.index.lookup(name)?;
		list.first()?.returns().get(index).cloned()
	}
}

#[cfg(test)]
mod tests {
	use procdb_invocation::{ArgKind, ProcDecl, ProcKind, ReturnValues};

	use super::*;
	use crate::config::PdbConfig;

	#[test]
	fn describe_reports_shapes_and_metadata() {
		let pdb = Pdb::new(PdbConfig::default());
		let decl = ProcDecl::new("image-scale", ProcKind::Internal)
			.blurb("Scale the image")
			.attribution("Spencer Kimball", "Spencer Kimball", "1995")
			.menu_label("_Scale Image...")
			.arg("image", ArgKind::Image, "The image")
			.arg("new-width", ArgKind::Int32, "New width")
			.ret("ok", ArgKind::Int32, "");
		pdb.register(Procedure::internal(decl, |_, _| ReturnValues::success([])).unwrap());

		let info = pdb.describe("image-scale").expect("registered");
		assert_eq!(info.proc_type, "Internal Procedure");
		assert_eq!(info.authors, "Spencer Kimball");
		assert_eq!(info.menu_label.as_deref(), Some("_Scale Image..."));
		assert_eq!(info.args.len(), 2);
		assert_eq!(info.args[0].kind, "IMAGE");
		assert_eq!(info.args[0].code, 13);
		assert_eq!(info.registrations, 1);

		assert_eq!(pdb.proc_arg("image-scale", 1).map(|s| s.name), Some("new-width".to_string()));
		assert_eq!(pdb.proc_val("image-scale", 0).map(|s| s.kind), Some(ArgKind::Int32));
		assert!(pdb.proc_arg("image-scale", 2).is_none());
		assert!(pdb.describe("missing").is_none());
	}
}
