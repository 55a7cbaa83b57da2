//! Documentation dumps.
//!
//! The text dump writes one `register-procedure` S-expression per record,
//! sorted by name. Records sharing a name appear in dispatch order.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use procdb_invocation::ArgSpec;

use crate::info::ProcInfo;
use crate::pdb::Pdb;
use crate::procedure::Procedure;

impl Pdb {
	/// Writes the S-expression dump of every registered procedure.
	pub fn dump(&self, out: &mut impl Write) -> io::Result<()> {
		let snap = self.index.snapshot();
		let mut first = true;
		for name in snap.names() {
			let Some(list) = snap.get(name) else {
				continue;
			};
			for procedure in list.iter() {
				if !first {
					writeln!(out)?;
				}
				first = false;
				write_entry(out, procedure)?;
			}
		}
		out.flush()
	}

	pub fn dump_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
		let path = path.as_ref();
		let mut out = BufWriter::new(File::create(path)?);
		self.dump(&mut out)?;
		tracing::info!(path = %path.display(), "wrote procedure dump");
		Ok(())
	}

	/// Writes a JSON array of [`ProcInfo`], one per name, sorted by name.
	pub fn dump_json(&self, out: &mut impl Write) -> io::Result<()> {
		let snap = self.index.snapshot();
		let infos: Vec<ProcInfo> = snap
			.names()
			.into_iter()
			.filter_map(|name| {
				let list = snap.get(name)?;
				Some(ProcInfo::new(list.first()?, list.len()))
			})
			.collect();
		serde_json::to_writer_pretty(&mut *out, &infos)?;
		writeln!(out)?;
		out.flush()
	}
}

fn write_entry(out: &mut impl Write, procedure: &Procedure) -> io::Result<()> {
	let meta = procedure.meta();
	writeln!(out, "(register-procedure {}", quote(procedure.name()))?;
	for field in [&meta.blurb, &meta.help, &meta.authors, &meta.copyright, &meta.date] {
		writeln!(out, "  {}", quote(field))?;
	}
	writeln!(out, "  {}", quote(procedure.kind().label()))?;
	write_specs(out, procedure.args())?;
	write_specs(out, procedure.returns())?;
	writeln!(out, ")")
}

fn write_specs(out: &mut impl Write, specs: &[ArgSpec]) -> io::Result<()> {
	writeln!(out, "  (")?;
	for spec in specs {
		writeln!(
			out,
			"    ( {} {} {} )",
			quote(&spec.name),
			quote(spec.kind.name()),
			quote(&spec.description)
		)?;
	}
	writeln!(out, "  )")
}

fn quote(text: &str) -> String {
	let mut quoted = String::with_capacity(text.len() + 2);
	quoted.push('"');
	for c in text.chars() {
		match c {
			'"' => quoted.push_str("\\\""),
			'\\' => quoted.push_str("\\\\"),
			'\n' => quoted.push_str("\\n"),
			'\t' => quoted.push_str("\\t"),
			c => quoted.push(c),
		}
	}
	quoted.push('"');
	quoted
}
