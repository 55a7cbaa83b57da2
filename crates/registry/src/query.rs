//! Regex search over procedure metadata.

use procdb_invocation::{ProcKind, ProcMeta};
use regex::{Regex, RegexBuilder};

use crate::compat::CompatMode;
use crate::pdb::Pdb;

/// Error raised by [`Pdb::query`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
	#[error("invalid {field} pattern {pattern:?}: {reason}")]
	InvalidPattern {
		field: &'static str,
		pattern: String,
		reason: String,
	},
}

/// Metadata search patterns.
///
/// Every pattern is a case-insensitive regex matched anywhere in its field;
/// an empty pattern matches everything. A procedure is reported only when
/// all patterns match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
	pub name: String,
	pub blurb: String,
	pub help: String,
	pub authors: String,
	pub copyright: String,
	pub date: String,
	pub category: String,
	/// Pattern over the kind label ("Internal Procedure", "Plug-In", ...).
	pub proc_type: Option<String>,
}

impl Query {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a query from the seven metadata patterns.
	pub fn fields(name: &str, blurb: &str, help: &str, authors: &str, copyright: &str, date: &str, category: &str) -> Self {
		Self {
			name: name.into(),
			blurb: blurb.into(),
			help: help.into(),
			authors: authors.into(),
			copyright: copyright.into(),
			date: date.into(),
			category: category.into(),
			proc_type: None,
		}
	}

	pub fn name(mut self, pattern: impl Into<String>) -> Self {
		self.name = pattern.into();
		self
	}

	pub fn blurb(mut self, pattern: impl Into<String>) -> Self {
		self.blurb = pattern.into();
		self
	}

	pub fn help(mut self, pattern: impl Into<String>) -> Self {
		self.help = pattern.into();
		self
	}

	pub fn authors(mut self, pattern: impl Into<String>) -> Self {
		self.authors = pattern.into();
		self
	}

	pub fn copyright(mut self, pattern: impl Into<String>) -> Self {
		self.copyright = pattern.into();
		self
	}

	pub fn date(mut self, pattern: impl Into<String>) -> Self {
		self.date = pattern.into();
		self
	}

	pub fn category(mut self, pattern: impl Into<String>) -> Self {
		self.category = pattern.into();
		self
	}

	pub fn proc_type(mut self, pattern: impl Into<String>) -> Self {
		self.proc_type = Some(pattern.into());
		self
	}

	fn compile(&self) -> Result<Compiled, QueryError> {
		Ok(Compiled {
			name: compile("name", &self.name)?,
			blurb: compile("blurb", &self.blurb)?,
			help: compile("help", &self.help)?,
			authors: compile("authors", &self.authors)?,
			copyright: compile("copyright", &self.copyright)?,
			date: compile("date", &self.date)?,
			category: compile("category", &self.category)?,
			proc_type: self.proc_type.as_deref().map(|p| compile("proc-type", p)).transpose()?,
		})
	}
}

fn compile(field: &'static str, pattern: &str) -> Result<Regex, QueryError> {
	RegexBuilder::new(pattern)
		.case_insensitive(true)
		.build()
		.map_err(|err| QueryError::InvalidPattern {
			field,
			pattern: pattern.to_string(),
			reason: err.to_string(),
		})
}

struct Compiled {
	name: Regex,
	blurb: Regex,
	help: Regex,
	authors: Regex,
	copyright: Regex,
	date: Regex,
	category: Regex,
	proc_type: Option<Regex>,
}

impl Compiled {
	fn matches(&self, name: &str, meta: &ProcMeta, blurb: &str, help: &str, kind: ProcKind) -> bool {
		self.name.is_match(name)
			&& self.blurb.is_match(blurb)
			&& self.help.is_match(help)
			&& self.authors.is_match(&meta.authors)
			&& self.copyright.is_match(&meta.copyright)
			&& self.date.is_match(&meta.date)
			&& self.category.is_match(&meta.category)
			&& self.proc_type.as_ref().is_none_or(|re| re.is_match(kind.label()))
	}
}

/// Blurb and help synthesized for a deprecated alias.
pub(crate) fn deprecation_text(canonical: &str) -> String {
	format!("Deprecated: use '{canonical}' instead.")
}

impl Pdb {
	/// Returns the sorted, de-duplicated names whose metadata matches `query`.
	///
	/// Each name is matched against its most recent registration. When the
	/// compat mode is not `Off`, deprecated aliases of registered procedures
	/// are included with synthesized documentation.
	pub fn query(&self, query: &Query) -> Result<Vec<String>, QueryError> {
		let compiled = query.compile()?;
		let snap = self.index.snapshot();

		let mut names: Vec<String> = snap
			.iter()
			.filter_map(|(name, list)| {
				let head = list.first()?;
				let meta = head.meta();
				compiled
					.matches(name, meta, &meta.blurb, &meta.help, head.kind())
					.then(|| name.to_string())
			})
			.collect();

		if self.compat_mode() != CompatMode::Off {
			for (old, canonical) in self.compat.iter() {
				let Some(head) = snap.get(canonical).and_then(|list| list.first()) else {
					continue;
				};
				let text = deprecation_text(canonical);
				if compiled.matches(old, head.meta(), &text, &text, head.kind()) {
					names.push(old.to_string());
				}
			}
		}

		names.sort_unstable();
		names.dedup();
		tracing::debug!(matches = names.len(), "query");
		Ok(names)
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::thread;

	use procdb_invocation::{ProcDecl, ReturnValues};

	use super::*;
	use crate::config::PdbConfig;
	use crate::procedure::Procedure;

	fn register(pdb: &Pdb, decl: ProcDecl) {
		pdb.register(Procedure::internal(decl, |_, _| ReturnValues::success([])).unwrap());
	}

	fn sample() -> Arc<Pdb> {
		let pdb = Pdb::new(PdbConfig::default());
		register(&pdb, ProcDecl::new("foo-bar", ProcKind::Internal).blurb("Foo things").attribution("Ada", "Ada", "1995"));
		register(&pdb, ProcDecl::new("foo-baz", ProcKind::Internal).blurb("More foo").help("Baz help"));
		register(&pdb, ProcDecl::new("bar-foo", ProcKind::Internal).blurb("Not a prefix match"));
		register(&pdb, ProcDecl::new("drawable-delete", ProcKind::Internal).blurb("Delete a drawable"));
		pdb
	}

	#[test]
	fn anchored_name_pattern() {
		let pdb = sample();
		assert_eq!(pdb.query(&Query::new().name("^foo")).unwrap(), ["foo-bar", "foo-baz"]);
	}

	#[test]
	fn patterns_are_case_insensitive() {
		let pdb = sample();
		assert_eq!(pdb.query(&Query::new().name("^FOO")).unwrap(), ["foo-bar", "foo-baz"]);
		assert_eq!(pdb.query(&Query::new().blurb("foo THINGS")).unwrap(), ["foo-bar"]);
	}

	#[test]
	fn all_patterns_must_match() {
		let pdb = sample();
		let query = Query::fields("^foo", "", "baz", "", "", "", "");
		assert_eq!(pdb.query(&query).unwrap(), ["foo-baz"]);

		let none = Query::fields("^foo", "", "", "nobody", "", "", "");
		assert!(pdb.query(&none).unwrap().is_empty());
	}

	#[test]
	fn invalid_pattern_is_reported() {
		let pdb = sample();
		let err = pdb.query(&Query::new().help("(unclosed")).unwrap_err();
		assert!(matches!(err, QueryError::InvalidPattern { field: "help", .. }));
	}

	#[test]
	fn proc_type_matches_kind_label() {
		let pdb = sample();
		assert_eq!(pdb.query(&Query::new().proc_type("^internal")).unwrap().len(), 4);
		assert!(pdb.query(&Query::new().proc_type("plug-in")).unwrap().is_empty());
	}

	#[test]
	fn duplicate_registrations_are_reported_once() {
		let pdb = sample();
		register(&pdb, ProcDecl::new("foo-bar", ProcKind::Internal).blurb("Foo again"));
		assert_eq!(pdb.query(&Query::new().name("^foo-bar$")).unwrap(), ["foo-bar"]);
	}

	#[test]
	fn compat_aliases_depend_on_mode() {
		let pdb = sample();
		let query = Query::new().name("delete$");
		assert_eq!(pdb.query(&query).unwrap(), ["drawable-delete"]);

		pdb.set_compat_mode(CompatMode::On);
		assert_eq!(
			pdb.query(&query).unwrap(),
			["channel-delete", "drawable-delete", "layer-delete"]
		);

		let by_blurb = Query::new().blurb("use 'drawable-delete'");
		assert_eq!(pdb.query(&by_blurb).unwrap(), ["channel-delete", "layer-delete"]);
	}

	#[test]
	fn query_is_stable_under_concurrent_describe() {
		let pdb = sample();
		let readers: Vec<_> = (0..4)
			.map(|_| {
				let pdb = pdb.clone();
				thread::spawn(move || {
					for _ in 0..200 {
						assert!(pdb.describe("foo-bar").is_some());
					}
				})
			})
			.collect();
		for _ in 0..200 {
			assert_eq!(pdb.query(&Query::new().name("^foo")).unwrap(), ["foo-bar", "foo-baz"]);
		}
		for reader in readers {
			reader.join().unwrap();
		}
	}
}
