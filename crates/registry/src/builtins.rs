//! Introspection procedures exposed through the database itself.
//!
//! Out-of-process extensions only see the database through calls, so the
//! query engine and record metadata are published as ordinary internal
//! procedures.

use std::sync::{Arc, Weak};

use procdb_invocation::{Arg, ArgKind, ArgSpec, CallContext, ProcDecl, ProcKind, ReturnValues};

use crate::pdb::Pdb;
use crate::procedure::Procedure;
use crate::query::Query;

const AUTHOR: &str = "procdb";
const DATE: &str = "2024";

type Handler = fn(&Pdb, &CallContext<'_>, &[Arg]) -> ReturnValues;

impl Pdb {
	/// Registers the `pdb-*` introspection procedures.
	pub fn install_builtins(self: &Arc<Self>) {
		for (decl, handler) in builtin_decls() {
			let pdb = Arc::downgrade(self);
			match Procedure::internal(decl, move |ctx, args| with_pdb(&pdb, ctx, args, handler)) {
				Ok(procedure) => {
					self.register(procedure);
				}
				Err(err) => tracing::error!(error = %err, "invalid built-in declaration"),
			}
		}
	}
}

fn with_pdb(pdb: &Weak<Pdb>, ctx: &CallContext<'_>, args: &[Arg], handler: Handler) -> ReturnValues {
	match pdb.upgrade() {
		Some(pdb) => handler(&pdb, ctx, args),
		None => ReturnValues::execution_error("procedure database has shut down"),
	}
}

fn decl(name: &str, blurb: &str) -> ProcDecl {
	ProcDecl::new(name, ProcKind::Internal)
		.blurb(blurb)
		.attribution(AUTHOR, AUTHOR, DATE)
		.category("Procedural database")
}

fn builtin_decls() -> Vec<(ProcDecl, Handler)> {
	let mut query = decl("pdb-query", "Queries the procedure database for its contents using regular expression matching.")
		.help("Every pattern is a case-insensitive regular expression; all must match. Empty patterns match everything.");
	for field in ["name", "blurb", "help", "authors", "copyright", "date", "category", "proc-type"] {
		query.args.push(ArgSpec::string(field, format!("The regex for procedure {field}")));
	}
	let query = query
		.ret("num-matches", ArgKind::Int32, "The number of matching procedures")
		.ret("procedure-names", ArgKind::StringArray, "The list of procedure names");

	let index_lookup = |name: &str, blurb: &str, what: &str| {
		decl(name, blurb)
			.arg("procedure-name", ArgKind::String, "The procedure name")
			.arg(format!("{what}-num"), ArgKind::Int32, format!("The {what} number"))
			.ret(format!("{what}-type"), ArgKind::Int32, format!("The type code of the {what}"))
			.ret(format!("{what}-name"), ArgKind::String, format!("The name of the {what}"))
			.ret(format!("{what}-desc"), ArgKind::String, format!("A description of the {what}"))
	};

	vec![
		(query, pdb_query as Handler),
		(
			decl("pdb-proc-exists", "Checks whether a procedure is registered under the exact name.")
				.arg("procedure-name", ArgKind::String, "The procedure name")
				.ret("exists", ArgKind::Int32, "1 if registered, 0 otherwise"),
			pdb_proc_exists as Handler,
		),
		(
			decl("pdb-proc-info", "Queries the procedure database for information on the specified procedure.")
				.arg("procedure-name", ArgKind::String, "The procedure name")
				.ret("blurb", ArgKind::String, "A short blurb")
				.ret("help", ArgKind::String, "Detailed procedure help")
				.ret("authors", ArgKind::String, "Authors of the procedure")
				.ret("copyright", ArgKind::String, "The copyright")
				.ret("date", ArgKind::String, "Copyright date")
				.ret("proc-type", ArgKind::Int32, "The procedure type code")
				.ret("num-args", ArgKind::Int32, "The number of input arguments")
				.ret("num-values", ArgKind::Int32, "The number of return values"),
			pdb_proc_info as Handler,
		),
		(
			index_lookup("pdb-proc-arg", "Queries the procedure database for information on the specified procedure's argument.", "arg"),
			pdb_proc_arg as Handler,
		),
		(
			index_lookup("pdb-proc-val", "Queries the procedure database for information on the specified procedure's return value.", "val"),
			pdb_proc_val as Handler,
		),
		(
			decl("pdb-temp-name", "Generates a unique temporary procedure name.")
				.ret("temp-name", ArgKind::String, "A unique temporary name for a temporary procedure"),
			pdb_temp_name as Handler,
		),
		(
			decl("pdb-dump", "Dumps the current contents of the procedure database to a file.")
				.arg("filename", ArgKind::String, "The dump filename"),
			pdb_dump as Handler,
		),
		(
			decl("pdb-get-compat-mode", "Returns the current compatibility mode.")
				.ret("compat-mode", ArgKind::String, "One of \"off\", \"on\" or \"warn\""),
			pdb_get_compat_mode as Handler,
		),
	]
}

fn str_arg(args: &[Arg], index: usize) -> &str {
	args.get(index).and_then(Arg::as_str).unwrap_or_default()
}

fn index_arg(args: &[Arg], index: usize) -> Option<usize> {
	args.get(index).and_then(Arg::as_int).and_then(|n| usize::try_from(n).ok())
}

fn count(n: usize) -> Arg {
	Arg::Int32(i32::try_from(n).unwrap_or(i32::MAX))
}

fn pdb_query(pdb: &Pdb, _ctx: &CallContext<'_>, args: &[Arg]) -> ReturnValues {
	let proc_type = str_arg(args, 7);
	let mut query = Query::fields(
		str_arg(args, 0),
		str_arg(args, 1),
		str_arg(args, 2),
		str_arg(args, 3),
		str_arg(args, 4),
		str_arg(args, 5),
		str_arg(args, 6),
	);
	if !proc_type.is_empty() {
		query = query.proc_type(proc_type);
	}
	match pdb.query(&query) {
		Ok(names) => ReturnValues::success([count(names.len()), Arg::StringArray(names)]),
		Err(err) => ReturnValues::calling_error(err.to_string()),
	}
}

fn pdb_proc_exists(pdb: &Pdb, _ctx: &CallContext<'_>, args: &[Arg]) -> ReturnValues {
	let exists = pdb.proc_exists(str_arg(args, 0));
	ReturnValues::success([Arg::Int32(i32::from(exists))])
}

fn pdb_proc_info(pdb: &Pdb, _ctx: &CallContext<'_>, args: &[Arg]) -> ReturnValues {
	let name = str_arg(args, 0);
	let Some(info) = pdb.describe(name) else {
		return ReturnValues::execution_error(format!("procedure '{name}' not found"));
	};
	ReturnValues::success([
		Arg::string(info.blurb),
		Arg::string(info.help),
		Arg::string(info.authors),
		Arg::string(info.copyright),
		Arg::string(info.date),
		Arg::Int32(i32::from(info.proc_type_code)),
		count(info.args.len()),
		count(info.returns.len()),
	])
}

fn spec_values(name: &str, index: Option<usize>, spec: Option<ArgSpec>, what: &str) -> ReturnValues {
	match spec {
		Some(spec) => ReturnValues::success([
			Arg::Int32(i32::from(spec.kind.code())),
			Arg::string(spec.name),
			Arg::string(spec.description),
		]),
		None => ReturnValues::execution_error(format!(
			"procedure '{name}' has no {what} #{}",
			index.map_or_else(|| "?".to_string(), |i| i.to_string())
		)),
	}
}

fn pdb_proc_arg(pdb: &Pdb, _ctx: &CallContext<'_>, args: &[Arg]) -> ReturnValues {
	let name = str_arg(args, 0);
	let index = index_arg(args, 1);
	spec_values(name, index, index.and_then(|i| pdb.proc_arg(name, i)), "argument")
}

fn pdb_proc_val(pdb: &Pdb, _ctx: &CallContext<'_>, args: &[Arg]) -> ReturnValues {
	let name = str_arg(args, 0);
	let index = index_arg(args, 1);
	spec_values(name, index, index.and_then(|i| pdb.proc_val(name, i)), "return value")
}

fn pdb_temp_name(pdb: &Pdb, _ctx: &CallContext<'_>, _args: &[Arg]) -> ReturnValues {
	ReturnValues::success([Arg::string(pdb.temp_name())])
}

fn pdb_dump(pdb: &Pdb, _ctx: &CallContext<'_>, args: &[Arg]) -> ReturnValues {
	let path = str_arg(args, 0);
	match pdb.dump_to_file(path) {
		Ok(()) => ReturnValues::success([]),
		Err(err) => ReturnValues::execution_error(format!("could not write dump to '{path}': {err}")),
	}
}

fn pdb_get_compat_mode(pdb: &Pdb, _ctx: &CallContext<'_>, _args: &[Arg]) -> ReturnValues {
	ReturnValues::success([Arg::string(pdb.compat_mode().to_string())])
}

#[cfg(test)]
mod tests {
	use procdb_invocation::{ArgList, Status};

	use super::*;
	use crate::config::PdbConfig;

	fn pdb() -> Arc<Pdb> {
		let pdb = Pdb::new(PdbConfig::default());
		pdb.install_builtins();
		pdb
	}

	fn strings(values: &[&str]) -> ArgList {
		values.iter().map(|s| Arg::string(*s)).collect()
	}

	#[test]
	fn builtins_are_registered() {
		let pdb = pdb();
		for name in ["pdb-query", "pdb-proc-exists", "pdb-proc-info", "pdb-proc-arg", "pdb-proc-val", "pdb-temp-name", "pdb-dump", "pdb-get-compat-mode"] {
			assert!(pdb.proc_exists(name), "{name}");
		}
	}

	#[test]
	fn query_through_the_database() {
		let pdb = pdb();
		let result = pdb.execute("pdb-query", &strings(&["^pdb-proc-(arg|val)$", "", "", "", "", "", "", ""]));
		assert_eq!(result.status(), Status::Success);
		assert_eq!(
			result.values(),
			&[Arg::Int32(2), Arg::string_array(["pdb-proc-arg", "pdb-proc-val"])]
		);

		let bad = pdb.execute("pdb-query", &strings(&["(", "", "", "", "", "", "", ""]));
		assert_eq!(bad.status(), Status::CallingError);
	}

	#[test]
	fn proc_info_and_arg() {
		let pdb = pdb();
		let info = pdb.execute("pdb-proc-info", &strings(&["pdb-proc-arg"]));
		assert_eq!(info.status(), Status::Success);
		assert_eq!(info.value(5), Some(&Arg::Int32(0)));
		assert_eq!(info.value(6), Some(&Arg::Int32(2)));
		assert_eq!(info.value(7), Some(&Arg::Int32(3)));

		let arg = pdb.execute("pdb-proc-arg", &vec![Arg::string("pdb-proc-arg"), Arg::Int32(1)].into());
		assert_eq!(arg.value(0), Some(&Arg::Int32(i32::from(ArgKind::Int32.code()))));
		assert_eq!(arg.value(1).and_then(Arg::as_str), Some("arg-num"));

		let missing = pdb.execute("pdb-proc-val", &vec![Arg::string("pdb-dump"), Arg::Int32(0)].into());
		assert_eq!(missing.status(), Status::ExecutionError);
	}

	#[test]
	fn exists_and_temp_name() {
		let pdb = pdb();
		let yes = pdb.execute("pdb-proc-exists", &strings(&["pdb-dump"]));
		assert_eq!(yes.values(), &[Arg::Int32(1)]);
		let no = pdb.execute("pdb-proc-exists", &strings(&["pdb-nothing"]));
		assert_eq!(no.values(), &[Arg::Int32(0)]);

		let temp = pdb.execute("pdb-temp-name", &ArgList::new());
		assert!(temp.value(0).and_then(Arg::as_str).is_some_and(|n| n.starts_with("temp-procedure-number-")));
	}

	#[test]
	fn dump_and_compat_mode() {
		let pdb = pdb();
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("dump.txt");
		let result = pdb.execute("pdb-dump", &strings(&[path.to_str().unwrap()]));
		assert_eq!(result.status(), Status::Success);
		let text = std::fs::read_to_string(&path).unwrap();
		assert!(text.contains("(register-procedure \"pdb-dump\""));

		let mode = pdb.execute("pdb-get-compat-mode", &ArgList::new());
		assert_eq!(mode.value(0).and_then(Arg::as_str), Some("off"));
	}

	#[test]
	fn builtins_do_not_keep_database_alive() {
		let pdb = pdb();
		let weak = Arc::downgrade(&pdb);
		drop(pdb);
		assert!(weak.upgrade().is_none());
	}
}
