//! Demonstration extension executable.
//!
//! Announces a handful of procedures that exercise the process bridge:
//! plain round trips, array arguments, nested calls back into the host,
//! temporary procedures and a resident extension.

use anyhow::bail;
use procdb_invocation::{Arg, ArgKind, ArgList, ProcDecl, ProcKind, ReturnValues, Status};
use procdb_rpc::plugin::Plugin;
use procdb_rpc::{QUERY_FLAG, RUN_FLAG};

const AUTHOR: &str = "procdb developers";
const DATE: &str = "2024";

fn declarations() -> Vec<ProcDecl> {
	let plugin = |name: &str, blurb: &str| {
		ProcDecl::new(name, ProcKind::Plugin)
			.blurb(blurb)
			.attribution(AUTHOR, AUTHOR, DATE)
			.category("Demo")
	};
	vec![
		plugin("demo-echo", "Return the given text")
			.arg("text", ArgKind::String, "Text to echo")
			.ret("text", ArgKind::String, "The same text"),
		plugin("demo-sum", "Sum an array of integers")
			.arg("num-values", ArgKind::Int32, "Number of values")
			.arg("values", ArgKind::Int32Array, "Values to add")
			.ret("sum", ArgKind::Int32, "Sum of the values"),
		plugin("demo-callback", "Ask the host whether a procedure exists")
			.arg("name", ArgKind::String, "Procedure name")
			.ret("exists", ArgKind::Int32, "1 if registered"),
		plugin("demo-with-temporary", "Double a value through a temporary procedure")
			.arg("value", ArgKind::Int32, "Value to double")
			.ret("doubled", ArgKind::Int32, "Twice the value")
			.ret("temp-name", ArgKind::String, "Name the temporary procedure had"),
		plugin("demo-decline", "Always pass to the next registration"),
		ProcDecl::new("demo-resident", ProcKind::Extension)
			.blurb("Stay resident and serve demo-resident-ping and demo-resident-crash")
			.attribution(AUTHOR, AUTHOR, DATE)
			.category("Demo"),
	]
}

fn run(plugin: &Plugin, name: &str, args: &[Arg]) -> ReturnValues {
	match name {
		"demo-echo" => ReturnValues::success([args[0].clone()]),
		"demo-sum" => match &args[1] {
			Arg::Int32Array(values) => ReturnValues::success([Arg::Int32(values.iter().sum())]),
			other => ReturnValues::calling_error(format!("expected INT32ARRAY, got {}", other.kind())),
		},
		"demo-callback" => match plugin.call("pdb-proc-exists", vec![args[0].clone()]) {
			Ok(result) => ReturnValues::success(result.values().first().cloned()),
			Err(err) => ReturnValues::execution_error(err.to_string()),
		},
		"demo-with-temporary" => with_temporary(plugin, args).unwrap_or_else(|err| ReturnValues::execution_error(err.to_string())),
		"demo-decline" => ReturnValues::pass_through(),
		"demo-resident" => resident(plugin).unwrap_or_else(|err| ReturnValues::execution_error(err.to_string())),
		other => ReturnValues::calling_error(format!("procedure '{other}' is not provided by this extension")),
	}
}

fn with_temporary(plugin: &Plugin, args: &[Arg]) -> anyhow::Result<ReturnValues> {
	let named = plugin.call("pdb-temp-name", ArgList::new())?;
	let Some(temp) = named.value(0).and_then(Arg::as_str).map(str::to_owned) else {
		bail!("pdb-temp-name returned {}", named.status());
	};

	let decl = ProcDecl::new(&temp, ProcKind::Temporary)
		.arg("value", ArgKind::Int32, "")
		.ret("doubled", ArgKind::Int32, "");
	plugin.install_temporary(decl, |_, args| match args[0].as_int().and_then(|v| i32::try_from(v * 2).ok()) {
		Some(doubled) => ReturnValues::success([Arg::Int32(doubled)]),
		None => ReturnValues::execution_error("value out of range"),
	})?;

	let result = plugin.call(&temp, args.to_vec())?;
	plugin.uninstall_temporary(&temp)?;
	if result.status() != Status::Success {
		return Ok(result);
	}
	Ok(ReturnValues::success(result.values().iter().cloned().chain([Arg::string(temp)])))
}

fn resident(plugin: &Plugin) -> anyhow::Result<ReturnValues> {
	let decl = ProcDecl::new("demo-resident-ping", ProcKind::Temporary)
		.blurb("Answer from the resident demo extension")
		.ret("pong", ArgKind::Int32, "Always 42");
	plugin.install_temporary(decl, |_, _| ReturnValues::success([Arg::Int32(42)]))?;
	let crash = ProcDecl::new("demo-resident-crash", ProcKind::Temporary).blurb("Exit without answering");
	plugin.install_temporary(crash, |_, _| std::process::exit(3))?;
	plugin.extension_ack()?;
	plugin.serve_temporaries()?;
	Ok(ReturnValues::success([]))
}

fn main() -> anyhow::Result<()> {
	let subscriber = tracing_subscriber::fmt()
		.with_max_level(tracing::Level::WARN)
		.with_writer(std::io::stderr)
		.finish();
	tracing::subscriber::set_global_default(subscriber)?;

	let mode = std::env::args().skip(1).find(|arg| arg == QUERY_FLAG || arg == RUN_FLAG);
	if mode.is_none() {
		bail!("procdb-demo-extension is started by procdb with {QUERY_FLAG} or {RUN_FLAG}");
	}
	Plugin::stdio().main(&declarations(), run)?;
	Ok(())
}
