//! `procdb` command line.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use procdb_registry::{CompatMode, ProcInfo, Query};
use tracing::Level;

use crate::app::App;
use crate::args::parse_call_args;
use crate::cache;
use crate::config::{self, ConfigLoadReport, ProcdbConfig};

#[derive(Parser, Debug)]
#[command(name = "procdb")]
#[command(about = "Query, document and run procedures in the procedure database")]
#[command(version)]
pub struct Cli {
	/// Config file (defaults to procdb.toml in the user config directory)
	#[arg(short, long, value_name = "PATH", global = true)]
	pub config: Option<PathBuf>,

	/// Override the configured compatibility mode
	#[arg(long, value_name = "MODE", global = true)]
	pub compat: Option<CompatMode>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	pub verbose: bool,

	/// Query every extension instead of reusing cached declarations
	#[arg(long, global = true)]
	pub no_cache: bool,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// List procedures whose metadata matches every pattern
	Query(QueryArgs),
	/// Show a procedure's documentation and signature
	Info {
		name: String,
	},
	/// Write documentation for every procedure
	Dump {
		/// Emit JSON instead of S-expressions
		#[arg(long)]
		json: bool,
		/// Write to a file instead of stdout
		#[arg(short, long, value_name = "PATH")]
		output: Option<PathBuf>,
	},
	/// Run a procedure; one value per declared argument, array counts are implied
	Run {
		name: String,
		#[arg(allow_hyphen_values = true)]
		args: Vec<String>,
	},
}

/// Case-insensitive regex patterns; omitted patterns match everything.
#[derive(clap::Args, Debug, Default)]
pub struct QueryArgs {
	#[arg(long, default_value = "")]
	pub name: String,
	#[arg(long, default_value = "")]
	pub blurb: String,
	#[arg(long = "help-text", default_value = "")]
	pub help: String,
	#[arg(long, default_value = "")]
	pub authors: String,
	#[arg(long, default_value = "")]
	pub copyright: String,
	#[arg(long, default_value = "")]
	pub date: String,
	#[arg(long, default_value = "")]
	pub category: String,
	/// Pattern over the procedure type ("Internal Procedure", "Plug-In", ...)
	#[arg(long = "type")]
	pub proc_type: Option<String>,
}

impl From<QueryArgs> for Query {
	fn from(args: QueryArgs) -> Self {
		let query = Query::fields(&args.name, &args.blurb, &args.help, &args.authors, &args.copyright, &args.date, &args.category);
		match args.proc_type {
			Some(pattern) => query.proc_type(pattern),
			None => query,
		}
	}
}

/// Parses the command line and runs it.
pub fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	let report = load_config(cli.config.as_deref())?;
	let mut config = report.config_or_default();
	if let Some(mode) = cli.compat {
		config.compat_mode = mode;
	}
	if cli.no_cache {
		config.extension_cache = None;
	} else if config.extension_cache.is_none() {
		config.extension_cache = cache::default_cache_file();
	}

	init_logging(cli.verbose, config.log_level.as_deref())?;
	for (path, warning) in &report.warnings {
		tracing::warn!(path = %path.display(), "{warning}");
	}
	for (path, error) in &report.errors {
		tracing::error!(path = %path.display(), "{error}");
	}

	let app = App::start(&config);
	let result = run(&app, cli.command);
	app.shutdown();
	result
}

fn load_config(explicit: Option<&std::path::Path>) -> anyhow::Result<ConfigLoadReport> {
	if let Some(path) = explicit {
		let config = config::load_config_file(path)?;
		return Ok(ConfigLoadReport {
			config: Some(config),
			..ConfigLoadReport::default()
		});
	}
	let mut report = match config::default_config_dir() {
		Some(dir) => config::load_config_from_dir(&dir),
		None => ConfigLoadReport::default(),
	};
	if let Some(dir) = config::default_extension_dir().filter(|dir| dir.is_dir()) {
		let mut config = report.config.take().unwrap_or_else(ProcdbConfig::default);
		if !config.extension_dirs.contains(&dir) {
			config.extension_dirs.push(dir);
		}
		report.config = Some(config);
	}
	Ok(report)
}

fn init_logging(verbose: bool, configured: Option<&str>) -> anyhow::Result<()> {
	let level = match (verbose, configured) {
		(true, _) => Level::DEBUG,
		(false, Some(name)) => name.parse().with_context(|| format!("invalid log_level {name:?}"))?,
		(false, None) => Level::WARN,
	};
	let subscriber = tracing_subscriber::fmt().with_max_level(level).with_writer(io::stderr).finish();
	tracing::subscriber::set_global_default(subscriber)?;
	Ok(())
}

fn run(app: &App, command: Command) -> anyhow::Result<()> {
	let pdb = app.pdb();
	let stdout = io::stdout();
	let mut out = stdout.lock();
	match command {
		Command::Query(args) => {
			for name in pdb.query(&args.into())? {
				writeln!(out, "{name}")?;
			}
		}
		Command::Info { name } => {
			let Some(info) = pdb.describe(&name) else {
				bail!("{}", not_found(app, &name));
			};
			print_info(&mut out, &info)?;
		}
		Command::Dump { json, output } => {
			let mut sink: Box<dyn Write> = match &output {
				Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| format!("cannot create {}", path.display()))?)),
				None => Box::new(out),
			};
			if json {
				pdb.dump_json(&mut sink)?;
			} else {
				pdb.dump(&mut sink)?;
			}
			sink.flush()?;
		}
		Command::Run { name, args } => {
			let canonical = resolve(app, &name)?;
			let specs = pdb.index().lookup(&canonical).map(|list| list[0].args().clone()).unwrap_or_default();
			let list = parse_call_args(&specs, &args)?;
			let result = pdb.execute(&name, &list);
			writeln!(out, "{}", result.status())?;
			if !result.is_success() {
				bail!("{name}: {}", result.error_message().unwrap_or("no message"));
			}
			let returns = pdb.describe(&canonical).map(|info| info.returns).unwrap_or_default();
			for (i, value) in result.values().iter().enumerate() {
				match returns.get(i) {
					Some(spec) => writeln!(out, "{}\t{value}", spec.name)?,
					None => writeln!(out, "{value}")?,
				}
			}
		}
	}
	Ok(())
}

/// Canonical name for `name`, following the compatibility table when enabled.
fn resolve(app: &App, name: &str) -> anyhow::Result<String> {
	let pdb = app.pdb();
	if pdb.proc_exists(name) {
		return Ok(name.to_string());
	}
	if pdb.compat_mode() != CompatMode::Off
		&& let Some(canonical) = pdb.lookup_compat(name)
		&& pdb.proc_exists(canonical)
	{
		return Ok(canonical.to_string());
	}
	bail!("{}", not_found(app, name))
}

fn not_found(app: &App, name: &str) -> String {
	match app.pdb().suggest(name) {
		Some(close) => format!("procedure '{name}' not found (did you mean '{close}'?)"),
		None => format!("procedure '{name}' not found"),
	}
}

fn print_info(out: &mut impl Write, info: &ProcInfo) -> io::Result<()> {
	writeln!(out, "{} ({})", info.name, info.proc_type)?;
	if !info.blurb.is_empty() {
		writeln!(out, "  {}", info.blurb)?;
	}
	if !info.help.is_empty() {
		writeln!(out, "\n  {}", info.help)?;
	}
	writeln!(out)?;
	let attribution = [&info.authors, &info.copyright, &info.date].into_iter().filter(|s| !s.is_empty()).cloned().collect::<Vec<_>>();
	if !attribution.is_empty() {
		writeln!(out, "  by {}", attribution.join(", "))?;
	}
	if let Some(replacement) = &info.deprecated {
		writeln!(out, "  deprecated: use '{replacement}'")?;
	}
	if info.registrations > 1 {
		writeln!(out, "  {} registrations, most recent shown", info.registrations)?;
	}
	print_specs(out, "arguments", info.args.iter().map(|a| (&a.name, a.kind, &a.description)))?;
	print_specs(out, "returns", info.returns.iter().map(|a| (&a.name, a.kind, &a.description)))
}

fn print_specs<'a>(out: &mut impl Write, title: &str, specs: impl Iterator<Item = (&'a String, &'a str, &'a String)>) -> io::Result<()> {
	let specs: Vec<_> = specs.collect();
	if specs.is_empty() {
		return Ok(());
	}
	writeln!(out, "  {title}:")?;
	for (name, kind, description) in specs {
		writeln!(out, "    {name:<16} {kind:<12} {description}")?;
	}
	Ok(())
}

