//! Host startup and shutdown: the database, built-ins and extensions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use procdb_invocation::{ArgList, Backend, ProcDecl, ProcKind, TransportError};
use procdb_registry::{Pdb, Procedure};
use procdb_rpc::{ProcessBackend, query_extension};
use tracing::{debug, info, warn};

use crate::cache::{ExtensionCache, Mtime};
use crate::config::{ExtensionConfig, ProcdbConfig};

/// A running host.
#[derive(Debug)]
pub struct App {
	pdb: Arc<Pdb>,
	extensions: Vec<Loaded>,
	cache: Option<ExtensionCache>,
}

#[derive(Debug)]
struct Loaded {
	backend: Arc<ProcessBackend>,
	procedures: Vec<String>,
}

impl App {
	/// Creates the database, installs built-ins and loads every configured
	/// and discovered extension.
	///
	/// Extensions that fail to answer the query are logged and skipped.
	pub fn start(config: &ProcdbConfig) -> Self {
		let pdb = Pdb::new(config.pdb_config());
		pdb.install_builtins();
		let mut app = Self {
			pdb,
			extensions: Vec::new(),
			cache: config.extension_cache.as_deref().map(ExtensionCache::load),
		};

		let discovered = config.extension_dirs.iter().flat_map(|dir| scan_dir(dir)).map(|path| ExtensionConfig {
			path,
			args: Vec::new(),
			autostart: false,
		});
		for ext in config.extensions.iter().cloned().chain(discovered) {
			if let Err(err) = app.load_extension(&ext) {
				warn!(path = %ext.path.display(), error = %err, "skipping extension");
			}
		}
		app.save_cache();
		info!(procedures = app.pdb.index().len(), extensions = app.extensions.len(), "host started");
		app
	}

	pub fn pdb(&self) -> &Arc<Pdb> {
		&self.pdb
	}

	/// Queries one executable and registers what it announces.
	///
	/// Returns the number of procedures registered. Declarations that fail
	/// validation, or that claim to be internal or temporary, are skipped.
	pub fn load_extension(&mut self, ext: &ExtensionConfig) -> Result<usize, TransportError> {
		if self.extensions.iter().any(|l| l.backend.path() == ext.path) {
			debug!(path = %ext.path.display(), "extension already loaded");
			return Ok(0);
		}

		let decls = self.declarations(ext)?;
		let backend = Arc::new(ProcessBackend::with_args(&ext.path, ext.args.clone()));
		let mut procedures = Vec::with_capacity(decls.len());
		let mut autostart = Vec::new();
		for decl in decls {
			if !matches!(decl.kind, ProcKind::Plugin | ProcKind::Extension) {
				warn!(name = %decl.name, kind = %decl.kind, "extension announced a procedure of the wrong kind");
				continue;
			}
			let name = decl.name.clone();
			let starts = ext.autostart && decl.kind == ProcKind::Extension && decl.args.is_empty();
			match Procedure::new(decl, backend.clone() as Arc<dyn Backend>) {
				Ok(procedure) => {
					self.pdb.register(procedure);
					if starts {
						autostart.push(name.clone());
					}
					procedures.push(name);
				}
				Err(err) => warn!(%name, error = %err, "rejected procedure declaration"),
			}
		}

		for name in &autostart {
			let result = self.pdb.execute(name, &ArgList::new());
			if result.is_success() {
				debug!(procedure = %name, "autostarted");
			} else {
				warn!(procedure = %name, status = %result.status(), message = result.error_message().unwrap_or_default(), "autostart failed");
			}
		}

		let count = procedures.len();
		info!(path = %ext.path.display(), procedures = count, "extension loaded");
		self.extensions.push(Loaded { backend, procedures });
		Ok(count)
	}

	/// Declarations of `ext`, from the cache when its mtime is unchanged.
	fn declarations(&mut self, ext: &ExtensionConfig) -> Result<Vec<ProcDecl>, TransportError> {
		let mtime = Mtime::of(&ext.path);
		if let (Some(cache), Some(mtime)) = (self.cache.as_mut(), mtime)
			&& let Some(decls) = cache.lookup(&ext.path, &ext.args, mtime)
		{
			debug!(path = %ext.path.display(), procedures = decls.len(), "using cached declarations");
			return Ok(decls);
		}
		let decls = query_extension(&ext.path, &ext.args)?;
		if let (Some(cache), Some(mtime)) = (self.cache.as_mut(), mtime) {
			cache.insert(&ext.path, &ext.args, mtime, decls.clone());
		}
		Ok(decls)
	}

	fn save_cache(&mut self) {
		if let Some(cache) = self.cache.as_mut()
			&& let Err(err) = cache.save()
		{
			warn!(error = %err, "failed to write declaration cache");
		}
	}

	/// Procedures per loaded executable.
	pub fn extensions(&self) -> impl Iterator<Item = (&Path, &[String])> {
		self.extensions.iter().map(|l| (l.backend.path(), l.procedures.as_slice()))
	}

	/// Stops resident extensions and releases every record.
	pub fn shutdown(mut self) -> usize {
		self.save_cache();
		self.pdb.shutdown()
	}
}

/// Executable files directly inside `dir`, sorted by path.
fn scan_dir(dir: &Path) -> Vec<PathBuf> {
	let entries = match std::fs::read_dir(dir) {
		Ok(entries) => entries,
		Err(err) => {
			warn!(dir = %dir.display(), error = %err, "cannot scan extension directory");
			return Vec::new();
		}
	};
	let mut found: Vec<PathBuf> = entries.filter_map(Result::ok).map(|e| e.path()).filter(|p| is_executable(p)).collect();
	found.sort();
	debug!(dir = %dir.display(), found = found.len(), "scanned extension directory");
	found
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
	use std::os::unix::fs::PermissionsExt;
	path.metadata().is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
	path.is_file()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::{CacheEntry, read_cache, write_cache};

	/// Config with one non-executable "extension" and a cache entry for it.
	fn cached(dir: &Path, skew: u64) -> ProcdbConfig {
		let exe = dir.join("tool");
		std::fs::write(&exe, "not a program").unwrap();
		let mut mtime = Mtime::of(&exe).unwrap();
		mtime.secs += skew;
		let file = dir.join("extensions.cache");
		write_cache(&file, &[CacheEntry {
			path: exe.clone(),
			args: Vec::new(),
			mtime,
			decls: vec![ProcDecl::new("tool-run", ProcKind::Plugin)],
		}])
		.unwrap();
		ProcdbConfig {
			extensions: vec![ExtensionConfig {
				path: exe,
				args: Vec::new(),
				autostart: false,
			}],
			extension_cache: Some(file),
			..ProcdbConfig::default()
		}
	}

	#[test]
	fn cached_declarations_skip_the_query() {
		let dir = tempfile::tempdir().unwrap();
		let app = App::start(&cached(dir.path(), 0));
		assert!(app.pdb().proc_exists("tool-run"));
		assert_eq!(app.extensions().count(), 1);
	}

	#[test]
	fn stale_cache_entry_is_queried_again() {
		let dir = tempfile::tempdir().unwrap();
		let config = cached(dir.path(), 1);
		let app = App::start(&config);
		assert!(!app.pdb().proc_exists("tool-run"));
		assert_eq!(app.extensions().count(), 0);
		let file = config.extension_cache.unwrap();
		assert!(read_cache(&file).unwrap().is_empty());
	}

	#[test]
	fn corrupt_cache_does_not_block_startup() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("extensions.cache");
		std::fs::write(&file, b"garbage").unwrap();
		let app = App::start(&ProcdbConfig {
			extension_cache: Some(file),
			..ProcdbConfig::default()
		});
		assert!(app.pdb().proc_exists("pdb-query"));
	}

	#[test]
	fn start_without_extensions_has_builtins() {
		let app = App::start(&ProcdbConfig::default());
		assert!(app.pdb().proc_exists("pdb-query"));
		assert_eq!(app.extensions().count(), 0);
		assert!(app.shutdown() > 0);
	}

	#[test]
	fn missing_extension_is_skipped() {
		let config = ProcdbConfig {
			extensions: vec![ExtensionConfig {
				path: "/nonexistent/procdb-extension".into(),
				args: Vec::new(),
				autostart: false,
			}],
			..ProcdbConfig::default()
		};
		let app = App::start(&config);
		assert_eq!(app.extensions().count(), 0);
	}

	#[cfg(unix)]
	#[test]
	fn scan_lists_only_executables() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let exe = dir.path().join("tool");
		let data = dir.path().join("readme.txt");
		std::fs::write(&exe, "#!/bin/sh\n").unwrap();
		std::fs::write(&data, "text").unwrap();
		std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
		assert_eq!(scan_dir(dir.path()), vec![exe]);
	}
}
