//! Extension declaration cache.
//!
//! Querying an extension means spawning it. The cache keeps the declarations
//! each executable announced, keyed by path and launch arguments, together
//! with the executable's modification time. An entry is reused only while the
//! mtime is unchanged. The file is a magic and schema-version header followed
//! by a postcard payload.

use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use procdb_invocation::ProcDecl;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Magic bytes identifying a procdb declaration cache.
pub const MAGIC: &[u8; 8] = b"PROCDBRC";

/// Schema version for cache format compatibility.
pub const SCHEMA_VERSION: u32 = 1;

const HEADER_SIZE: usize = MAGIC.len() + size_of::<u32>();

/// File name used inside the data directory.
pub const CACHE_FILE: &str = "extensions.cache";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
	#[error("failed to access {}: {source}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("{} is not a declaration cache", path.display())]
	BadHeader { path: PathBuf },
	#[error("{} has schema version {found}, expected {SCHEMA_VERSION}", path.display())]
	Version { path: PathBuf, found: u32 },
	#[error("failed to decode {}: {source}", path.display())]
	Codec {
		path: PathBuf,
		#[source]
		source: postcard::Error,
	},
}

/// Modification time as seconds and nanoseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mtime {
	pub secs: u64,
	pub nanos: u32,
}

impl Mtime {
	/// Modification time of `path`, if the platform reports one.
	pub fn of(path: &Path) -> Option<Self> {
		let since = path.metadata().ok()?.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
		Some(Self {
			secs: since.as_secs(),
			nanos: since.subsec_nanos(),
		})
	}
}

/// Declarations one executable announced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
	pub path: PathBuf,
	pub args: Vec<String>,
	pub mtime: Mtime,
	pub decls: Vec<ProcDecl>,
}

/// In-memory cache bound to a file.
///
/// Entries read from disk are only carried into the next write when they are
/// looked up again, so executables that disappeared drop out on save.
#[derive(Debug)]
pub struct ExtensionCache {
	file: PathBuf,
	stored: FxHashMap<(PathBuf, Vec<String>), CacheEntry>,
	current: Vec<CacheEntry>,
	dirty: bool,
}

impl ExtensionCache {
	/// Loads `file`. A missing file gives an empty cache; an unreadable or
	/// corrupt one is logged and treated as empty.
	pub fn load(file: impl Into<PathBuf>) -> Self {
		let file = file.into();
		let entries = match read_cache(&file) {
			Ok(entries) => entries,
			Err(CacheError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => Vec::new(),
			Err(err) => {
				warn!(error = %err, "ignoring declaration cache");
				Vec::new()
			}
		};
		debug!(file = %file.display(), entries = entries.len(), "loaded declaration cache");
		let stored = entries.into_iter().map(|e| ((e.path.clone(), e.args.clone()), e)).collect();
		Self {
			file,
			stored,
			current: Vec::new(),
			dirty: false,
		}
	}

	pub fn file(&self) -> &Path {
		&self.file
	}

	/// Cached declarations for `path` launched with `args`, if its mtime still
	/// matches.
	pub fn lookup(&mut self, path: &Path, args: &[String], mtime: Mtime) -> Option<Vec<ProcDecl>> {
		let entry = self.stored.remove(&(path.to_path_buf(), args.to_vec()))?;
		if entry.mtime != mtime {
			debug!(path = %path.display(), "cached declarations are stale");
			self.dirty = true;
			return None;
		}
		let decls = entry.decls.clone();
		self.current.push(entry);
		Some(decls)
	}

	/// Records freshly queried declarations.
	pub fn insert(&mut self, path: &Path, args: &[String], mtime: Mtime, decls: Vec<ProcDecl>) {
		self.stored.remove(&(path.to_path_buf(), args.to_vec()));
		self.current.retain(|e| !(e.path == path && e.args == args));
		self.current.push(CacheEntry {
			path: path.to_path_buf(),
			args: args.to_vec(),
			mtime,
			decls,
		});
		self.dirty = true;
	}

	/// Writes the entries used since loading, if anything changed.
	pub fn save(&mut self) -> Result<(), CacheError> {
		if !self.dirty && self.stored.is_empty() {
			return Ok(());
		}
		write_cache(&self.file, &self.current)?;
		debug!(file = %self.file.display(), entries = self.current.len(), "wrote declaration cache");
		self.stored.clear();
		self.dirty = false;
		Ok(())
	}
}

/// Reads every entry of the cache at `path`.
pub fn read_cache(path: &Path) -> Result<Vec<CacheEntry>, CacheError> {
	let data = std::fs::read(path).map_err(|source| CacheError::Io {
		path: path.to_path_buf(),
		source,
	})?;
	if data.len() < HEADER_SIZE || &data[..MAGIC.len()] != MAGIC {
		return Err(CacheError::BadHeader { path: path.to_path_buf() });
	}
	let mut version = [0u8; size_of::<u32>()];
	version.copy_from_slice(&data[MAGIC.len()..HEADER_SIZE]);
	let found = u32::from_le_bytes(version);
	if found != SCHEMA_VERSION {
		return Err(CacheError::Version {
			path: path.to_path_buf(),
			found,
		});
	}
	postcard::from_bytes(&data[HEADER_SIZE..]).map_err(|source| CacheError::Codec {
		path: path.to_path_buf(),
		source,
	})
}

/// Writes `entries` to `path`, creating the parent directory.
pub fn write_cache(path: &Path, entries: &[CacheEntry]) -> Result<(), CacheError> {
	let io = |source: std::io::Error| CacheError::Io {
		path: path.to_path_buf(),
		source,
	};
	let payload = postcard::to_stdvec(entries).map_err(|source| CacheError::Codec {
		path: path.to_path_buf(),
		source,
	})?;
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent).map_err(io)?;
	}
	let mut data = Vec::with_capacity(HEADER_SIZE + payload.len());
	data.extend_from_slice(MAGIC);
	data.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
	data.extend_from_slice(&payload);
	std::fs::write(path, data).map_err(io)
}

/// Default cache location under the user data directory.
pub fn default_cache_file() -> Option<PathBuf> {
	dirs::data_dir().map(|dir| dir.join("procdb").join(CACHE_FILE))
}
