//! The procedure database handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use procdb_invocation::{ArgList, Backend, Caller, Host, ProcDecl, ReturnValues, SessionId, SpecError};
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::compat::{CompatMode, CompatTable};
use crate::config::PdbConfig;
use crate::index::ProcIndex;
use crate::procedure::{ProcId, Procedure};

/// Process-wide procedure database.
///
/// Owned and passed explicitly; there is no global instance. Create it with
/// [`Pdb::new`], which returns an `Arc` because built-in procedures and
/// backends refer back to it.
#[derive(Debug)]
pub struct Pdb {
	pub(crate) index: ProcIndex,
	pub(crate) compat: CompatTable,
	compat_mode: RwLock<CompatMode>,
	sessions: Mutex<FxHashSet<SessionId>>,
	next_session: AtomicU64,
	next_temp: AtomicU64,
}

impl Pdb {
	/// Creates an empty database with the built-in compatibility table.
	pub fn new(config: PdbConfig) -> Arc<Self> {
		Self::with_compat_table(config, CompatTable::builtin())
	}

	pub fn with_compat_table(config: PdbConfig, compat: CompatTable) -> Arc<Self> {
		debug!(compat_mode = %config.compat_mode, compat_entries = compat.len(), "creating procedure database");
		Arc::new(Self {
			index: ProcIndex::new(),
			compat,
			compat_mode: RwLock::new(config.compat_mode),
			sessions: Mutex::new(FxHashSet::default()),
			next_session: AtomicU64::new(1),
			next_temp: AtomicU64::new(1),
		})
	}

	pub fn compat_mode(&self) -> CompatMode {
		*self.compat_mode.read()
	}

	pub fn set_compat_mode(&self, mode: CompatMode) {
		let old = std::mem::replace(&mut *self.compat_mode.write(), mode);
		if old != mode {
			info!(%old, new = %mode, "compat mode changed");
		}
	}

	pub fn compat_table(&self) -> &CompatTable {
		&self.compat
	}

	/// Direct access to the name index.
	pub fn index(&self) -> &ProcIndex {
		&self.index
	}

	/// Registers a record at the head of its name's list.
	///
	/// Records are validated when built, so registration itself cannot fail.
	pub fn register(&self, procedure: Procedure) -> ProcId {
		let id = procedure.id();
		debug!(name = procedure.name(), %id, kind = %procedure.kind(), "register");
		self.index.register(Arc::new(procedure));
		id
	}

	/// Removes one record. Returns false if it was not registered.
	pub fn unregister(&self, name: &str, id: ProcId) -> bool {
		let removed = self.index.unregister(name, id).is_some();
		debug!(name, %id, removed, "unregister");
		removed
	}

	/// Exact-name existence check. Deprecated aliases do not count.
	pub fn proc_exists(&self, name: &str) -> bool {
		self.index.contains(name)
	}

	/// Canonical target of a deprecated name, independent of the current mode.
	pub fn lookup_compat(&self, name: &str) -> Option<&str> {
		self.compat.resolve(name)
	}

	/// Returns a fresh name of the form `temp-procedure-number-N`.
	pub fn temp_name(&self) -> String {
		loop {
			let n = self.next_temp.fetch_add(1, Ordering::Relaxed);
			let name = format!("temp-procedure-number-{n}");
			if !self.index.contains(&name) {
				return name;
			}
		}
	}

	/// Closest registered name to `name`, for "did you mean" hints.
	pub fn suggest(&self, name: &str) -> Option<String> {
		let snap = self.index.snapshot();
		snap.iter()
			.map(|(candidate, _)| (strsim::jaro_winkler(name, candidate), candidate))
			.filter(|(score, _)| *score > 0.8)
			.max_by(|a, b| a.0.total_cmp(&b.0))
			.map(|(_, candidate)| candidate.to_string())
	}

	/// Sessions currently open.
	pub fn sessions(&self) -> Vec<SessionId> {
		let mut sessions: Vec<_> = self.sessions.lock().iter().copied().collect();
		sessions.sort_unstable();
		sessions
	}

	/// Ends every session, shuts down every backend and drops every record.
	///
	/// Returns the number of records released.
	pub fn shutdown(&self) -> usize {
		let sessions: Vec<_> = self.sessions.lock().drain().collect();
		let mut released = 0;
		for session in sessions {
			released += self.end_session_records(session);
		}

		let remaining = self.index.clear();
		for procedure in &remaining {
			procedure.backend().shutdown();
		}
		released += remaining.len();
		info!(released, "procedure database shut down");
		released
	}

	fn end_session_records(&self, session: SessionId) -> usize {
		let removed = self.index.unregister_session(session);
		for procedure in &removed {
			debug!(name = procedure.name(), %session, "temporary procedure removed");
		}
		removed.len()
	}
}

impl Host for Pdb {
	fn execute_as(&self, caller: Caller, name: &str, args: &ArgList) -> ReturnValues {
		self.dispatch(caller, name, args)
	}

	fn open_session(&self) -> SessionId {
		let session = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed));
		self.sessions.lock().insert(session);
		debug!(%session, "session opened");
		session
	}

	fn install_temporary(&self, session: SessionId, decl: ProcDecl, backend: Arc<dyn Backend>) -> Result<(), SpecError> {
		let procedure = Procedure::temporary(decl, session, backend)?;
		self.register(procedure);
		Ok(())
	}

	fn uninstall_temporary(&self, session: SessionId, name: &str) -> bool {
		let Some(list) = self.index.lookup(name) else {
			return false;
		};
		let Some(owned) = list.iter().find(|p| p.session() == Some(session)) else {
			return false;
		};
		self.unregister(name, owned.id())
	}

	fn end_session(&self, session: SessionId) -> usize {
		self.sessions.lock().remove(&session);
		let removed = self.end_session_records(session);
		debug!(%session, removed, "session ended");
		removed
	}
}

#[cfg(test)]
mod tests {
	use procdb_invocation::{ArgKind, InProcess, ProcKind};

	use super::*;

	fn noop(name: &str) -> Procedure {
		Procedure::internal(ProcDecl::new(name, ProcKind::Internal), |_, _| ReturnValues::success([])).unwrap()
	}

	#[test]
	fn temporaries_vanish_with_their_session() {
		let pdb = Pdb::new(PdbConfig::default());
		let session = pdb.open_session();
		let backend = InProcess::shared(|_, _| ReturnValues::success([]));
		pdb.install_temporary(session, ProcDecl::new("temp-a", ProcKind::Plugin), backend.clone()).unwrap();
		pdb.install_temporary(session, ProcDecl::new("temp-b", ProcKind::Plugin), backend).unwrap();
		assert_eq!(pdb.index().lookup("temp-a").unwrap()[0].kind(), ProcKind::Temporary);

		assert_eq!(pdb.end_session(session), 2);
		assert!(!pdb.proc_exists("temp-a"));
		assert!(!pdb.proc_exists("temp-b"));
		assert!(pdb.sessions().is_empty());
	}

	#[test]
	fn uninstall_only_touches_owning_session() {
		let pdb = Pdb::new(PdbConfig::default());
		let owner = pdb.open_session();
		let other = pdb.open_session();
		let backend = InProcess::shared(|_, _| ReturnValues::success([]));
		pdb.install_temporary(owner, ProcDecl::new("cb", ProcKind::Temporary), backend).unwrap();

		assert!(!pdb.uninstall_temporary(other, "cb"));
		assert!(pdb.uninstall_temporary(owner, "cb"));
		assert!(!pdb.proc_exists("cb"));
	}

	#[test]
	fn install_temporary_rejects_bad_declarations() {
		let pdb = Pdb::new(PdbConfig::default());
		let session = pdb.open_session();
		let decl = ProcDecl::new("cb", ProcKind::Temporary).arg("xs", ArgKind::StringArray, "");
		let backend = InProcess::shared(|_, _| ReturnValues::success([]));
		assert!(pdb.install_temporary(session, decl, backend).is_err());
	}

	#[test]
	fn temp_names_skip_registered_names() {
		let pdb = Pdb::new(PdbConfig::default());
		pdb.register(noop("temp-procedure-number-1"));
		assert_eq!(pdb.temp_name(), "temp-procedure-number-2");
		assert_eq!(pdb.temp_name(), "temp-procedure-number-3");
	}

	#[test]
	fn shutdown_releases_everything() {
		let pdb = Pdb::new(PdbConfig::default());
		pdb.register(noop("alpha"));
		pdb.register(noop("alpha"));
		let session = pdb.open_session();
		pdb.install_temporary(session, ProcDecl::new("beta", ProcKind::Temporary), InProcess::shared(|_, _| ReturnValues::success([])))
			.unwrap();

		assert_eq!(pdb.shutdown(), 3);
		assert!(pdb.index().is_empty());
		assert!(pdb.sessions().is_empty());
	}

	#[test]
	fn suggest_finds_close_names() {
		let pdb = Pdb::new(PdbConfig::default());
		pdb.register(noop("image-get-width"));
		assert_eq!(pdb.suggest("image-get-widht").as_deref(), Some("image-get-width"));
		assert_eq!(pdb.suggest("zzz"), None);
	}
}
