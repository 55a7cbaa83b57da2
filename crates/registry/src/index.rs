//! Name index with atomic snapshot publication.
//!
//! # Invariants
//!
//! - Readers never observe a partially applied register or unregister.
//! - Concurrent writers are linearizable; no update is lost.
//! - A key exists only while its list is non-empty.

use std::sync::Arc;

use arc_swap::ArcSwap;
use procdb_invocation::SessionId;
use rustc_hash::FxHashMap;

use crate::procedure::{ProcId, Procedure};

/// Immutable list of records registered under one name, most recent first.
pub type ProcList = Arc<[Arc<Procedure>]>;

/// One published state of the index.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
	by_name: FxHashMap<Arc<str>, ProcList>,
}

impl IndexSnapshot {
	pub fn get(&self, name: &str) -> Option<&ProcList> {
		self.by_name.get(name)
	}

	/// Number of distinct names.
	pub fn len(&self) -> usize {
		self.by_name.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_name.is_empty()
	}

	/// Total number of records across all names.
	pub fn record_count(&self) -> usize {
		self.by_name.values().map(|list| list.len()).sum()
	}

	/// Iterates `(name, records)` in unspecified order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &ProcList)> {
		self.by_name.iter().map(|(name, list)| (&**name, list))
	}

	/// Returns every name, sorted.
	pub fn names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.by_name.keys().map(|name| &**name).collect();
		names.sort_unstable();
		names
	}
}

/// Thread-safe name → records index.
#[derive(Debug, Default)]
pub struct ProcIndex {
	snap: ArcSwap<IndexSnapshot>,
}

impl ProcIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Loads the current snapshot.
	#[inline]
	pub fn snapshot(&self) -> Arc<IndexSnapshot> {
		self.snap.load_full()
	}

	/// Exact-name lookup.
	#[inline]
	pub fn lookup(&self, name: &str) -> Option<ProcList> {
		self.snap.load().get(name).cloned()
	}

	pub fn contains(&self, name: &str) -> bool {
		self.snap.load().by_name.contains_key(name)
	}

	/// Number of distinct names.
	pub fn len(&self) -> usize {
		self.snap.load().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Inserts `procedure` at the head of its name's list.
	pub fn register(&self, procedure: Arc<Procedure>) {
		self.update(|old| {
			let mut next = old.clone();
			let list: Vec<Arc<Procedure>> = std::iter::once(procedure.clone())
				.chain(old.get(procedure.name()).into_iter().flat_map(|list| list.iter().cloned()))
				.collect();
			next.by_name.insert(Arc::from(procedure.name()), list.into());
			Some((next, ()))
		});
	}

	/// Removes the record `id` registered under `name`.
	///
	/// Returns the removed record, or `None` if it was not registered.
	pub fn unregister(&self, name: &str, id: ProcId) -> Option<Arc<Procedure>> {
		self.update(|old| {
			let list = old.get(name)?;
			let pos = list.iter().position(|p| p.id() == id)?;
			let removed = list[pos].clone();
			let mut next = old.clone();
			let rest: Vec<_> = list.iter().enumerate().filter(|(i, _)| *i != pos).map(|(_, p)| p.clone()).collect();
			if rest.is_empty() {
				next.by_name.remove(name);
			} else {
				next.by_name.insert(Arc::from(name), rest.into());
			}
			Some((next, removed))
		})
	}

	/// Removes every record owned by `session`.
	pub fn unregister_session(&self, session: SessionId) -> Vec<Arc<Procedure>> {
		self.retain(|p| p.session() != Some(session))
	}

	/// Removes every record, returning them.
	pub fn clear(&self) -> Vec<Arc<Procedure>> {
		self.retain(|_| false)
	}

	fn retain(&self, keep: impl Fn(&Procedure) -> bool) -> Vec<Arc<Procedure>> {
		self.update(|old| {
			let mut removed = Vec::new();
			let mut next = IndexSnapshot::default();
			for (name, list) in &old.by_name {
				let (kept, dropped): (Vec<_>, Vec<_>) = list.iter().cloned().partition(|p| keep(p.as_ref()));
				removed.extend(dropped);
				if !kept.is_empty() {
					next.by_name.insert(name.clone(), kept.into());
				}
			}
			(!removed.is_empty()).then_some((next, removed))
		})
		.unwrap_or_default()
	}

	/// Publishes the snapshot produced by `f` with a CAS retry loop.
	///
	/// `f` may run several times and returns `None` to abandon the update.
	fn update<R>(&self, mut f: impl FnMut(&IndexSnapshot) -> Option<(IndexSnapshot, R)>) -> Option<R> {
		loop {
			let old = self.snap.load_full();
			let (next, out) = f(&old)?;
			let prev = self.snap.compare_and_swap(&old, Arc::new(next));
			if Arc::ptr_eq(&prev, &old) {
				return Some(out);
			}
		}
	}
}
