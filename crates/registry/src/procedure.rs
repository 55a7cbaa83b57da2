//! Procedure records.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use procdb_invocation::{Arg, ArgSpec, Backend, CallContext, InProcess, ProcDecl, ProcKind, ProcMeta, ReturnValues, SessionId, SpecError};

static NEXT_PROC_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one registered record.
///
/// Several records may share a name; the id tells them apart for
/// [`crate::Pdb::unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcId(u64);

impl ProcId {
	fn next() -> Self {
		Self(NEXT_PROC_ID.fetch_add(1, Ordering::Relaxed))
	}

	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ProcId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// A validated procedure declaration bound to its execution strategy.
///
/// Argument and return shapes are frozen at construction.
pub struct Procedure {
	id: ProcId,
	name: String,
	kind: ProcKind,
	meta: ProcMeta,
	args: Arc<[ArgSpec]>,
	returns: Arc<[ArgSpec]>,
	session: Option<SessionId>,
	backend: Arc<dyn Backend>,
}

impl Procedure {
	/// Builds a record from a declaration and a backend, validating the declaration.
	pub fn new(decl: ProcDecl, backend: Arc<dyn Backend>) -> Result<Self, SpecError> {
		decl.validate()?;
		let ProcDecl {
			name,
			kind,
			meta,
			args,
			returns,
		} = decl;
		Ok(Self {
			id: ProcId::next(),
			name,
			kind,
			meta,
			args: args.into(),
			returns: returns.into(),
			session: None,
			backend,
		})
	}

	/// Builds an in-process record. The declaration's kind is forced to `Internal`.
	pub fn internal<F>(mut decl: ProcDecl, f: F) -> Result<Self, SpecError>
	where
		F: Fn(&CallContext<'_>, &[Arg]) -> ReturnValues + Send + Sync + 'static,
	{
		decl.kind = ProcKind::Internal;
		Self::new(decl, InProcess::shared(f))
	}

	/// Builds a temporary record owned by `session`.
	pub fn temporary(mut decl: ProcDecl, session: SessionId, backend: Arc<dyn Backend>) -> Result<Self, SpecError> {
		decl.kind = ProcKind::Temporary;
		let mut procedure = Self::new(decl, backend)?;
		procedure.session = Some(session);
		Ok(procedure)
	}

	#[inline]
	pub fn id(&self) -> ProcId {
		self.id
	}

	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline]
	pub fn kind(&self) -> ProcKind {
		self.kind
	}

	#[inline]
	pub fn meta(&self) -> &ProcMeta {
		&self.meta
	}

	#[inline]
	pub fn args(&self) -> &Arc<[ArgSpec]> {
		&self.args
	}

	#[inline]
	pub fn returns(&self) -> &Arc<[ArgSpec]> {
		&self.returns
	}

	/// Owning session, for temporary records.
	#[inline]
	pub fn session(&self) -> Option<SessionId> {
		self.session
	}

	#[inline]
	pub fn backend(&self) -> &Arc<dyn Backend> {
		&self.backend
	}

	/// Reconstructs the declaration this record was built from.
	pub fn decl(&self) -> ProcDecl {
		ProcDecl {
			name: self.name.clone(),
			kind: self.kind,
			meta: self.meta.clone(),
			args: self.args.to_vec(),
			returns: self.returns.to_vec(),
		}
	}
}

impl fmt::Debug for Procedure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Procedure")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("kind", &self.kind)
			.field("args", &self.args.len())
			.field("returns", &self.returns.len())
			.field("session", &self.session)
			.finish_non_exhaustive()
	}
}
