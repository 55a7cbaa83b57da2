//! Procedure database: registry, dispatcher and introspection.
//!
//! # Architecture
//!
//! * [`ProcIndex`] maps names to lists of [`Procedure`] records, most recent
//!   first. Reads load an immutable snapshot; writes publish a new one with a
//!   CAS loop.
//! * [`Pdb`] owns the index, the [`CompatTable`] and session bookkeeping, and
//!   implements [`procdb_invocation::Host`] so backends can call back in.
//! * Dispatch (`Pdb::execute`) resolves a name, type-checks arguments against
//!   each candidate in turn, runs its backend and falls through on
//!   `PASS_THROUGH`.
//! * Introspection ([`Query`], [`ProcInfo`], dumps) reads a single snapshot and
//!   never mutates.
//!
//! # Invariants
//!
//! - No lock is held while a backend runs; backends may re-enter dispatch.
//! - A name key exists only while at least one record is registered under it.

mod builtins;
mod call;
mod compat;
mod config;
mod dispatch;
mod dump;
mod error;
mod index;
mod info;
mod pdb;
mod procedure;
mod query;

pub use call::Call;
pub use compat::{CompatMode, CompatTable};
pub use config::PdbConfig;
pub use error::CallError;
pub use index::{IndexSnapshot, ProcIndex, ProcList};
pub use info::{ArgInfo, ProcInfo};
pub use pdb::Pdb;
pub use procedure::{ProcId, Procedure};
pub use query::{Query, QueryError};
