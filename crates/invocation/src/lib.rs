//! Canonical invocation types for the procedure database.
//!
//! Every caller, whether built-in code, the CLI, or an out-of-process
//! extension, speaks in terms of these types:
//!
//! * [`ArgKind`]: the closed set of argument kinds.
//! * [`Arg`]: one typed argument slot, and [`ArgList`], an ordered slot list
//!   released in reverse order.
//! * [`ArgSpec`] / [`ProcDecl`]: declared procedure shapes and metadata.
//! * [`ReturnValues`]: a result list whose first slot is always a [`Status`].
//! * [`Backend`] / [`Host`]: the seam between the dispatcher and whatever
//!   actually runs a procedure, in-process or in another process.

pub mod arg;
pub mod backend;
pub mod builder;
pub mod decl;
pub mod kind;
pub mod list;
pub mod spec;
pub mod status;
pub mod values;

pub use arg::{Arg, ArgError, Parasite, Rgba};
pub use backend::{Backend, CallContext, Caller, Host, InProcess, SessionGuard, SessionId, TransportError};
pub use builder::{ArgListBuilder, BuildError};
pub use decl::{ProcDecl, ProcKind, ProcMeta};
pub use kind::ArgKind;
pub use list::{ArgList, Released};
pub use spec::{ArgSpec, SpecError, validate_name, validate_specs};
pub use status::Status;
pub use values::{Deprecation, ReturnValues};
