//! Process bridge for out-of-process procedures.
//!
//! Host and extension exchange [`WireMessage`] frames over the extension's
//! stdin/stdout. Each frame is a postcard payload behind a little-endian
//! `u32` length prefix.
//!
//! * Host side: [`ProcessBackend`] runs a procedure by spawning its
//!   executable, [`TemporaryBackend`] forwards to a procedure installed by a
//!   running process, and [`query_extension`] collects the declarations an
//!   executable announces.
//! * Extension side: [`plugin::Plugin`] answers queries and runs, calls back
//!   into the host and serves its temporary procedures.
//!
//! All I/O is blocking. While the host waits for a return value it keeps
//! serving requests from the same process, so calls may nest across the
//! process boundary in either direction.

#![warn(missing_docs)]

mod channel;
mod connection;
mod discovery;
pub mod frame;
pub mod plugin;
mod process;
mod temporary;
mod wire;

pub use channel::Channel;
pub use discovery::query_extension;
pub use process::ProcessBackend;
pub use temporary::TemporaryBackend;
pub use wire::WireMessage;

/// Flag passed to an executable when the host wants its declarations.
pub const QUERY_FLAG: &str = "--query";

/// Flag passed to an executable when the host runs one of its procedures.
pub const RUN_FLAG: &str = "--run";
