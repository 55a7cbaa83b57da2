//! Procedure database host.
//!
//! Loads `procdb.toml`, creates the database with its built-in procedures,
//! queries extension executables (or reuses their cached declarations) and registers what they announce. The
//! `procdb` binary is a thin command-line front end over [`App`].

pub mod app;
pub mod args;
pub mod cache;
pub mod cli;
pub mod config;

pub use app::App;
pub use args::{ParseArgsError, parse_call_args};
pub use cache::{CacheError, ExtensionCache};
pub use config::{ConfigError, ConfigLoadReport, ExtensionConfig, ProcdbConfig};
