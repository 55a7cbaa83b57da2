//! Database settings.

use serde::{Deserialize, Serialize};

use crate::compat::CompatMode;

/// Settings applied when a database is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PdbConfig {
	/// Initial compatibility mode; changeable later with [`crate::Pdb::set_compat_mode`].
	pub compat_mode: CompatMode,
}

impl PdbConfig {
	pub fn with_compat_mode(mut self, mode: CompatMode) -> Self {
		self.compat_mode = mode;
		self
	}
}
