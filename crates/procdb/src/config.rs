//! `procdb.toml` loading.

use std::path::{Path, PathBuf};

use procdb_registry::{CompatMode, PdbConfig};
use serde::{Deserialize, Serialize};

/// File name looked up in a config directory.
pub const CONFIG_FILE: &str = "procdb.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
}

/// Host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcdbConfig {
	pub compat_mode: CompatMode,
	/// `tracing` level name (`error` .. `trace`); `--verbose` overrides it.
	pub log_level: Option<String>,
	pub extensions: Vec<ExtensionConfig>,
	/// Directories whose executables are queried as extensions.
	pub extension_dirs: Vec<PathBuf>,
	/// Declaration cache file. Unset means every extension is queried on start.
	pub extension_cache: Option<PathBuf>,
}

/// One explicitly configured extension executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionConfig {
	pub path: PathBuf,
	/// Passed before the mode flag on every spawn.
	#[serde(default)]
	pub args: Vec<String>,
	/// Run the executable's argument-less `Extension` procedures at startup.
	#[serde(default)]
	pub autostart: bool,
}

impl ProcdbConfig {
	pub fn pdb_config(&self) -> PdbConfig {
		PdbConfig::default().with_compat_mode(self.compat_mode)
	}

	/// Resolves relative extension and cache paths against `base`.
	fn resolve_paths(&mut self, base: &Path) {
		for ext in &mut self.extensions {
			if ext.path.is_relative() {
				ext.path = base.join(&ext.path);
			}
		}
		for dir in &mut self.extension_dirs {
			if dir.is_relative() {
				*dir = base.join(&*dir);
			}
		}
		if let Some(cache) = self.extension_cache.as_mut().filter(|p| p.is_relative()) {
			*cache = base.join(&*cache);
		}
	}
}

/// Parses a config document. Paths are left as written.
pub fn parse_config_str(content: &str, path: &Path) -> Result<ProcdbConfig, ConfigError> {
	toml::from_str(content).map_err(|source| ConfigError::Parse {
		path: path.to_path_buf(),
		source,
	})
}

/// Reads and parses `path`, resolving relative paths against its directory.
pub fn load_config_file(path: &Path) -> Result<ProcdbConfig, ConfigError> {
	let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
		path: path.to_path_buf(),
		source,
	})?;
	let mut config = parse_config_str(&content, path)?;
	if let Some(base) = path.parent() {
		config.resolve_paths(base);
	}
	Ok(config)
}

/// Result of loading configuration from a directory.
#[derive(Debug, Default)]
pub struct ConfigLoadReport {
	/// Parsed config, if the file existed and parsed.
	pub config: Option<ProcdbConfig>,
	/// Non-fatal findings keyed by source file path.
	pub warnings: Vec<(PathBuf, String)>,
	/// Read or parse errors keyed by source file path.
	pub errors: Vec<(PathBuf, String)>,
}

impl ConfigLoadReport {
	/// The loaded config, or defaults when nothing usable was found.
	pub fn config_or_default(&self) -> ProcdbConfig {
		self.config.clone().unwrap_or_default()
	}
}

/// Loads `procdb.toml` from `config_dir`.
///
/// A missing file is not an error. Configured extension paths and extension
/// directories that do not exist are reported as warnings.
pub fn load_config_from_dir(config_dir: &Path) -> ConfigLoadReport {
	let mut report = ConfigLoadReport::default();
	let path = config_dir.join(CONFIG_FILE);
	if !path.exists() {
		return report;
	}

	match load_config_file(&path) {
		Ok(config) => {
			for ext in &config.extensions {
				if !ext.path.exists() {
					report.warnings.push((path.clone(), format!("extension {} does not exist", ext.path.display())));
				}
			}
			for dir in &config.extension_dirs {
				if !dir.is_dir() {
					report.warnings.push((path.clone(), format!("extension directory {} does not exist", dir.display())));
				}
			}
			report.config = Some(config);
		}
		Err(err) => report.errors.push((path, err.to_string())),
	}
	report
}

/// `$XDG_CONFIG_HOME/procdb` or the platform equivalent.
pub fn default_config_dir() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("procdb"))
}

/// Per-user extension directory, scanned in addition to configured ones.
pub fn default_extension_dir() -> Option<PathBuf> {
	dirs::data_dir().map(|dir| dir.join("procdb").join("extensions"))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn parses_full_document() {
		let text = r#"
			compat_mode = "warn"
			log_level = "debug"
			extension_dirs = ["/opt/procdb/ext"]
			extension_cache = "/var/cache/procdb/extensions.cache"

			[[extensions]]
			path = "/usr/lib/procdb/sharpen"
			args = ["--fast"]
			autostart = true
		"#;
		let config = parse_config_str(text, Path::new("procdb.toml")).unwrap();
		assert_eq!(
			config,
			ProcdbConfig {
				compat_mode: CompatMode::Warn,
				log_level: Some("debug".into()),
				extensions: vec![ExtensionConfig {
					path: "/usr/lib/procdb/sharpen".into(),
					args: vec!["--fast".into()],
					autostart: true,
				}],
				extension_dirs: vec!["/opt/procdb/ext".into()],
				extension_cache: Some("/var/cache/procdb/extensions.cache".into()),
			}
		);
		assert_eq!(config.pdb_config().compat_mode, CompatMode::Warn);
	}

	#[test]
	fn empty_document_is_default() {
		let config = parse_config_str("", Path::new("procdb.toml")).unwrap();
		assert_eq!(config, ProcdbConfig::default());
		assert_eq!(config.compat_mode, CompatMode::Off);
	}

	#[test]
	fn unknown_fields_are_rejected() {
		let err = parse_config_str("compat = \"on\"", Path::new("procdb.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
	}

	#[test]
	fn bad_compat_mode_is_rejected() {
		assert!(parse_config_str("compat_mode = \"loud\"", Path::new("procdb.toml")).is_err());
	}

	#[test]
	fn load_ignores_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let report = load_config_from_dir(dir.path());
		assert!(report.config.is_none());
		assert!(report.warnings.is_empty());
		assert!(report.errors.is_empty());
		assert_eq!(report.config_or_default(), ProcdbConfig::default());
	}

	#[test]
	fn load_resolves_relative_paths_and_warns_on_missing() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir(dir.path().join("ext")).unwrap();
		std::fs::write(
			dir.path().join(CONFIG_FILE),
			"extension_dirs = [\"ext\"]\n[[extensions]]\npath = \"bin/missing\"\n",
		)
		.unwrap();

		let report = load_config_from_dir(dir.path());
		let config = report.config.expect("config should load");
		assert_eq!(config.extension_dirs, vec![dir.path().join("ext")]);
		assert_eq!(config.extensions[0].path, dir.path().join("bin/missing"));
		assert!(!config.extensions[0].autostart);
		assert_eq!(report.warnings.len(), 1);
		assert!(report.warnings[0].1.contains("bin/missing"));
		assert!(report.errors.is_empty());
	}

	#[test]
	fn load_collects_parse_errors() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join(CONFIG_FILE), "compat_mode = ").unwrap();
		let report = load_config_from_dir(dir.path());
		assert!(report.config.is_none());
		assert_eq!(report.errors.len(), 1);
		assert!(report.errors[0].0.ends_with(CONFIG_FILE));
	}
}
