//! Deprecated-name compatibility shim.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Whether calls under deprecated names are remapped.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	Default,
	Serialize,
	Deserialize,
	strum::Display,
	strum::EnumString,
	strum::EnumIter
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CompatMode {
	/// Deprecated names are unknown.
	#[default]
	Off,
	/// Deprecated names silently resolve to their replacement.
	On,
	/// Deprecated names resolve and every remap is reported.
	Warn,
}

/// Deprecated names from the 2.x procedure set, unprefixed.
const BUILTIN: &[(&str, &str)] = &[
	("blend", "edit-blend"),
	("brushes-list", "brushes-get-list"),
	("bucket-fill", "edit-bucket-fill"),
	("channel-delete", "drawable-delete"),
	("channel-get-image-id", "drawable-get-image"),
	("channel-get-name", "drawable-get-name"),
	("channel-get-tattoo", "drawable-get-tattoo"),
	("channel-get-visible", "drawable-get-visible"),
	("channel-ops-duplicate", "image-duplicate"),
	("channel-ops-offset", "drawable-offset"),
	("channel-set-name", "drawable-set-name"),
	("channel-set-tattoo", "drawable-set-tattoo"),
	("channel-set-visible", "drawable-set-visible"),
	("color-picker", "image-pick-color"),
	("convert-grayscale", "image-convert-grayscale"),
	("convert-indexed", "image-convert-indexed"),
	("convert-rgb", "image-convert-rgb"),
	("crop", "image-crop"),
	("drawable-bytes", "drawable-bpp"),
	("drawable-image", "drawable-get-image"),
	("image-active-drawable", "image-get-active-drawable"),
	("image-floating-selection", "image-get-floating-sel"),
	("image-get-cmap", "image-get-colormap"),
	("image-set-cmap", "image-set-colormap"),
	("layer-delete", "drawable-delete"),
	("layer-get-linked", "drawable-get-linked"),
	("layer-get-name", "drawable-get-name"),
	("layer-get-tattoo", "drawable-get-tattoo"),
	("layer-get-visible", "drawable-get-visible"),
	("layer-mask", "layer-get-mask"),
	("layer-set-linked", "drawable-set-linked"),
	("layer-set-name", "drawable-set-name"),
	("layer-set-tattoo", "drawable-set-tattoo"),
	("layer-set-visible", "drawable-set-visible"),
	("palette-refresh", "palettes-refresh"),
	("patterns-list", "patterns-get-list"),
	("selection-clear", "selection-none"),
	("temp-procedure-name", "pdb-temp-name"),
	("undo-push-group-end", "image-undo-group-end"),
	("undo-push-group-start", "image-undo-group-start"),
];

/// Deprecated → canonical name table, loaded once per database.
///
/// Shapes are never translated: a call under a deprecated name must already
/// use the canonical procedure's arguments.
#[derive(Debug, Clone, Default)]
pub struct CompatTable {
	map: FxHashMap<String, String>,
}

impl CompatTable {
	/// Table of the built-in deprecated names.
	pub fn builtin() -> Self {
		Self::from_pairs(BUILTIN.iter().copied())
	}

	pub fn from_pairs<I, A, B>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (A, B)>,
		A: Into<String>,
		B: Into<String>,
	{
		Self {
			map: pairs.into_iter().map(|(old, new)| (old.into(), new.into())).collect(),
		}
	}

	/// Canonical replacement for `name`, regardless of mode.
	pub fn resolve(&self, name: &str) -> Option<&str> {
		self.map.get(name).map(String::as_str)
	}

	/// Iterates `(deprecated, canonical)` pairs in unspecified order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.map.iter().map(|(old, new)| (old.as_str(), new.as_str()))
	}

	pub fn len(&self) -> usize {
		self.map.len()
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}
}
