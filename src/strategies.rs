//! Consolidated strategy and mode enums
//!
//! Central location for the comparison, conflict, rename and cleanup modes
//! used across the sync pipeline.
//!
//! Each enum includes:
//! - FromStr implementation for CLI and config parsing
//! - Display giving the canonical config spelling

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// COMPARE MODE
// ============================================================================

/// How files on the two sides (and against the prior state) are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CompareMode {
	/// Size only. Can have false negatives.
	Size,

	/// mtime within tolerance, plus size (default)
	#[default]
	Mtime,

	/// Common hashes; falls back per `hash_fail_fallback`
	Hash,
}

impl FromStr for CompareMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"size" => Ok(Self::Size),
			"mtime" => Ok(Self::Mtime),
			"hash" => Ok(Self::Hash),
			_ => Err(format!("Unknown compare mode: {}. Valid options: size, mtime, hash", s)),
		}
	}
}

impl std::fmt::Display for CompareMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Size => write!(f, "size"),
			Self::Mtime => write!(f, "mtime"),
			Self::Hash => write!(f, "hash"),
		}
	}
}

// ============================================================================
// HASH FALLBACK
// ============================================================================

/// What to do when hash comparison is requested but no usable common hash
/// exists for a pair of files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HashFallback {
	Size,
	Mtime,

	/// Fail the run with a MissingHash error (default)
	#[default]
	None,
}

impl FromStr for HashFallback {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"size" => Ok(Self::Size),
			"mtime" => Ok(Self::Mtime),
			"none" => Ok(Self::None),
			_ => {
				Err(format!("Unknown hash fallback: {}. Valid options: size, mtime, none", s))
			}
		}
	}
}

impl std::fmt::Display for HashFallback {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Size => write!(f, "size"),
			Self::Mtime => write!(f, "mtime"),
			Self::None => write!(f, "none"),
		}
	}
}

// ============================================================================
// CONFLICT MODE
// ============================================================================

/// Policy for files modified on both sides
///
/// `older`/`newer` compare mtimes and `smaller`/`larger` compare sizes.
/// Whenever the deciding attribute is missing or equal on both sides the
/// resolution falls through to tagging both files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictMode {
	/// A always wins
	A,

	/// B always wins
	B,

	/// Older mtime wins
	Older,

	/// Newer mtime wins (default)
	#[default]
	Newer,

	/// Smaller file wins
	Smaller,

	/// Larger file wins
	Larger,

	/// No winner. Both sides are renamed with a tag and cross-copied.
	Tag,
}

impl FromStr for ConflictMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"A" | "a" => Ok(Self::A),
			"B" | "b" => Ok(Self::B),
			_ => match s.to_lowercase().as_str() {
				"older" => Ok(Self::Older),
				"newer" => Ok(Self::Newer),
				"smaller" => Ok(Self::Smaller),
				"larger" => Ok(Self::Larger),
				"tag" => Ok(Self::Tag),
				_ => Err(format!(
					"Unknown conflict mode: {}. Valid options: A, B, older, newer, smaller, larger, tag",
					s
				)),
			},
		}
	}
}

impl std::fmt::Display for ConflictMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::A => write!(f, "A"),
			Self::B => write!(f, "B"),
			Self::Older => write!(f, "older"),
			Self::Newer => write!(f, "newer"),
			Self::Smaller => write!(f, "smaller"),
			Self::Larger => write!(f, "larger"),
			Self::Tag => write!(f, "tag"),
		}
	}
}

// ============================================================================
// RENAME MODE
// ============================================================================

/// Per-side rename tracking mode
///
/// The candidate pool is only files already classified as new; a match is
/// accepted only when unique and the matched prior path is queued for
/// deletion on the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RenameMode {
	/// Size of the file only. Very prone to false matches.
	Size,

	/// Size plus mtime within tolerance
	Mtime,

	/// At least one shared hash value
	Hash,

	/// Disable rename tracking (default)
	#[default]
	None,
}

impl FromStr for RenameMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"size" => Ok(Self::Size),
			"mtime" => Ok(Self::Mtime),
			"hash" => Ok(Self::Hash),
			"none" => Ok(Self::None),
			_ => Err(format!(
				"Unknown rename mode: {}. Valid options: size, mtime, hash, none",
				s
			)),
		}
	}
}

impl std::fmt::Display for RenameMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Size => write!(f, "size"),
			Self::Mtime => write!(f, "mtime"),
			Self::Hash => write!(f, "hash"),
			Self::None => write!(f, "none"),
		}
	}
}

impl RenameMode {
	pub fn enabled(&self) -> bool {
		!matches!(self, RenameMode::None)
	}
}

// ============================================================================
// EMPTY DIR CLEANUP
// ============================================================================

/// Tri-state toggle for removing directories emptied by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Cleanup {
	/// Clean up when the backend can hold empty directories (default)
	#[default]
	Auto,

	Always,
	Never,
}

impl FromStr for Cleanup {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"auto" => Ok(Self::Auto),
			"always" | "true" => Ok(Self::Always),
			"never" | "false" => Ok(Self::Never),
			_ => Err(format!("Unknown cleanup mode: {}. Valid options: auto, always, never", s)),
		}
	}
}

impl std::fmt::Display for Cleanup {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Auto => write!(f, "auto"),
			Self::Always => write!(f, "always"),
			Self::Never => write!(f, "never"),
		}
	}
}


// vim: ts=4
