//! Settings record for a sync pair
//!
//! All recognized options live in a single `Settings` struct loaded from a
//! TOML file. CLI `--override "KEY = VALUE"` patches are applied on top of
//! the file before validation, and a handful of runtime flags (dry run,
//! reset state) are attached by the caller afterwards.

use crate::error::SyncError;
use crate::strategies::{Cleanup, CompareMode, ConflictMode, HashFallback, RenameMode};
use crate::types::Side;
use crate::util::pathjoin;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Directory on each remote that holds state, locks and backups when no
/// external workdir is configured. Always excluded from listings.
pub const INTERNAL_DIR: &str = ".bisyncr";

/// Flags that would interfere with our own filtering if a user smuggled
/// them into the general transport flags
const FILTER_FLAGS: [&str; 7] = [
	"--include",
	"--exclude",
	"--include-from",
	"--exclude-from",
	"--filter",
	"--filter-from",
	"--files-from",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
	// ========================================================================
	// ENDPOINTS
	// ========================================================================
	/// Root of side A as understood by the transport
	pub remote_a: String,

	/// Root of side B
	pub remote_b: String,

	/// State and backup location per side. Defaults to the internal
	/// sentinel directory inside the synced root; anything else must lie
	/// outside the root.
	pub workdir_a: Option<String>,
	pub workdir_b: Option<String>,

	/// Identifier used in snapshot and lock filenames. Lets several sync
	/// pairs share a root.
	pub name: String,

	// ========================================================================
	// COMPARISON
	// ========================================================================
	pub compare: CompareMode,

	/// mtime equality tolerance in seconds
	pub dt: f64,

	/// Comparator behavior when hashes are requested but unavailable
	pub hash_fail_fallback: HashFallback,

	/// Request ModTime from the transport even when the compare mode does
	/// not strictly need it
	pub always_get_mtime: bool,

	// ========================================================================
	// CONFLICTS
	// ========================================================================
	pub conflict_mode: ConflictMode,

	/// Tag the losing side instead of backing it up
	pub tag_conflict: bool,

	// ========================================================================
	// RENAME TRACKING
	// ========================================================================
	pub renames_a: RenameMode,
	pub renames_b: RenameMode,

	/// Carry hashes from the prior snapshot when path, size and mtime all
	/// match, fetching only the remainder
	pub reuse_hashes_a: bool,
	pub reuse_hashes_b: bool,

	// ========================================================================
	// BACKUPS
	// ========================================================================
	/// Copy files into the backup area before overwrite or delete
	pub backup: bool,

	/// Mirror each side's backup area to the other side
	pub sync_backups: bool,

	// ========================================================================
	// TRANSPORT
	// ========================================================================
	/// Path to the transport executable
	pub transport_exe: String,

	/// Include/exclude patterns handed to the transport on listings.
	/// The internal namespace is always excluded regardless.
	pub filter_flags: Vec<String>,

	/// Extra flags for every transport call, and per-side additions.
	/// Must not contain filtering flags.
	pub transport_flags: Vec<String>,
	pub transport_flags_a: Vec<String>,
	pub transport_flags_b: Vec<String>,

	/// Extra environment for the transport process
	pub transport_env: BTreeMap<String, String>,

	// ========================================================================
	// EXECUTION
	// ========================================================================
	/// Worker pool size for per-file actions within a side
	pub action_threads: usize,

	pub cleanup_empty_dirs_a: Cleanup,
	pub cleanup_empty_dirs_b: Cleanup,

	/// Synthesize the post-run state from the plan instead of relisting
	pub avoid_relist: bool,

	/// Advisory cross-run locking via sentinel files
	pub set_lock: bool,

	// ========================================================================
	// RUNTIME (set from the CLI, never read from the file)
	// ========================================================================
	#[serde(skip)]
	pub dry_run: bool,

	#[serde(skip)]
	pub interactive: bool,

	#[serde(skip)]
	pub reset_state: bool,
}

impl Default for Settings {
	fn default() -> Self {
		Settings {
			remote_a: String::new(),
			remote_b: String::new(),
			workdir_a: None,
			workdir_b: None,
			name: "sync".to_string(),

			compare: CompareMode::Mtime,
			dt: 1.1,
			hash_fail_fallback: HashFallback::None,
			always_get_mtime: false,

			conflict_mode: ConflictMode::Newer,
			tag_conflict: false,

			renames_a: RenameMode::None,
			renames_b: RenameMode::None,
			reuse_hashes_a: false,
			reuse_hashes_b: false,

			backup: true,
			sync_backups: false,

			transport_exe: "rclone".to_string(),
			filter_flags: vec![],
			transport_flags: vec![],
			transport_flags_a: vec![],
			transport_flags_b: vec![],
			transport_env: BTreeMap::new(),

			action_threads: 1,
			cleanup_empty_dirs_a: Cleanup::Auto,
			cleanup_empty_dirs_b: Cleanup::Auto,
			avoid_relist: false,
			set_lock: true,

			dry_run: false,
			interactive: false,
			reset_state: false,
		}
	}
}

impl Settings {
	/// Load settings from a TOML file and apply `KEY = VALUE` override lines
	pub fn load(path: &Path, overrides: &[String]) -> Result<Settings, SyncError> {
		let text = std::fs::read_to_string(path).map_err(|e| SyncError::Config {
			message: format!("cannot read '{}': {}", path.display(), e),
		})?;
		Settings::from_toml_str(&text, overrides)
	}

	/// Parse settings from TOML text plus override patches
	pub fn from_toml_str(text: &str, overrides: &[String]) -> Result<Settings, SyncError> {
		let mut table: toml::Table = toml::from_str(text)
			.map_err(|e| SyncError::Config { message: e.to_string() })?;

		for line in overrides {
			let patch = parse_override(line)?;
			for (key, val) in patch {
				debug!("override: {} = {}", key, val);
				table.insert(key, val);
			}
		}

		normalize_conflict_mode(&mut table)?;

		let mut settings: Settings = toml::Value::Table(table)
			.try_into()
			.map_err(|e: toml::de::Error| SyncError::Config { message: e.to_string() })?;
		settings.validate()?;
		Ok(settings)
	}

	/// Check option consistency and fix up derived values
	pub fn validate(&mut self) -> Result<(), SyncError> {
		for (side, remote) in [(Side::A, &self.remote_a), (Side::B, &self.remote_b)] {
			if remote.is_empty() {
				return Err(SyncError::Config {
					message: format!("must specify remote_{}", side.letter().to_lowercase()),
				});
			}
		}

		for (attr, flags) in [
			("transport_flags", &self.transport_flags),
			("transport_flags_a", &self.transport_flags_a),
			("transport_flags_b", &self.transport_flags_b),
		] {
			for flag in flags {
				if FILTER_FLAGS.contains(&flag.as_str()) {
					return Err(SyncError::Config {
						message: format!(
							"'{}' cannot contain '{}' or any other filtering flag; use filter_flags",
							attr, flag
						),
					});
				}
			}
		}

		if self.dt < 0.0 {
			return Err(SyncError::Config { message: "dt must be non-negative".to_string() });
		}

		if self.action_threads < 1 {
			self.action_threads = 1;
		}

		for side in Side::BOTH {
			if let Some(workdir) = self.workdir_override(side) {
				let root = self.remote(side).trim_end_matches('/');
				let inside = workdir.strip_prefix(root).map_or(false, |rest| {
					rest.is_empty() || rest.starts_with('/') || root.ends_with(':')
				});
				if inside && workdir != pathjoin(root, INTERNAL_DIR) {
					return Err(SyncError::Config {
						message: format!(
							"workdir_{} '{}' lies inside remote_{}; use a location outside the synced root",
							side.letter().to_lowercase(),
							workdir,
							side.letter().to_lowercase()
						),
					});
				}
			}
		}

		if self.avoid_relist {
			warn!("avoid_relist is experimental. Use with caution.");
			if self.cleanup_empty_dirs_a != Cleanup::Never
				|| self.cleanup_empty_dirs_b != Cleanup::Never
			{
				warn!("avoid_relist: disabling empty directory cleanup");
				self.cleanup_empty_dirs_a = Cleanup::Never;
				self.cleanup_empty_dirs_b = Cleanup::Never;
			}
		}

		if self.dry_run && self.interactive {
			return Err(SyncError::Config {
				message: "cannot set both dry_run and interactive".to_string(),
			});
		}

		Ok(())
	}

	pub fn remote(&self, side: Side) -> &str {
		match side {
			Side::A => &self.remote_a,
			Side::B => &self.remote_b,
		}
	}

	fn workdir_override(&self, side: Side) -> Option<&str> {
		match side {
			Side::A => self.workdir_a.as_deref(),
			Side::B => self.workdir_b.as_deref(),
		}
	}

	/// State and backup location for a side
	pub fn workdir(&self, side: Side) -> String {
		match self.workdir_override(side) {
			Some(w) => w.trim_end_matches('/').to_string(),
			None => pathjoin(self.remote(side), INTERNAL_DIR),
		}
	}

	/// Whether the workdir is the sentinel directory inside the synced root
	pub fn workdir_is_internal(&self, side: Side) -> bool {
		self.workdir_override(side).is_none()
	}

	pub fn renames(&self, side: Side) -> RenameMode {
		match side {
			Side::A => self.renames_a,
			Side::B => self.renames_b,
		}
	}

	pub fn reuse_hashes(&self, side: Side) -> bool {
		match side {
			Side::A => self.reuse_hashes_a,
			Side::B => self.reuse_hashes_b,
		}
	}

	pub fn transport_flags_for(&self, side: Side) -> &[String] {
		match side {
			Side::A => &self.transport_flags_a,
			Side::B => &self.transport_flags_b,
		}
	}

	pub fn cleanup_empty_dirs(&self, side: Side) -> Cleanup {
		match side {
			Side::A => self.cleanup_empty_dirs_a,
			Side::B => self.cleanup_empty_dirs_b,
		}
	}

	/// Whether any stage needs hashes for this side
	pub fn needs_hashes(&self, side: Side) -> bool {
		self.compare == CompareMode::Hash || self.renames(side) == RenameMode::Hash
	}

	/// Whether listings should request ModTime for this side
	pub fn needs_mtime(&self, side: Side) -> bool {
		self.always_get_mtime
			|| self.compare == CompareMode::Mtime
			|| self.hash_fail_fallback == HashFallback::Mtime
			|| self.renames(side) == RenameMode::Mtime
			|| matches!(self.conflict_mode, ConflictMode::Older | ConflictMode::Newer)
			|| self.reuse_hashes(side)
	}
}

/// Parse one `--override` line as a TOML fragment. A bare unquoted value is
/// retried as a string so `name = weekly` works like `name = "weekly"`.
fn parse_override(line: &str) -> Result<toml::Table, SyncError> {
	if let Ok(table) = toml::from_str::<toml::Table>(line) {
		return Ok(table);
	}
	if let Some((key, val)) = line.split_once('=') {
		let retry = format!("{} = {:?}", key.trim(), val.trim());
		if let Ok(table) = toml::from_str::<toml::Table>(&retry) {
			return Ok(table);
		}
	}
	Err(SyncError::Config { message: format!("cannot parse override '{}'", line) })
}

/// Accept legacy compound conflict modes like `newer_tag`, rewriting them to
/// the base mode plus `tag_conflict = true`.
fn normalize_conflict_mode(table: &mut toml::Table) -> Result<(), SyncError> {
	let compound = match table.get("conflict_mode") {
		Some(toml::Value::String(s)) if s.ends_with("_tag") => s.clone(),
		_ => return Ok(()),
	};
	let base = compound.trim_end_matches("_tag").to_string();
	warn!(
		"conflict_mode '{}' is deprecated. Use conflict_mode = \"{}\" and tag_conflict = true",
		compound, base
	);
	table.insert("conflict_mode".to_string(), toml::Value::String(base));
	table.insert("tag_conflict".to_string(), toml::Value::Boolean(true));
	Ok(())
}

/// Commented settings template written by `--new`
pub const TEMPLATE: &str = r#"# bisyncr settings
#
# Specify the two roots to be synchronized as the transport understands
# them. A local path needs no remote prefix.
remote_a = ""
remote_b = ""

# Unique identifier for this sync pair. Lets one root take part in several
# pairs without the snapshots colliding.
name = "NAME"

# How to decide whether two files are the same: "size", "mtime" or "hash".
# mtime also checks size. Hashes use whatever common algorithms the two
# backends report.
compare = "mtime"

# Allowed mtime difference in seconds when compare = "mtime"
dt = 1.1

# Fallback when compare = "hash" finds no usable common hash:
# "size", "mtime" or "none" (fail the run)
hash_fail_fallback = "none"

# Policy for files modified on both sides:
# "A", "B", "older", "newer", "smaller", "larger" or "tag"
conflict_mode = "newer"

# Tag the losing file instead of backing it up
tag_conflict = false

# Rename tracking per side: "size", "mtime", "hash" or "none"
renames_a = "none"
renames_b = "none"

# Reuse hashes from the prior run when path, size and mtime match.
# Worth enabling for backends that compute hashes on demand.
reuse_hashes_a = false
reuse_hashes_b = false

# Copy files into the backup area before they are overwritten or deleted
backup = true

# Mirror each side's backup area to the other side
sync_backups = false

# Filtering patterns passed to the transport on listings, e.g.
# filter_flags = ["--exclude", "*.tmp"]
filter_flags = []

# Transport invocation. transport_flags apply to every call; the per-side
# variants are appended for calls touching that side only. Do not put
# filtering flags here.
transport_exe = "rclone"
transport_flags = []
transport_flags_a = []
transport_flags_b = []

# Extra environment for the transport, e.g. credentials
# [transport_env]
# RCLONE_CONFIG_PASS = "..."

# Worker pool size for per-file actions within one side
action_threads = 1

# Remove directories emptied by a run: "auto", "always" or "never"
cleanup_empty_dirs_a = "auto"
cleanup_empty_dirs_b = "auto"

# Build the next state from the executed plan instead of relisting.
# Experimental.
avoid_relist = false

# Advisory locking so two runs of the same pair do not interleave
set_lock = true
"#;

/// Resolve the config path argument. A directory means local mode: search
/// upwards for `.bisyncr/config.toml`, or place a new one here.
pub fn find_config(path: &Path, new: bool) -> Result<std::path::PathBuf, SyncError> {
	if !path.is_dir() {
		return Ok(path.to_path_buf());
	}
	if new {
		return Ok(path.join(INTERNAL_DIR).join("config.toml"));
	}
	let mut dir = path
		.canonicalize()
		.map_err(|e| SyncError::Config { message: format!("{}: {}", path.display(), e) })?;
	loop {
		let candidate = dir.join(INTERNAL_DIR).join("config.toml");
		debug!("Looking for config in '{}'", dir.display());
		if candidate.exists() {
			return Ok(candidate);
		}
		if !dir.pop() {
			return Err(SyncError::Config {
				message: format!(
					"could not find '{}/config.toml' at or above '{}'",
					INTERNAL_DIR,
					path.display()
				),
			});
		}
	}
}

/// Write a fresh settings template, refusing to clobber an existing file
pub fn write_template(path: &Path) -> Result<(), SyncError> {
	if path.exists() {
		return Err(SyncError::Config {
			message: format!(
				"path '{}' exists. Specify a different path or move the existing file",
				path.display()
			),
		});
	}
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			std::fs::create_dir_all(parent)?;
		}
	}
	let name: String = uuid::Uuid::new_v4().simple().to_string()[..5].to_string();
	std::fs::write(path, TEMPLATE.replace("NAME", &name))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base_toml() -> &'static str {
		"remote_a = \"/tmp/a\"\nremote_b = \"/tmp/b\"\nname = \"test\"\n"
	}

	#[test]
	fn test_defaults() {
		let s = Settings::from_toml_str(base_toml(), &[]).unwrap();
		assert_eq!(s.compare, CompareMode::Mtime);
		assert_eq!(s.dt, 1.1);
		assert_eq!(s.conflict_mode, ConflictMode::Newer);
		assert!(s.backup);
		assert!(s.set_lock);
		assert_eq!(s.action_threads, 1);
	}

	#[test]
	fn test_missing_remote_rejected() {
		let err = Settings::from_toml_str("remote_a = \"/tmp/a\"", &[]).unwrap_err();
		assert!(err.to_string().contains("remote_b"));
	}

	#[test]
	fn test_unknown_key_rejected() {
		let text = format!("{}snapshot_dir = \"x\"\n", base_toml());
		assert!(Settings::from_toml_str(&text, &[]).is_err());
	}

	#[test]
	fn test_overrides_patch_and_win() {
		let overrides = vec![
			"compare = \"hash\"".to_string(),
			"dt = 5.0".to_string(),
			"name = weekly".to_string(), // bare value retried as string
		];
		let s = Settings::from_toml_str(base_toml(), &overrides).unwrap();
		assert_eq!(s.compare, CompareMode::Hash);
		assert_eq!(s.dt, 5.0);
		assert_eq!(s.name, "weekly");
	}

	#[test]
	fn test_legacy_compound_conflict_mode() {
		let text = format!("{}conflict_mode = \"newer_tag\"\n", base_toml());
		let s = Settings::from_toml_str(&text, &[]).unwrap();
		assert_eq!(s.conflict_mode, ConflictMode::Newer);
		assert!(s.tag_conflict);
	}

	#[test]
	fn test_filter_flags_rejected_in_transport_flags() {
		let text = format!("{}transport_flags = [\"--exclude\", \"*.tmp\"]\n", base_toml());
		let err = Settings::from_toml_str(&text, &[]).unwrap_err();
		assert!(err.to_string().contains("filter"));
	}

	#[test]
	fn test_workdir_inside_root_rejected() {
		let text = format!("{}workdir_a = \"/tmp/a/state\"\n", base_toml());
		assert!(Settings::from_toml_str(&text, &[]).is_err());

		// The root itself is the most-overlapping workdir of all
		let text = format!("{}workdir_a = \"/tmp/a\"\n", base_toml());
		assert!(Settings::from_toml_str(&text, &[]).is_err());

		let text = format!("{}workdir_a = \"/elsewhere/state\"\n", base_toml());
		let s = Settings::from_toml_str(&text, &[]).unwrap();
		assert_eq!(s.workdir(Side::A), "/elsewhere/state");
		assert!(!s.workdir_is_internal(Side::A));
	}

	#[test]
	fn test_default_workdir_is_internal() {
		let s = Settings::from_toml_str(base_toml(), &[]).unwrap();
		assert_eq!(s.workdir(Side::A), "/tmp/a/.bisyncr");
		assert!(s.workdir_is_internal(Side::A));
	}

	#[test]
	fn test_action_threads_clamped() {
		let text = format!("{}action_threads = 0\n", base_toml());
		let s = Settings::from_toml_str(&text, &[]).unwrap();
		assert_eq!(s.action_threads, 1);
	}

	#[test]
	fn test_avoid_relist_disables_cleanup() {
		let text = format!("{}avoid_relist = true\n", base_toml());
		let s = Settings::from_toml_str(&text, &[]).unwrap();
		assert_eq!(s.cleanup_empty_dirs_a, Cleanup::Never);
		assert_eq!(s.cleanup_empty_dirs_b, Cleanup::Never);
	}

	#[test]
	fn test_template_parses() {
		let mut table: toml::Table = toml::from_str(TEMPLATE).unwrap();
		table.insert("remote_a".into(), toml::Value::String("/a".into()));
		table.insert("remote_b".into(), toml::Value::String("/b".into()));
		let text = toml::to_string(&table).unwrap();
		assert!(Settings::from_toml_str(&text, &[]).is_ok());
	}
}

// vim: ts=4
