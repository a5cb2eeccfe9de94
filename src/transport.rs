//! Gateway to the external transport CLI
//!
//! All storage I/O goes through a single rclone-compatible executable. This
//! module spawns it, feeds it batch file lists, parses its JSON listings and
//! feature reports, and keeps a tally of time spent in calls. Nothing here
//! knows about sync semantics; callers pick the operations and the order.

use crate::config::{Settings, INTERNAL_DIR};
use crate::error::{SyncError, TransportError};
use crate::listing::Listing;
use crate::types::{FileRecord, Side};
use crate::util::{pathjoin, rfc3339_to_unix};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Capabilities reported by a backend
#[derive(Debug, Clone, Default)]
pub struct Features {
	/// Server-side rename within the backend
	pub move_files: bool,

	/// The backend can hold empty directories
	pub empty_dirs: bool,

	/// Hash algorithms the backend can report
	pub hashes: Vec<String>,
}

#[derive(Deserialize)]
struct FeaturesReply {
	#[serde(rename = "Hashes", default)]
	hashes: Vec<String>,

	#[serde(rename = "Features", default)]
	features: BTreeMap<String, bool>,
}

/// One entry of the transport's JSON listing output
#[derive(Deserialize)]
struct LsEntry {
	#[serde(rename = "Path")]
	path: String,

	#[serde(rename = "Size", default)]
	size: i64,

	#[serde(rename = "ModTime", default)]
	mod_time: Option<String>,

	#[serde(rename = "IsDir", default)]
	is_dir: bool,

	#[serde(rename = "Hashes", default)]
	hashes: Option<BTreeMap<String, String>>,
}

pub struct Transport {
	cfg: Arc<Settings>,
	run_ts: String,
	tmpdir: tempfile::TempDir,
	staging_seq: AtomicUsize,
	call_time: Mutex<Duration>,
	features: tokio::sync::Mutex<[Option<Features>; 2]>,
}

impl Transport {
	pub fn new(cfg: Arc<Settings>, run_ts: &str) -> Result<Self, SyncError> {
		Ok(Transport {
			cfg,
			run_ts: run_ts.to_string(),
			tmpdir: tempfile::TempDir::new()?,
			staging_seq: AtomicUsize::new(0),
			call_time: Mutex::new(Duration::ZERO),
			features: tokio::sync::Mutex::new([None, None]),
		})
	}

	/// Workdir-relative name of this run's backup area for one side
	pub fn backup_dir_name(&self, side: Side) -> String {
		format!("backups/{}_{}_{}", self.run_ts, self.cfg.name, side.letter())
	}

	/// Backup area for this run on one side
	pub fn backup_root(&self, side: Side) -> String {
		pathjoin(&self.cfg.workdir(side), &self.backup_dir_name(side))
	}

	/// Total wall time spent inside transport calls so far
	pub fn elapsed_in_calls(&self) -> Duration {
		*self.call_time.lock().unwrap()
	}

	/// Local staging directory for this run
	pub fn staging_dir(&self) -> &std::path::Path {
		self.tmpdir.path()
	}

	/// Log the transport's version banner
	pub async fn version_banner(&self) {
		match self.call(&["--version".to_string()]).await {
			Ok(out) => {
				if let Some(line) = out.lines().next() {
					info!("transport version: {}", line);
				}
			}
			Err(e) => warn!("could not query transport version: {}", e),
		}
	}

	fn side_flags(&self, side: Option<Side>) -> Vec<String> {
		let mut flags = self.cfg.transport_flags.clone();
		if let Some(side) = side {
			flags.extend_from_slice(self.cfg.transport_flags_for(side));
		}
		flags
	}

	/// Spawn the transport once and capture its output. stderr is relayed
	/// to the run log; sensitive environment values never are.
	pub async fn call(&self, args: &[String]) -> Result<String, TransportError> {
		let exe = &self.cfg.transport_exe;
		debug!("transport: {} {}", exe, args.join(" "));

		let mut cmd = tokio::process::Command::new(exe);
		cmd.args(args);
		cmd.env("RCLONE_ASK_PASSWORD", "false");
		for (key, val) in &self.cfg.transport_env {
			cmd.env(key, val);
			debug!("transport env: {}={}", key, redact(key, val));
		}
		cmd.kill_on_drop(true);

		let started = Instant::now();
		let out = cmd
			.output()
			.await
			.map_err(|e| TransportError::Spawn { cmd: exe.clone(), source: e })?;
		*self.call_time.lock().unwrap() += started.elapsed();

		let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
		for line in stderr.lines() {
			debug!("transport: {}", line);
		}

		if !out.status.success() {
			return Err(TransportError::Exit {
				cmd: format!("{} {}", exe, args.join(" ")),
				code: out.status.code().unwrap_or(-1),
				stderr: trim_stderr(&stderr),
			});
		}
		Ok(String::from_utf8_lossy(&out.stdout).into_owned())
	}

	/// Write a batch file list into the staging directory
	pub fn write_files_from(&self, tag: &str, files: &[String]) -> Result<PathBuf, SyncError> {
		let seq = self.staging_seq.fetch_add(1, Ordering::Relaxed);
		let path = self.tmpdir.path().join(format!("{}_{}", seq, tag));
		std::fs::write(&path, files.join("\n"))?;
		Ok(path)
	}

	// ========================================================================
	// LISTING
	// ========================================================================

	/// List one side, reusing hashes from the prior snapshot where the
	/// record is unchanged and fetching the remainder in a second pass.
	pub async fn list(&self, side: Side, prev: &Listing) -> Result<Listing, SyncError> {
		let want_hashes = self.cfg.needs_hashes(side);
		let reuse = want_hashes && self.cfg.reuse_hashes(side);

		let mut args: Vec<String> = vec![
			"lsjson".to_string(),
			"--filter".to_string(),
			format!("- /{}/**", INTERNAL_DIR),
		];
		if want_hashes && !reuse {
			args.push("--hash".to_string());
		}
		if !self.cfg.needs_mtime(side) {
			args.push("--no-modtime".to_string());
		}
		args.extend(self.cfg.filter_flags.iter().cloned());
		args.extend(self.side_flags(Some(side)));
		args.extend([
			"-R".to_string(),
			"--no-mimetype".to_string(),
			"--files-only".to_string(),
			self.cfg.remote(side).to_string(),
		]);

		let out = self.call(&args).await?;
		let entries: Vec<LsEntry> = serde_json::from_str(&out)
			.map_err(|e| TransportError::Parse { message: e.to_string() })?;
		debug!("{}: Read {}", side, entries.len());

		let mut listing = Listing::new();
		for entry in entries {
			if entry.is_dir {
				continue;
			}
			listing.insert(to_record(entry));
		}

		if !want_hashes || !reuse {
			return Ok(listing);
		}

		// Carry hashes forward where path, size and mtime all match
		let mut not_hashed: Vec<String> = Vec::new();
		let mut carried = 0usize;
		let paths: Vec<String> = listing.paths().map(|p| p.to_string()).collect();
		for path in paths {
			let rec = listing.get(&path).expect("listed").clone();
			match prev.get(&path) {
				Some(old)
					if old.size == rec.size
						&& old.mtime == rec.mtime
						&& old.hashes.is_some() =>
				{
					let mut rec = rec;
					rec.hashes = old.hashes.clone();
					listing.insert(rec);
					carried += 1;
				}
				_ => not_hashed.push(path),
			}
		}

		if not_hashed.is_empty() {
			debug!("{}: Carried {} hashes. No need to fetch more", side, carried);
			return Ok(listing);
		}
		debug!("{}: Carried {} hashes. Fetching hashes for {}", side, carried, not_hashed.len());

		let files_from =
			self.write_files_from(&format!("{}_update_hash", side), &not_hashed)?;
		let mut args: Vec<String> = vec![
			"lsjson".to_string(),
			"--hash".to_string(),
			"--files-from".to_string(),
			files_from.display().to_string(),
		];
		args.extend(self.side_flags(Some(side)));
		args.extend([
			"-R".to_string(),
			"--no-mimetype".to_string(),
			"--files-only".to_string(),
			self.cfg.remote(side).to_string(),
		]);

		let out = self.call(&args).await?;
		let entries: Vec<LsEntry> = serde_json::from_str(&out)
			.map_err(|e| TransportError::Parse { message: e.to_string() })?;
		let fetched = entries.len();
		for entry in entries {
			if entry.is_dir {
				continue;
			}
			let rec = to_record(entry);
			if rec.hashes.is_some() && listing.contains(&rec.path) {
				listing.insert(rec);
			}
		}
		debug!("{}: Updated hash on {} files", side, fetched);

		Ok(listing)
	}

	/// Names directly under an absolute remote directory. An absent
	/// directory reads as empty.
	pub async fn list_names(&self, root: &str) -> Result<Vec<String>, SyncError> {
		let args =
			vec!["lsjson".to_string(), "--files-only".to_string(), root.to_string()];
		let out = match self.call(&args).await {
			Ok(out) => out,
			Err(e) if e.is_not_found() => return Ok(vec![]),
			Err(e) => return Err(e.into()),
		};
		let entries: Vec<LsEntry> = serde_json::from_str(&out)
			.map_err(|e| TransportError::Parse { message: e.to_string() })?;
		Ok(entries.into_iter().filter(|e| !e.is_dir).map(|e| e.path).collect())
	}

	// ========================================================================
	// SINGLE-FILE OPERATIONS
	// ========================================================================

	/// Copy one file between absolute transport paths, overwriting the
	/// destination without checking it first
	pub async fn copyto(
		&self,
		src: &str,
		dst: &str,
		side: Option<Side>,
		retries: Option<u32>,
	) -> Result<(), TransportError> {
		let mut args = vec!["copyto".to_string()];
		args.extend(self.side_flags(side));
		args.extend(transfer_flags(retries));
		args.extend([src.to_string(), dst.to_string()]);
		self.call(&args).await.map(drop)
	}

	/// Server-side rename between absolute transport paths
	pub async fn moveto(
		&self,
		src: &str,
		dst: &str,
		side: Option<Side>,
		retries: Option<u32>,
	) -> Result<(), TransportError> {
		let mut args = vec!["moveto".to_string()];
		args.extend(self.side_flags(side));
		args.extend(transfer_flags(retries));
		args.extend([src.to_string(), dst.to_string()]);
		self.call(&args).await.map(drop)
	}

	/// Delete a single object, tolerating its absence when asked to
	pub async fn delete_file(
		&self,
		path: &str,
		side: Option<Side>,
		ignore_missing: bool,
	) -> Result<(), TransportError> {
		let mut args = vec!["deletefile".to_string()];
		args.extend(self.side_flags(side));
		args.extend(["--retries".to_string(), "1".to_string(), path.to_string()]);
		match self.call(&args).await {
			Ok(_) => Ok(()),
			Err(e) if ignore_missing && e.is_not_found() => Ok(()),
			Err(e) => Err(e),
		}
	}

	/// Delete every file under an absolute remote directory
	pub async fn delete_dir_files(
		&self,
		root: &str,
		ignore_missing: bool,
	) -> Result<(), TransportError> {
		let args = vec![
			"delete".to_string(),
			"--retries".to_string(),
			"1".to_string(),
			root.to_string(),
		];
		match self.call(&args).await {
			Ok(_) => Ok(()),
			Err(e) if ignore_missing && e.is_not_found() => Ok(()),
			Err(e) => Err(e),
		}
	}

	// ========================================================================
	// BATCH OPERATIONS
	// ========================================================================

	/// Bulk delete of root-relative paths on one side
	pub async fn delete_batch(&self, side: Side, files: &[String]) -> Result<(), SyncError> {
		if files.is_empty() {
			return Ok(());
		}
		let files_from = self.write_files_from(&format!("{}_del", side), files)?;
		let mut args = vec![
			"delete".to_string(),
			"--files-from".to_string(),
			files_from.display().to_string(),
		];
		args.extend(self.side_flags(Some(side)));
		args.push(self.cfg.remote(side).to_string());
		self.call(&args).await?;
		Ok(())
	}

	/// Bulk server-side move of the given relative paths from one absolute
	/// root to another. Used to sweep whole subtrees into the backup area.
	pub async fn move_batch(
		&self,
		side: Side,
		src_root: &str,
		dst_root: &str,
		files: &[String],
	) -> Result<(), SyncError> {
		if files.is_empty() {
			return Ok(());
		}
		let files_from = self.write_files_from(&format!("{}_move", side), files)?;
		let mut args = vec![
			"move".to_string(),
			"--files-from".to_string(),
			files_from.display().to_string(),
		];
		args.extend(self.side_flags(Some(side)));
		args.extend(transfer_flags(Some(4)));
		args.extend([src_root.to_string(), dst_root.to_string()]);
		self.call(&args).await?;
		Ok(())
	}

	/// Bulk copy of relative paths between two absolute roots. The
	/// destination may already hold older versions, so times are ignored
	/// but the destination is still consulted.
	pub async fn copy_batch(
		&self,
		src_root: &str,
		dst_root: &str,
		files: &[String],
		side: Option<Side>,
		retries: Option<u32>,
	) -> Result<(), SyncError> {
		if files.is_empty() {
			return Ok(());
		}
		let files_from = self.write_files_from("copy", files)?;
		let mut args = vec![
			"copy".to_string(),
			"--files-from".to_string(),
			files_from.display().to_string(),
			"--ignore-times".to_string(),
			"--no-traverse".to_string(),
		];
		args.extend(self.side_flags(side));
		if let Some(n) = retries {
			args.extend(["--retries".to_string(), n.to_string()]);
		}
		args.extend([src_root.to_string(), dst_root.to_string()]);
		self.call(&args).await?;
		Ok(())
	}

	/// Cross-side transfer of root-relative paths
	pub async fn transfer(&self, from: Side, files: &[String]) -> Result<(), SyncError> {
		self.copy_batch(
			self.cfg.remote(from),
			self.cfg.remote(from.other()),
			files,
			None,
			None,
		)
		.await
	}

	// ========================================================================
	// FEATURES AND DIRECTORY CLEANUP
	// ========================================================================

	/// Query and cache the backend capabilities of one side
	pub async fn features(&self, side: Side) -> Result<Features, SyncError> {
		let mut cache = self.features.lock().await;
		let slot = match side {
			Side::A => 0,
			Side::B => 1,
		};
		if let Some(f) = &cache[slot] {
			return Ok(f.clone());
		}

		let args = vec![
			"backend".to_string(),
			"features".to_string(),
			self.cfg.remote(side).to_string(),
		];
		let out = self.call(&args).await?;
		let reply: FeaturesReply = serde_json::from_str(&out)
			.map_err(|e| TransportError::Parse { message: e.to_string() })?;

		let features = Features {
			move_files: reply.features.get("Move").copied().unwrap_or(false),
			empty_dirs: reply
				.features
				.get("CanHaveEmptyDirectories")
				.copied()
				.unwrap_or(false),
			hashes: reply.hashes,
		};
		debug!(
			"{}: features move={} empty_dirs={} hashes={:?}",
			side, features.move_files, features.empty_dirs, features.hashes
		);
		cache[slot] = Some(features.clone());
		Ok(features)
	}

	/// Remove the empty directory tree rooted at a root-relative path
	pub async fn rmdirs(&self, side: Side, root: &str) -> Result<(), SyncError> {
		let mut args = vec!["rmdirs".to_string()];
		args.extend(self.side_flags(Some(side)));
		args.push(pathjoin(self.cfg.remote(side), root));
		match self.call(&args).await {
			Ok(_) => Ok(()),
			// The tree may already be gone, or not be empty after all
			Err(e) if e.is_not_found() => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

fn transfer_flags(retries: Option<u32>) -> Vec<String> {
	let mut flags = vec![
		"--no-traverse".to_string(),
		"--no-check-dest".to_string(),
		"--ignore-times".to_string(),
	];
	if let Some(n) = retries {
		flags.extend(["--retries".to_string(), n.to_string()]);
	}
	flags
}

fn to_record(entry: LsEntry) -> FileRecord {
	let hashes = entry.hashes.and_then(|h| {
		let h: BTreeMap<String, String> = h
			.into_iter()
			.map(|(alg, val)| (normalize_alg(&alg), val))
			.collect();
		if h.values().any(|v| !v.is_empty()) {
			Some(h)
		} else {
			None
		}
	});
	FileRecord {
		path: entry.path,
		size: entry.size.max(0) as u64,
		mtime: entry.mod_time.as_deref().and_then(rfc3339_to_unix),
		hashes,
	}
}

/// Older transports spell algorithm names like "SHA-1" or "MD5"
fn normalize_alg(alg: &str) -> String {
	alg.to_lowercase().replace('-', "")
}

fn redact(key: &str, val: &str) -> String {
	let upper = key.to_uppercase();
	if ["PASS", "SECRET", "TOKEN", "KEY"].iter().any(|n| upper.contains(n)) {
		"**REDACTED**".to_string()
	} else {
		val.to_string()
	}
}

fn trim_stderr(stderr: &str) -> String {
	let trimmed = stderr.trim();
	match trimmed.char_indices().nth_back(1999) {
		Some((idx, _)) => trimmed[idx..].to_string(),
		None => trimmed.to_string(),
	}
}


// vim: ts=4
