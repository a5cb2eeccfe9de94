//! File equality predicate
//!
//! A single `same(f1, f2)` decides whether two records describe the same
//! content. The predicate is parameterized by the configured compare mode
//! and degrades predictably when a backend withholds hashes or mtimes.

use crate::config::Settings;
use crate::error::SyncError;
use crate::strategies::{CompareMode, HashFallback};
use crate::types::FileRecord;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

pub struct Comparator {
	mode: CompareMode,
	fallback: HashFallback,
	dt: f64,

	// One-shot warning latches so a large listing does not flood the log
	warned_hash_fallback: AtomicBool,
	warned_no_mtime: AtomicBool,
}

impl Comparator {
	pub fn new(cfg: &Settings) -> Self {
		Comparator {
			mode: cfg.compare,
			fallback: cfg.hash_fail_fallback,
			dt: cfg.dt,
			warned_hash_fallback: AtomicBool::new(false),
			warned_no_mtime: AtomicBool::new(false),
		}
	}

	#[cfg(test)]
	pub fn with_mode(mode: CompareMode, fallback: HashFallback, dt: f64) -> Self {
		Comparator {
			mode,
			fallback,
			dt,
			warned_hash_fallback: AtomicBool::new(false),
			warned_no_mtime: AtomicBool::new(false),
		}
	}

	/// A missing operand is never equal to anything
	pub fn same_opt(
		&self,
		f1: Option<&FileRecord>,
		f2: Option<&FileRecord>,
	) -> Result<bool, SyncError> {
		match (f1, f2) {
			(Some(f1), Some(f2)) => self.same(f1, f2),
			_ => Ok(false),
		}
	}

	/// Whether the two records describe the same content under the
	/// configured mode. Reflexive, symmetric and deterministic.
	pub fn same(&self, f1: &FileRecord, f2: &FileRecord) -> Result<bool, SyncError> {
		let mut mode = self.mode;

		if mode == CompareMode::Hash {
			match hash_verdict(f1, f2) {
				Some(false) => return Ok(false),
				Some(true) => {
					// Hashes agree; the size check below still applies
					mode = CompareMode::Size;
				}
				None => {
					let msg =
						"No common hashes found and/or one or both remotes do not provide hashes";
					match self.fallback {
						HashFallback::None => {
							return Err(SyncError::MissingHash { message: msg.to_string() })
						}
						HashFallback::Size => {
							self.warn_fallback(msg, "size");
							mode = CompareMode::Size;
						}
						HashFallback::Mtime => {
							self.warn_fallback(msg, "mtime");
							mode = CompareMode::Mtime;
						}
					}
				}
			}
		}

		if f1.size != f2.size {
			return Ok(false);
		}
		if mode == CompareMode::Size {
			return Ok(true);
		}

		match (f1.mtime, f2.mtime) {
			(Some(m1), Some(m2)) => Ok((m1 - m2).abs() <= self.dt),
			_ => {
				if !self.warned_no_mtime.swap(true, Ordering::Relaxed) {
					warn!("Files do not have mtime. Using only size");
				}
				Ok(true)
			}
		}
	}

	fn warn_fallback(&self, msg: &str, to: &str) {
		if !self.warned_hash_fallback.swap(true, Ordering::Relaxed) {
			warn!("{}. Falling back to '{}'", msg, to);
		}
	}
}

/// Compare every hash algorithm that both records carry with a non-empty
/// value. None means there was nothing usable to compare.
fn hash_verdict(f1: &FileRecord, f2: &FileRecord) -> Option<bool> {
	let (h1, h2) = match (&f1.hashes, &f2.hashes) {
		(Some(h1), Some(h2)) => (h1, h2),
		_ => return None,
	};
	let mut any = false;
	for (alg, v1) in h1 {
		if v1.is_empty() {
			continue;
		}
		if let Some(v2) = h2.get(alg) {
			if v2.is_empty() {
				continue;
			}
			if v1 != v2 {
				return Some(false);
			}
			any = true;
		}
	}
	if any {
		Some(true)
	} else {
		None
	}
}


// vim: ts=4
