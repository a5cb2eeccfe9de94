//! Conflict resolution for files modified on both sides

use crate::config::Settings;
use crate::strategies::ConflictMode;
use crate::types::FileRecord;
use crate::util::{bytes2human, unix2iso};
use tracing::info;

/// Outcome of resolving one conflicting path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
	/// A's content wins; B's copy is backed up or tagged
	KeepA,

	/// B's content wins; A's copy is backed up or tagged
	KeepB,

	/// No winner. Both copies are tagged and cross-copied.
	TagBoth,
}

pub struct ConflictResolver {
	mode: ConflictMode,
}

impl ConflictResolver {
	pub fn new(cfg: &Settings) -> Self {
		ConflictResolver { mode: cfg.conflict_mode }
	}

	/// Decide the winner for a path present and modified on both sides.
	///
	/// `older`/`newer` compare mtimes, `smaller`/`larger` compare sizes.
	/// A missing or equal deciding attribute falls through to tagging both.
	pub fn resolve(&self, path: &str, file_a: &FileRecord, file_b: &FileRecord) -> Resolution {
		let resolution = match self.mode {
			ConflictMode::A => Resolution::KeepA,
			ConflictMode::B => Resolution::KeepB,
			ConflictMode::Tag => Resolution::TagBoth,
			ConflictMode::Older | ConflictMode::Newer => {
				match (file_a.mtime, file_b.mtime) {
					(Some(ma), Some(mb)) if ma != mb => {
						let a_wins = (ma > mb) == (self.mode == ConflictMode::Newer);
						if a_wins {
							Resolution::KeepA
						} else {
							Resolution::KeepB
						}
					}
					_ => Resolution::TagBoth,
				}
			}
			ConflictMode::Smaller | ConflictMode::Larger => {
				if file_a.size == file_b.size {
					Resolution::TagBoth
				} else {
					let a_wins =
						(file_a.size > file_b.size) == (self.mode == ConflictMode::Larger);
					if a_wins {
						Resolution::KeepA
					} else {
						Resolution::KeepB
					}
				}
			}
		};

		let (txt_a, txt_b) = describe(self.mode, file_a, file_b);
		let verdict = match resolution {
			Resolution::KeepA => " (keep A)",
			Resolution::KeepB => " (keep B)",
			Resolution::TagBoth => " (tag both)",
		};
		info!(
			"CONFLICT '{}'. A: {}, B: {}. Resolving with mode '{}'{}",
			path, txt_a, txt_b, self.mode, verdict
		);

		resolution
	}
}

fn describe(mode: ConflictMode, file_a: &FileRecord, file_b: &FileRecord) -> (String, String) {
	match mode {
		ConflictMode::Older | ConflictMode::Newer
			if file_a.mtime.is_some() && file_b.mtime.is_some() =>
		{
			(unix2iso(file_a.mtime), unix2iso(file_b.mtime))
		}
		_ => {
			let (va, la) = bytes2human(file_a.size);
			let (vb, lb) = bytes2human(file_b.size);
			(format!("{:.2} {}", va, la), format!("{:.2} {}", vb, lb))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn resolver(mode: ConflictMode) -> ConflictResolver {
		ConflictResolver { mode }
	}

	fn rec(size: u64, mtime: Option<f64>) -> FileRecord {
		let mut r = FileRecord::new("f", size);
		r.mtime = mtime;
		r
	}

	#[test]
	fn test_fixed_winner() {
		let a = rec(1, Some(100.0));
		let b = rec(2, Some(200.0));
		assert_eq!(resolver(ConflictMode::A).resolve("f", &a, &b), Resolution::KeepA);
		assert_eq!(resolver(ConflictMode::B).resolve("f", &a, &b), Resolution::KeepB);
	}

	#[test]
	fn test_newer_and_older() {
		let a = rec(1, Some(100.0));
		let b = rec(2, Some(200.0));
		assert_eq!(resolver(ConflictMode::Newer).resolve("f", &a, &b), Resolution::KeepB);
		assert_eq!(resolver(ConflictMode::Older).resolve("f", &a, &b), Resolution::KeepA);
	}

	#[test]
	fn test_mtime_missing_or_equal_tags_both() {
		let a = rec(1, None);
		let b = rec(2, Some(200.0));
		assert_eq!(resolver(ConflictMode::Newer).resolve("f", &a, &b), Resolution::TagBoth);

		let a = rec(1, Some(200.0));
		assert_eq!(resolver(ConflictMode::Newer).resolve("f", &a, &b), Resolution::TagBoth);
	}

	#[test]
	fn test_size_policies() {
		let a = rec(10, None);
		let b = rec(20, None);
		assert_eq!(resolver(ConflictMode::Larger).resolve("f", &a, &b), Resolution::KeepB);
		assert_eq!(resolver(ConflictMode::Smaller).resolve("f", &a, &b), Resolution::KeepA);

		let same = rec(10, None);
		assert_eq!(resolver(ConflictMode::Larger).resolve("f", &a, &same), Resolution::TagBoth);
	}

	#[test]
	fn test_tag_mode() {
		let a = rec(1, Some(1.0));
		let b = rec(2, Some(2.0));
		assert_eq!(resolver(ConflictMode::Tag).resolve("f", &a, &b), Resolution::TagBoth);
	}
}

// vim: ts=4
