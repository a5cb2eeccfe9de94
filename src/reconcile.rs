//! Three-way reconciliation of the two current listings against the prior
//! state
//!
//! Every path present on either side after common-path pruning is classified
//! exactly once: new on one side, deleted on the other, modified on one
//! side, or conflicting. The prior snapshot is the arbiter; a file absent
//! from one side is a deletion only when the surviving copy still matches
//! its own prior record.

use crate::compare::Comparator;
use crate::conflict::{ConflictResolver, Resolution};
use crate::error::SyncError;
use crate::listing::Listing;
use crate::types::Side;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Classification output for one side
#[derive(Debug, Default, Clone)]
pub struct SideLists {
	/// Paths that appeared on this side with no prior record
	pub new: Vec<String>,

	/// Paths to delete on this side
	pub del: Vec<String>,

	/// Conflict losers to rename with a tag on this side
	pub tag: Vec<String>,

	/// Paths to copy into the backup area before overwrite
	pub backup: Vec<String>,

	/// Server-side renames (from, to) scheduled on this side
	pub moves: Vec<(String, String)>,
}

/// All classification queues for one run
#[derive(Debug, Default, Clone)]
pub struct Queues {
	pub a: SideLists,
	pub b: SideLists,

	/// Cross-side copy lists
	pub trans_a2b: Vec<String>,
	pub trans_b2a: Vec<String>,
}

impl Queues {
	pub fn side(&self, side: Side) -> &SideLists {
		match side {
			Side::A => &self.a,
			Side::B => &self.b,
		}
	}

	pub fn side_mut(&mut self, side: Side) -> &mut SideLists {
		match side {
			Side::A => &mut self.a,
			Side::B => &mut self.b,
		}
	}

	/// Transfers originating on `side`
	pub fn trans_from(&self, side: Side) -> &Vec<String> {
		match side {
			Side::A => &self.trans_a2b,
			Side::B => &self.trans_b2a,
		}
	}

	pub fn trans_from_mut(&mut self, side: Side) -> &mut Vec<String> {
		match side {
			Side::A => &mut self.trans_a2b,
			Side::B => &mut self.trans_b2a,
		}
	}

	/// Rename tracking on `side` mutates that side's new list together with
	/// the other side's delete and move lists
	pub fn rename_views(&mut self, side: Side) -> (&mut SideLists, &mut SideLists) {
		match side {
			Side::A => (&mut self.a, &mut self.b),
			Side::B => (&mut self.b, &mut self.a),
		}
	}

	/// Debug dump of every queue
	pub fn echo(&self, descr: &str) {
		debug!("Queues {}", descr);
		for side in Side::BOTH {
			let lists = self.side(side);
			debug!("   new{} {:?}", side, lists.new);
			debug!("   del{} {:?}", side, lists.del);
			debug!("   tag{} {:?}", side, lists.tag);
			debug!("   backup{} {:?}", side, lists.backup);
			debug!("   moves{} {:?}", side, lists.moves);
		}
		debug!("   transA2B {:?}", self.trans_a2b);
		debug!("   transB2A {:?}", self.trans_b2a);
	}
}

/// Remove paths whose current records agree on both sides, from the current
/// and prior listings alike. What remains is the interesting set.
pub fn prune_common(
	cmp: &Comparator,
	curr_a: &mut Listing,
	curr_b: &mut Listing,
	prev_a: &mut Listing,
	prev_b: &mut Listing,
) -> Result<(), SyncError> {
	let common: Vec<String> = curr_a
		.paths()
		.filter(|p| curr_b.contains(p))
		.map(|p| p.to_string())
		.collect();

	let mut matched = 0usize;
	for path in &common {
		let same = {
			let file_a = curr_a.get(path);
			let file_b = curr_b.get(path);
			cmp.same_opt(file_a, file_b)?
		};
		if !same {
			continue;
		}
		curr_a.remove(path);
		curr_b.remove(path);
		prev_a.remove(path);
		prev_b.remove(path);
		matched += 1;
	}
	debug!("Found {} common paths with {} matching files", common.len(), matched);
	Ok(())
}

/// Classify every remaining path and fill the queues
pub fn classify(
	cmp: &Comparator,
	resolver: &ConflictResolver,
	tag_conflict: bool,
	curr_a: &Listing,
	curr_b: &Listing,
	prev_a: &Listing,
	prev_b: &Listing,
) -> Result<Queues, SyncError> {
	let mut q = Queues::default();

	let all_paths: BTreeSet<&str> = curr_a.paths().chain(curr_b.paths()).collect();

	for path in all_paths {
		let file_a = curr_a.get(path);
		let file_b = curr_b.get(path);
		let file_ap = prev_a.get(path);
		let file_bp = prev_b.get(path);

		if file_a.is_none() {
			// file_b must exist
			if file_bp.is_none() {
				debug!("File '{}' is new on B", path);
				q.b.new.push(path.to_string());
			} else if cmp.same_opt(file_b, file_bp)? {
				debug!("File '{}' deleted on A", path);
				q.b.del.push(path.to_string());
			} else {
				info!(
					"DELETE CONFLICT: File '{}' deleted on A but modified on B. Transfering",
					path
				);
				q.trans_b2a.push(path.to_string());
			}
			continue;
		}

		if file_b.is_none() {
			if file_ap.is_none() {
				debug!("File '{}' is new on A", path);
				q.a.new.push(path.to_string());
			} else if cmp.same_opt(file_a, file_ap)? {
				debug!("File '{}' deleted on B", path);
				q.a.del.push(path.to_string());
			} else {
				info!(
					"DELETE CONFLICT: File '{}' deleted on B but modified on A. Transfering",
					path
				);
				q.trans_a2b.push(path.to_string());
			}
			continue;
		}

		// Present on both sides and known not to agree since common paths
		// were pruned. Decide whether only one side changed.
		let comp_a = cmp.same_opt(file_a, file_ap)?;
		let comp_b = cmp.same_opt(file_b, file_bp)?;

		if comp_a && comp_b {
			// Should not happen; treat as a conflict below
			debug!("'{}': Both A and B compare to prev but do not agree. This is ODD.", path);
		} else if !comp_a && !comp_b {
			debug!("'{}': Neither compare. Both modified or both new", path);
		} else if comp_a {
			debug!("'{}': Modified on B only", path);
			q.trans_b2a.push(path.to_string());
			q.a.backup.push(path.to_string());
			continue;
		} else {
			debug!("'{}': Modified on A only", path);
			q.trans_a2b.push(path.to_string());
			q.b.backup.push(path.to_string());
			continue;
		}

		// Both sides changed (or the prior state is silent). Apply policy.
		let file_a = file_a.expect("present");
		let file_b = file_b.expect("present");
		match resolver.resolve(path, file_a, file_b) {
			Resolution::KeepA => {
				q.trans_a2b.push(path.to_string());
				if tag_conflict {
					q.b.tag.push(path.to_string());
				} else {
					q.b.backup.push(path.to_string());
				}
			}
			Resolution::KeepB => {
				q.trans_b2a.push(path.to_string());
				if tag_conflict {
					q.a.tag.push(path.to_string());
				} else {
					q.a.backup.push(path.to_string());
				}
			}
			Resolution::TagBoth => {
				q.a.tag.push(path.to_string());
				q.b.tag.push(path.to_string());
			}
		}
	}

	Ok(q)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::strategies::{CompareMode, ConflictMode, HashFallback};
	use crate::types::FileRecord;

	fn cmp() -> Comparator {
		Comparator::with_mode(CompareMode::Mtime, HashFallback::None, 1.1)
	}

	fn resolver(mode: ConflictMode) -> ConflictResolver {
		let mut cfg = crate::config::Settings::default();
		cfg.conflict_mode = mode;
		ConflictResolver::new(&cfg)
	}

	fn rec(path: &str, size: u64, mtime: f64) -> FileRecord {
		FileRecord::new(path, size).with_mtime(mtime)
	}

	#[test]
	fn test_prune_common_removes_matching_paths_everywhere() {
		let mut curr_a = Listing::from_records(vec![rec("same", 1, 10.0), rec("only_a", 2, 10.0)]);
		let mut curr_b = Listing::from_records(vec![rec("same", 1, 10.0), rec("only_b", 3, 10.0)]);
		let mut prev_a = Listing::from_records(vec![rec("same", 1, 10.0)]);
		let mut prev_b = Listing::from_records(vec![rec("same", 1, 10.0)]);

		prune_common(&cmp(), &mut curr_a, &mut curr_b, &mut prev_a, &mut prev_b).unwrap();

		assert!(!curr_a.contains("same"));
		assert!(!curr_b.contains("same"));
		assert!(!prev_a.contains("same"));
		assert!(!prev_b.contains("same"));
		assert!(curr_a.contains("only_a"));
		assert!(curr_b.contains("only_b"));
	}

	#[test]
	fn test_prune_common_keeps_differing_paths() {
		let mut curr_a = Listing::from_records(vec![rec("f", 1, 10.0)]);
		let mut curr_b = Listing::from_records(vec![rec("f", 2, 10.0)]);
		let mut prev_a = Listing::new();
		let mut prev_b = Listing::new();

		prune_common(&cmp(), &mut curr_a, &mut curr_b, &mut prev_a, &mut prev_b).unwrap();
		assert!(curr_a.contains("f"));
		assert!(curr_b.contains("f"));
	}

	#[test]
	fn test_first_run_classifies_one_sided_paths_as_new() {
		let curr_a = Listing::from_records(vec![rec("x", 1, 10.0)]);
		let curr_b = Listing::from_records(vec![rec("y", 2, 10.0)]);
		let empty = Listing::new();

		let q = classify(
			&cmp(),
			&resolver(ConflictMode::Newer),
			false,
			&curr_a,
			&curr_b,
			&empty,
			&empty,
		)
		.unwrap();

		assert_eq!(q.a.new, vec!["x"]);
		assert_eq!(q.b.new, vec!["y"]);
		assert!(q.a.del.is_empty());
		assert!(q.b.del.is_empty());
	}

	#[test]
	fn test_deletion_detected_via_prior_state() {
		// "gone" exists on B, unchanged from prior; A no longer has it
		let curr_a = Listing::new();
		let curr_b = Listing::from_records(vec![rec("gone", 5, 50.0)]);
		let prev_a = Listing::from_records(vec![rec("gone", 5, 50.0)]);
		let prev_b = Listing::from_records(vec![rec("gone", 5, 50.0)]);

		let q = classify(
			&cmp(),
			&resolver(ConflictMode::Newer),
			false,
			&curr_a,
			&curr_b,
			&prev_a,
			&prev_b,
		)
		.unwrap();

		assert_eq!(q.b.del, vec!["gone"]);
		assert!(q.trans_b2a.is_empty());
	}

	#[test]
	fn test_delete_conflict_reverts_deletion() {
		// Deleted on A but modified on B since the prior state
		let curr_a = Listing::new();
		let curr_b = Listing::from_records(vec![rec("k", 9, 99.0)]);
		let prev_a = Listing::from_records(vec![rec("k", 5, 50.0)]);
		let prev_b = Listing::from_records(vec![rec("k", 5, 50.0)]);

		let q = classify(
			&cmp(),
			&resolver(ConflictMode::Newer),
			false,
			&curr_a,
			&curr_b,
			&prev_a,
			&prev_b,
		)
		.unwrap();

		assert!(q.b.del.is_empty());
		assert_eq!(q.trans_b2a, vec!["k"]);
	}

	#[test]
	fn test_one_side_modified() {
		let curr_a = Listing::from_records(vec![rec("f", 5, 50.0)]);
		let curr_b = Listing::from_records(vec![rec("f", 9, 99.0)]);
		let prev_a = Listing::from_records(vec![rec("f", 5, 50.0)]);
		let prev_b = Listing::from_records(vec![rec("f", 5, 50.0)]);

		let q = classify(
			&cmp(),
			&resolver(ConflictMode::Newer),
			false,
			&curr_a,
			&curr_b,
			&prev_a,
			&prev_b,
		)
		.unwrap();

		// B modified, so B wins and A's copy gets backed up
		assert_eq!(q.trans_b2a, vec!["f"]);
		assert_eq!(q.a.backup, vec!["f"]);
		assert!(q.trans_a2b.is_empty());
	}

	#[test]
	fn test_both_modified_newer_wins() {
		let curr_a = Listing::from_records(vec![rec("f", 5, 100.0)]);
		let curr_b = Listing::from_records(vec![rec("f", 9, 200.0)]);
		let prev_a = Listing::from_records(vec![rec("f", 1, 10.0)]);
		let prev_b = Listing::from_records(vec![rec("f", 1, 10.0)]);

		let q = classify(
			&cmp(),
			&resolver(ConflictMode::Newer),
			false,
			&curr_a,
			&curr_b,
			&prev_a,
			&prev_b,
		)
		.unwrap();

		assert_eq!(q.trans_b2a, vec!["f"]);
		assert_eq!(q.a.backup, vec!["f"]);
	}

	#[test]
	fn test_both_modified_tag_conflict_tags_loser() {
		let curr_a = Listing::from_records(vec![rec("f", 5, 100.0)]);
		let curr_b = Listing::from_records(vec![rec("f", 9, 200.0)]);
		let prev_a = Listing::from_records(vec![rec("f", 1, 10.0)]);
		let prev_b = Listing::from_records(vec![rec("f", 1, 10.0)]);

		let q = classify(
			&cmp(),
			&resolver(ConflictMode::Newer),
			true,
			&curr_a,
			&curr_b,
			&prev_a,
			&prev_b,
		)
		.unwrap();

		assert_eq!(q.trans_b2a, vec!["f"]);
		assert_eq!(q.a.tag, vec!["f"]);
		assert!(q.a.backup.is_empty());
	}

	#[test]
	fn test_both_new_without_prior_is_conflict() {
		let curr_a = Listing::from_records(vec![rec("f", 5, 100.0)]);
		let curr_b = Listing::from_records(vec![rec("f", 9, 200.0)]);
		let empty = Listing::new();

		let q = classify(
			&cmp(),
			&resolver(ConflictMode::Tag),
			false,
			&curr_a,
			&curr_b,
			&empty,
			&empty,
		)
		.unwrap();

		assert_eq!(q.a.tag, vec!["f"]);
		assert_eq!(q.b.tag, vec!["f"]);
		assert!(q.a.new.is_empty());
		assert!(q.b.new.is_empty());
	}
}

// vim: ts=4
