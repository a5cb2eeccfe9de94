//! Removal of directories emptied by a run
//!
//! Compares the directory set implied by the pre-run listing with the
//! post-run one and asks the transport to prune whatever trees disappeared.
//! Only directories this run emptied are touched; the transport's recursive
//! rmdir refuses anything still holding files.

use crate::config::Settings;
use crate::error::SyncError;
use crate::listing::Listing;
use crate::strategies::Cleanup;
use crate::transport::Transport;
use crate::types::Side;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Every ancestor directory of every path in the listing
fn dir_set(listing: &Listing) -> BTreeSet<String> {
	let mut dirs = BTreeSet::new();
	for path in listing.paths() {
		let mut idx = 0;
		while let Some(off) = path[idx..].find('/') {
			idx += off;
			dirs.insert(path[..idx].to_string());
			idx += 1;
		}
	}
	dirs
}

/// Directories present before the run but not after, reduced to their
/// topmost roots. The transport prunes each tree recursively.
pub fn removed_dirs(before: &Listing, after: &Listing) -> Vec<String> {
	let gone: Vec<String> =
		dir_set(before).difference(&dir_set(after)).cloned().collect();

	let mut roots: Vec<String> = Vec::new();
	for dir in gone {
		// `gone` is sorted, so a covering root precedes its children
		let covered =
			roots.last().map_or(false, |root| dir.starts_with(&format!("{}/", root)));
		if !covered {
			roots.push(dir);
		}
	}
	roots
}

/// Prune directories emptied on one side, when configured or when the
/// backend is one that keeps empty directories around
pub async fn reap(
	rc: &Transport,
	cfg: &Settings,
	side: Side,
	before: &Listing,
	after: &Listing,
) -> Result<(), SyncError> {
	let enabled = match cfg.cleanup_empty_dirs(side) {
		Cleanup::Always => true,
		Cleanup::Never => false,
		Cleanup::Auto => rc.features(side).await?.empty_dirs,
	};
	if !enabled {
		return Ok(());
	}

	let roots = removed_dirs(before, after);
	if roots.is_empty() {
		debug!("{}: no emptied directories", side);
		return Ok(());
	}

	for root in &roots {
		info!("Removing empty directory tree on {}: '{}'", side, root);
		rc.rmdirs(side, root).await?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::FileRecord;

	fn listing(paths: &[&str]) -> Listing {
		Listing::from_records(paths.iter().map(|p| FileRecord::new(*p, 1)))
	}

	#[test]
	fn test_dir_set_collects_all_ancestors() {
		let dirs = dir_set(&listing(&["a/b/c.txt", "a/d.txt", "top.txt"]));
		let expect: BTreeSet<String> =
			["a", "a/b"].iter().map(|s| s.to_string()).collect();
		assert_eq!(dirs, expect);
	}

	#[test]
	fn test_removed_dirs_diff() {
		let before = listing(&["keep/a.txt", "gone/b.txt", "gone/sub/c.txt"]);
		let after = listing(&["keep/a.txt"]);
		assert_eq!(removed_dirs(&before, &after), vec!["gone".to_string()]);
	}

	#[test]
	fn test_removed_dirs_keeps_partially_emptied_parent() {
		let before = listing(&["a/x.txt", "a/sub/y.txt"]);
		let after = listing(&["a/x.txt"]);
		assert_eq!(removed_dirs(&before, &after), vec!["a/sub".to_string()]);
	}

	#[test]
	fn test_removed_dirs_collapses_to_topmost_root() {
		let before = listing(&["a/b/c/d.txt"]);
		let after = listing(&[]);
		assert_eq!(removed_dirs(&before, &after), vec!["a".to_string()]);
	}

	#[test]
	fn test_no_removed_dirs_when_nothing_changed() {
		let before = listing(&["a/x.txt"]);
		assert!(removed_dirs(&before, &before).is_empty());
	}

	#[test]
	fn test_sibling_prefix_not_treated_as_parent() {
		// "ab" is not inside "a"
		let before = listing(&["a/x.txt", "ab/y.txt"]);
		let after = listing(&[]);
		assert_eq!(removed_dirs(&before, &after), vec!["a".to_string(), "ab".to_string()]);
	}
}

// vim: ts=4
