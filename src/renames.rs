//! Rename tracking
//!
//! Promotes matched (new, deleted) pairs into server-side moves. A file that
//! is queued for deletion was by construction present and unmodified at the
//! last sync, so renaming it into place is safe. A match must be unique;
//! anything ambiguous stays a delete plus a transfer.

use crate::config::Settings;
use crate::listing::Listing;
use crate::reconcile::Queues;
use crate::strategies::RenameMode;
use crate::types::{FileRecord, Side};
use tracing::{debug, info};

/// Rewrite `q` in place, moving provable renames on `side` from the
/// new/delete queues into the other side's move list.
pub fn track_moves(cfg: &Settings, side: Side, curr: &Listing, prev: &Listing, q: &mut Queues) {
	let mode = cfg.renames(side);
	if !mode.enabled() {
		return;
	}

	let (lists, other) = q.rename_views(side);

	// A move is only recognized when the path was classified new here, a
	// unique prior file matches it, and that prior path is queued for
	// deletion on the other side.
	let new_paths: Vec<String> = lists.new.clone();
	for path in new_paths {
		debug!("Looking for moves on {}: '{}'", side, path);
		let currfile = match curr.get(&path) {
			Some(f) => f,
			None => continue,
		};

		let candidates: Vec<&FileRecord> = prev
			.by_size(currfile.size)
			.filter(|prevfile| match mode {
				RenameMode::Size => true,
				RenameMode::Mtime => match (prevfile.mtime, currfile.mtime) {
					(Some(pm), Some(cm)) => (pm - cm).abs() <= cfg.dt,
					_ => false,
				},
				RenameMode::Hash => prevfile.shares_hash(currfile),
				RenameMode::None => false,
			})
			.collect();

		if candidates.is_empty() {
			debug!("No matches for '{}' on {}", path, side);
			continue;
		}

		if candidates.len() > 1 {
			info!("Too many possible previous files for '{}' on {}", path, side);
			for c in &candidates {
				info!("   '{}'", c.path);
			}
			continue;
		}

		let prevpath = candidates[0].path.clone();
		if !other.del.contains(&prevpath) {
			debug!("File '{}' moved from '{}' on {} but modified", path, prevpath, side);
			continue;
		}

		lists.new.retain(|p| p != &path);
		other.del.retain(|p| p != &prevpath);
		debug!("Move found: on {}: '{}' --> '{}'", side.other(), prevpath, path);
		other.moves.push((prevpath, path));
	}
}


// vim: ts=4
