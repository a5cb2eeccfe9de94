//! Action planning
//!
//! Turns the classification queues into the final per-side action lists.
//! The execution order is a hard contract: deletes, then backups, then
//! moves, then cross-side transfers. Deletes first keep the backup area
//! clean, backups must precede any overwrite, and tag renames must land
//! before the transfers that pick the renamed files up by name.

use crate::config::Settings;
use crate::reconcile::Queues;
use crate::types::Side;
use crate::util::tag_path;
use tracing::{debug, info};

/// Final, ordered action lists for one run
#[derive(Debug, Default, Clone)]
pub struct SyncPlan {
	pub del_a: Vec<String>,
	pub del_b: Vec<String>,

	pub backup_a: Vec<String>,
	pub backup_b: Vec<String>,

	pub moves_a: Vec<(String, String)>,
	pub moves_b: Vec<(String, String)>,

	pub trans_a2b: Vec<String>,
	pub trans_b2a: Vec<String>,
}

impl SyncPlan {
	pub fn del(&self, side: Side) -> &[String] {
		match side {
			Side::A => &self.del_a,
			Side::B => &self.del_b,
		}
	}

	pub fn backup(&self, side: Side) -> &[String] {
		match side {
			Side::A => &self.backup_a,
			Side::B => &self.backup_b,
		}
	}

	pub fn moves(&self, side: Side) -> &[(String, String)] {
		match side {
			Side::A => &self.moves_a,
			Side::B => &self.moves_b,
		}
	}

	pub fn trans_from(&self, side: Side) -> &[String] {
		match side {
			Side::A => &self.trans_a2b,
			Side::B => &self.trans_b2a,
		}
	}

	/// Whether any action at all touches `side`
	pub fn changes(&self, side: Side) -> bool {
		!self.del(side).is_empty()
			|| !self.backup(side).is_empty()
			|| !self.moves(side).is_empty()
			|| !self.trans_from(side.other()).is_empty()
	}

	pub fn is_empty(&self) -> bool {
		!self.changes(Side::A) && !self.changes(Side::B)
	}

	/// Print every planned action without performing anything
	pub fn print_dry_run(&self) {
		info!("(DRY RUN)");
		for side in Side::BOTH {
			for path in self.del(side) {
				info!("(DRY RUN) on {}: delete '{}'", side, path);
			}
			for path in self.backup(side) {
				info!("(DRY RUN) on {}: backup '{}'", side, path);
			}
			for (src, dst) in self.moves(side) {
				info!("(DRY RUN) on {}: move '{}' --> '{}'", side, src, dst);
			}
		}
		for path in &self.trans_a2b {
			info!("(DRY RUN) Transfer A >>> B: '{}'", path);
		}
		for path in &self.trans_b2a {
			info!("(DRY RUN) Transfer B >>> A: '{}'", path);
		}
	}
}

pub struct Planner<'a> {
	cfg: &'a Settings,
	ts_compact: &'a str,
}

impl<'a> Planner<'a> {
	pub fn new(cfg: &'a Settings, ts_compact: &'a str) -> Self {
		Planner { cfg, ts_compact }
	}

	/// Consume the queues and produce the ordered plan.
	///
	/// Tagged conflict losers become a scheduled rename plus a transfer of
	/// the renamed file; new files are appended to the outgoing transfer
	/// list of their side.
	pub fn build(&self, mut q: Queues) -> SyncPlan {
		for side in Side::BOTH {
			let tags: Vec<String> = std::mem::take(&mut q.side_mut(side).tag);
			for path in tags {
				let dest = tag_path(&path, self.ts_compact, side);
				debug!("Tag on {}: '{}' --> '{}'", side, path, dest);
				q.side_mut(side).moves.push((path, dest.clone()));
				// Renames land before transfers, so the tagged name is real
				// by the time the transfer runs
				q.trans_from_mut(side).push(dest);
			}

			let new: Vec<String> = std::mem::take(&mut q.side_mut(side).new);
			q.trans_from_mut(side).extend(new);
		}

		if !self.cfg.backup {
			q.a.backup.clear();
			q.b.backup.clear();
		}

		SyncPlan {
			del_a: q.a.del,
			del_b: q.b.del,
			backup_a: q.a.backup,
			backup_b: q.b.backup,
			moves_a: q.a.moves,
			moves_b: q.b.moves,
			trans_a2b: q.trans_a2b,
			trans_b2a: q.trans_b2a,
		}
	}
}


// vim: ts=4
