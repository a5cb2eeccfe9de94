//! Plan execution
//!
//! Drives the transport in the mandated order: per side deletes, then
//! backups, then moves, and finally the cross-side transfers. Per-file
//! operations within one side fan out over a worker pool of
//! `action_threads`; the two sides run one after the other.

use crate::config::{Settings, INTERNAL_DIR};
use crate::error::SyncError;
use crate::listing::Listing;
use crate::plan::SyncPlan;
use crate::transport::Transport;
use crate::types::Side;
use crate::util::pathjoin;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub struct Executor<'a> {
	rc: &'a Transport,
	cfg: &'a Settings,
}

impl<'a> Executor<'a> {
	pub fn new(rc: &'a Transport, cfg: &'a Settings) -> Self {
		Executor { rc, cfg }
	}

	/// Run the whole plan. Partial completion leaves the remotes in a state
	/// the next run will simply observe and finish, since the snapshot is
	/// only persisted after success.
	pub async fn execute(&self, plan: &SyncPlan) -> Result<(), SyncError> {
		for side in Side::BOTH {
			self.delete(side, plan.del(side)).await?;
			self.backup(side, plan.backup(side)).await?;
			self.moves(side, plan.moves(side)).await?;
		}

		self.rc.transfer(Side::A, &plan.trans_a2b).await?;
		self.rc.transfer(Side::B, &plan.trans_b2a).await?;

		if self.cfg.backup && self.cfg.sync_backups {
			self.mirror_backups(plan).await?;
		}

		Ok(())
	}

	/// Delete files on one side, sweeping them into the backup area first
	/// when backups are on. With server-side move and an internal workdir
	/// the sweep is a rename per top-level directory; otherwise it degrades
	/// to copy-then-delete.
	async fn delete(&self, side: Side, files: &[String]) -> Result<(), SyncError> {
		if files.is_empty() {
			return Ok(());
		}

		if !self.cfg.backup {
			for path in files {
				info!("delete {}: '{}'", side, path);
			}
			return self.rc.delete_batch(side, files).await;
		}

		let backup_root = self.rc.backup_root(side);
		for path in files {
			info!("delete (w/ backup) {}: '{}'", side, path);
		}

		let features = self.rc.features(side).await?;
		if features.move_files && self.cfg.workdir_is_internal(side) {
			let remote = self.cfg.remote(side);
			let (root_files, groups) = group_by_top_dir(files);

			let mut jobs: Vec<BoxFuture<'_, Result<(), SyncError>>> = Vec::new();
			for (dir, names) in groups {
				let src = pathjoin(remote, &dir);
				let dst = pathjoin(&backup_root, &dir);
				jobs.push(Box::pin(async move {
					self.rc.move_batch(side, &src, &dst, &names).await
				}));
			}
			for name in root_files {
				let src = pathjoin(remote, &name);
				let dst = pathjoin(&backup_root, &name);
				jobs.push(Box::pin(async move {
					self.rc.moveto(&src, &dst, Some(side), Some(4)).await?;
					Ok(())
				}));
			}
			self.run_pool(jobs).await?;
		} else {
			debug!("{}: no server-side move into backup area; copying then deleting", side);
			self.rc
				.copy_batch(self.cfg.remote(side), &backup_root, files, Some(side), Some(4))
				.await?;
			self.rc.delete_batch(side, files).await?;
		}

		info!("Backups for {} stored in '{}'", side, backup_root);
		Ok(())
	}

	/// Copy soon-to-be-overwritten files into the backup area
	async fn backup(&self, side: Side, files: &[String]) -> Result<(), SyncError> {
		if files.is_empty() {
			return Ok(());
		}
		let backup_root = self.rc.backup_root(side);
		for path in files {
			info!("backup {}: '{}'", side, path);
		}
		self.rc
			.copy_batch(self.cfg.remote(side), &backup_root, files, Some(side), Some(4))
			.await?;
		info!("Backups for {} stored in '{}'", side, backup_root);
		Ok(())
	}

	/// Renames inside the synced root, fanned out over the worker pool.
	/// Their source and destination sets are disjoint by construction, so
	/// ordering between them does not matter.
	async fn moves(&self, side: Side, pairs: &[(String, String)]) -> Result<(), SyncError> {
		if pairs.is_empty() {
			return Ok(());
		}

		let use_move = self.rc.features(side).await?.move_files;
		let remote = self.cfg.remote(side);

		let mut jobs: Vec<BoxFuture<'_, Result<(), SyncError>>> = Vec::new();
		for (from, to) in pairs {
			let src = pathjoin(remote, from);
			let dst = pathjoin(remote, to);
			info!("move {}: '{}' --> '{}'", side, from, to);
			jobs.push(Box::pin(async move {
				if use_move {
					self.rc.moveto(&src, &dst, Some(side), Some(4)).await?;
				} else {
					self.rc.copyto(&src, &dst, Some(side), Some(4)).await?;
					self.rc.delete_file(&src, Some(side), false).await?;
				}
				Ok(())
			}));
		}
		self.run_pool(jobs).await
	}

	/// Copy each side's backup area for this run onto the other side so
	/// the archives mirror
	async fn mirror_backups(&self, plan: &SyncPlan) -> Result<(), SyncError> {
		for side in Side::BOTH {
			let mut files: Vec<String> = Vec::new();
			files.extend_from_slice(plan.del(side));
			files.extend_from_slice(plan.backup(side));
			if files.is_empty() {
				continue;
			}
			let src = self.rc.backup_root(side);
			let dst =
				pathjoin(&self.cfg.workdir(side.other()), &self.rc.backup_dir_name(side));
			info!("Mirroring {} backups to {}", side, side.other());
			self.rc.copy_batch(&src, &dst, &files, None, Some(4)).await?;
		}
		Ok(())
	}

	async fn run_pool(
		&self,
		jobs: Vec<BoxFuture<'_, Result<(), SyncError>>>,
	) -> Result<(), SyncError> {
		stream::iter(jobs)
			.buffer_unordered(self.cfg.action_threads.max(1))
			.try_collect::<Vec<()>>()
			.await?;
		Ok(())
	}
}

/// Split root-relative paths into top-level files and per-directory groups.
/// Group members are relative to their directory so they can feed a bulk
/// move of that subtree.
pub fn group_by_top_dir(files: &[String]) -> (Vec<String>, BTreeMap<String, Vec<String>>) {
	let mut root_files = Vec::new();
	let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
	for path in files {
		match path.split_once('/') {
			Some((dir, rest)) => groups.entry(dir.to_string()).or_default().push(rest.to_string()),
			None => root_files.push(path.clone()),
		}
	}
	(root_files, groups)
}

/// Build the post-run listings from the pre-action snapshots and the plan,
/// instead of relisting. Deletes drop records, moves re-key them, and each
/// transfer copies the source record over the destination. Internal
/// namespace paths never enter a listing.
pub fn synthesize_post_state(
	curr_a0: &Listing,
	curr_b0: &Listing,
	plan: &SyncPlan,
) -> (Listing, Listing) {
	let mut state_a = curr_a0.clone();
	let mut state_b = curr_b0.clone();

	for (state, side) in [(&mut state_a, Side::A), (&mut state_b, Side::B)] {
		for path in plan.del(side) {
			state.remove(path);
		}
		for (from, to) in plan.moves(side) {
			state.rename(from, to);
		}
	}

	let internal_prefix = format!("{}/", INTERNAL_DIR);
	for path in &plan.trans_a2b {
		if path.starts_with(&internal_prefix) {
			continue;
		}
		if let Some(rec) = state_a.get(path) {
			state_b.insert(rec.clone());
		}
	}
	for path in &plan.trans_b2a {
		if path.starts_with(&internal_prefix) {
			continue;
		}
		if let Some(rec) = state_b.get(path) {
			state_a.insert(rec.clone());
		}
	}

	(state_a, state_b)
}


// vim: ts=4
