//! Run orchestration
//!
//! One `SyncRun` drives a full pass: parallel listings against the prior
//! snapshots, lock handling, reconciliation, planning, execution and the
//! final state push. The snapshot is only persisted after everything else
//! succeeded, so an interrupted run simply redoes its work next time.

use crate::cleanup;
use crate::compare::Comparator;
use crate::config::Settings;
use crate::conflict::ConflictResolver;
use crate::error::SyncError;
use crate::executor::{synthesize_post_state, Executor};
use crate::listing::Listing;
use crate::lock::{BreakTarget, LockService};
use crate::plan::{Planner, SyncPlan};
use crate::reconcile;
use crate::renames;
use crate::snapshot::SnapshotStore;
use crate::transport::Transport;
use crate::types::Side;
use crate::util::file_summary;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub struct SyncRun {
	cfg: Arc<Settings>,
	rc: Transport,
	now: String,
	now_compact: String,
}

impl SyncRun {
	pub fn new(cfg: Settings) -> Result<Self, SyncError> {
		let now = chrono::Local::now().format("%Y-%m-%dT%H%M%S").to_string();
		let now_compact = now.replace('-', "");
		let cfg = Arc::new(cfg);
		let rc = Transport::new(cfg.clone(), &now)?;
		Ok(SyncRun { cfg, rc, now, now_compact })
	}

	/// Clear lock sentinels without running a sync
	pub async fn break_locks(&self, target: BreakTarget) -> Result<(), SyncError> {
		LockService::new(&self.rc, &self.cfg, &self.now).break_locks(target).await
	}

	/// One full synchronization pass
	pub async fn run(&self) -> Result<(), SyncError> {
		let started = Instant::now();
		self.rc.version_banner().await;

		let lock = LockService::new(&self.rc, &self.cfg, &self.now);
		lock.check().await?;
		if !self.cfg.dry_run {
			lock.acquire().await?;
		}

		let snapshots = SnapshotStore::new(&self.rc, &self.cfg);

		info!("Refreshing file list on A '{}'", self.cfg.remote(Side::A));
		info!("Refreshing file list on B '{}'", self.cfg.remote(Side::B));
		let (res_a, res_b) = tokio::join!(
			self.load_side(&snapshots, Side::A),
			self.load_side(&snapshots, Side::B)
		);
		let (mut curr_a, mut prev_a) = res_a?;
		let (mut curr_b, mut prev_b) = res_b?;
		info!("A: {}", file_summary(curr_a.iter()));
		info!("B: {}", file_summary(curr_b.iter()));

		// The unpruned listings seed the next state and the emptied
		// directory accounting
		let curr_a0 = curr_a.clone();
		let curr_b0 = curr_b.clone();

		let cmp = Comparator::new(&self.cfg);
		reconcile::prune_common(&cmp, &mut curr_a, &mut curr_b, &mut prev_a, &mut prev_b)?;

		let resolver = ConflictResolver::new(&self.cfg);
		let mut q = reconcile::classify(
			&cmp,
			&resolver,
			self.cfg.tag_conflict,
			&curr_a,
			&curr_b,
			&prev_a,
			&prev_b,
		)?;
		q.echo("Initial");

		renames::track_moves(&self.cfg, Side::A, &curr_a, &prev_a, &mut q);
		renames::track_moves(&self.cfg, Side::B, &curr_b, &prev_b, &mut q);
		q.echo("After tracking moves");

		let plan = Planner::new(&self.cfg, &self.now_compact).build(q);

		let sum_a = file_summary(plan.trans_a2b.iter().filter_map(|p| curr_a.get(p)));
		let sum_b = file_summary(plan.trans_b2a.iter().filter_map(|p| curr_b.get(p)));

		if self.cfg.dry_run {
			plan.print_dry_run();
			info!("(DRY RUN) A >>> B {}", sum_a);
			info!("(DRY RUN) B >>> A {}", sum_b);
			return Ok(());
		}

		if self.cfg.interactive {
			plan.print_dry_run();
			info!("A >>> B {}", sum_a);
			info!("B >>> A {}", sum_b);
			if !prompt_proceed()? {
				info!("Aborted at prompt. No changes made.");
				lock.release().await?;
				return Ok(());
			}
		}

		info!("A >>> B {}", sum_a);
		info!("B >>> A {}", sum_b);
		Executor::new(&self.rc, &self.cfg).execute(&plan).await?;

		let (post_a, post_b) = if self.cfg.avoid_relist {
			info!("Synthesizing post-run state from the plan");
			synthesize_post_state(&curr_a0, &curr_b0, &plan)
		} else {
			let (post_a, post_b) = tokio::join!(
				self.relist_if_changed(Side::A, &plan, &curr_a0),
				self.relist_if_changed(Side::B, &plan, &curr_b0)
			);
			(post_a?, post_b?)
		};

		snapshots.save(Side::A, &post_a).await?;
		snapshots.save(Side::B, &post_b).await?;

		cleanup::reap(&self.rc, &self.cfg, Side::A, &curr_a0, &post_a).await?;
		cleanup::reap(&self.rc, &self.cfg, Side::B, &curr_b0, &post_b).await?;

		lock.release().await?;

		info!(
			"Sync complete in {:.1}s ({:.1}s in transport calls)",
			started.elapsed().as_secs_f64(),
			self.rc.elapsed_in_calls().as_secs_f64()
		);
		Ok(())
	}

	async fn load_side(
		&self,
		snapshots: &SnapshotStore<'_>,
		side: Side,
	) -> Result<(Listing, Listing), SyncError> {
		let prev = snapshots.load(side).await?;
		let curr = self.rc.list(side, &prev).await?;
		Ok((curr, prev))
	}

	/// Fresh listing when this run touched the side, otherwise the pre-run
	/// listing already is the next state. The pre-run listing doubles as the
	/// hash reuse source either way.
	async fn relist_if_changed(
		&self,
		side: Side,
		plan: &SyncPlan,
		curr0: &Listing,
	) -> Result<Listing, SyncError> {
		if plan.changes(side) {
			info!("Refreshing file list on {}", side);
			let listing = self.rc.list(side, curr0).await?;
			info!("{}: {}", side, file_summary(listing.iter()));
			Ok(listing)
		} else {
			info!("No need to refresh file list on {}. Updating current state", side);
			Ok(curr0.clone())
		}
	}
}

fn prompt_proceed() -> Result<bool, SyncError> {
	print!("Proceed with sync? [y/N] ");
	std::io::stdout().flush()?;
	let mut answer = String::new();
	std::io::stdin().read_line(&mut answer)?;
	let answer = answer.trim().to_lowercase();
	Ok(answer == "y" || answer == "yes")
}

// vim: ts=4
