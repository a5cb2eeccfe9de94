//! Advisory cross-run locking via sentinel files on each side
//!
//! A sentinel at `{workdir}/LOCK/LOCK_{name}` marks a run in progress.
//! Locks are only advisory between runs of this tool; when `set_lock` is
//! disabled the whole service is a no-op and concurrent runs are the
//! operator's problem.

use crate::config::Settings;
use crate::error::SyncError;
use crate::transport::Transport;
use crate::types::Side;
use crate::util::pathjoin;
use tracing::{debug, info};

pub struct LockService<'a> {
	rc: &'a Transport,
	cfg: &'a Settings,
	run_ts: &'a str,
}

/// Which side's locks an explicit break applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakTarget {
	A,
	B,
	Both,
}

impl std::str::FromStr for BreakTarget {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"A" | "a" => Ok(BreakTarget::A),
			"B" | "b" => Ok(BreakTarget::B),
			"both" => Ok(BreakTarget::Both),
			_ => Err(format!("Unknown break target: {}. Valid options: A, B, both", s)),
		}
	}
}

impl BreakTarget {
	fn sides(self) -> &'static [Side] {
		match self {
			BreakTarget::A => &[Side::A],
			BreakTarget::B => &[Side::B],
			BreakTarget::Both => &[Side::A, Side::B],
		}
	}
}

impl<'a> LockService<'a> {
	pub fn new(rc: &'a Transport, cfg: &'a Settings, run_ts: &'a str) -> Self {
		LockService { rc, cfg, run_ts }
	}

	fn lock_dir(&self, side: Side) -> String {
		pathjoin(&self.cfg.workdir(side), "LOCK")
	}

	fn lock_path(&self, side: Side) -> String {
		pathjoin(&self.lock_dir(side), &format!("LOCK_{}", self.cfg.name))
	}

	/// Abort with the offending sentinels when any side is locked
	pub async fn check(&self) -> Result<(), SyncError> {
		if !self.cfg.set_lock {
			return Ok(());
		}
		let mut sentinels = Vec::new();
		for side in Side::BOTH {
			for name in self.rc.list_names(&self.lock_dir(side)).await? {
				sentinels.push(format!("{}:{}", side, name));
			}
		}
		if sentinels.is_empty() {
			Ok(())
		} else {
			Err(SyncError::RemoteLocked { sentinels })
		}
	}

	/// Place our sentinel on both sides. Idempotent.
	pub async fn acquire(&self) -> Result<(), SyncError> {
		if !self.cfg.set_lock {
			return Ok(());
		}
		let local = self.rc.staging_dir().join(format!("LOCK_{}", self.cfg.name));
		std::fs::write(&local, self.run_ts)?;
		let local = local.display().to_string();
		for side in Side::BOTH {
			info!("Setting lock on {}", side);
			self.rc
				.copyto(&local, &self.lock_path(side), Some(side), Some(1))
				.await?;
		}
		Ok(())
	}

	/// Remove our own sentinel from both sides. A missing sentinel is fine.
	pub async fn release(&self) -> Result<(), SyncError> {
		if !self.cfg.set_lock {
			return Ok(());
		}
		for side in Side::BOTH {
			debug!("Releasing lock on {}", side);
			self.rc.delete_file(&self.lock_path(side), Some(side), true).await?;
		}
		Ok(())
	}

	/// Unconditionally clear every sentinel on the chosen side(s)
	pub async fn break_locks(&self, target: BreakTarget) -> Result<(), SyncError> {
		if self.cfg.dry_run {
			info!("DRY RUN lock break");
			return Ok(());
		}
		for side in target.sides() {
			info!("Breaking locks on {}. May be a no-op if {} is not locked", side, side);
			self.rc.delete_dir_files(&self.lock_dir(*side), true).await?;
		}
		Ok(())
	}
}


// vim: ts=4
