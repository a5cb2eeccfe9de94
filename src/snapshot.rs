//! Snapshot persistence
//!
//! The listing persisted at the end of the last successful run is the merge
//! base for the next one. Snapshots live on each side's workdir as
//! xz-compressed JSON; the older zlib-wrapped format with a `zipjson`
//! magic header stays readable.

use crate::config::Settings;
use crate::error::SyncError;
use crate::listing::Listing;
use crate::transport::Transport;
use crate::types::{FileRecord, Side};
use crate::util::pathjoin;
use std::io::{Read, Write};
use tracing::{debug, info};

const LEGACY_MAGIC: &[u8] = b"zipjson\x00\x00";
const XZ_MAGIC: &[u8] = b"\xfd7zXZ\x00";

pub struct SnapshotStore<'a> {
	rc: &'a Transport,
	cfg: &'a Settings,
}

impl<'a> SnapshotStore<'a> {
	pub fn new(rc: &'a Transport, cfg: &'a Settings) -> Self {
		SnapshotStore { rc, cfg }
	}

	fn remote_path(&self, side: Side) -> String {
		pathjoin(
			&self.cfg.workdir(side),
			&format!("{}-{}_fl.json.xz", side.letter(), self.cfg.name),
		)
	}

	fn legacy_remote_path(&self, side: Side) -> String {
		pathjoin(
			&self.cfg.workdir(side),
			&format!("{}-{}_fl.zipjson", side.letter(), self.cfg.name),
		)
	}

	/// Fetch the prior listing for one side. Absent snapshots, and every
	/// snapshot when `reset_state` is set, read as empty.
	pub async fn load(&self, side: Side) -> Result<Listing, SyncError> {
		if self.cfg.reset_state {
			info!("{}: prior state reset; treating all files as new", side);
			return Ok(Listing::new());
		}

		let local = self.rc.staging_dir().join(format!("{}_prev", side.letter()));
		let local_str = local.display().to_string();

		let mut found = false;
		for remote in [self.remote_path(side), self.legacy_remote_path(side)] {
			match self.rc.copyto(&remote, &local_str, Some(side), None).await {
				Ok(()) => {
					found = true;
					break;
				}
				Err(e) if e.is_not_found() => continue,
				Err(e) => return Err(e.into()),
			}
		}
		if !found {
			debug!("{}: no prior file list. First run semantics", side);
			return Ok(Listing::new());
		}

		let bytes = std::fs::read(&local)?;
		let records = decode_snapshot(&bytes)?;
		debug!("{}: prior list has {} files", side, records.len());
		Ok(Listing::from_records(records))
	}

	/// Persist the post-run listing for one side. The write lands in the
	/// staging area first and reaches the remote in a single copy.
	pub async fn save(&self, side: Side, listing: &Listing) -> Result<(), SyncError> {
		let records: Vec<&FileRecord> = listing.iter().collect();
		let bytes = encode_snapshot(&records)?;

		let local = self.rc.staging_dir().join(format!("{}_curr", side.letter()));
		std::fs::write(&local, bytes)?;

		self.rc
			.copyto(&local.display().to_string(), &self.remote_path(side), Some(side), None)
			.await?;
		debug!("{}: pushed file list with {} files", side, listing.len());
		Ok(())
	}
}

/// Serialize records into the current snapshot format
pub fn encode_snapshot(records: &[&FileRecord]) -> Result<Vec<u8>, SyncError> {
	let json = serde_json::to_vec(records)
		.map_err(|e| SyncError::State { message: format!("cannot serialize file list: {}", e) })?;
	let mut enc = xz2::write::XzEncoder::new(Vec::new(), 6);
	enc.write_all(&json)?;
	Ok(enc.finish()?)
}

/// Deserialize either snapshot format, sniffing by magic bytes
pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<FileRecord>, SyncError> {
	let json: Vec<u8> = if bytes.starts_with(LEGACY_MAGIC) {
		let mut dec = flate2::read::ZlibDecoder::new(&bytes[LEGACY_MAGIC.len()..]);
		let mut out = Vec::new();
		dec.read_to_end(&mut out)
			.map_err(|e| SyncError::State { message: format!("bad legacy file list: {}", e) })?;
		out
	} else if bytes.starts_with(XZ_MAGIC) {
		let mut dec = xz2::read::XzDecoder::new(bytes);
		let mut out = Vec::new();
		dec.read_to_end(&mut out)
			.map_err(|e| SyncError::State { message: format!("bad file list: {}", e) })?;
		out
	} else {
		return Err(SyncError::State {
			message: "file list has unknown format (neither xz nor zipjson)".to_string(),
		});
	};

	serde_json::from_slice(&json)
		.map_err(|e| SyncError::State { message: format!("cannot parse file list: {}", e) })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_current_format_round_trip() {
		let recs = vec![
			FileRecord::new("a.txt", 10).with_mtime(100.0).with_hash("md5", "aa"),
			FileRecord::new("sub/b.txt", 20),
		];
		let refs: Vec<&FileRecord> = recs.iter().collect();
		let bytes = encode_snapshot(&refs).unwrap();
		assert!(bytes.starts_with(XZ_MAGIC));

		let back = decode_snapshot(&bytes).unwrap();
		assert_eq!(back, recs);
	}

	#[test]
	fn test_legacy_format_readable() {
		// What older tooling wrote: magic header plus zlib JSON with the
		// transport's field spellings
		let json = r#"[{"Path":"x.txt","Size":5,"mtime":42.5,"Hashes":{"md5":"ff"}}]"#;
		let mut compressed = Vec::from(LEGACY_MAGIC);
		let mut enc =
			flate2::write::ZlibEncoder::new(&mut compressed, flate2::Compression::default());
		enc.write_all(json.as_bytes()).unwrap();
		enc.finish().unwrap();

		let recs = decode_snapshot(&compressed).unwrap();
		assert_eq!(recs.len(), 1);
		assert_eq!(recs[0].path, "x.txt");
		assert_eq!(recs[0].size, 5);
		assert_eq!(recs[0].mtime, Some(42.5));
		assert_eq!(recs[0].hashes.as_ref().unwrap().get("md5").unwrap(), "ff");
	}

	#[test]
	fn test_unknown_format_rejected() {
		assert!(decode_snapshot(b"garbage").is_err());
		assert!(decode_snapshot(b"").is_err());
	}
}

// vim: ts=4
