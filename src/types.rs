//! Core data types for bisyncr

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One of the two endpoints being kept in sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
	A,
	B,
}

impl Side {
	pub const BOTH: [Side; 2] = [Side::A, Side::B];

	/// The opposite endpoint
	pub fn other(self) -> Side {
		match self {
			Side::A => Side::B,
			Side::B => Side::A,
		}
	}

	pub fn letter(self) -> &'static str {
		match self {
			Side::A => "A",
			Side::B => "B",
		}
	}
}

impl std::fmt::Display for Side {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.letter())
	}
}

impl std::str::FromStr for Side {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"A" | "a" => Ok(Side::A),
			"B" | "b" => Ok(Side::B),
			_ => Err(format!("Unknown side: {}. Valid options: A, B", s)),
		}
	}
}

/// A single file as reported by the transport for one listing
///
/// Records are immutable values from the listing they came from. `mtime` is
/// Unix seconds and is present only when the transport reported a ModTime.
/// `hashes` maps lowercase algorithm names to hex digests and is present
/// only when the transport reported at least one non-empty digest.
///
/// The serialized field names match the transport's listing output so that
/// snapshots written by older tooling stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
	#[serde(rename = "Path")]
	pub path: String,

	#[serde(rename = "Size")]
	pub size: u64,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mtime: Option<f64>,

	#[serde(rename = "Hashes", default, skip_serializing_if = "Option::is_none")]
	pub hashes: Option<BTreeMap<String, String>>,
}

impl FileRecord {
	pub fn new(path: impl Into<String>, size: u64) -> Self {
		FileRecord { path: path.into(), size, mtime: None, hashes: None }
	}

	pub fn with_mtime(mut self, mtime: f64) -> Self {
		self.mtime = Some(mtime);
		self
	}

	pub fn with_hash(mut self, alg: impl Into<String>, digest: impl Into<String>) -> Self {
		self.hashes.get_or_insert_with(BTreeMap::new).insert(alg.into(), digest.into());
		self
	}

	/// Same record under a different path
	pub fn renamed(&self, path: impl Into<String>) -> Self {
		let mut r = self.clone();
		r.path = path.into();
		r
	}

	/// Whether the two records share at least one equal, non-empty hash value
	pub fn shares_hash(&self, other: &FileRecord) -> bool {
		let (h1, h2) = match (&self.hashes, &other.hashes) {
			(Some(h1), Some(h2)) => (h1, h2),
			_ => return false,
		};
		h1.iter().any(|(alg, v1)| {
			!v1.is_empty() && h2.get(alg).map(|v2| v2 == v1).unwrap_or(false)
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_side_other() {
		assert_eq!(Side::A.other(), Side::B);
		assert_eq!(Side::B.other(), Side::A);
	}

	#[test]
	fn test_record_serialized_field_names() {
		let rec = FileRecord::new("a/b.txt", 12).with_mtime(100.5).with_hash("md5", "abcd");
		let json = serde_json::to_string(&rec).unwrap();
		assert!(json.contains("\"Path\""));
		assert!(json.contains("\"Size\""));
		assert!(json.contains("\"mtime\""));
		assert!(json.contains("\"Hashes\""));

		let back: FileRecord = serde_json::from_str(&json).unwrap();
		assert_eq!(back, rec);
	}

	#[test]
	fn test_record_optional_fields_omitted() {
		let rec = FileRecord::new("x", 0);
		let json = serde_json::to_string(&rec).unwrap();
		assert!(!json.contains("mtime"));
		assert!(!json.contains("Hashes"));
	}

	#[test]
	fn test_shares_hash() {
		let a = FileRecord::new("a", 1).with_hash("md5", "11").with_hash("sha1", "22");
		let b = FileRecord::new("b", 1).with_hash("sha1", "22");
		let c = FileRecord::new("c", 1).with_hash("md5", "99");
		let d = FileRecord::new("d", 1);
		assert!(a.shares_hash(&b));
		assert!(!a.shares_hash(&c));
		assert!(!a.shares_hash(&d));
	}

	#[test]
	fn test_shares_hash_ignores_empty_values() {
		let a = FileRecord::new("a", 1).with_hash("md5", "");
		let b = FileRecord::new("b", 1).with_hash("md5", "");
		assert!(!a.shares_hash(&b));
	}
}

// vim: ts=4
