//! Utility functions for bisyncr

use crate::types::{FileRecord, Side};

/// Scale a byte count to a human unit. Returns a value,label pair.
pub fn bytes2human(byte_count: u64) -> (f64, &'static str) {
	const LABELS: [&str; 9] = ["b", "kb", "mb", "gb", "tb", "pb", "eb", "zb", "yb"];
	let mut best = 0;
	for ii in 0..LABELS.len() {
		if (byte_count as f64) / 1024f64.powi(ii as i32) < 1.0 {
			break;
		}
		best = ii;
	}
	(byte_count as f64 / 1024f64.powi(best as i32), LABELS[best])
}

/// One-line count and size summary of a set of records
pub fn file_summary<'a>(files: impl IntoIterator<Item = &'a FileRecord>) -> String {
	let mut n = 0usize;
	let mut total = 0u64;
	for f in files {
		n += 1;
		total += f.size;
	}
	let (val, label) = bytes2human(total);
	format!("{} files, {:.2} {}", n, val, label)
}

/// Join a remote root and a relative path.
///
/// Like a plain path join except that a root ending in ':' names the top of
/// a remote and must not grow a separator:
///
/// ```text
/// pathjoin("a", "b")    // a/b
/// pathjoin("a:", "b")   // a:b
/// pathjoin("a:", "/b")  // a:/b
/// pathjoin("a", "/b")   // a/b
/// ```
pub fn pathjoin(root: &str, rest: &str) -> String {
	let root = root.strip_suffix('/').unwrap_or(root);
	if root.is_empty() {
		return rest.trim_start_matches('/').to_string();
	}
	if root.ends_with(':') {
		format!("{}{}", root, rest)
	} else {
		format!("{}/{}", root, rest.trim_start_matches('/'))
	}
}

/// Tagged name for a conflict loser: the run timestamp and side go in front
/// of the extension so the original suffix keeps working.
///
/// ```text
/// docs/report.txt -> docs/report.20260801T120000.A.txt
/// Makefile        -> Makefile.20260801T120000.B
/// ```
pub fn tag_path(path: &str, ts_compact: &str, side: Side) -> String {
	let (dir, name) = match path.rfind('/') {
		Some(idx) => (&path[..idx + 1], &path[idx + 1..]),
		None => ("", path),
	};
	match name.rfind('.') {
		Some(dot) if dot > 0 => format!(
			"{}{}.{}.{}{}",
			dir,
			&name[..dot],
			ts_compact,
			side.letter(),
			&name[dot..]
		),
		_ => format!("{}{}.{}.{}", dir, name, ts_compact, side.letter()),
	}
}

/// Render an optional Unix mtime for log output
pub fn unix2iso(mtime: Option<f64>) -> String {
	match mtime {
		Some(t) => match chrono::DateTime::from_timestamp(t as i64, 0) {
			Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
			None => "None".to_string(),
		},
		None => "None".to_string(),
	}
}

/// Parse the transport's RFC3339 ModTime into Unix seconds
pub fn rfc3339_to_unix(timestr: &str) -> Option<f64> {
	let dt = chrono::DateTime::parse_from_rfc3339(timestr).ok()?;
	Some(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_bytes2human() {
		assert_eq!(bytes2human(0), (0.0, "b"));
		assert_eq!(bytes2human(512), (512.0, "b"));
		assert_eq!(bytes2human(2048), (2.0, "kb"));
		let (v, l) = bytes2human(3 * 1024 * 1024);
		assert_eq!(l, "mb");
		assert!((v - 3.0).abs() < 1e-9);
	}

	#[test]
	fn test_file_summary() {
		let files = vec![FileRecord::new("a", 1024), FileRecord::new("b", 1024)];
		assert_eq!(file_summary(files.iter()), "2 files, 2.00 kb");
		let none: Vec<FileRecord> = vec![];
		assert_eq!(file_summary(none.iter()), "0 files, 0.00 b");
	}

	#[test]
	fn test_pathjoin_remote_roots() {
		assert_eq!(pathjoin("a", "b"), "a/b");
		assert_eq!(pathjoin("a:", "b"), "a:b");
		assert_eq!(pathjoin("a:", "/b"), "a:/b");
		assert_eq!(pathjoin("a", "/b"), "a/b");
		assert_eq!(pathjoin("a/", "b"), "a/b");
		assert_eq!(pathjoin("b2:bucket", "x/y"), "b2:bucket/x/y");
	}

	#[test]
	fn test_tag_path() {
		assert_eq!(
			tag_path("docs/report.txt", "20260801T120000", Side::A),
			"docs/report.20260801T120000.A.txt"
		);
		assert_eq!(tag_path("Makefile", "20260801T120000", Side::B), "Makefile.20260801T120000.B");
		// A leading dot is a hidden-file prefix, not an extension
		assert_eq!(tag_path(".env", "T0", Side::A), ".env.T0.A");
		assert_eq!(tag_path("a/b/c.tar.gz", "T0", Side::B), "a/b/c.tar.T0.B.gz");
	}

	#[test]
	fn test_rfc3339_to_unix() {
		assert_eq!(rfc3339_to_unix("1970-01-01T00:00:00Z"), Some(0.0));
		let t = rfc3339_to_unix("2021-06-01T12:00:00.5Z").unwrap();
		assert!((t - 1622548800.5).abs() < 1e-6);
		let t = rfc3339_to_unix("2021-06-01T12:00:00+02:00").unwrap();
		assert!((t - 1622541600.0).abs() < 1e-6);
		assert_eq!(rfc3339_to_unix("not a time"), None);
	}

	#[test]
	fn test_unix2iso() {
		assert_eq!(unix2iso(None), "None");
		assert_eq!(unix2iso(Some(0.0)), "1970-01-01 00:00:00");
	}
}

// vim: ts=4
