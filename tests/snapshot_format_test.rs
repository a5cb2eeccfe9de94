/// Snapshot format compatibility
///
/// Current snapshots are xz-compressed JSON; older tooling wrote zlib JSON
/// behind a `zipjson` magic header and those must stay readable.
use bisyncr::snapshot::{decode_snapshot, encode_snapshot};
use bisyncr::types::FileRecord;
use std::io::Write;

#[test]
fn test_current_format_preserves_records() {
	let recs = vec![
		FileRecord::new("docs/a.txt", 12).with_mtime(1622548800.5).with_hash("md5", "abcd"),
		FileRecord::new("no_mtime.bin", 0),
	];
	let refs: Vec<&FileRecord> = recs.iter().collect();
	let bytes = encode_snapshot(&refs).unwrap();
	assert_eq!(decode_snapshot(&bytes).unwrap(), recs);
}

#[test]
fn test_legacy_zipjson_readable() {
	// Byte-for-byte what the old format looked like: 9 magic bytes, then
	// zlib-compressed JSON using the transport's field spellings
	let json = concat!(
		"[",
		r#"{"Path":"a/b.txt","Size":100,"mtime":1600000000.25,"Hashes":{"sha1":"dd"}},"#,
		r#"{"Path":"c.txt","Size":7}"#,
		"]"
	);
	let mut bytes = Vec::from(&b"zipjson\x00\x00"[..]);
	let mut enc = flate2::write::ZlibEncoder::new(&mut bytes, flate2::Compression::default());
	enc.write_all(json.as_bytes()).unwrap();
	enc.finish().unwrap();

	let recs = decode_snapshot(&bytes).unwrap();
	assert_eq!(recs.len(), 2);
	assert_eq!(recs[0].path, "a/b.txt");
	assert_eq!(recs[0].size, 100);
	assert_eq!(recs[0].mtime, Some(1600000000.25));
	assert_eq!(recs[0].hashes.as_ref().unwrap().get("sha1").unwrap(), "dd");
	assert_eq!(recs[1].path, "c.txt");
	assert!(recs[1].mtime.is_none());
	assert!(recs[1].hashes.is_none());
}

#[test]
fn test_corrupt_payload_is_an_error() {
	// Valid magic but broken zlib stream
	let mut bytes = Vec::from(&b"zipjson\x00\x00"[..]);
	bytes.extend_from_slice(b"not zlib at all");
	assert!(decode_snapshot(&bytes).is_err());

	assert!(decode_snapshot(b"neither format").is_err());
}

// vim: ts=4
