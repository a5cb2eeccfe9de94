/// Settings loading, overrides and discovery
use bisyncr::config::{self, Settings};
use bisyncr::strategies::{CompareMode, ConflictMode};
use bisyncr::types::Side;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
	let path = dir.path().join("config.toml");
	fs::write(&path, body).unwrap();
	path
}

#[test]
fn test_load_from_file() {
	let dir = TempDir::new().unwrap();
	let path = write_config(
		&dir,
		"remote_a = \"/data/a\"\nremote_b = \"b2:bucket\"\nname = \"pair1\"\ncompare = \"hash\"\n",
	);

	let cfg = Settings::load(&path, &[]).unwrap();
	assert_eq!(cfg.remote_a, "/data/a");
	assert_eq!(cfg.remote_b, "b2:bucket");
	assert_eq!(cfg.name, "pair1");
	assert_eq!(cfg.compare, CompareMode::Hash);
	// Remote-aware workdir join
	assert_eq!(cfg.workdir(Side::B), "b2:bucket/.bisyncr");
}

#[test]
fn test_overrides_beat_file_values() {
	let dir = TempDir::new().unwrap();
	let path = write_config(
		&dir,
		"remote_a = \"/a\"\nremote_b = \"/b\"\nconflict_mode = \"A\"\nbackup = true\n",
	);

	let overrides =
		vec!["conflict_mode = \"newer\"".to_string(), "backup = false".to_string()];
	let cfg = Settings::load(&path, &overrides).unwrap();
	assert_eq!(cfg.conflict_mode, ConflictMode::Newer);
	assert!(!cfg.backup);
}

#[test]
fn test_legacy_compound_mode_in_override() {
	let dir = TempDir::new().unwrap();
	let path = write_config(&dir, "remote_a = \"/a\"\nremote_b = \"/b\"\n");

	let cfg =
		Settings::load(&path, &["conflict_mode = \"older_tag\"".to_string()]).unwrap();
	assert_eq!(cfg.conflict_mode, ConflictMode::Older);
	assert!(cfg.tag_conflict);
}

#[test]
fn test_bad_override_reported() {
	let dir = TempDir::new().unwrap();
	let path = write_config(&dir, "remote_a = \"/a\"\nremote_b = \"/b\"\n");

	let err = Settings::load(&path, &["no equals sign".to_string()]).unwrap_err();
	assert!(err.to_string().contains("override"));
}

#[test]
fn test_missing_file_reported() {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("nope.toml");
	assert!(Settings::load(&path, &[]).is_err());
}

#[test]
fn test_template_written_once() {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join(".bisyncr").join("config.toml");

	config::write_template(&path).unwrap();
	assert!(path.exists());
	let text = fs::read_to_string(&path).unwrap();
	assert!(text.contains("remote_a"));
	assert!(text.contains("conflict_mode"));
	// The random pair name got substituted in
	assert!(!text.contains("= \"NAME\""));

	// A second write must refuse to clobber
	assert!(config::write_template(&path).is_err());
}

#[test]
fn test_find_config_searches_upwards() {
	let dir = TempDir::new().unwrap();
	let cfg_path = dir.path().join(".bisyncr").join("config.toml");
	fs::create_dir_all(cfg_path.parent().unwrap()).unwrap();
	fs::write(&cfg_path, "x = 1\n").unwrap();

	let nested = dir.path().join("deep").join("deeper");
	fs::create_dir_all(&nested).unwrap();

	let found = config::find_config(&nested, false).unwrap();
	assert_eq!(found.canonicalize().unwrap(), cfg_path.canonicalize().unwrap());
}

#[test]
fn test_find_config_passes_files_through() {
	let dir = TempDir::new().unwrap();
	let path = write_config(&dir, "");
	assert_eq!(config::find_config(&path, false).unwrap(), path);
}

#[test]
fn test_find_config_new_targets_internal_dir() {
	let dir = TempDir::new().unwrap();
	let target = config::find_config(dir.path(), true).unwrap();
	assert!(target.ends_with(".bisyncr/config.toml"));
}

// vim: ts=4
