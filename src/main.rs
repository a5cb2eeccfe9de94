use clap::{Arg, ArgAction, Command};
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info};

use bisyncr::config;
use bisyncr::config::Settings;
use bisyncr::lock::BreakTarget;
use bisyncr::logging;
use bisyncr::sync::SyncRun;

fn cli() -> Command {
	Command::new("bisyncr")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Bidirectional directory sync via an rclone-compatible transport")
		.arg(
			Arg::new("configpath")
				.default_value(".")
				.help(
					"Path to the settings file for this sync pair. A directory is \
					 searched upwards for '.bisyncr/config.toml', or used as the \
					 target location with --new",
				),
		)
		.arg(
			Arg::new("new")
				.long("new")
				.action(ArgAction::SetTrue)
				.help("Write a fresh settings template and exit"),
		)
		.arg(
			Arg::new("dry-run")
				.short('n')
				.long("dry-run")
				.action(ArgAction::SetTrue)
				.help("Plan and print actions without changing anything"),
		)
		.arg(
			Arg::new("interactive")
				.short('i')
				.long("interactive")
				.action(ArgAction::SetTrue)
				.help("Show the planned actions and prompt before proceeding"),
		)
		.arg(
			Arg::new("no-backup")
				.long("no-backup")
				.action(ArgAction::SetTrue)
				.help("Skip backups for this run"),
		)
		.arg(
			Arg::new("break-lock")
				.long("break-lock")
				.value_name("SIDE")
				.value_parser(["A", "B", "both"])
				.help("Break locks on A, B or both remotes and exit"),
		)
		.arg(
			Arg::new("reset-state")
				.long("reset-state")
				.action(ArgAction::SetTrue)
				.help(
					"Disregard the stored prior state for this run. One-sided files \
					 are treated as new and the result is the union of both remotes",
				),
		)
		.arg(
			Arg::new("override")
				.long("override")
				.action(ArgAction::Append)
				.value_name("'OPTION = VALUE'")
				.help("Override a settings option for this run only. May repeat"),
		)
		.arg(
			Arg::new("debug")
				.long("debug")
				.action(ArgAction::SetTrue)
				.help("Debug logging; transport exit codes are propagated"),
		)
}

async fn real_main() -> i32 {
	let matches = cli().get_matches();
	let debug = matches.get_flag("debug");
	logging::init_tracing(debug);

	let configpath = matches.get_one::<String>("configpath").expect("defaulted");
	let new = matches.get_flag("new");

	let configpath = match config::find_config(Path::new(configpath), new) {
		Ok(p) => p,
		Err(e) => {
			error!("{}", e);
			return 1;
		}
	};

	if new {
		return match config::write_template(&configpath) {
			Ok(()) => {
				info!("Settings template written to '{}'", configpath.display());
				0
			}
			Err(e) => {
				error!("{}", e);
				1
			}
		};
	}

	if matches.get_flag("dry-run") && matches.get_flag("interactive") {
		error!("Cannot set both --dry-run and --interactive");
		return 1;
	}

	let overrides: Vec<String> = matches
		.get_many::<String>("override")
		.map(|vals| vals.cloned().collect())
		.unwrap_or_default();
	for line in &overrides {
		info!("Override: {}", line);
	}

	let mut cfg = match Settings::load(&configpath, &overrides) {
		Ok(cfg) => cfg,
		Err(e) => {
			error!("{}", e);
			return 1;
		}
	};
	cfg.dry_run = matches.get_flag("dry-run");
	cfg.interactive = matches.get_flag("interactive");
	cfg.reset_state = matches.get_flag("reset-state");
	if matches.get_flag("no-backup") {
		cfg.backup = false;
	}

	info!("A: '{}'", cfg.remote_a);
	info!("B: '{}'", cfg.remote_b);

	let run = match SyncRun::new(cfg) {
		Ok(run) => run,
		Err(e) => {
			error!("{}", e);
			return 1;
		}
	};

	let result = match matches.get_one::<String>("break-lock") {
		Some(target) => {
			let target = BreakTarget::from_str(target).expect("validated by clap");
			run.break_locks(target).await
		}
		None => run.run().await,
	};

	match result {
		Ok(()) => 0,
		Err(e) => {
			error!("{}", e);
			match e.transport_exit_code() {
				Some(code) if debug => code,
				_ => 1,
			}
		}
	}
}

#[tokio::main]
async fn main() {
	std::process::exit(real_main().await);
}

// vim: ts=4
