//! Error types for bisyncr operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Invalid configuration or option combination
	Config { message: String },

	/// The external transport failed
	Transport(TransportError),

	/// A competing run holds a lock on one or both remotes
	RemoteLocked { sentinels: Vec<String> },

	/// Hash comparison requested but no usable hashes and no fallback
	MissingHash { message: String },

	/// Snapshot state could not be read or written
	State { message: String },

	/// I/O error on local staging files
	Io(io::Error),

	/// Run aborted at the interactive prompt
	Aborted,
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Config { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Transport(e) => write!(f, "Transport error: {}", e),
			SyncError::RemoteLocked { sentinels } => {
				write!(f, "Remote(s) locked:")?;
				for s in sentinels {
					write!(f, "\n  {}", s)?;
				}
				Ok(())
			}
			SyncError::MissingHash { message } => write!(f, "{}", message),
			SyncError::State { message } => write!(f, "State error: {}", message),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Aborted => write!(f, "Aborted"),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<TransportError> for SyncError {
	fn from(e: TransportError) -> Self {
		SyncError::Transport(e)
	}
}

impl SyncError {
	/// Exit code of the underlying transport call, if that is what failed
	pub fn transport_exit_code(&self) -> Option<i32> {
		match self {
			SyncError::Transport(TransportError::Exit { code, .. }) => Some(*code),
			_ => None,
		}
	}
}

/// Errors from invoking the external transport executable
#[derive(Debug)]
pub enum TransportError {
	/// The executable could not be spawned at all
	Spawn { cmd: String, source: io::Error },

	/// The transport exited with a non-zero code
	Exit { cmd: String, code: i32, stderr: String },

	/// The transport produced output we could not parse
	Parse { message: String },
}

impl fmt::Display for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransportError::Spawn { cmd, source } => {
				write!(f, "Failed to spawn '{}': {}", cmd, source)
			}
			TransportError::Exit { cmd, code, stderr } => {
				write!(f, "'{}' exited with code {}", cmd, code)?;
				if !stderr.is_empty() {
					write!(f, ": {}", stderr)?;
				}
				Ok(())
			}
			TransportError::Parse { message } => {
				write!(f, "Failed to parse transport output: {}", message)
			}
		}
	}
}

impl Error for TransportError {}

impl TransportError {
	/// Whether the failure indicates an absent source object rather than a
	/// real fault. Exit code 3 is "directory not found", 4 is "object not
	/// found" in rclone-compatible transports.
	pub fn is_not_found(&self) -> bool {
		matches!(self, TransportError::Exit { code: 3 | 4, .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_not_found_classification() {
		let e = TransportError::Exit { cmd: "x".into(), code: 3, stderr: String::new() };
		assert!(e.is_not_found());
		let e = TransportError::Exit { cmd: "x".into(), code: 4, stderr: String::new() };
		assert!(e.is_not_found());
		let e = TransportError::Exit { cmd: "x".into(), code: 1, stderr: String::new() };
		assert!(!e.is_not_found());
	}

	#[test]
	fn test_locked_display_lists_sentinels() {
		let e = SyncError::RemoteLocked {
			sentinels: vec!["A:LOCK_job".to_string(), "B:LOCK_job".to_string()],
		};
		let txt = e.to_string();
		assert!(txt.contains("A:LOCK_job"));
		assert!(txt.contains("B:LOCK_job"));
	}

	#[test]
	fn test_transport_exit_code_passthrough() {
		let e = SyncError::Transport(TransportError::Exit {
			cmd: "lsjson".into(),
			code: 7,
			stderr: String::new(),
		});
		assert_eq!(e.transport_exit_code(), Some(7));
		assert_eq!(SyncError::Aborted.transport_exit_code(), None);
	}
}

// vim: ts=4
