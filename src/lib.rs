//! # bisyncr - Bidirectional sync over an rclone-compatible transport
//!
//! bisyncr keeps two storage endpoints in sync by remembering the listing of
//! the last successful run and reconciling both sides against it. All
//! storage I/O is delegated to an external transport CLI, so anything the
//! transport can reach (local disks, object stores, SFTP, encrypted
//! overlays) can take part in a pair.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bisyncr::config::Settings;
//! use bisyncr::sync::SyncRun;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bisyncr::error::SyncError> {
//!     let cfg = Settings::load("config.toml".as_ref(), &[])?;
//!     SyncRun::new(cfg)?.run().await
//! }
//! ```

#![deny(unsafe_code)]

pub mod cleanup;
pub mod compare;
pub mod config;
pub mod conflict;
pub mod error;
pub mod executor;
pub mod listing;
pub mod lock;
pub mod logging;
pub mod plan;
pub mod reconcile;
pub mod renames;
pub mod snapshot;
pub mod strategies;
pub mod sync;
pub mod transport;
pub mod types;
pub mod util;

// Re-export commonly used types
pub use config::Settings;
pub use error::{SyncError, TransportError};
pub use listing::Listing;
pub use plan::SyncPlan;
pub use sync::SyncRun;
pub use types::{FileRecord, Side};

// vim: ts=4
