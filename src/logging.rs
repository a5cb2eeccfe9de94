//! Logging prelude module for convenient access to tracing macros.

pub use tracing::{debug, error, info, trace, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// Logs at INFO level by default, DEBUG when `debug` is set. `RUST_LOG`
/// overrides both:
///
/// ```bash
/// RUST_LOG=bisyncr=trace bisyncr config.toml
/// ```
pub fn init_tracing(debug: bool) {
	let fallback = if debug { "debug" } else { "info" };
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
		)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}
