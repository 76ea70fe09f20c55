//! Logger
//!
//! Logs to stderr, filtered by `RUST_LOG` (defaults to `info`), and optionally
//! to a file, filtered by `RUST_LOG_FILE` (defaults to `debug`).
//!
//! Anything logged through [`pre_init`] before [`init`] is called is buffered
//! and emitted once the logger exists.

// Imports
use {
	std::{
		fs,
		io,
		path::Path,
		sync::Arc,
	},
	parking_lot::Mutex,
	tracing::Level,
	tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer},
};

/// Pre-init messages
static PRE_INIT_MESSAGES: Mutex<Vec<(Level, String)>> = parking_lot::const_mutex(vec![]);

/// Logging before the logger is initialized
pub mod pre_init {
	// Imports
	use {super::PRE_INIT_MESSAGES, tracing::Level};

	/// Buffers a debug message
	pub fn debug(message: impl Into<String>) {
		PRE_INIT_MESSAGES.lock().push((Level::DEBUG, message.into()));
	}
}

/// Initializes the logger.
///
/// If `log_file` is given, logs are also written to it, truncating it unless `log_file_append` is set.
///
/// # Panics
/// Panics if a global logger was already set.
pub fn init(log_file: Option<&Path>, log_file_append: bool) {
	let stderr_layer = fmt::layer()
		.with_writer(io::stderr)
		.with_filter(self::env_filter("RUST_LOG", "info"));

	// Note: If we can't open the log file, we still want stderr logging,
	//       so we report the error after initializing.
	let (file_layer, file_err) = match log_file.map(|path| self::open_log_file(path, log_file_append)) {
		Some(Ok(file)) => {
			let layer = fmt::layer()
				.with_ansi(false)
				.with_writer(Arc::new(file))
				.with_filter(self::env_filter("RUST_LOG_FILE", "debug"));
			(Some(layer), None)
		},
		Some(Err(err)) => (None, Some(err)),
		None => (None, None),
	};

	tracing_subscriber::registry()
		.with(stderr_layer)
		.with(file_layer)
		.init();

	if let Some(err) = file_err {
		tracing::warn!(?log_file, ?err, "Unable to open log file");
	}

	// Then emit all pre-init messages
	let messages = std::mem::take(&mut *PRE_INIT_MESSAGES.lock());
	for (level, message) in messages {
		match level {
			Level::TRACE => tracing::trace!("{message}"),
			Level::DEBUG => tracing::debug!("{message}"),
			Level::INFO => tracing::info!("{message}"),
			Level::WARN => tracing::warn!("{message}"),
			_ => tracing::error!("{message}"),
		}
	}
}

/// Creates an env filter from the variable `var`, falling back to `default`
fn env_filter(var: &str, default: &str) -> EnvFilter {
	EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Opens the log file
fn open_log_file(path: &Path, append: bool) -> Result<fs::File, io::Error> {
	fs::OpenOptions::new()
		.create(true)
		.write(true)
		.append(append)
		.truncate(!append)
		.open(path)
}
