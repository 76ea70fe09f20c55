//! Recorder

// Imports
use {
	crate::{
		addr::ThreadId,
		config::SharingConfig,
		error::{ConfigError, RecordError},
		table::{FrozenTable, TrackingTable},
	},
	std::fmt,
};

/// Recorder.
///
/// Records every memory access into a tracking table. Safe to call
/// from any number of threads at once.
#[derive(Debug)]
pub struct Recorder {
	/// Tracking table
	table: TrackingTable,
}

impl Recorder {
	/// Creates a recorder with an empty tracking table.
	///
	/// # Errors
	/// Returns an error if `config` is invalid.
	pub fn new(config: &SharingConfig) -> Result<Self, ConfigError> {
		let geometry = config.validate()?;
		tracing::debug!(?config, ?geometry, "Creating recorder");

		Ok(Self {
			table: TrackingTable::new(geometry, config.max_threads, config.shards),
		})
	}

	/// Records an access to `addr` by `thread`.
	///
	/// # Errors
	/// Returns an error if `thread` is out of range.
	/// Nothing is recorded in that case.
	pub fn record(&self, thread: ThreadId, addr: u64) -> Result<(), RecordError> {
		let max_threads = self.table.max_threads();
		if thread.to_usize() >= max_threads {
			return Err(RecordError::ThreadOutOfRange { thread, max_threads });
		}

		let (block, word) = self.table.geometry().split(addr);
		if self.table.touch(thread, block, word) {
			tracing::trace!(?thread, ?block, "Discovered block");
		}

		Ok(())
	}

	/// Handles a memory access from the instrumentation harness.
	///
	/// The access kind doesn't matter for sharing, so reads and writes are recorded alike.
	/// Accesses that are neither are ignored.
	///
	/// # Errors
	/// Returns an error if `thread` is out of range.
	pub fn on_memory_access(&self, thread: ThreadId, addr: u64, is_read: bool, is_write: bool) -> Result<(), RecordError> {
		match is_read || is_write {
			true => self.record(thread, addr),
			false => Ok(()),
		}
	}

	/// Returns the total number of accesses recorded
	pub fn accesses(&self) -> u64 {
		self.table.touches()
	}

	/// Returns the number of blocks observed so far
	pub fn blocks(&self) -> u64 {
		self.table.blocks_discovered()
	}

	/// Stops recording, freezing the tracking table
	pub fn freeze(self) -> FrozenTable {
		let table = self.table.freeze();
		tracing::debug!(accesses = table.touches(), blocks = table.len(), "Froze tracking table");
		table
	}

	/// Formats debug output to `f`.
	pub fn fmt_debug(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
		let accesses = self.accesses();
		let blocks = self.blocks();
		let accesses_per_block = match blocks {
			0 => 0.0,
			_ => accesses as f64 / blocks as f64,
		};

		write!(
			f,
			"{accesses} accesses, {blocks} blocks ({accesses_per_block:.2} accesses per block)"
		)
	}
}
