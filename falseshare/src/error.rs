//! Errors

// Imports
use crate::addr::ThreadId;

/// Configuration error.
///
/// Returned when building a [`Geometry`](crate::Geometry) from an invalid configuration.
#[derive(PartialEq, Eq, Clone, Debug)]
#[derive(thiserror::Error)]
pub enum ConfigError {
	#[error("Block size must be a power of two, found {0}")]
	BlockSizeNotPowerOfTwo(usize),

	#[error("Word size must be a power of two, found {0}")]
	WordSizeNotPowerOfTwo(usize),

	#[error("Word size ({word_size}) must not be larger than the block size ({block_size})")]
	WordLargerThanBlock { block_size: usize, word_size: usize },

	#[error("Blocks have {words} words, which don't fit into a {bits}-bit word mask")]
	MaskTooNarrow { words: usize, bits: u32 },

	#[error("Maximum thread count must be positive")]
	ZeroMaxThreads,

	#[error("Shard count must be a power of two, found {0}")]
	ShardsNotPowerOfTwo(usize),
}

/// Error while recording an access
#[derive(PartialEq, Eq, Clone, Debug)]
#[derive(thiserror::Error)]
pub enum RecordError {
	#[error("Thread {thread} is out of range, at most {max_threads} threads are tracked")]
	ThreadOutOfRange { thread: ThreadId, max_threads: usize },
}
