//! Addresses, blocks and words

// Imports
use {
	crate::{config::SharingConfig, error::ConfigError},
	std::{fmt, ops::RangeInclusive},
};

/// Thread id, as reported by the instrumentation harness
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub u32);

impl ThreadId {
	/// Returns this thread id as an index
	pub fn to_usize(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Display for ThreadId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

/// Block id.
///
/// An address shifted right by the block size
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct BlockId(u64);

impl fmt::Debug for BlockId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("BlockId")
			.field(&format_args!("{:#010x}", self.0))
			.finish()
	}
}

impl BlockId {
	/// Creates a block id from its raw value
	pub const fn new(id: u64) -> Self {
		Self(id)
	}

	/// Returns the block id as a u64
	pub fn to_u64(self) -> u64 {
		self.0
	}
}

/// Word index within a block
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
pub struct WordIdx(u32);

/// Word mask.
///
/// One bit per word of a block, set once the word was touched.
#[derive(PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct WordMask(u64);

impl fmt::Debug for WordMask {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("WordMask")
			.field(&format_args!("{:#b}", self.0))
			.finish()
	}
}

impl WordMask {
	/// Number of words a mask can hold
	pub const BITS: u32 = u64::BITS;
	/// Empty mask
	pub const EMPTY: Self = Self(0);

	/// Creates a mask with a single word set
	pub fn single(word: WordIdx) -> Self {
		Self(1 << word.0)
	}

	/// Returns the raw bits of this mask
	pub fn bits(self) -> u64 {
		self.0
	}

	/// Returns this mask with `word` set
	#[must_use]
	pub fn with(self, word: WordIdx) -> Self {
		Self(self.0 | Self::single(word).0)
	}

	/// Returns if any word is set in both masks
	pub fn overlaps(self, other: Self) -> bool {
		self.0 & other.0 != 0
	}

	/// Returns if no words are set
	pub fn is_empty(self) -> bool {
		self.0 == 0
	}
}

/// Block geometry.
///
/// Built from a validated [`SharingConfig`], so all shifts and masks are consistent.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Geometry {
	/// `log2(block_size)`
	block_shift: u32,

	/// `log2(word_size)`
	word_shift: u32,

	/// Words per block
	words_per_block: u32,
}

impl Geometry {
	/// Validates `config` and builds its geometry.
	///
	/// # Errors
	/// Returns an error if either size isn't a power of two, if words are larger than
	/// blocks, or if a block has more words than fit into a [`WordMask`].
	pub fn new(config: &SharingConfig) -> Result<Self, ConfigError> {
		let SharingConfig {
			block_size, word_size, ..
		} = *config;

		if !block_size.is_power_of_two() {
			return Err(ConfigError::BlockSizeNotPowerOfTwo(block_size));
		}
		if !word_size.is_power_of_two() {
			return Err(ConfigError::WordSizeNotPowerOfTwo(word_size));
		}
		if word_size > block_size {
			return Err(ConfigError::WordLargerThanBlock { block_size, word_size });
		}

		let words = block_size / word_size;
		if words > WordMask::BITS as usize {
			return Err(ConfigError::MaskTooNarrow {
				words,
				bits: WordMask::BITS,
			});
		}

		Ok(Self {
			block_shift:     block_size.trailing_zeros(),
			word_shift:      word_size.trailing_zeros(),
			words_per_block: words as u32,
		})
	}

	/// Returns the block size, in bytes
	pub fn block_size(&self) -> u64 {
		1 << self.block_shift
	}

	/// Returns the word size, in bytes
	pub fn word_size(&self) -> u64 {
		1 << self.word_shift
	}

	/// Returns the number of words per block
	pub fn words_per_block(&self) -> u32 {
		self.words_per_block
	}

	/// Returns the block that contains `addr`
	pub fn block_id(&self, addr: u64) -> BlockId {
		BlockId(addr >> self.block_shift)
	}

	/// Returns the word within its block that contains `addr`
	pub fn word_idx(&self, addr: u64) -> WordIdx {
		let offset_mask = self.block_size() - 1;
		WordIdx(((addr & offset_mask) >> self.word_shift) as u32)
	}

	/// Splits `addr` into its block and word
	pub fn split(&self, addr: u64) -> (BlockId, WordIdx) {
		(self.block_id(addr), self.word_idx(addr))
	}

	/// Returns the addresses covered by `block`.
	///
	/// Inclusive, so the last block of the address space doesn't wrap.
	pub fn block_range(&self, block: BlockId) -> RangeInclusive<u64> {
		let start = block.0 << self.block_shift;
		start..=start + (self.block_size() - 1)
	}
}
