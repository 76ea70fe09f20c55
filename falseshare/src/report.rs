//! Sharing report

// Imports
use {
	crate::{
		addr::{BlockId, ThreadId},
		classifier::Classification,
	},
	std::{collections::BTreeSet, fmt, ops::RangeInclusive},
};

/// Sharing report
#[derive(PartialEq, Eq, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SharingReport {
	/// Block size, in bytes
	pub block_size: u64,

	/// Word size, in bytes
	pub word_size: u64,

	/// Total blocks observed
	pub total_blocks: usize,

	/// Blocks touched by a single thread
	pub unshared: usize,

	/// Truly shared blocks
	pub truly_shared: usize,

	/// Falsely shared blocks
	pub falsely_shared: usize,

	/// Details of each detailed block, in discovery order
	pub details: Vec<BlockSharing>,
}

impl SharingReport {
	/// Creates an empty report
	pub fn new(block_size: u64, word_size: u64) -> Self {
		Self {
			block_size,
			word_size,
			total_blocks: 0,
			unshared: 0,
			truly_shared: 0,
			falsely_shared: 0,
			details: vec![],
		}
	}

	/// Registers a classified block
	pub fn register(&mut self, classification: Classification) {
		self.total_blocks += 1;
		match classification {
			Classification::Unshared => self.unshared += 1,
			Classification::TrulyShared => self.truly_shared += 1,
			Classification::FalselyShared => self.falsely_shared += 1,
		}
	}

	/// Adds details for a block
	pub fn push_details(&mut self, block: BlockSharing) {
		self.details.push(block);
	}

	/// Returns the details of all falsely shared blocks
	pub fn falsely_shared_blocks(&self) -> impl Iterator<Item = &BlockSharing> {
		self.details
			.iter()
			.filter(|block| block.classification == Classification::FalselyShared)
	}
}

impl fmt::Display for SharingReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "blocks size:\t{}", self.total_blocks)?;
		writeln!(f, "falsely shared:\t{}", self.falsely_shared)?;
		writeln!(f, "truly shared:\t{}", self.truly_shared)?;
		writeln!(f, "unshared:\t{}", self.unshared)?;

		for block in &self.details {
			write!(f, "{block}")?;
		}

		Ok(())
	}
}

/// Sharing details of a block
#[derive(PartialEq, Eq, Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct BlockSharing {
	/// Block
	pub block: BlockId,

	/// Addresses covered by the block
	pub addrs: RangeInclusive<u64>,

	/// Classification
	pub classification: Classification,

	/// All threads that touched the block
	pub threads: BTreeSet<ThreadId>,

	/// Thread pairs that touched at least one common word
	pub overlapping_pairs: usize,

	/// Thread pairs that only touched different words
	pub disjoint_pairs: usize,
}

impl fmt::Display for BlockSharing {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = match self.classification {
			Classification::Unshared => "unshared",
			Classification::TrulyShared => "truly shared",
			Classification::FalselyShared => "falsely shared",
		};

		writeln!(
			f,
			"Block: {:#x}..={:#x} ({kind}, {} overlapping / {} disjoint pairs)",
			self.addrs.start(),
			self.addrs.end(),
			self.overlapping_pairs,
			self.disjoint_pairs
		)?;
		for thread in &self.threads {
			writeln!(f, "\tThread: {thread}")?;
		}

		Ok(())
	}
}
