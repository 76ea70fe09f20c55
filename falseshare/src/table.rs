//! Tracking table
//!
//! Holds, for every block observed, which words each thread touched.
//!
//! The table is split into shards by block id, each behind its own lock, so
//! threads touching different blocks rarely contend. All updates to a block
//! happen under its shard's lock.

// Imports
use {
	crate::addr::{BlockId, Geometry, ThreadId, WordIdx, WordMask},
	crossbeam::utils::CachePadded,
	parking_lot::Mutex,
	std::{
		collections::{hash_map, HashMap},
		sync::atomic::{self, AtomicU64},
	},
};

/// Tracking table
#[derive(Debug)]
pub struct TrackingTable {
	/// Geometry
	geometry: Geometry,

	/// Maximum number of threads
	max_threads: usize,

	/// All shards
	shards: Box<[CachePadded<Mutex<Shard>>]>,

	/// Blocks discovered so far.
	///
	/// Used to give each block its discovery index.
	blocks_discovered: AtomicU64,
}

impl TrackingTable {
	/// Creates an empty tracking table.
	///
	/// `shards` is expected to be a power of two, as ensured by
	/// [`SharingConfig::validate`](crate::SharingConfig::validate).
	pub fn new(geometry: Geometry, max_threads: usize, shards: usize) -> Self {
		debug_assert!(shards.is_power_of_two(), "Shard count must be a power of two");
		Self {
			geometry,
			max_threads,
			shards: (0..shards).map(|_| CachePadded::new(Mutex::new(Shard::new()))).collect(),
			blocks_discovered: AtomicU64::new(0),
		}
	}

	/// Returns the geometry
	pub fn geometry(&self) -> &Geometry {
		&self.geometry
	}

	/// Returns the maximum number of threads
	pub fn max_threads(&self) -> usize {
		self.max_threads
	}

	/// Returns the number of blocks discovered so far
	pub fn blocks_discovered(&self) -> u64 {
		self.blocks_discovered.load(atomic::Ordering::Relaxed)
	}

	/// Returns the number of touches so far.
	///
	/// Locks every shard in turn, so this is only meant for periodic output.
	pub fn touches(&self) -> u64 {
		self.shards.iter().map(|shard| shard.lock().touches).sum()
	}

	/// Marks `word` of `block` as touched by `thread`.
	///
	/// Returns if the block was discovered by this touch.
	///
	/// # Panics
	/// Panics if `thread` is not below the maximum number of threads.
	pub fn touch(&self, thread: ThreadId, block: BlockId, word: WordIdx) -> bool {
		assert!(
			thread.to_usize() < self.max_threads,
			"Thread {thread} is out of range (max {})",
			self.max_threads
		);

		let mut shard = self.shards[self.shard_idx(block)].lock();
		let shard = &mut *shard;
		let (record, discovered) = match shard.idxs.entry(block) {
			hash_map::Entry::Occupied(entry) => (&mut shard.records[*entry.get()], false),
			hash_map::Entry::Vacant(entry) => {
				let discovery = self.blocks_discovered.fetch_add(1, atomic::Ordering::Relaxed);
				let idx = *entry.insert(shard.records.len());
				shard.records.push(BlockAccessRecord::new(block, discovery));
				(&mut shard.records[idx], true)
			},
		};

		record.touch(thread, word);
		shard.touches += 1;
		discovered
	}

	/// Freezes this table, ordering all records by discovery
	pub fn freeze(self) -> FrozenTable {
		let mut touches = 0;
		let mut records = vec![];
		for shard in self.shards.into_vec() {
			let shard = CachePadded::into_inner(shard).into_inner();
			touches += shard.touches;
			records.extend(shard.records);
		}
		records.sort_unstable_by_key(|record| record.discovery);

		let idxs = records
			.iter()
			.enumerate()
			.map(|(idx, record)| (record.block, idx))
			.collect();

		FrozenTable {
			geometry: self.geometry,
			touches,
			records,
			idxs,
		}
	}

	/// Returns the shard index of `block`
	fn shard_idx(&self, block: BlockId) -> usize {
		// Note: Neighbouring blocks are usually touched together, so we
		//       scramble the id to avoid them all landing on the same shard.
		let hash = block.to_u64().wrapping_mul(0x9e37_79b9_7f4a_7c15);
		(hash >> 32) as usize & (self.shards.len() - 1)
	}
}

/// Shard
#[derive(Debug)]
struct Shard {
	/// Record index, by block
	idxs: HashMap<BlockId, usize>,

	/// All records, in discovery order within this shard
	records: Vec<BlockAccessRecord>,

	/// Touches of blocks in this shard
	touches: u64,
}

impl Shard {
	fn new() -> Self {
		Self {
			idxs:    HashMap::new(),
			records: vec![],
			touches: 0,
		}
	}
}

/// Access record for a block
#[derive(Clone, Debug)]
pub struct BlockAccessRecord {
	/// Block
	block: BlockId,

	/// Discovery index
	discovery: u64,

	/// Word masks, indexed by thread id.
	///
	/// Only grows as far as the largest thread that touched this block.
	/// An empty mask means the thread never touched the block.
	masks: Vec<WordMask>,
}

impl BlockAccessRecord {
	/// Creates an empty record
	fn new(block: BlockId, discovery: u64) -> Self {
		Self {
			block,
			discovery,
			masks: vec![],
		}
	}

	/// Marks `word` as touched by `thread`
	fn touch(&mut self, thread: ThreadId, word: WordIdx) {
		let idx = thread.to_usize();
		if idx >= self.masks.len() {
			self.masks.resize(idx + 1, WordMask::EMPTY);
		}
		self.masks[idx] = self.masks[idx].with(word);
	}

	/// Returns the block of this record
	pub fn block(&self) -> BlockId {
		self.block
	}

	/// Returns the words touched by `thread`
	pub fn mask(&self, thread: ThreadId) -> WordMask {
		self.masks.get(thread.to_usize()).copied().unwrap_or_default()
	}

	/// Returns all threads that touched this block, along with the words they touched
	pub fn threads(&self) -> impl Iterator<Item = (ThreadId, WordMask)> + Clone + '_ {
		self.masks
			.iter()
			.enumerate()
			.filter(|(_, mask)| !mask.is_empty())
			.map(|(idx, &mask)| (ThreadId(idx as u32), mask))
	}

	/// Returns the number of threads that touched this block
	pub fn thread_count(&self) -> usize {
		self.masks.iter().filter(|mask| !mask.is_empty()).count()
	}
}

/// Frozen tracking table.
///
/// Read-only, with all records in discovery order.
#[derive(Clone, Debug)]
pub struct FrozenTable {
	/// Geometry
	geometry: Geometry,

	/// Total touches recorded
	touches: u64,

	/// All records
	records: Vec<BlockAccessRecord>,

	/// Record index, by block
	idxs: HashMap<BlockId, usize>,
}

impl FrozenTable {
	/// Returns the geometry
	pub fn geometry(&self) -> &Geometry {
		&self.geometry
	}

	/// Returns the total number of touches recorded
	pub fn touches(&self) -> u64 {
		self.touches
	}

	/// Returns all records
	pub fn records(&self) -> &[BlockAccessRecord] {
		&self.records
	}

	/// Returns the record of `block`, if it was observed
	pub fn get(&self, block: BlockId) -> Option<&BlockAccessRecord> {
		self.idxs.get(&block).map(|&idx| &self.records[idx])
	}

	/// Returns the number of blocks observed
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Returns if no blocks were observed
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use {super::*, crate::SharingConfig};

	fn table(shards: usize) -> TrackingTable {
		let config = SharingConfig::default();
		let geometry = config.validate().expect("Default config should be valid");
		TrackingTable::new(geometry, config.max_threads, shards)
	}

	fn touch(table: &TrackingTable, thread: u32, addr: u64) -> bool {
		let (block, word) = table.geometry().split(addr);
		table.touch(ThreadId(thread), block, word)
	}

	#[test]
	fn discovers_each_block_once() {
		let table = self::table(4);
		assert!(touch(&table, 0, 0x100));
		assert!(!touch(&table, 1, 0x104));
		assert!(touch(&table, 0, 0x140));
		assert_eq!(table.blocks_discovered(), 2);
		assert_eq!(table.touches(), 3);
	}

	#[test]
	fn touches_are_counted_per_shard() {
		let table = self::table(8);
		for block in 0..64 {
			touch(&table, 0, block * 0x40);
			touch(&table, 1, block * 0x40 + 4);
		}
		assert_eq!(table.touches(), 128);

		// Every shard only counts touches of its own blocks
		let per_shard = table.shards.iter().map(|shard| shard.lock().touches).collect::<Vec<_>>();
		assert!(per_shard.iter().all(|&touches| touches < 128), "Touches landed in a single shard: {per_shard:?}");

		let frozen = table.freeze();
		assert_eq!(frozen.touches(), 128);
		assert_eq!(frozen.len(), 64);
	}

	#[test]
	fn frozen_lookup_by_block() {
		let table = self::table(4);
		let addrs = [0x9000, 0x40, 0x5000];
		for &addr in &addrs {
			touch(&table, 1, addr);
		}

		let frozen = table.freeze();
		for &addr in &addrs {
			let block = BlockId::new(addr >> 6);
			let record = frozen.get(block).expect("Block should be recorded");
			assert_eq!(record.block(), block);
		}
		assert!(frozen.get(BlockId::new(0x1234)).is_none());
	}

	#[test]
	fn masks_accumulate_per_thread() {
		let table = self::table(1);
		touch(&table, 0, 0x100);
		touch(&table, 0, 0x108);
		touch(&table, 2, 0x13c);

		let frozen = table.freeze();
		let record = frozen.get(BlockId::new(0x4)).expect("Block should be recorded");
		assert_eq!(record.mask(ThreadId(0)).bits(), 0b101);
		assert_eq!(record.mask(ThreadId(1)), WordMask::EMPTY);
		assert_eq!(record.mask(ThreadId(2)).bits(), 1 << 15);
		assert_eq!(record.thread_count(), 2);
		assert_eq!(
			record.threads().map(|(thread, _)| thread).collect::<Vec<_>>(),
			[ThreadId(0), ThreadId(2)]
		);
	}

	#[test]
	fn freeze_keeps_discovery_order() {
		let table = self::table(8);
		let addrs = [0x9000, 0x40, 0x5000, 0x80, 0x1_0000];
		for &addr in &addrs {
			touch(&table, 0, addr);
		}

		let frozen = table.freeze();
		let blocks = frozen.records().iter().map(|record| record.block()).collect::<Vec<_>>();
		let expected = addrs.iter().map(|&addr| BlockId::new(addr >> 6)).collect::<Vec<_>>();
		assert_eq!(blocks, expected);
	}

	#[test]
	#[should_panic = "out of range"]
	fn touch_rejects_out_of_range_thread() {
		let table = self::table(1);
		touch(&table, 32, 0x0);
	}
}
