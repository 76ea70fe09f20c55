//! Sharing classifier
//!
//! Labels every block of a frozen tracking table as unshared, truly shared
//! or falsely shared.
//!
//! A block touched by a single thread is unshared. Otherwise, if any two threads
//! touched a common word, the block is truly shared, regardless of how many other
//! thread pairs touched disjoint words. Only when every pair of threads touched
//! disjoint words is the block falsely shared.

// Imports
use {
	crate::{
		report::{BlockSharing, SharingReport},
		table::{BlockAccessRecord, FrozenTable},
	},
	itertools::Itertools,
};

/// Block classification
#[derive(PartialEq, Eq, Clone, Copy, Hash, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Classification {
	/// Touched by a single thread
	Unshared,

	/// At least two threads touched the same word
	TrulyShared,

	/// At least two threads touched the block, all of them on different words
	FalselyShared,
}

/// Which blocks to include details for in a [`SharingReport`]
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
pub enum Details {
	/// No details
	#[default]
	None,

	/// Only falsely shared blocks
	FalselyShared,

	/// Both falsely and truly shared blocks
	Shared,
}

impl Details {
	/// Returns if blocks with `classification` should be detailed
	pub fn includes(self, classification: Classification) -> bool {
		match (self, classification) {
			(_, Classification::Unshared) | (Self::None, _) => false,
			(Self::FalselyShared, classification) => classification == Classification::FalselyShared,
			(Self::Shared, _) => true,
		}
	}
}

/// Classifies a single block
pub fn classify_block(record: &BlockAccessRecord) -> Classification {
	if record.thread_count() <= 1 {
		return Classification::Unshared;
	}

	// Note: `any` stops at the first overlapping pair
	let truly_shared = record
		.threads()
		.tuple_combinations()
		.any(|((_, lhs), (_, rhs))| lhs.overlaps(rhs));

	match truly_shared {
		true => Classification::TrulyShared,
		false => Classification::FalselyShared,
	}
}

/// Counts the thread pairs of a block that overlap and that are disjoint.
///
/// Returns `(overlapping, disjoint)`.
pub fn pair_counts(record: &BlockAccessRecord) -> (usize, usize) {
	record
		.threads()
		.tuple_combinations()
		.fold((0, 0), |(overlapping, disjoint), ((_, lhs), (_, rhs))| {
			match lhs.overlaps(rhs) {
				true => (overlapping + 1, disjoint),
				false => (overlapping, disjoint + 1),
			}
		})
}

/// Classifies all blocks of `table`, producing a report.
///
/// Consumes the table, since classification happens once, after recording stopped.
pub fn classify(table: FrozenTable, details: Details) -> SharingReport {
	let geometry = *table.geometry();
	let mut report = SharingReport::new(geometry.block_size(), geometry.word_size());

	for record in table.records() {
		let classification = self::classify_block(record);
		report.register(classification);

		if details.includes(classification) {
			let (overlapping_pairs, disjoint_pairs) = self::pair_counts(record);
			report.push_details(BlockSharing {
				block: record.block(),
				addrs: geometry.block_range(record.block()),
				classification,
				threads: record.threads().map(|(thread, _)| thread).collect(),
				overlapping_pairs,
				disjoint_pairs,
			});
		}
	}

	let threads_per_shared_block = table
		.records()
		.iter()
		.map(BlockAccessRecord::thread_count)
		.filter(|&threads| threads > 1)
		.map(|threads| threads as f64)
		.collect::<average::Variance>();
	tracing::debug!(
		total = report.total_blocks,
		falsely_shared = report.falsely_shared,
		truly_shared = report.truly_shared,
		"Classified blocks, {:.2} ± {:.2} threads per shared block",
		threads_per_shared_block.mean(),
		threads_per_shared_block.error()
	);

	report
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::{addr::ThreadId, Recorder, SharingConfig},
	};

	/// Records all `(thread, addr)` accesses and freezes the table
	fn table(accesses: &[(u32, u64)]) -> FrozenTable {
		let recorder = Recorder::new(&SharingConfig::default()).expect("Unable to create recorder");
		for &(thread, addr) in accesses {
			recorder.record(ThreadId(thread), addr).expect("Unable to record");
		}
		recorder.freeze()
	}

	fn classify_single(accesses: &[(u32, u64)]) -> Classification {
		let table = self::table(accesses);
		assert_eq!(table.len(), 1, "Expected a single block");
		classify_block(&table.records()[0])
	}

	#[test]
	fn single_thread_is_unshared() {
		let accesses = (0..16).map(|word| (5, word * 4)).collect::<Vec<_>>();
		assert_eq!(classify_single(&accesses), Classification::Unshared);
	}

	#[test]
	fn disjoint_words_are_falsely_shared() {
		assert_eq!(classify_single(&[(0, 0x0), (1, 0x4)]), Classification::FalselyShared);
	}

	#[test]
	fn same_word_is_truly_shared() {
		// Different bytes, same word
		assert_eq!(classify_single(&[(0, 0x0), (1, 0x3)]), Classification::TrulyShared);
	}

	#[test]
	fn any_overlap_dominates() {
		// Threads 0 and 1 share word 0, while 2 and 3 are disjoint from everyone
		let accesses = [(0, 0x0), (1, 0x0), (2, 0x8), (3, 0xc), (0, 0x10)];
		let table = self::table(&accesses);
		let record = &table.records()[0];
		assert_eq!(classify_block(record), Classification::TrulyShared);
		assert_eq!(pair_counts(record), (1, 5));
	}

	#[test]
	fn details_filter() {
		assert!(!Details::None.includes(Classification::FalselyShared));
		assert!(Details::FalselyShared.includes(Classification::FalselyShared));
		assert!(!Details::FalselyShared.includes(Classification::TrulyShared));
		assert!(Details::Shared.includes(Classification::TrulyShared));
		assert!(!Details::Shared.includes(Classification::Unshared));
	}

	#[test]
	fn report_counts() {
		let table = self::table(&[
			// Falsely shared
			(0, 0x0),
			(1, 0x4),
			// Truly shared
			(0, 0x40),
			(1, 0x40),
			// Unshared
			(2, 0x80),
		]);
		let report = classify(table, Details::Shared);
		assert_eq!(report.total_blocks, 3);
		assert_eq!(report.falsely_shared, 1);
		assert_eq!(report.truly_shared, 1);
		assert_eq!(report.unshared, 1);
		assert_eq!(report.details.len(), 2);
		assert_eq!(report.details[0].classification, Classification::FalselyShared);
		assert_eq!(report.details[0].addrs, 0x0..=0x3f);
		assert_eq!(report.details[1].classification, Classification::TrulyShared);
	}
}
