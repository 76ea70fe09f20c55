//! Concurrent recording

// Imports
use {
	falseshare::{BlockId, Classification, Details, Recorder, SharingConfig, ThreadId},
	std::thread,
};

#[test]
fn threads_on_disjoint_words() {
	const THREADS: u32 = 8;
	const BLOCKS: u64 = 512;

	let recorder = Recorder::new(&SharingConfig::default()).expect("Unable to create recorder");
	thread::scope(|scope| {
		for thread in 0..THREADS {
			let recorder = &recorder;
			scope.spawn(move || {
				// Each thread touches its own word of every block, a few times over
				for _ in 0..4 {
					for block in 0..BLOCKS {
						let addr = block * 64 + u64::from(thread) * 4;
						recorder.record(ThreadId(thread), addr).expect("Unable to record");
					}
				}
			});
		}
	});

	assert_eq!(recorder.accesses(), 4 * BLOCKS * u64::from(THREADS));
	let report = falseshare::classify(recorder.freeze(), Details::FalselyShared);
	assert_eq!(report.total_blocks, BLOCKS as usize);
	assert_eq!(report.falsely_shared, BLOCKS as usize);
	assert!(report
		.details
		.iter()
		.all(|block| block.threads.len() == THREADS as usize));
}

#[test]
fn threads_contending_on_one_block() {
	const THREADS: u32 = 16;

	let recorder = Recorder::new(&SharingConfig::default()).expect("Unable to create recorder");
	thread::scope(|scope| {
		for thread in 0..THREADS {
			let recorder = &recorder;
			scope.spawn(move || {
				for _ in 0..1000 {
					recorder
						.record(ThreadId(thread), 0x4000 + u64::from(thread) * 4)
						.expect("Unable to record");
				}
			});
		}
	});

	let table = recorder.freeze();
	assert_eq!(table.touches(), 1000 * u64::from(THREADS));
	let record = table.get(BlockId::new(0x4000 >> 6)).expect("Block should be recorded");
	assert_eq!(record.thread_count(), THREADS as usize);
	for thread in 0..THREADS {
		assert_eq!(record.mask(ThreadId(thread)).bits(), 1 << thread);
	}
	assert_eq!(falseshare::classifier::classify_block(record), Classification::FalselyShared);
}

#[test]
fn independent_recorders() {
	let lhs = Recorder::new(&SharingConfig::default()).expect("Unable to create recorder");
	let rhs = Recorder::new(&SharingConfig::default()).expect("Unable to create recorder");

	lhs.record(ThreadId(0), 0x0).expect("Unable to record");
	lhs.record(ThreadId(1), 0x4).expect("Unable to record");
	rhs.record(ThreadId(0), 0x0).expect("Unable to record");

	let lhs = falseshare::classify(lhs.freeze(), Details::None);
	let rhs = falseshare::classify(rhs.freeze(), Details::None);
	assert_eq!(lhs.falsely_shared, 1);
	assert_eq!(rhs.falsely_shared, 0);
	assert_eq!(rhs.unshared, 1);
}
