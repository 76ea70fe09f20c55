//! Generates synthetic sharing traces.
//!
//! Each thread walks a shared array of blocks, touching words according to
//! the chosen pattern, with all threads' accesses randomly interleaved.

// Imports
use {
	anyhow::Context,
	clap::Parser,
	falseshare::{
		sharing_trace::{Record, RecordAccessKind},
		SharingTraceWriter,
		ThreadId,
	},
	rand::{seq::SliceRandom, Rng},
	std::{fs, io::BufWriter, path::PathBuf},
};

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
struct Args {
	/// Output trace file
	#[clap(short = 'o', long = "output", default_value = "output.trace")]
	output_file: PathBuf,

	/// Access pattern
	#[clap(long = "pattern", value_enum, default_value_t = Pattern::Mixed)]
	pattern: Pattern,

	/// Threads
	#[clap(long = "threads", default_value_t = 4)]
	threads: u32,

	/// Blocks
	#[clap(long = "blocks", default_value_t = 128)]
	blocks: u64,

	/// Accesses per thread
	#[clap(long = "accesses", default_value_t = 10_000)]
	accesses: usize,

	/// Base address
	#[clap(long = "base", default_value_t = 0x7f00_0000_0000)]
	base: u64,
}

/// Access pattern
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(clap::ValueEnum)]
enum Pattern {
	/// Each thread touches its own word of every block
	False,

	/// All threads touch the same word of every block
	True,

	/// Each thread touches only its own blocks
	Private,

	/// Each block randomly uses one of the other patterns
	Mixed,
}

/// Block size
const BLOCK_SIZE: u64 = 64;

/// Word size
const WORD_SIZE: u64 = 4;

fn main() -> Result<(), anyhow::Error> {
	let args = Args::parse();
	anyhow::ensure!(args.threads > 0, "At least 1 thread is required");
	anyhow::ensure!(args.blocks > 0, "At least 1 block is required");
	anyhow::ensure!(
		u64::from(args.threads) <= BLOCK_SIZE / WORD_SIZE,
		"At most {} threads fit into a block with distinct words",
		BLOCK_SIZE / WORD_SIZE
	);

	let mut rng = rand::thread_rng();

	// Choose the pattern of each block
	let block_patterns = (0..args.blocks)
		.map(|_| match args.pattern {
			Pattern::Mixed => *[Pattern::False, Pattern::True, Pattern::Private]
				.choose(&mut rng)
				.expect("Patterns are non-empty"),
			pattern => pattern,
		})
		.collect::<Vec<_>>();

	// Then build all accesses of every thread
	let mut accesses = (0..args.threads)
		.flat_map(|thread| std::iter::repeat(thread).take(args.accesses))
		.map(|thread| {
			let block = rng.gen_range(0..args.blocks);
			let word = match block_patterns[block as usize] {
				Pattern::False => u64::from(thread),
				Pattern::True => 0,
				Pattern::Private | Pattern::Mixed => rng.gen_range(0..BLOCK_SIZE / WORD_SIZE),
			};

			// Note: Private blocks are only ever touched by their owner
			let thread = match block_patterns[block as usize] {
				Pattern::Private => (block % u64::from(args.threads)) as u32,
				_ => thread,
			};

			let addr = args.base + block * BLOCK_SIZE + word * WORD_SIZE + rng.gen_range(0..WORD_SIZE);
			(thread, addr)
		})
		.collect::<Vec<_>>();
	accesses.shuffle(&mut rng);

	// Finally write them
	let file = fs::File::create(&args.output_file).context("Unable to create output file")?;
	let mut writer =
		SharingTraceWriter::new(BufWriter::new(file), BLOCK_SIZE as u32).context("Unable to create trace writer")?;
	for (time, (thread, addr)) in accesses.into_iter().enumerate() {
		let record = Record {
			time: time as u64,
			addr,
			thread: ThreadId(thread),
			kind: match rng.gen_bool(0.5) {
				true => RecordAccessKind::Read,
				false => RecordAccessKind::Write,
			},
		};
		writer.write(&record).context("Unable to write record")?;
	}
	writer.finish().context("Unable to finish writing trace")?;

	Ok(())
}
