//! Simulator

// Imports
use {
	crate::{
		error::RecordError,
		sharing_trace::{Record, SharingTraceReader},
		Recorder,
	},
	anyhow::Context,
	crossbeam::channel,
	std::{
		io,
		ops::Range,
		thread,
		time::{Duration, Instant},
	},
};

/// Records sent to a worker at once
const BATCH_LEN: usize = 4096;

/// Batches that may be queued for each worker
const WORKER_QUEUE_LEN: usize = 16;

/// Simulator.
///
/// Replays a sharing trace into a [`Recorder`], as the instrumentation harness would.
#[derive(Debug)]
pub struct Simulator {
	/// Trace skip
	///
	/// Dictates how many records are skipped for each trace.
	/// A value of 0 implies that the recorder receives all records,
	/// while a value of 1 implies it receives every other record.
	trace_skip: usize,

	/// Debug output period
	///
	/// Interval in which to output debug output for the recorder
	debug_output_period: Duration,

	/// Worker threads.
	///
	/// With more than 1 worker, records are split between the workers by thread,
	/// so each thread's records are still recorded in order.
	jobs: usize,
}

impl Simulator {
	/// Creates a new simulator
	pub fn new(trace_skip: usize, debug_output_period: Duration, jobs: usize) -> Self {
		Self {
			trace_skip,
			debug_output_period,
			jobs,
		}
	}

	/// Runs the simulator on all records from `reader`, recording them into `recorder`
	pub fn run(
		&mut self,
		reader: &mut SharingTraceReader<impl io::Read + io::Seek>,
		recorder: &Recorder,
	) -> Result<RunOutput, anyhow::Error> {
		match self.jobs {
			0 | 1 => self.replay(reader, recorder, |record| {
				self::handle_record(recorder, &record).context("Unable to record access")
			}),
			jobs => thread::scope(|scope| self.replay_parallel(scope, jobs, reader, recorder)),
		}
	}

	/// Replays all records with `jobs` worker threads
	fn replay_parallel<'scope, 'env>(
		&self,
		scope: &'scope thread::Scope<'scope, 'env>,
		jobs: usize,
		reader: &mut SharingTraceReader<impl io::Read + io::Seek>,
		recorder: &'env Recorder,
	) -> Result<RunOutput, anyhow::Error> {
		// Spawn all workers
		let (senders, workers): (Vec<_>, Vec<_>) = (0..jobs)
			.map(|worker_idx| -> Result<_, anyhow::Error> {
				let (sender, receiver) = channel::bounded::<Vec<Record>>(WORKER_QUEUE_LEN);
				let worker = thread::Builder::new()
					.name(format!("replay-{worker_idx}"))
					.spawn_scoped(scope, move || -> Result<(), RecordError> {
						for batch in receiver {
							for record in &batch {
								self::handle_record(recorder, record)?;
							}
						}

						Ok(())
					})
					.context("Unable to spawn worker")?;

				Ok((sender, worker))
			})
			.collect::<Result<Vec<_>, _>>()?
			.into_iter()
			.unzip();

		// Then dispatch each record to the worker of its thread
		let mut batches = vec![Vec::with_capacity(BATCH_LEN); jobs];
		let replay_res = self.replay(reader, recorder, |record| {
			let worker_idx = record.thread.to_usize() % jobs;
			let batch = &mut batches[worker_idx];
			batch.push(record);
			if batch.len() >= BATCH_LEN {
				let batch = std::mem::replace(batch, Vec::with_capacity(BATCH_LEN));
				senders[worker_idx]
					.send(batch)
					.map_err(|_| anyhow::anyhow!("Worker {worker_idx} stopped early"))?;
			}

			Ok(())
		});

		// Flush any partial batches
		// Note: Workers that stopped early will report their own error below.
		if replay_res.is_ok() {
			for (sender, batch) in senders.iter().zip(batches) {
				if !batch.is_empty() {
					let _ = sender.send(batch);
				}
			}
		}
		drop(senders);

		// Finally wait for all workers.
		// Note: Worker errors are checked first, since they're usually why the replay failed.
		for (worker_idx, worker) in workers.into_iter().enumerate() {
			worker
				.join()
				.map_err(|_| anyhow::anyhow!("Worker {worker_idx} panicked"))?
				.with_context(|| format!("Worker {worker_idx} was unable to record access"))?;
		}

		replay_res
	}

	/// Reads all records from `reader`, passing every non-skipped one to `handle`
	fn replay(
		&self,
		reader: &mut SharingTraceReader<impl io::Read + io::Seek>,
		recorder: &Recorder,
		mut handle: impl FnMut(Record) -> Result<(), anyhow::Error>,
	) -> Result<RunOutput, anyhow::Error> {
		// Note: We start in the past so that we output right away at the start
		let mut last_debug_time = Instant::now()
			.checked_sub(self.debug_output_period)
			.unwrap_or_else(Instant::now);

		// Create the record iterator
		let total_records = reader.records_remaining();
		let record_it = std::iter::from_fn(|| reader.read_next().transpose());

		// Go through all records
		let mut records_read = 0;
		let mut records_handled = 0;
		let mut time_span = None::<Range<u64>>;
		for (record_idx, record_res) in record_it.enumerate() {
			let record = record_res.context("Unable to read next record")?;
			records_read += 1;
			if record_idx % (self.trace_skip + 1) != 0 {
				continue;
			}

			// Note: Records from different threads aren't necessarily ordered by time
			time_span = Some(match time_span {
				Some(span) => span.start.min(record.time)..span.end.max(record.time.saturating_add(1)),
				None => record.time..record.time.saturating_add(1),
			});

			handle(record)?;
			records_handled += 1;

			// Then show debug output, if it's been long enough
			let cur_time = Instant::now();
			if cur_time.duration_since(last_debug_time) >= self.debug_output_period {
				let records_processed_percentage = 100.0 * (record_idx as f64 / total_records as f64);
				tracing::info!(
					"[{records_processed_percentage:.2}%] Debug: {}",
					falseshare_util::DisplayWrapper::new(|f| recorder.fmt_debug(f))
				);
				last_debug_time = cur_time
			}
		}

		Ok(RunOutput {
			records_read,
			records_handled,
			time_span,
		})
	}
}

/// Records a single trace record
fn handle_record(recorder: &Recorder, record: &Record) -> Result<(), RecordError> {
	recorder.on_memory_access(record.thread, record.addr, record.kind.is_read(), record.kind.is_write())
}

/// Output for [`Simulator::run`]
#[derive(Clone, Debug)]
pub struct RunOutput {
	/// Records read from the trace
	pub records_read: u64,

	/// Records passed to the recorder
	pub records_handled: u64,

	/// Time span
	pub time_span: Option<Range<u64>>,
}
