//! False sharing detector (`falseshare`)

// Modules
mod args;

// Imports
use {
	self::args::Args,
	anyhow::Context,
	clap::Parser,
	falseshare::{classifier, data, Config, Recorder, SharingTraceReader, Simulator},
	falseshare_util::logger,
	std::{
		fs,
		io::{self, Write},
		time::Duration,
	},
};

fn main() -> Result<(), anyhow::Error> {
	// Get arguments
	let args = Args::parse();
	logger::pre_init::debug(format!("Args: {args:?}"));

	// Initialize logging
	logger::init(args.log_file.as_deref(), args.log_file_append);

	// Read the config file
	let mut config = match &args.config_file {
		Some(config_file) => {
			let config_file = fs::File::open(config_file).context("Unable to open config file")?;
			serde_json::from_reader::<_, Config>(config_file).context("Unable to parse config file")?
		},
		None => Config::default(),
	};
	if let Some(jobs) = args.jobs {
		config.jobs = jobs;
	}
	tracing::debug!(?config, "Using config");

	// Read the trace file
	let trace_file = fs::File::open(&args.trace_file).context("Unable to open trace file")?;
	let mut trace_reader =
		SharingTraceReader::from_reader(io::BufReader::new(trace_file)).context("Unable to parse sharing trace")?;
	tracing::trace!(target: "falseshare::parse_sharing_trace", ?trace_reader, "Parsed sharing trace");

	let trace_block_size = trace_reader.header().block_size;
	if trace_block_size != 0 && trace_block_size as usize != config.sharing.block_size {
		tracing::warn!(
			"Trace was recorded with {trace_block_size}-byte blocks, but detecting with {}-byte blocks",
			config.sharing.block_size
		);
	}

	// Run the simulator
	let recorder = Recorder::new(&config.sharing).context("Invalid sharing configuration")?;
	let mut sim = Simulator::new(
		config.trace_skip,
		Duration::from_secs_f64(config.debug_output_period_secs),
		config.jobs,
	);
	let run_output = sim
		.run(&mut trace_reader, &recorder)
		.context("Unable to run simulator")?;

	// Then classify all blocks
	let details = match args.details {
		Some(args::Details::FalselyShared) => classifier::Details::FalselyShared,
		Some(args::Details::Shared) => classifier::Details::Shared,
		None => classifier::Details::None,
	};
	let report = classifier::classify(recorder.freeze(), details);

	match &args.report_file {
		Some(report_path) => {
			let mut report_file = fs::File::create(report_path).context("Unable to create report file")?;
			write!(report_file, "{report}").context("Unable to write report")?;
		},
		None => print!("{report}"),
	}

	if let Some(output_path) = &args.output_file {
		let data = data::Data {
			time_span: run_output.time_span,
			records:   data::RecordsData {
				read:     run_output.records_read,
				recorded: run_output.records_handled,
			},
			sharing:   config.sharing,
			report,
		};

		let output_file = fs::File::create(output_path).context("Unable to create output file")?;
		serde_json::to_writer_pretty(output_file, &data).context("Unable to write to output file")?;
	}

	Ok(())
}
