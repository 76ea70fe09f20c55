//! Arguments

// Imports
use std::path::PathBuf;

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
pub struct Args {
	/// Log file
	///
	/// Specifies a file to perform verbose logging to.
	/// You can use `RUST_LOG_FILE` to set filtering options
	#[clap(long = "log-file")]
	pub log_file: Option<PathBuf>,

	/// Whether to append to the log file
	#[clap(long = "log-file-append")]
	pub log_file_append: bool,

	/// Trace file
	pub trace_file: PathBuf,

	/// Config file
	///
	/// Uses the default configuration if not given
	#[clap(long = "config")]
	pub config_file: Option<PathBuf>,

	/// Output file
	///
	/// Writes the report, along with run information, as json
	#[clap(long = "output")]
	pub output_file: Option<PathBuf>,

	/// Report file
	///
	/// Writes the text report to this file instead of stdout
	#[clap(short = 'o', long = "report")]
	pub report_file: Option<PathBuf>,

	/// Blocks to include details for
	#[clap(long = "details", value_enum, num_args = 0..=1, default_missing_value = "falsely-shared")]
	pub details: Option<Details>,

	/// Worker threads
	///
	/// Overrides the config file
	#[clap(short = 'j', long = "jobs")]
	pub jobs: Option<usize>,
}

/// Details
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(clap::ValueEnum)]
pub enum Details {
	/// Falsely shared blocks
	FalselyShared,

	/// Falsely and truly shared blocks
	Shared,
}
