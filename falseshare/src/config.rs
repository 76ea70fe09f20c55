//! Configuration

// Imports
use crate::{addr::Geometry, error::ConfigError};

/// Configuration
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
	/// Trace skip
	pub trace_skip: usize,

	/// Debug output period (in seconds)
	pub debug_output_period_secs: f64,

	/// Worker threads used to replay the trace
	pub jobs: usize,

	/// Sharing configuration
	pub sharing: SharingConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			trace_skip:               0,
			debug_output_period_secs: 1.0,
			jobs:                     1,
			sharing:                  SharingConfig::default(),
		}
	}
}

/// Sharing configuration
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SharingConfig {
	/// Block size, in bytes
	pub block_size: usize,

	/// Word size, in bytes
	pub word_size: usize,

	/// Maximum number of threads.
	///
	/// Thread ids must be within `0..max_threads`.
	pub max_threads: usize,

	/// Number of shards in the tracking table
	pub shards: usize,
}

impl SharingConfig {
	/// Validates this configuration, returning its block geometry
	///
	/// # Errors
	/// Returns an error if any field is invalid.
	pub fn validate(&self) -> Result<Geometry, ConfigError> {
		if self.max_threads == 0 {
			return Err(ConfigError::ZeroMaxThreads);
		}
		if !self.shards.is_power_of_two() {
			return Err(ConfigError::ShardsNotPowerOfTwo(self.shards));
		}

		Geometry::new(self)
	}
}

impl Default for SharingConfig {
	fn default() -> Self {
		Self {
			block_size:  64,
			word_size:   4,
			max_threads: 32,
			shards:      64,
		}
	}
}
