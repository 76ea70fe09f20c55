//! Output data

// Imports
use {
	crate::{config::SharingConfig, report::SharingReport},
	std::ops::Range,
};

/// Output data
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Data {
	pub time_span: Option<Range<u64>>,
	pub records:   RecordsData,
	pub sharing:   SharingConfig,
	pub report:    SharingReport,
}

/// Records output data
#[derive(Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct RecordsData {
	pub read:     u64,
	pub recorded: u64,
}
