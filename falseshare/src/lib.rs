//! False sharing detector (`falseshare`)
//!
//! Records which words of each cache block every thread touches, then classifies
//! each block as unshared, truly shared or falsely shared.

// Modules
pub mod addr;
pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod recorder;
pub mod report;
pub mod sharing_trace;
pub mod sim;
pub mod table;

// Exports
pub use self::{
	addr::{BlockId, Geometry, ThreadId, WordIdx, WordMask},
	classifier::{classify, Classification, Details},
	config::{Config, SharingConfig},
	error::{ConfigError, RecordError},
	recorder::Recorder,
	report::{BlockSharing, SharingReport},
	sharing_trace::{SharingTraceReader, SharingTraceWriter},
	sim::Simulator,
	table::{BlockAccessRecord, FrozenTable, TrackingTable},
};
