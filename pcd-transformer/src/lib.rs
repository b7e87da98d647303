pub mod aggregator;
pub mod dynamic;
pub mod error;
pub mod frame;
pub mod label;
pub mod labels;
pub mod runner;
pub mod static_bg;

#[cfg(test)]
pub(crate) mod test_utils;

pub use aggregator::{AggregateStats, AggregatorConfig, FrameWindowAggregator};
pub use error::AlignError;
pub use frame::{FrameInfo, NearSensorFilter, TrackedBox};
pub use runner::{RunSummary, SequenceRunner};
pub use static_bg::StaticCache;
