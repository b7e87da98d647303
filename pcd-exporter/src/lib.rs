pub mod error;
pub mod occupancy;

pub use error::ExportError;
pub use occupancy::{OccupancyFileWriter, OccupancySink};
