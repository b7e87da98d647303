pub mod error;
pub mod nuscenes;
pub mod reader;

pub use error::DatasetError;
pub use nuscenes::{Dataset, NuScenes, ObjectBox};
