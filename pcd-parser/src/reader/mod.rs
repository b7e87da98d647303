pub mod label;
pub mod lidar;

pub use label::read_lidarseg_labels;
pub use lidar::LidarBinReader;
