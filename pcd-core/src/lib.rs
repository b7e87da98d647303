pub mod geometry;
pub mod pointcloud;
