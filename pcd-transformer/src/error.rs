use pcd_core::pointcloud::point::PointCloudError;
use pcd_exporter::ExportError;
use pcd_parser::DatasetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    PointCloud(#[from] PointCloudError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("sweep {0} carries no lidarseg labels")]
    Unlabeled(String),
}
