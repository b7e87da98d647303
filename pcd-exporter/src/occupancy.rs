use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use byteorder::{ByteOrder as _, LittleEndian};
use half::f16;
use pcd_core::pointcloud::{
    decimation::decimator::{PointCloudDecimator, VoxelDecimator},
    point::{BoundingVolume, SegmentedPointCloud, OCCUPANCY_RANGE},
};

use crate::error::ExportError;

/// Destination of an aggregated, labeled sweep.
pub trait OccupancySink {
    /// Persists `cloud` under `file_name` and returns the number of points written.
    fn write(&mut self, file_name: &str, cloud: &SegmentedPointCloud) -> Result<usize, ExportError>;
}

/// Writes voxel-reduced clouds as float16 `[x, y, z, intensity, label]` records.
pub struct OccupancyFileWriter {
    pub output_dir: PathBuf,
    pub voxel_size: f64,
    pub clip: BoundingVolume,
}

impl OccupancyFileWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            voxel_size: 0.2,
            clip: OCCUPANCY_RANGE,
        }
    }

    /// Voxel reduction followed by the second clip.
    pub fn reduce(&self, cloud: &SegmentedPointCloud) -> SegmentedPointCloud {
        let decimator = VoxelDecimator {
            voxel_size: self.voxel_size,
        };
        decimator.decimate_segmented(cloud).clip(&self.clip)
    }
}

impl OccupancySink for OccupancyFileWriter {
    fn write(&mut self, file_name: &str, cloud: &SegmentedPointCloud) -> Result<usize, ExportError> {
        check_channels(cloud)?;
        let reduced = self.reduce(cloud);

        fs::create_dir_all(&self.output_dir).map_err(|source| ExportError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        let path = self.output_dir.join(file_name);
        write_f16_records(&path, &reduced).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

        log::debug!(
            "wrote {} of {} points to {:?}",
            reduced.len(),
            cloud.len(),
            path
        );
        Ok(reduced.len())
    }
}

/// Intensity shares the float16 record with the label and must fit the 0..=255 encoding.
fn check_channels(cloud: &SegmentedPointCloud) -> Result<(), ExportError> {
    match cloud
        .points()
        .iter()
        .position(|p| !p.intensity.is_finite() || !(0.0..=255.0).contains(&p.intensity))
    {
        Some(index) => Err(ExportError::ChannelOutOfRange {
            index,
            value: cloud.points()[index].intensity,
        }),
        None => Ok(()),
    }
}

const RECORD_CHANNELS: usize = 5;
const BYTE_STRIDE: usize = RECORD_CHANNELS * 2;

fn write_f16_records(path: &Path, cloud: &SegmentedPointCloud) -> std::io::Result<()> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    let mut buffer = [0u8; BYTE_STRIDE];

    for (point, label) in cloud.iter() {
        let record = [
            f16::from_f64(point.x),
            f16::from_f64(point.y),
            f16::from_f64(point.z),
            f16::from_f32(point.intensity),
            f16::from_f32(label as f32),
        ];
        LittleEndian::write_u16_into(&record.map(f16::to_bits), &mut buffer);
        writer.write_all(&buffer)?;
    }

    writer.flush()
}
