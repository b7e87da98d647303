use std::{fs, path::Path};

use byteorder::{ByteOrder as _, LittleEndian};
use pcd_core::pointcloud::point::{Point, PointCloud};

use crate::error::DatasetError;

/// Reader for raw `.pcd.bin` sweeps: little-endian `f32` records of
/// `x, y, z, intensity, ring_index`. Only the first four channels are kept.
#[derive(Debug, Clone, Copy)]
pub struct LidarBinReader {
    pub channels: usize,
}

impl Default for LidarBinReader {
    fn default() -> Self {
        Self { channels: 5 }
    }
}

impl LidarBinReader {
    pub fn read(&self, path: &Path) -> Result<PointCloud, DatasetError> {
        let bytes = fs::read(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(path, &bytes)
    }

    fn parse(&self, path: &Path, bytes: &[u8]) -> Result<PointCloud, DatasetError> {
        let record_size = self.channels * 4;
        if self.channels < 4 || bytes.len() % record_size != 0 {
            return Err(DatasetError::MalformedPointFile {
                path: path.to_path_buf(),
                len: bytes.len(),
                record_size,
            });
        }

        let points = bytes
            .chunks_exact(record_size)
            .map(|record| {
                let mut values = [0f32; 4];
                LittleEndian::read_f32_into(&record[..16], &mut values);
                Point {
                    x: values[0] as f64,
                    y: values[1] as f64,
                    z: values[2] as f64,
                    intensity: values[3],
                }
            })
            .collect();
        Ok(PointCloud::new(points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn encode(records: &[[f32; 5]]) -> Vec<u8> {
        let mut bytes = vec![0u8; records.len() * 20];
        for (chunk, record) in bytes.chunks_exact_mut(20).zip(records) {
            LittleEndian::write_f32_into(record, chunk);
        }
        bytes
    }

    #[test]
    fn test_read_keeps_four_channels() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&encode(&[
            [1.5, -2.0, 0.25, 17.0, 3.0],
            [10.0, 20.0, -1.0, 255.0, 31.0],
        ]))
        .unwrap();

        let cloud = LidarBinReader::default().read(file.path()).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points[0], Point::new(1.5, -2.0, 0.25, 17.0));
        assert_eq!(cloud.points[1].intensity, 255.0);
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let mut bytes = encode(&[[0.0; 5]]);
        bytes.extend_from_slice(&[0, 0, 0]);
        let result = LidarBinReader::default().parse(Path::new("broken.pcd.bin"), &bytes);
        assert!(matches!(
            result,
            Err(DatasetError::MalformedPointFile {
                len: 23,
                record_size: 20,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let result = LidarBinReader::default().read(Path::new("/nonexistent/sweep.pcd.bin"));
        assert!(matches!(result, Err(DatasetError::Io { .. })));
    }
}
