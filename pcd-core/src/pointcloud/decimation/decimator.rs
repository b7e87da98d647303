use std::collections::HashMap;

use crate::pointcloud::point::{Point, SegmentedPointCloud};

pub trait PointCloudDecimator {
    /// Indices of the points that survive, in ascending order.
    fn decimate(&self, points: &[Point]) -> Vec<usize>;

    fn decimate_segmented(&self, cloud: &SegmentedPointCloud) -> SegmentedPointCloud {
        let indices = self.decimate(cloud.points());
        cloud.select_indices(&indices)
    }
}

/// Keeps one representative per voxel: the point closest to the voxel center.
/// Labels travel with the chosen point, so they stay valid class ids.
pub struct VoxelDecimator {
    pub voxel_size: f64,
}

impl PointCloudDecimator for VoxelDecimator {
    fn decimate(&self, points: &[Point]) -> Vec<usize> {
        let voxel_size = self.voxel_size;
        let mut cells: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();

        for (i, point) in points.iter().enumerate() {
            let index = self.get_voxel_index(point, voxel_size);
            cells.entry(index).or_default().push(i);
        }

        let mut decimated: Vec<usize> = cells
            .into_iter()
            .filter_map(|(index, cell_points)| {
                let voxel_center = self.get_voxel_center(index, voxel_size);
                self.select_closest_point(points, cell_points, voxel_center)
            })
            .collect();
        decimated.sort_unstable();
        decimated
    }
}

impl VoxelDecimator {
    fn get_voxel_index(&self, point: &Point, voxel_size: f64) -> (i64, i64, i64) {
        let x_idx = (point.x / voxel_size).floor() as i64;
        let y_idx = (point.y / voxel_size).floor() as i64;
        let z_idx = (point.z / voxel_size).floor() as i64;
        (x_idx, y_idx, z_idx)
    }

    fn get_voxel_center(&self, index: (i64, i64, i64), voxel_size: f64) -> (f64, f64, f64) {
        let (x_idx, y_idx, z_idx) = index;
        (
            (x_idx as f64 + 0.5) * voxel_size,
            (y_idx as f64 + 0.5) * voxel_size,
            (z_idx as f64 + 0.5) * voxel_size,
        )
    }

    fn select_closest_point(
        &self,
        points: &[Point],
        cell_points: Vec<usize>,
        voxel_center: (f64, f64, f64),
    ) -> Option<usize> {
        // ties go to the earliest index so the output does not depend on hash order
        cell_points.into_iter().min_by(|&a, &b| {
            let dist_a = self.squared_distance(&points[a], voxel_center);
            let dist_b = self.squared_distance(&points[b], voxel_center);
            dist_a
                .partial_cmp(&dist_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        })
    }

    fn squared_distance(&self, a: &Point, b: (f64, f64, f64)) -> f64 {
        (a.x - b.0).powi(2) + (a.y - b.1).powi(2) + (a.z - b.2).powi(2)
    }
}
