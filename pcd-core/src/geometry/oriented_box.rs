use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use rayon::prelude::*;

use crate::pointcloud::point::{Point, PointCloud};

/// 3D box with an arbitrary orientation.
///
/// `size` is `[width, length, height]`: length runs along the box's local x axis,
/// width along y and height along z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Vector3<f64>,
    pub size: [f64; 3],
    pub orientation: UnitQuaternion<f64>,
}

impl OrientedBox {
    pub fn new(center: Vector3<f64>, size: [f64; 3], orientation: UnitQuaternion<f64>) -> Self {
        Self {
            center,
            size,
            orientation,
        }
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.orientation.to_rotation_matrix().into_inner()
    }

    /// Membership test with inclusive faces.
    pub fn contains(&self, point: &Point) -> bool {
        let local = self
            .orientation
            .inverse_transform_vector(&(Vector3::new(point.x, point.y, point.z) - self.center));
        let [width, length, height] = self.size;
        local.x.abs() <= length / 2.0
            && local.y.abs() <= width / 2.0
            && local.z.abs() <= height / 2.0
    }

    pub fn mask(&self, cloud: &PointCloud) -> Vec<bool> {
        cloud.points.par_iter().map(|p| self.contains(p)).collect()
    }

    pub fn translate(&mut self, delta: &Vector3<f64>) {
        self.center += delta;
    }

    /// Rotates the box about the origin.
    pub fn rotate(&mut self, rotation: &UnitQuaternion<f64>) {
        self.center = rotation * self.center;
        self.orientation = rotation * self.orientation;
    }
}
