//! Rigid-body operations on point clouds.
//!
//! Only the spatial coordinates are touched; extra channels are carried over as is.

use nalgebra::{Isometry3, Matrix3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rayon::prelude::*;

use crate::pointcloud::point::{Point, PointCloud};

/// Applies `R * p + t` to every point, or `R^T * (p - t)` when `inverse` is set.
pub fn transform(
    cloud: &PointCloud,
    rotation: &Matrix3<f64>,
    translation: &Vector3<f64>,
    inverse: bool,
) -> PointCloud {
    let rotation_t = rotation.transpose();
    map_points(cloud, |p| {
        if inverse {
            rotation_t * (p - translation)
        } else {
            rotation * p + translation
        }
    })
}

/// Rotates every point by `rotation` about `center`.
pub fn rotate(cloud: &PointCloud, rotation: &Matrix3<f64>, center: &Vector3<f64>) -> PointCloud {
    map_points(cloud, |p| rotation * (p - center) + center)
}

pub fn translate(cloud: &PointCloud, delta: &Vector3<f64>) -> PointCloud {
    map_points(cloud, |p| p + delta)
}

fn map_points<F>(cloud: &PointCloud, f: F) -> PointCloud
where
    F: Fn(Vector3<f64>) -> Vector3<f64> + Sync,
{
    let points = cloud
        .points
        .par_iter()
        .map(|point| {
            let moved = f(Vector3::new(point.x, point.y, point.z));
            Point {
                x: moved.x,
                y: moved.y,
                z: moved.z,
                intensity: point.intensity,
            }
        })
        .collect();
    PointCloud::new(points)
}

/// A rotation + translation pair as stored in calibration and ego pose records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Builds a pose from a `[w, x, y, z]` quaternion and a translation.
    pub fn from_wxyz(rotation: [f64; 4], translation: [f64; 3]) -> Self {
        let [w, x, y, z] = rotation;
        Self {
            rotation: UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
            translation: Vector3::from(translation),
        }
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }
}

/// Calibration (sensor -> ego) and ego pose (ego -> global) of one sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePose {
    pub calibration: Pose,
    pub ego: Pose,
}
