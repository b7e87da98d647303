//! Records of the nuScenes JSON tables, restricted to the fields the converter reads.

use pcd_core::geometry::Pose;
use serde::Deserialize;

use super::token::*;

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    pub token: SceneToken,
    pub name: String,
    pub first_sample_token: SampleToken,
    pub last_sample_token: SampleToken,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sample {
    pub token: SampleToken,
    pub timestamp: u64,
    pub scene_token: SceneToken,
    #[serde(deserialize_with = "optional_link")]
    pub prev: Option<SampleToken>,
    #[serde(deserialize_with = "optional_link")]
    pub next: Option<SampleToken>,
    /// Keyframe LIDAR_TOP capture, filled in while indexing.
    #[serde(skip)]
    pub lidar_token: Option<SampleDataToken>,
    /// Annotations of this sample in table order, filled in while indexing.
    #[serde(skip)]
    pub anns: Vec<AnnotationToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleData {
    pub token: SampleDataToken,
    pub sample_token: SampleToken,
    pub ego_pose_token: EgoPoseToken,
    pub calibrated_sensor_token: CalibratedSensorToken,
    pub filename: String,
    pub timestamp: u64,
    pub is_key_frame: bool,
    #[serde(deserialize_with = "optional_link")]
    pub prev: Option<SampleDataToken>,
    #[serde(deserialize_with = "optional_link")]
    pub next: Option<SampleDataToken>,
}

impl SampleData {
    /// Base name of the point file, e.g. `n008-..__LIDAR_TOP__1532402927647951.pcd.bin`.
    pub fn file_name(&self) -> &str {
        self.filename
            .rsplit('/')
            .next()
            .unwrap_or(self.filename.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EgoPose {
    pub token: EgoPoseToken,
    pub timestamp: u64,
    pub translation: [f64; 3],
    /// Quaternion as `[w, x, y, z]`.
    pub rotation: [f64; 4],
}

impl EgoPose {
    pub fn pose(&self) -> Pose {
        Pose::from_wxyz(self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalibratedSensor {
    pub token: CalibratedSensorToken,
    pub sensor_token: SensorToken,
    pub translation: [f64; 3],
    pub rotation: [f64; 4],
}

impl CalibratedSensor {
    pub fn pose(&self) -> Pose {
        Pose::from_wxyz(self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sensor {
    pub token: SensorToken,
    pub channel: String,
    pub modality: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleAnnotation {
    pub token: AnnotationToken,
    pub sample_token: SampleToken,
    pub instance_token: InstanceToken,
    pub translation: [f64; 3],
    /// `[width, length, height]`
    pub size: [f64; 3],
    pub rotation: [f64; 4],
    #[serde(deserialize_with = "optional_link")]
    pub prev: Option<AnnotationToken>,
    #[serde(deserialize_with = "optional_link")]
    pub next: Option<AnnotationToken>,
    /// Resolved through the instance's category while indexing.
    #[serde(skip)]
    pub category_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub token: InstanceToken,
    pub category_token: CategoryToken,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub token: CategoryToken,
    pub name: String,
    /// Lidarseg class index; only present in datasets shipped with lidarseg.
    #[serde(default)]
    pub index: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LidarSeg {
    pub token: String,
    pub sample_data_token: SampleDataToken,
    pub filename: String,
}
