use std::collections::HashMap;

use nalgebra::Vector3;
use pcd_core::{
    geometry::{FramePose, OrientedBox},
    pointcloud::point::{PointCloud, PointCloudError, SegmentedPointCloud},
};
use pcd_parser::{
    nuscenes::{
        table::SampleData,
        token::{AnnotationToken, InstanceToken, SampleDataToken, SampleToken},
    },
    Dataset,
};

use crate::error::AlignError;

/// An object box in its frame's sensor coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedBox {
    pub bbox: OrientedBox,
    pub annotation: AnnotationToken,
    pub instance: InstanceToken,
    /// lidarseg class of the object's category.
    pub label: u8,
    pub velocity: Option<Vector3<f64>>,
}

/// Everything the aligners need to know about one sweep.
#[derive(Debug, Clone)]
pub struct FrameInfo {
    /// Set for keyframes only.
    pub sample: Option<SampleToken>,
    pub lidar: SampleDataToken,
    pub file_name: String,
    pub timestamp: u64,
    pub cloud: PointCloud,
    pub pose: FramePose,
    pub boxes: Vec<TrackedBox>,
    /// lidarseg ground truth, keyframes only.
    pub labels: Option<Vec<u8>>,
    instances: HashMap<InstanceToken, usize>,
}

impl FrameInfo {
    /// Snapshot of a keyframe's LIDAR_TOP sweep with labels and box velocities.
    pub fn keyframe<D: Dataset + ?Sized>(
        dataset: &D,
        sample_token: &SampleToken,
    ) -> Result<Self, AlignError> {
        let sample = dataset.sample(sample_token)?;
        let sample_data = dataset.sample_data(dataset.lidar_token(sample)?)?;
        let mut frame = Self::from_sample_data(dataset, sample_data)?;

        let labels = dataset.load_labels(&sample_data.token)?;
        if labels.len() != frame.cloud.len() {
            return Err(PointCloudError::LengthMismatch {
                points: frame.cloud.len(),
                labels: labels.len(),
            }
            .into());
        }
        for tracked in &mut frame.boxes {
            tracked.velocity = dataset.box_velocity(&tracked.annotation)?;
        }

        frame.sample = Some(sample_token.clone());
        frame.labels = Some(labels);
        Ok(frame)
    }

    /// Snapshot of any sweep; intermediate sweeps get interpolated boxes and no labels.
    pub fn sweep<D: Dataset + ?Sized>(
        dataset: &D,
        token: &SampleDataToken,
    ) -> Result<Self, AlignError> {
        let sample_data = dataset.sample_data(token)?;
        Self::from_sample_data(dataset, sample_data)
    }

    fn from_sample_data<D: Dataset + ?Sized>(
        dataset: &D,
        sample_data: &SampleData,
    ) -> Result<Self, AlignError> {
        let cloud = dataset.load_points(sample_data)?;
        let pose = FramePose {
            calibration: dataset
                .calibrated_sensor(&sample_data.calibrated_sensor_token)?
                .pose(),
            ego: dataset.ego_pose(&sample_data.ego_pose_token)?.pose(),
        };

        let boxes = dataset
            .boxes(&sample_data.token)?
            .into_iter()
            .map(|object| {
                Ok(TrackedBox {
                    label: dataset.category_index(&object.category)?,
                    bbox: object.bbox,
                    annotation: object.annotation,
                    instance: object.instance,
                    velocity: None,
                })
            })
            .collect::<Result<Vec<_>, AlignError>>()?;
        let instances = boxes
            .iter()
            .enumerate()
            .map(|(index, tracked)| (tracked.instance.clone(), index))
            .collect();

        Ok(Self {
            sample: None,
            lidar: sample_data.token.clone(),
            file_name: sample_data.file_name().to_string(),
            timestamp: sample_data.timestamp,
            cloud,
            pose,
            boxes,
            labels: None,
            instances,
        })
    }

    /// Box of `instance` in this frame, if the object is annotated here.
    pub fn box_of(&self, instance: &InstanceToken) -> Option<&TrackedBox> {
        self.instances.get(instance).map(|&index| &self.boxes[index])
    }

    pub fn labeled_points(&self) -> Result<SegmentedPointCloud, AlignError> {
        let labels = self
            .labels
            .clone()
            .ok_or_else(|| AlignError::Unlabeled(self.lidar.to_string()))?;
        Ok(SegmentedPointCloud::new(self.cloud.clone(), labels)?)
    }
}

/// Drops returns from the sensor's immediate surroundings (the ego vehicle body).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearSensorFilter {
    pub radius_x: f64,
    pub radius_y: f64,
}

impl Default for NearSensorFilter {
    fn default() -> Self {
        Self {
            radius_x: 1.0,
            radius_y: 2.0,
        }
    }
}

impl NearSensorFilter {
    pub fn remove_close(&self, cloud: &PointCloud) -> PointCloud {
        let points = cloud
            .points
            .iter()
            .filter(|p| !(p.x.abs() < self.radius_x && p.y.abs() < self.radius_y))
            .copied()
            .collect();
        PointCloud::new(points)
    }
}
