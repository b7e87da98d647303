//! In-memory dataset for exercising the aligners without nuScenes files.

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};
use pcd_core::{
    geometry::{OrientedBox, Pose},
    pointcloud::point::{Point, PointCloud, SegmentedPointCloud},
};
use pcd_exporter::{ExportError, OccupancySink};
use pcd_parser::{
    nuscenes::{table::*, token::*},
    Dataset, DatasetError, ObjectBox,
};

pub(crate) fn cloud(coords: &[[f64; 3]]) -> PointCloud {
    PointCloud::new(
        coords
            .iter()
            .map(|c| Point::new(c[0], c[1], c[2], 0.0))
            .collect(),
    )
}

pub(crate) fn labeled(points: &[([f64; 3], u8)]) -> SegmentedPointCloud {
    let coords: Vec<[f64; 3]> = points.iter().map(|(xyz, _)| *xyz).collect();
    let labels = points.iter().map(|(_, label)| *label).collect();
    SegmentedPointCloud::new(cloud(&coords), labels).unwrap()
}

pub(crate) fn ego_at(x: f64) -> Pose {
    Pose {
        rotation: UnitQuaternion::identity(),
        translation: Vector3::new(x, 0.0, 0.0),
    }
}

pub(crate) struct SyntheticFrame {
    token: String,
    key_frame: bool,
    ego: Pose,
    points: PointCloud,
    labels: Vec<u8>,
    boxes: Vec<ObjectBox>,
}

impl SyntheticFrame {
    /// A keyframe whose ego vehicle sits `ego_x` meters along the global x axis.
    pub fn keyframe(token: &str, ego_x: f64, points: Vec<([f64; 3], u8)>) -> Self {
        let segmented = labeled(&points);
        let (points, labels) = segmented.into_parts();
        Self {
            token: token.to_string(),
            key_frame: true,
            ego: ego_at(ego_x),
            points,
            labels,
            boxes: Vec::new(),
        }
    }

    pub fn sweep(token: &str, ego_x: f64, points: Vec<[f64; 3]>) -> Self {
        Self {
            token: token.to_string(),
            key_frame: false,
            ego: ego_at(ego_x),
            points: cloud(&points),
            labels: Vec::new(),
            boxes: Vec::new(),
        }
    }

    pub fn with_ego(mut self, ego: Pose) -> Self {
        self.ego = ego;
        self
    }

    /// Adds an axis-aligned `vehicle.car` box, given in sensor coordinates.
    pub fn with_box(mut self, instance: &str, center: [f64; 3], size: [f64; 3]) -> Self {
        self.boxes.push(ObjectBox {
            bbox: OrientedBox::new(Vector3::from(center), size, UnitQuaternion::identity()),
            annotation: format!("{}-{}", self.token, instance).into(),
            instance: instance.into(),
            category: "vehicle.car".to_string(),
        });
        self
    }
}

pub(crate) struct SyntheticDataset {
    scenes: Vec<Scene>,
    samples: HashMap<SampleToken, Sample>,
    sample_data: HashMap<SampleDataToken, SampleData>,
    ego_poses: HashMap<EgoPoseToken, EgoPose>,
    calibrated_sensors: HashMap<CalibratedSensorToken, CalibratedSensor>,
    annotations: HashMap<AnnotationToken, SampleAnnotation>,
    points: HashMap<SampleDataToken, PointCloud>,
    labels: HashMap<SampleDataToken, Vec<u8>>,
    boxes: HashMap<SampleDataToken, Vec<ObjectBox>>,
    velocities: HashMap<AnnotationToken, Vector3<f64>>,
    categories: HashMap<String, u8>,
}

fn wxyz(rotation: &UnitQuaternion<f64>) -> [f64; 4] {
    [rotation.w, rotation.i, rotation.j, rotation.k]
}

impl SyntheticDataset {
    pub fn new() -> Self {
        let calibration = CalibratedSensor {
            token: "cs-lidar".into(),
            sensor_token: "lidar".into(),
            translation: [0.0; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
        };
        Self {
            scenes: Vec::new(),
            samples: HashMap::new(),
            sample_data: HashMap::new(),
            ego_poses: HashMap::new(),
            calibrated_sensors: HashMap::from([(calibration.token.clone(), calibration)]),
            annotations: HashMap::new(),
            points: HashMap::new(),
            labels: HashMap::new(),
            boxes: HashMap::new(),
            velocities: HashMap::new(),
            categories: HashMap::from([("vehicle.car".to_string(), 17)]),
        }
    }

    pub fn sample_token(lidar_token: &str) -> SampleToken {
        format!("sample-{lidar_token}").into()
    }

    /// Adds a scene; frames are in capture order, sweeps belong to the keyframe after them.
    pub fn push_scene(&mut self, name: &str, frames: Vec<SyntheticFrame>) {
        let scene_token: SceneToken = format!("scene-{name}").into();
        let keyframes: Vec<&SyntheticFrame> = frames.iter().filter(|f| f.key_frame).collect();

        for (i, frame) in keyframes.iter().enumerate() {
            let sample = Sample {
                token: Self::sample_token(&frame.token),
                timestamp: i as u64 * 500_000,
                scene_token: scene_token.clone(),
                prev: i
                    .checked_sub(1)
                    .map(|j| Self::sample_token(&keyframes[j].token)),
                next: keyframes.get(i + 1).map(|f| Self::sample_token(&f.token)),
                lidar_token: Some(frame.token.as_str().into()),
                anns: frame.boxes.iter().map(|b| b.annotation.clone()).collect(),
            };
            self.samples.insert(sample.token.clone(), sample);
        }

        for (i, frame) in frames.iter().enumerate() {
            let token: SampleDataToken = frame.token.as_str().into();
            let owner = frames[i..]
                .iter()
                .find(|f| f.key_frame)
                .map(|f| Self::sample_token(&f.token))
                .expect("scene must end with a keyframe");
            let ego_pose_token: EgoPoseToken = format!("ep-{}", frame.token).into();

            self.ego_poses.insert(
                ego_pose_token.clone(),
                EgoPose {
                    token: ego_pose_token.clone(),
                    timestamp: i as u64 * 100_000,
                    translation: frame.ego.translation.into(),
                    rotation: wxyz(&frame.ego.rotation),
                },
            );
            self.sample_data.insert(
                token.clone(),
                SampleData {
                    token: token.clone(),
                    sample_token: owner,
                    ego_pose_token,
                    calibrated_sensor_token: "cs-lidar".into(),
                    filename: format!("samples/LIDAR_TOP/{}.pcd.bin", frame.token),
                    timestamp: i as u64 * 100_000,
                    is_key_frame: frame.key_frame,
                    prev: i
                        .checked_sub(1)
                        .map(|j| frames[j].token.as_str().into()),
                    next: frames.get(i + 1).map(|f| f.token.as_str().into()),
                },
            );
            self.points.insert(token.clone(), frame.points.clone());
            if frame.key_frame {
                self.labels.insert(token.clone(), frame.labels.clone());
            }
            self.boxes.insert(token, frame.boxes.clone());
        }

        self.scenes.push(Scene {
            token: scene_token,
            name: name.to_string(),
            first_sample_token: Self::sample_token(&keyframes[0].token),
            last_sample_token: Self::sample_token(&keyframes[keyframes.len() - 1].token),
        });
    }

    pub fn set_velocity(&mut self, annotation: &str, velocity: Vector3<f64>) {
        self.velocities.insert(annotation.into(), velocity);
    }

    pub fn set_labels(&mut self, lidar_token: &str, labels: Vec<u8>) {
        self.labels.insert(lidar_token.into(), labels);
    }

    pub fn remove_labels(&mut self, lidar_token: &str) {
        self.labels.remove(&SampleDataToken::from(lidar_token));
    }
}

fn missing(table: &'static str, token: impl ToString) -> DatasetError {
    DatasetError::MissingRecord {
        table,
        token: token.to_string(),
    }
}

impl Dataset for SyntheticDataset {
    fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    fn sample(&self, token: &SampleToken) -> Result<&Sample, DatasetError> {
        self.samples.get(token).ok_or_else(|| missing("sample", token))
    }

    fn sample_data(&self, token: &SampleDataToken) -> Result<&SampleData, DatasetError> {
        self.sample_data
            .get(token)
            .ok_or_else(|| missing("sample_data", token))
    }

    fn calibrated_sensor(
        &self,
        token: &CalibratedSensorToken,
    ) -> Result<&CalibratedSensor, DatasetError> {
        self.calibrated_sensors
            .get(token)
            .ok_or_else(|| missing("calibrated_sensor", token))
    }

    fn ego_pose(&self, token: &EgoPoseToken) -> Result<&EgoPose, DatasetError> {
        self.ego_poses
            .get(token)
            .ok_or_else(|| missing("ego_pose", token))
    }

    fn sample_annotation(
        &self,
        token: &AnnotationToken,
    ) -> Result<&SampleAnnotation, DatasetError> {
        self.annotations
            .get(token)
            .ok_or_else(|| missing("sample_annotation", token))
    }

    fn load_points(&self, sample_data: &SampleData) -> Result<PointCloud, DatasetError> {
        self.points
            .get(&sample_data.token)
            .cloned()
            .ok_or_else(|| missing("points", &sample_data.token))
    }

    fn load_labels(&self, token: &SampleDataToken) -> Result<Vec<u8>, DatasetError> {
        self.labels
            .get(token)
            .cloned()
            .ok_or_else(|| missing("lidarseg", token))
    }

    fn boxes(&self, token: &SampleDataToken) -> Result<Vec<ObjectBox>, DatasetError> {
        self.boxes
            .get(token)
            .cloned()
            .ok_or_else(|| missing("sample_data", token))
    }

    fn box_velocity(&self, token: &AnnotationToken) -> Result<Option<Vector3<f64>>, DatasetError> {
        Ok(self.velocities.get(token).copied())
    }

    fn category_index(&self, name: &str) -> Result<u8, DatasetError> {
        self.categories
            .get(name)
            .copied()
            .ok_or_else(|| DatasetError::UnknownCategory(name.to_string()))
    }
}

/// Keeps every cloud it is handed, untouched.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub written: Vec<(String, SegmentedPointCloud)>,
}

impl OccupancySink for RecordingSink {
    fn write(&mut self, file_name: &str, cloud: &SegmentedPointCloud) -> Result<usize, ExportError> {
        self.written.push((file_name.to_string(), cloud.clone()));
        Ok(cloud.len())
    }
}
