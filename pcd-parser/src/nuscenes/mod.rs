//! nuScenes tables and the dataset queries the occupancy converter needs.

mod boxes;
pub mod table;
pub mod token;

use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use nalgebra::Vector3;
use pcd_core::pointcloud::point::PointCloud;
use serde::de::DeserializeOwned;

use crate::error::DatasetError;
use crate::reader::{read_lidarseg_labels, LidarBinReader};

pub use boxes::ObjectBox;
use boxes::{annotation_box, global_to_sensor, interpolate_box, interpolation_amount};
use table::*;
use token::*;

pub const LIDAR_CHANNEL: &str = "LIDAR_TOP";

/// Annotations further apart than this (seconds) give no velocity estimate.
const MAX_VELOCITY_TIME_DIFF: f64 = 1.5;

/// Read-only queries against a nuScenes-style dataset.
pub trait Dataset {
    fn scenes(&self) -> &[Scene];
    fn sample(&self, token: &SampleToken) -> Result<&Sample, DatasetError>;
    fn sample_data(&self, token: &SampleDataToken) -> Result<&SampleData, DatasetError>;
    fn calibrated_sensor(
        &self,
        token: &CalibratedSensorToken,
    ) -> Result<&CalibratedSensor, DatasetError>;
    fn ego_pose(&self, token: &EgoPoseToken) -> Result<&EgoPose, DatasetError>;
    fn sample_annotation(&self, token: &AnnotationToken)
        -> Result<&SampleAnnotation, DatasetError>;

    /// Raw points of a sweep in its sensor frame.
    fn load_points(&self, sample_data: &SampleData) -> Result<PointCloud, DatasetError>;
    /// Ground-truth lidarseg labels of a keyframe sweep.
    fn load_labels(&self, token: &SampleDataToken) -> Result<Vec<u8>, DatasetError>;
    /// Annotated boxes of a sweep, expressed in that sweep's sensor frame.
    fn boxes(&self, token: &SampleDataToken) -> Result<Vec<ObjectBox>, DatasetError>;
    /// Velocity of an annotated object in the global frame, `None` when it can't be estimated.
    fn box_velocity(&self, token: &AnnotationToken) -> Result<Option<Vector3<f64>>, DatasetError>;
    /// Lidarseg class index of a category name.
    fn category_index(&self, name: &str) -> Result<u8, DatasetError>;

    fn lidar_token<'a>(&self, sample: &'a Sample) -> Result<&'a SampleDataToken, DatasetError> {
        sample
            .lidar_token
            .as_ref()
            .ok_or_else(|| DatasetError::MissingLidar(sample.token.to_string()))
    }
}

/// Raw tables as they appear in `<dataroot>/<version>/*.json`.
#[derive(Debug, Default)]
pub struct Tables {
    pub scenes: Vec<Scene>,
    pub samples: Vec<Sample>,
    pub sample_data: Vec<SampleData>,
    pub ego_poses: Vec<EgoPose>,
    pub calibrated_sensors: Vec<CalibratedSensor>,
    pub sensors: Vec<Sensor>,
    pub sample_annotations: Vec<SampleAnnotation>,
    pub instances: Vec<Instance>,
    pub categories: Vec<Category>,
    pub lidarseg: Vec<LidarSeg>,
}

impl Tables {
    pub fn load(table_dir: &Path) -> Result<Self, DatasetError> {
        let lidarseg_path = table_dir.join("lidarseg.json");
        let lidarseg = if lidarseg_path.exists() {
            load_table(table_dir, "lidarseg")?
        } else {
            log::warn!("{:?} not found, lidarseg labels are unavailable", lidarseg_path);
            Vec::new()
        };

        Ok(Self {
            scenes: load_table(table_dir, "scene")?,
            samples: load_table(table_dir, "sample")?,
            sample_data: load_table(table_dir, "sample_data")?,
            ego_poses: load_table(table_dir, "ego_pose")?,
            calibrated_sensors: load_table(table_dir, "calibrated_sensor")?,
            sensors: load_table(table_dir, "sensor")?,
            sample_annotations: load_table(table_dir, "sample_annotation")?,
            instances: load_table(table_dir, "instance")?,
            categories: load_table(table_dir, "category")?,
            lidarseg,
        })
    }
}

fn load_table<T: DeserializeOwned>(table_dir: &Path, name: &str) -> Result<Vec<T>, DatasetError> {
    let path = table_dir.join(format!("{name}.json"));
    let file = File::open(&path).map_err(|source| DatasetError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::Json { path, source })
}

fn missing(table: &'static str, token: impl ToString) -> DatasetError {
    DatasetError::MissingRecord {
        table,
        token: token.to_string(),
    }
}

fn by_token<K, V>(records: Vec<V>, key: impl Fn(&V) -> K) -> HashMap<K, V>
where
    K: std::hash::Hash + Eq,
{
    records.into_iter().map(|r| (key(&r), r)).collect()
}

/// Indexed nuScenes dataset.
pub struct NuScenes {
    dataroot: PathBuf,
    scenes: Vec<Scene>,
    samples: HashMap<SampleToken, Sample>,
    sample_data: HashMap<SampleDataToken, SampleData>,
    ego_poses: HashMap<EgoPoseToken, EgoPose>,
    calibrated_sensors: HashMap<CalibratedSensorToken, CalibratedSensor>,
    sample_annotations: HashMap<AnnotationToken, SampleAnnotation>,
    lidarseg: HashMap<SampleDataToken, LidarSeg>,
    category_indices: HashMap<String, u8>,
    lidar_reader: LidarBinReader,
}

impl NuScenes {
    pub fn load(dataroot: impl Into<PathBuf>, version: &str) -> Result<Self, DatasetError> {
        let dataroot = dataroot.into();
        let start = std::time::Instant::now();
        let tables = Tables::load(&dataroot.join(version))?;
        let nusc = Self::from_tables(dataroot, tables)?;
        log::info!(
            "loaded {} ({} scenes, {} samples) in {:?}",
            version,
            nusc.scenes.len(),
            nusc.samples.len(),
            start.elapsed()
        );
        Ok(nusc)
    }

    /// Builds the lookup maps and the reverse links the tables don't store.
    pub fn from_tables(dataroot: PathBuf, tables: Tables) -> Result<Self, DatasetError> {
        let sensors = by_token(tables.sensors, |s| s.token.clone());
        let instances = by_token(tables.instances, |i| i.token.clone());
        let categories = by_token(tables.categories, |c| c.token.clone());
        let calibrated_sensors = by_token(tables.calibrated_sensors, |c| c.token.clone());
        let mut samples = by_token(tables.samples, |s| s.token.clone());

        for sd in tables.sample_data.iter().filter(|sd| sd.is_key_frame) {
            let calibration = calibrated_sensors
                .get(&sd.calibrated_sensor_token)
                .ok_or_else(|| missing("calibrated_sensor", &sd.calibrated_sensor_token))?;
            let sensor = sensors
                .get(&calibration.sensor_token)
                .ok_or_else(|| missing("sensor", &calibration.sensor_token))?;
            if sensor.channel != LIDAR_CHANNEL {
                continue;
            }
            let sample = samples
                .get_mut(&sd.sample_token)
                .ok_or_else(|| missing("sample", &sd.sample_token))?;
            sample.lidar_token = Some(sd.token.clone());
        }

        let mut sample_annotations = HashMap::with_capacity(tables.sample_annotations.len());
        for mut ann in tables.sample_annotations {
            let instance = instances
                .get(&ann.instance_token)
                .ok_or_else(|| missing("instance", &ann.instance_token))?;
            let category = categories
                .get(&instance.category_token)
                .ok_or_else(|| missing("category", &instance.category_token))?;
            ann.category_name = category.name.clone();
            samples
                .get_mut(&ann.sample_token)
                .ok_or_else(|| missing("sample", &ann.sample_token))?
                .anns
                .push(ann.token.clone());
            sample_annotations.insert(ann.token.clone(), ann);
        }

        let category_indices = categories
            .values()
            .filter_map(|c| c.index.map(|index| (c.name.clone(), index)))
            .collect();

        Ok(Self {
            dataroot,
            scenes: tables.scenes,
            samples,
            sample_data: by_token(tables.sample_data, |sd| sd.token.clone()),
            ego_poses: by_token(tables.ego_poses, |p| p.token.clone()),
            calibrated_sensors,
            sample_annotations,
            lidarseg: by_token(tables.lidarseg, |l| l.sample_data_token.clone()),
            category_indices,
            lidar_reader: LidarBinReader::default(),
        })
    }

    fn interpolated_boxes(
        &self,
        prev: &Sample,
        curr: &Sample,
        timestamp: u64,
    ) -> Result<Vec<ObjectBox>, DatasetError> {
        let mut prev_by_instance = HashMap::new();
        for token in &prev.anns {
            let ann = self.sample_annotation(token)?;
            prev_by_instance.insert(&ann.instance_token, ann);
        }
        let amount = interpolation_amount(prev.timestamp, curr.timestamp, timestamp);

        curr.anns
            .iter()
            .map(|token| {
                let ann = self.sample_annotation(token)?;
                Ok(match prev_by_instance.get(&ann.instance_token) {
                    Some(prev_ann) => interpolate_box(prev_ann, ann, amount),
                    None => annotation_box(ann),
                })
            })
            .collect()
    }
}

impl Dataset for NuScenes {
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
        self.sample_annotations
            .get(token)
            .ok_or_else(|| missing("sample_annotation", token))
    }

    fn load_points(&self, sample_data: &SampleData) -> Result<PointCloud, DatasetError> {
        self.lidar_reader
            .read(&self.dataroot.join(&sample_data.filename))
    }

    fn load_labels(&self, token: &SampleDataToken) -> Result<Vec<u8>, DatasetError> {
        let record = self
            .lidarseg
            .get(token)
            .ok_or_else(|| missing("lidarseg", token))?;
        read_lidarseg_labels(&self.dataroot.join(&record.filename))
    }

    fn boxes(&self, token: &SampleDataToken) -> Result<Vec<ObjectBox>, DatasetError> {
        let sd = self.sample_data(token)?;
        let curr = self.sample(&sd.sample_token)?;

        // Intermediate sweeps belong to the following keyframe; their boxes are
        // interpolated from the previous keyframe's annotations.
        let mut boxes = match (&curr.prev, sd.is_key_frame) {
            (Some(prev_token), false) => {
                let prev = self.sample(prev_token)?;
                self.interpolated_boxes(prev, curr, sd.timestamp)?
            }
            _ => curr
                .anns
                .iter()
                .map(|t| self.sample_annotation(t).map(annotation_box))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let ego = self.ego_pose(&sd.ego_pose_token)?.pose();
        let calibration = self.calibrated_sensor(&sd.calibrated_sensor_token)?.pose();
        for object in &mut boxes {
            global_to_sensor(&mut object.bbox, &ego, &calibration);
        }
        Ok(boxes)
    }

    fn box_velocity(&self, token: &AnnotationToken) -> Result<Option<Vector3<f64>>, DatasetError> {
        let current = self.sample_annotation(token)?;
        let (first, last) = match (&current.prev, &current.next) {
            (None, None) => return Ok(None),
            (Some(prev), Some(next)) => (self.sample_annotation(prev)?, self.sample_annotation(next)?),
            (Some(prev), None) => (self.sample_annotation(prev)?, current),
            (None, Some(next)) => (current, self.sample_annotation(next)?),
        };

        let t_first = self.sample(&first.sample_token)?.timestamp;
        let t_last = self.sample(&last.sample_token)?.timestamp;
        let time_diff = 1e-6 * (t_last as f64 - t_first as f64);

        let max_time_diff = if current.prev.is_some() && current.next.is_some() {
            2.0 * MAX_VELOCITY_TIME_DIFF
        } else {
            MAX_VELOCITY_TIME_DIFF
        };
        if time_diff <= 0.0 || time_diff > max_time_diff {
            return Ok(None);
        }

        let pos_diff = Vector3::from(last.translation) - Vector3::from(first.translation);
        Ok(Some(pos_diff / time_diff))
    }

    fn category_index(&self, name: &str) -> Result<u8, DatasetError> {
        self.category_indices
            .get(name)
            .copied()
            .ok_or_else(|| DatasetError::UnknownCategory(name.to_string()))
    }
}
