use pcd_core::pointcloud::point::{BoundingVolume, SegmentedPointCloud, OCCUPANCY_RANGE};
use pcd_exporter::OccupancySink;
use pcd_parser::{
    nuscenes::token::{SampleDataToken, SampleToken},
    Dataset, DatasetError,
};

use crate::{
    error::AlignError,
    frame::{FrameInfo, NearSensorFilter},
    label::DEFAULT_MAX_LABEL_DISTANCE,
    static_bg::{intermediate_frame_align, keyframe_align, StaticCache},
};

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Keyframes gathered on each side of the target.
    pub num_sweeps: usize,
    pub clip: BoundingVolume,
    pub max_label_distance: f64,
    pub near_sensor: NearSensorFilter,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            num_sweeps: 10,
            clip: OCCUPANCY_RANGE,
            max_label_distance: DEFAULT_MAX_LABEL_DISTANCE,
            near_sensor: NearSensorFilter::default(),
        }
    }
}

/// Point counts contributed to one output file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub target: usize,
    pub keyframe: usize,
    pub intermediate: usize,
    /// Points left after the sink's own reduction.
    pub written: usize,
}

impl AggregateStats {
    pub fn merged(&self) -> usize {
        self.target + self.keyframe + self.intermediate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Prev,
    Next,
}

pub struct FrameWindowAggregator<'a, D: Dataset + ?Sized> {
    dataset: &'a D,
    config: AggregatorConfig,
}

impl<'a, D: Dataset + ?Sized> FrameWindowAggregator<'a, D> {
    pub fn new(dataset: &'a D, config: AggregatorConfig) -> Self {
        Self { dataset, config }
    }

    /// Builds the densified, labeled cloud of one keyframe and hands it to `sink`.
    pub fn aggregate(
        &self,
        sample_token: &SampleToken,
        cache: &mut StaticCache,
        sink: &mut dyn OccupancySink,
    ) -> Result<AggregateStats, AlignError> {
        let target = FrameInfo::keyframe(self.dataset, sample_token)?;
        let before = self.keyframe_window(sample_token, Direction::Prev)?;
        let after = self.keyframe_window(sample_token, Direction::Next)?;

        let mut keyframe_points = SegmentedPointCloud::default();
        for token in before.iter().chain(&after) {
            let neighbour = FrameInfo::keyframe(self.dataset, token)?;
            keyframe_points.extend(keyframe_align(&neighbour, &target)?);
        }

        let mut reference = target.labeled_points()?.clip(&self.config.clip);
        let keyframe_points = keyframe_points.clip(&self.config.clip);
        let mut stats = AggregateStats {
            target: reference.len(),
            keyframe: keyframe_points.len(),
            ..Default::default()
        };
        reference.extend(keyframe_points);

        let mut intermediate = SegmentedPointCloud::default();
        let sweeps = before
            .iter()
            .map(|token| self.intermediate_sweeps(token, Direction::Next))
            .chain(
                after
                    .iter()
                    .map(|token| self.intermediate_sweeps(token, Direction::Prev)),
            );
        for tokens in sweeps {
            for token in tokens? {
                let sweep = FrameInfo::sweep(self.dataset, &token)?;
                intermediate.extend(intermediate_frame_align(
                    &sweep,
                    &target,
                    &reference,
                    cache,
                    &self.config.near_sensor,
                    self.config.max_label_distance,
                )?);
            }
        }

        let mut merged = reference;
        if intermediate.is_empty() {
            log::debug!("no intermediate points for sample {}", sample_token);
        } else {
            stats.intermediate = intermediate.len();
            merged.extend(intermediate);
        }

        stats.written = sink.write(&target.file_name, &merged)?;
        Ok(stats)
    }

    /// Up to `num_sweeps` keyframes on one side of `sample_token`, farthest first.
    fn keyframe_window(
        &self,
        sample_token: &SampleToken,
        direction: Direction,
    ) -> Result<Vec<SampleToken>, AlignError> {
        let mut window = Vec::with_capacity(self.config.num_sweeps);
        let mut current = self.dataset.sample(sample_token)?;
        while window.len() < self.config.num_sweeps {
            let link = match direction {
                Direction::Prev => &current.prev,
                Direction::Next => &current.next,
            };
            let Some(token) = link else {
                break;
            };
            current = self.dataset.sample(token)?;
            window.push(token.clone());
        }
        window.reverse();
        Ok(window)
    }

    /// Non-keyframe sweeps strictly between `sample_token` and its neighbour in `direction`.
    fn intermediate_sweeps(
        &self,
        sample_token: &SampleToken,
        direction: Direction,
    ) -> Result<Vec<SampleDataToken>, AlignError> {
        let start = self.dataset.sample(sample_token)?;
        let neighbour = match direction {
            Direction::Prev => &start.prev,
            Direction::Next => &start.next,
        };
        let Some(neighbour) = neighbour else {
            return Ok(Vec::new());
        };
        let end = self.dataset.lidar_token(self.dataset.sample(neighbour)?)?;

        let step = |token: &SampleDataToken| -> Result<Option<SampleDataToken>, DatasetError> {
            let record = self.dataset.sample_data(token)?;
            Ok(match direction {
                Direction::Prev => record.prev.clone(),
                Direction::Next => record.next.clone(),
            })
        };

        let mut sweeps = Vec::new();
        let mut current = step(self.dataset.lidar_token(start)?)?;
        loop {
            let token = current.ok_or_else(|| DatasetError::MissingRecord {
                table: "sample_data",
                token: end.to_string(),
            })?;
            if &token == end {
                break;
            }
            current = step(&token)?;
            sweeps.push(token);
        }
        Ok(sweeps)
    }
}
