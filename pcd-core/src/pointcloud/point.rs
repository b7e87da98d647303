use thiserror::Error;

#[derive(Debug, Error)]
pub enum PointCloudError {
    #[error("point count ({points}) does not match label count ({labels})")]
    LengthMismatch { points: usize, labels: usize },
    #[error("mask length ({mask}) does not match point count ({points})")]
    MaskMismatch { points: usize, mask: usize },
}

// LiDAR returns are stored as xyz in meters plus the raw intensity channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub intensity: f32,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64, intensity: f32) -> Self {
        Self { x, y, z, intensity }
    }

    pub fn xyz(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Replaces the spatial coordinates, keeping the extra channels.
    pub fn with_xyz(&self, xyz: [f64; 3]) -> Self {
        Self {
            x: xyz[0],
            y: xyz[1],
            z: xyz[2],
            intensity: self.intensity,
        }
    }

    pub fn squared_distance(&self, other: &Point) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point>,
}

impl PointCloud {
    pub fn new(points: Vec<Point>) -> Self {
        PointCloud { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Keeps the points whose mask entry is `true`, in their original order.
    pub fn select(&self, mask: &[bool]) -> Result<PointCloud, PointCloudError> {
        if mask.len() != self.points.len() {
            return Err(PointCloudError::MaskMismatch {
                points: self.points.len(),
                mask: mask.len(),
            });
        }
        let points = self
            .points
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(point, _)| *point)
            .collect();
        Ok(PointCloud { points })
    }

    pub fn extend(&mut self, other: PointCloud) {
        self.points.extend(other.points);
    }
}

/// Points paired with a trailing semantic label channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentedPointCloud {
    cloud: PointCloud,
    labels: Vec<u8>,
}

impl SegmentedPointCloud {
    pub fn new(cloud: PointCloud, labels: Vec<u8>) -> Result<Self, PointCloudError> {
        if cloud.len() != labels.len() {
            return Err(PointCloudError::LengthMismatch {
                points: cloud.len(),
                labels: labels.len(),
            });
        }
        Ok(Self { cloud, labels })
    }

    /// Every point gets the same class.
    pub fn uniform(cloud: PointCloud, label: u8) -> Self {
        let labels = vec![label; cloud.len()];
        Self { cloud, labels }
    }

    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    pub fn points(&self) -> &[Point] {
        &self.cloud.points
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn into_parts(self) -> (PointCloud, Vec<u8>) {
        (self.cloud, self.labels)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Point, u8)> {
        self.cloud.points.iter().zip(self.labels.iter().copied())
    }

    pub fn extend(&mut self, other: SegmentedPointCloud) {
        self.cloud.extend(other.cloud);
        self.labels.extend(other.labels);
    }

    pub fn select(&self, mask: &[bool]) -> Result<SegmentedPointCloud, PointCloudError> {
        if mask.len() != self.len() {
            return Err(PointCloudError::MaskMismatch {
                points: self.len(),
                mask: mask.len(),
            });
        }
        Ok(self.retain_masked(mask))
    }

    /// Keeps the entries at `indices`; indices must be in bounds.
    pub fn select_indices(&self, indices: &[usize]) -> SegmentedPointCloud {
        let points = indices.iter().map(|&i| self.cloud.points[i]).collect();
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        Self {
            cloud: PointCloud::new(points),
            labels,
        }
    }

    /// Drops every point outside `bounds`.
    pub fn clip(&self, bounds: &BoundingVolume) -> SegmentedPointCloud {
        let mask: Vec<bool> = self
            .cloud
            .points
            .iter()
            .map(|point| bounds.contains(point))
            .collect();
        self.retain_masked(&mask)
    }

    fn retain_masked(&self, mask: &[bool]) -> SegmentedPointCloud {
        let (points, labels): (Vec<Point>, Vec<u8>) = self
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|((point, label), _)| (*point, label))
            .unzip();
        Self {
            cloud: PointCloud::new(points),
            labels,
        }
    }
}

/// Extent of the occupancy grid around the sensor, in meters.
pub const OCCUPANCY_RANGE: BoundingVolume = BoundingVolume {
    min: [-60.0, -60.0, -10.0],
    max: [60.0, 60.0, 10.0],
};

// Axis-aligned volume, both bounds inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundingVolume {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingVolume {
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min[0]
            && point.x <= self.max[0]
            && point.y >= self.min[1]
            && point.y <= self.max[1]
            && point.z >= self.min[2]
            && point.z <= self.max[2]
    }
}
