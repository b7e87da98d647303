use kiddo::{ImmutableKdTree, SquaredEuclidean};
use pcd_core::pointcloud::point::{Point, PointCloud, PointCloudError, SegmentedPointCloud};
use rayon::prelude::*;

use crate::error::AlignError;

pub const DEFAULT_MAX_LABEL_DISTANCE: f64 = 1.0;

/// Items are indices into `reference`. Any number of points may share a coordinate.
fn build_kdtree(reference: &SegmentedPointCloud) -> ImmutableKdTree<f64, 3> {
    let entries: Vec<[f64; 3]> = reference.points().iter().map(Point::xyz).collect();
    ImmutableKdTree::new_from_slice(&entries)
}

/// Transfers labels from `reference` onto `targets` by nearest neighbour.
///
/// Targets with `None` take the label of their nearest reference point. Every target
/// farther than `max_dist` from the reference set is dropped, labeled or not.
pub fn get_label(
    reference: &SegmentedPointCloud,
    targets: &PointCloud,
    target_labels: &[Option<u8>],
    max_dist: f64,
) -> Result<SegmentedPointCloud, AlignError> {
    if targets.len() != target_labels.len() {
        return Err(PointCloudError::LengthMismatch {
            points: targets.len(),
            labels: target_labels.len(),
        }
        .into());
    }
    if reference.is_empty() {
        log::debug!("empty label reference, dropping {} points", targets.len());
        return Ok(SegmentedPointCloud::default());
    }

    let tree = build_kdtree(reference);
    let max_dist_sq = max_dist * max_dist;
    let ref_labels = reference.labels();

    let matched: Vec<Option<(Point, u8)>> = targets
        .points
        .par_iter()
        .zip(target_labels.par_iter())
        .map(|(point, label)| {
            let nearest = tree.nearest_one::<SquaredEuclidean>(&point.xyz());
            if nearest.distance > max_dist_sq {
                return None;
            }
            Some((*point, label.unwrap_or(ref_labels[nearest.item as usize])))
        })
        .collect();

    let (points, labels): (Vec<Point>, Vec<u8>) = matched.into_iter().flatten().unzip();
    Ok(SegmentedPointCloud::new(PointCloud::new(points), labels)?)
}
