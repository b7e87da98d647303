//! Background alignment and the per-scene cache of aligned sweeps.

use std::collections::HashMap;

use pcd_core::{
    geometry::{transform, FramePose},
    pointcloud::point::{PointCloud, SegmentedPointCloud},
};
use pcd_parser::nuscenes::token::SampleDataToken;

use crate::{
    dynamic::{align_dynamic_objects, repose_points, DynamicAlignment},
    error::AlignError,
    frame::{FrameInfo, NearSensorFilter},
    label::get_label,
    labels,
};

/// Moves a cloud from `source`'s sensor frame into `dest`'s sensor frame through the global frame.
pub fn prev2ego(cloud: &PointCloud, source: &FramePose, dest: &FramePose) -> PointCloud {
    let cloud = transform(
        cloud,
        &source.calibration.rotation_matrix(),
        &source.calibration.translation,
        false,
    );
    let cloud = transform(
        &cloud,
        &source.ego.rotation_matrix(),
        &source.ego.translation,
        false,
    );
    let cloud = transform(&cloud, &dest.ego.rotation_matrix(), &dest.ego.translation, true);
    transform(
        &cloud,
        &dest.calibration.rotation_matrix(),
        &dest.calibration.translation,
        true,
    )
}

/// Aligns a labeled neighbour keyframe into `dest`.
///
/// Noise and ego-vehicle returns are removed. Static surfaces follow the ego motion,
/// points of objects also annotated in `dest` follow their box, everything else is dropped.
/// All points keep their ground-truth labels.
pub fn keyframe_align(source: &FrameInfo, dest: &FrameInfo) -> Result<SegmentedPointCloud, AlignError> {
    let labeled = source.labeled_points()?;
    let valid: Vec<bool> = labeled
        .labels()
        .iter()
        .map(|&l| l != labels::NOISE && l != labels::EGO_VEHICLE)
        .collect();
    let labeled = labeled.select(&valid)?;

    let static_mask: Vec<bool> = labeled.labels().iter().map(|&l| labels::is_static(l)).collect();
    let (static_cloud, static_labels) = labeled.select(&static_mask)?.into_parts();
    let mut aligned = SegmentedPointCloud::new(
        prev2ego(&static_cloud, &source.pose, &dest.pose),
        static_labels,
    )?;

    let movable_mask: Vec<bool> = static_mask.iter().map(|m| !m).collect();
    let movable = labeled.select(&movable_mask)?;
    for tracked in &source.boxes {
        let Some(dest_box) = dest.box_of(&tracked.instance) else {
            continue;
        };
        let inside = movable.select(&tracked.bbox.mask(movable.cloud()))?;
        let (moved, keep) = repose_points(&tracked.bbox, &dest_box.bbox, inside.cloud());
        let (_, box_labels) = inside.into_parts();
        aligned.extend(SegmentedPointCloud::new(moved, box_labels)?.select(&keep)?);
    }

    Ok(aligned)
}

/// Background points of one sweep, already aligned to the frame they were first aligned to.
#[derive(Debug, Clone)]
pub struct CachedStatic {
    pub points: SegmentedPointCloud,
    pub frame: FramePose,
}

/// Aligned background per intermediate sweep; valid within a single scene only.
#[derive(Debug, Default)]
pub struct StaticCache {
    entries: HashMap<SampleDataToken, CachedStatic>,
}

impl StaticCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token: &SampleDataToken) -> Option<&CachedStatic> {
        self.entries.get(token)
    }

    pub fn insert(&mut self, token: SampleDataToken, entry: CachedStatic) {
        self.entries.insert(token, entry);
    }

    pub fn contains(&self, token: &SampleDataToken) -> bool {
        self.entries.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

/// Aligns an unlabeled intermediate sweep into `dest`.
///
/// Object points are re-posed box by box. The remaining background is aligned and
/// labeled from `reference` on first visit; later visits re-project the cached result.
pub fn intermediate_frame_align(
    sweep: &FrameInfo,
    dest: &FrameInfo,
    reference: &SegmentedPointCloud,
    cache: &mut StaticCache,
    near_sensor: &NearSensorFilter,
    max_dist: f64,
) -> Result<SegmentedPointCloud, AlignError> {
    let cloud = near_sensor.remove_close(&sweep.cloud);

    let mut aligned = SegmentedPointCloud::default();
    let mut claimed = vec![false; cloud.len()];
    for tracked in &sweep.boxes {
        let DynamicAlignment {
            aligned: object_points,
            source_mask,
        } = align_dynamic_objects(tracked, &cloud, dest)?;
        for (claim, inside) in claimed.iter_mut().zip(&source_mask) {
            *claim |= *inside;
        }
        aligned.extend(object_points);
    }

    let background = match cache.get(&sweep.lidar) {
        Some(cached) => {
            log::debug!("static cache hit for sweep {}", sweep.lidar);
            SegmentedPointCloud::new(
                prev2ego(cached.points.cloud(), &cached.frame, &dest.pose),
                cached.points.labels().to_vec(),
            )?
        }
        None => {
            let unclaimed: Vec<bool> = claimed.iter().map(|c| !c).collect();
            let background = prev2ego(&cloud.select(&unclaimed)?, &sweep.pose, &dest.pose);
            let unlabeled = vec![None; background.len()];
            let labeled = get_label(reference, &background, &unlabeled, max_dist)?;
            cache.insert(
                sweep.lidar.clone(),
                CachedStatic {
                    points: labeled.clone(),
                    frame: dest.pose,
                },
            );
            labeled
        }
    };

    aligned.extend(background);
    Ok(aligned)
}
