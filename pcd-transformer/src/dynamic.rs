use pcd_core::{
    geometry::{rotate, translate, OrientedBox},
    pointcloud::point::{PointCloud, SegmentedPointCloud},
};

use crate::{
    error::AlignError,
    frame::{FrameInfo, TrackedBox},
};

pub struct DynamicAlignment {
    /// Re-posed object points in the destination frame, labeled with the object's class.
    pub aligned: SegmentedPointCloud,
    /// Points of the source cloud enclosed by the source box.
    pub source_mask: Vec<bool>,
}

/// Carries points from `src`'s pose to `dst`'s pose.
///
/// Returns the moved cloud together with a mask of the points that land inside `dst`;
/// the rest drifted out because the two boxes differ in size.
pub fn repose_points(
    src: &OrientedBox,
    dst: &OrientedBox,
    cloud: &PointCloud,
) -> (PointCloud, Vec<bool>) {
    let local = rotate(cloud, &src.rotation_matrix().transpose(), &src.center);
    let shifted = translate(&local, &(dst.center - src.center));
    let moved = rotate(&shifted, &dst.rotation_matrix(), &dst.center);
    let inside = dst.mask(&moved);
    (moved, inside)
}

/// Moves the points of one tracked object into `dest`.
///
/// An object that is not annotated in `dest` is not visible there: its points are
/// dropped, but `source_mask` still marks them so callers can keep them out of the
/// static background.
pub fn align_dynamic_objects(
    tracked: &TrackedBox,
    points: &PointCloud,
    dest: &FrameInfo,
) -> Result<DynamicAlignment, AlignError> {
    let source_mask = tracked.bbox.mask(points);

    let Some(dest_box) = dest.box_of(&tracked.instance) else {
        return Ok(DynamicAlignment {
            aligned: SegmentedPointCloud::default(),
            source_mask,
        });
    };

    let selected = points.select(&source_mask)?;
    let (moved, inside) = repose_points(&tracked.bbox, &dest_box.bbox, &selected);
    let aligned = SegmentedPointCloud::uniform(moved.select(&inside)?, tracked.label);

    Ok(DynamicAlignment {
        aligned,
        source_mask,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{cloud, SyntheticDataset, SyntheticFrame};
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};
    use std::f64::consts::FRAC_PI_2;

    fn boxed(center: [f64; 3], size: [f64; 3], yaw: f64) -> OrientedBox {
        OrientedBox::new(
            Vector3::from(center),
            size,
            UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
        )
    }

    /// Destination keyframe "k1" where the car moved 5 m forward.
    fn destination(car_size: [f64; 3]) -> FrameInfo {
        let mut dataset = SyntheticDataset::new();
        dataset.push_scene(
            "a",
            vec![
                SyntheticFrame::keyframe("k0", 0.0, vec![([0.0, 0.0, 0.0], 24)])
                    .with_box("car", [10.0, 0.0, 0.0], [2.0, 4.0, 2.0]),
                SyntheticFrame::keyframe("k1", 0.0, vec![([0.0, 0.0, 0.0], 24)])
                    .with_box("car", [15.0, 0.0, 0.0], car_size),
            ],
        );
        FrameInfo::keyframe(&dataset, &SyntheticDataset::sample_token("k1")).unwrap()
    }

    fn source_box(instance: &str) -> TrackedBox {
        TrackedBox {
            bbox: boxed([10.0, 0.0, 0.0], [2.0, 4.0, 2.0], 0.0),
            annotation: "k0-car".into(),
            instance: instance.into(),
            label: 17,
            velocity: None,
        }
    }

    #[test]
    fn test_repose_about_rotated_boxes() {
        // quarter turn: the box's local +x becomes world +y
        let src = boxed([0.0, 0.0, 0.0], [2.0, 4.0, 2.0], 0.0);
        let dst = boxed([10.0, 5.0, 1.0], [2.0, 4.0, 2.0], FRAC_PI_2);
        let (moved, inside) = repose_points(&src, &dst, &cloud(&[[1.5, 0.5, 0.0]]));
        assert_relative_eq!(moved.points[0].x, 9.5, epsilon = 1e-9);
        assert_relative_eq!(moved.points[0].y, 6.5, epsilon = 1e-9);
        assert_relative_eq!(moved.points[0].z, 1.0, epsilon = 1e-9);
        assert_eq!(inside, vec![true]);
    }

    #[test]
    fn test_align_follows_instance() {
        let dest = destination([2.0, 4.0, 2.0]);
        let points = cloud(&[[10.5, 0.2, 0.1], [30.0, 0.0, 0.0], [9.0, -0.5, -0.5]]);
        let result = align_dynamic_objects(&source_box("car"), &points, &dest).unwrap();

        assert_eq!(result.source_mask, vec![true, false, true]);
        assert_eq!(result.aligned.labels(), &[17, 17]);
        assert_relative_eq!(result.aligned.points()[0].x, 15.5, epsilon = 1e-9);
        assert_relative_eq!(result.aligned.points()[1].x, 14.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_instance_is_dropped_with_mask() {
        let dest = destination([2.0, 4.0, 2.0]);
        let points = cloud(&[[10.5, 0.2, 0.1], [30.0, 0.0, 0.0]]);
        let result = align_dynamic_objects(&source_box("truck"), &points, &dest).unwrap();

        assert!(result.aligned.is_empty());
        assert!(result.aligned.labels().is_empty());
        assert_eq!(result.source_mask, vec![true, false]);
    }

    #[test]
    fn test_alignment_never_grows() {
        // the destination box is shorter, so the car's tail falls outside it
        let dest = destination([2.0, 2.0, 2.0]);
        let points = cloud(&[
            [8.2, 0.0, 0.0],
            [9.5, 0.0, 0.0],
            [10.0, 0.0, 0.0],
            [11.8, 0.0, 0.0],
            [20.0, 0.0, 0.0],
        ]);
        let result = align_dynamic_objects(&source_box("car"), &points, &dest).unwrap();

        let enclosed = result.source_mask.iter().filter(|m| **m).count();
        assert_eq!(enclosed, 4);
        assert_eq!(result.aligned.len(), 2);
        assert!(result.aligned.len() <= enclosed);
    }
}
