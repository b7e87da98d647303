use nalgebra::Vector3;
use pcd_core::geometry::{OrientedBox, Pose};

use super::table::SampleAnnotation;
use super::token::{AnnotationToken, InstanceToken};

/// An annotated box as seen from one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBox {
    pub bbox: OrientedBox,
    pub annotation: AnnotationToken,
    pub instance: InstanceToken,
    pub category: String,
}

pub(crate) fn annotation_box(ann: &SampleAnnotation) -> ObjectBox {
    ObjectBox {
        bbox: OrientedBox::new(
            Vector3::from(ann.translation),
            ann.size,
            Pose::from_wxyz(ann.rotation, ann.translation).rotation,
        ),
        annotation: ann.token.clone(),
        instance: ann.instance_token.clone(),
        category: ann.category_name.clone(),
    }
}

/// Fraction of the way from `t0` to `t1` at time `t`, clamped to the interval.
pub(crate) fn interpolation_amount(t0: u64, t1: u64, t: u64) -> f64 {
    if t1 <= t0 {
        return 0.0;
    }
    let t = t.clamp(t0, t1);
    (t - t0) as f64 / (t1 - t0) as f64
}

/// Box between two annotations of the same instance: linear center, slerped orientation.
/// Size and identity come from `curr`.
pub(crate) fn interpolate_box(
    prev: &SampleAnnotation,
    curr: &SampleAnnotation,
    amount: f64,
) -> ObjectBox {
    let c0 = Vector3::from(prev.translation);
    let c1 = Vector3::from(curr.translation);
    let q0 = Pose::from_wxyz(prev.rotation, prev.translation).rotation;
    let q1 = Pose::from_wxyz(curr.rotation, curr.translation).rotation;

    let mut object = annotation_box(curr);
    object.bbox.center = c0.lerp(&c1, amount);
    object.bbox.orientation = q0.slerp(&q1, amount);
    object
}

/// Moves a global-frame box into the sensor frame of a sweep.
pub(crate) fn global_to_sensor(bbox: &mut OrientedBox, ego: &Pose, calibration: &Pose) {
    bbox.translate(&-ego.translation);
    bbox.rotate(&ego.rotation.inverse());
    bbox.translate(&-calibration.translation);
    bbox.rotate(&calibration.rotation.inverse());
}
