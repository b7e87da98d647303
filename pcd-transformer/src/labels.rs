//! lidarseg class indices with special handling.

use std::ops::RangeInclusive;

pub const NOISE: u8 = 0;
pub const EGO_VEHICLE: u8 = 31;

/// flat.driveable_surface ..= static.vegetation
pub const STATIC_CLASSES: RangeInclusive<u8> = 24..=30;

pub fn is_static(label: u8) -> bool {
    STATIC_CLASSES.contains(&label)
}
