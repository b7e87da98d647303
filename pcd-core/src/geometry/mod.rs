pub mod oriented_box;
pub mod rigid;

pub use oriented_box::OrientedBox;
pub use rigid::{rotate, transform, translate, FramePose, Pose};
