//! Evaluated results of a shape instance, read by renderers after `animate()`.

use crate::math::{Iso3, Mat4};
use crate::shape::Shape;

#[derive(Clone, Debug)]
pub struct Outputs {
    /// World transform per node.
    pub node_transforms: Vec<Mat4>,
    pub object_visibility: Vec<f32>,
    pub object_frames: Vec<u32>,
    pub object_mat_frames: Vec<u32>,
    /// Root motion accumulated by the last `advance_time`.
    pub ground_transform: Iso3,
}

impl Outputs {
    /// Outputs initialized to the shape's rest state.
    pub fn for_shape(shape: &Shape) -> Self {
        Self {
            node_transforms: vec![Mat4::identity(); shape.node_count()],
            object_visibility: shape.objects.iter().map(|o| o.default_visibility).collect(),
            object_frames: shape.objects.iter().map(|o| o.default_frame).collect(),
            object_mat_frames: shape.objects.iter().map(|o| o.default_mat_frame).collect(),
            ground_transform: Iso3::identity(),
        }
    }
}
