//! Interpolation helpers.
//!
//! Rotations use shortest-arc slerp (nlerp near degenerate angles), vectors
//! and scalars use the two-product lerp form so both endpoints are exact.

pub mod functions;

pub use functions::{
    interpolate_visibility, lerp_f32, lerp_vec3, nearest_key, nlerp_quat, slerp_quat,
};
