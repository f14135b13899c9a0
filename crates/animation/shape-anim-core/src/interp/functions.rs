//! Interpolation helpers:
//! - lerp_f32 / lerp_vec3 (exact at t = 0 and t = 1)
//! - slerp_quat with shortest-arc handling and an nlerp fallback
//! - interpolate_visibility (discrete cut for on/off keys)
//! - nearest_key (frame and material frame selection)

use crate::math::{Quat, Vec3};

const SLERP_EPSILON: f32 = 1.0e-6;

/// Linear interpolation of scalars. Written as `a(1-t) + bt` so the
/// endpoints reproduce `a` and `b` exactly.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

#[inline]
pub fn lerp_vec3(a: &Vec3, b: &Vec3, t: f32) -> Vec3 {
    if t <= 0.0 {
        return *a;
    }
    if t >= 1.0 {
        return *b;
    }
    a * (1.0 - t) + b * t
}

#[inline]
pub fn lerp_array3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

/// Quaternion NLERP with shortest-arc correction.
#[inline]
pub fn nlerp_quat(a: &Quat, b: &Quat, t: f32) -> Quat {
    let mut target = b.into_inner();
    if a.coords.dot(&target.coords) < 0.0 {
        target = -target;
    }
    let raw = a.into_inner() * (1.0 - t) + target * t;
    if raw.norm_squared() > 0.0 {
        Quat::new_normalize(raw)
    } else {
        *a
    }
}

/// Spherical linear interpolation along the shortest arc. Endpoints are
/// returned unchanged; nearly parallel inputs fall back to NLERP.
#[inline]
pub fn slerp_quat(a: &Quat, b: &Quat, t: f32) -> Quat {
    if t <= 0.0 {
        return *a;
    }
    if t >= 1.0 {
        return *b;
    }
    a.try_slerp(b, t, SLERP_EPSILON)
        .unwrap_or_else(|| nlerp_quat(a, b, t))
}

/// Visibility between two keys. Keys that differ by more than
/// `cut_threshold` (squared) are authored on/off switches: the value snaps at
/// `key_pos = 0.5` instead of fading through semi-transparency.
#[inline]
pub fn interpolate_visibility(v1: f32, v2: f32, key_pos: f32, cut_threshold: f32) -> f32 {
    let diff = v1 - v2;
    if diff * diff > cut_threshold {
        if key_pos < 0.5 {
            v1
        } else {
            v2
        }
    } else {
        lerp_f32(v1, v2, key_pos)
    }
}

/// Discrete selection between two keyed values.
#[inline]
pub fn nearest_key<T: Copy>(k1: T, k2: T, key_pos: f32) -> T {
    if key_pos < 0.5 {
        k1
    } else {
        k2
    }
}
