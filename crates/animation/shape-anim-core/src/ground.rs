//! Ground (root motion) extraction.
//!
//! A sequence with `G` ground frames places them at positions `1/G ..= G/G`;
//! position 0 is the identity. Motion between two unwrapped positions is
//! accumulated loop by loop so cyclic sequences can walk indefinitely.

use nalgebra::Translation3;

use crate::interp::{lerp_vec3, slerp_quat};
use crate::math::{Iso3, Quat, Vec3};
use crate::sequence::Sequence;

/// Ground transform at normalized position `t` (clamped to [0, 1]).
pub fn ground_at(sequence: &Sequence, t: f32) -> Iso3 {
    let g = sequence.num_ground_frames();
    if g == 0 {
        return Iso3::identity();
    }
    let p = t.clamp(0.0, 1.0) * g as f32;
    let kf = (p.floor() as usize).min(g - 1);
    let frac = p - kf as f32;

    let (r1, t1) = if kf == 0 {
        (Quat::identity(), Vec3::zeros())
    } else {
        sequence.ground_frame(kf - 1)
    };
    let (r2, t2) = sequence.ground_frame(kf);
    Iso3::from_parts(
        Translation3::from(lerp_vec3(&t1, &t2, frac)),
        slerp_quat(&r1, &r2, frac),
    )
}

/// Ground motion from unwrapped position `start` to `end`.
///
/// Spans shorter than `min_span` are identity; reversed ranges give the
/// inverse of the forward motion.
pub fn ground_delta(sequence: &Sequence, start: f32, end: f32, min_span: f32) -> Iso3 {
    if sequence.num_ground_frames() == 0 || (end - start).abs() < min_span {
        return Iso3::identity();
    }
    if end < start {
        return ground_delta(sequence, end, start, min_span).inverse();
    }

    let start_loop = start.floor();
    let end_loop = end.floor();
    let s = start - start_loop;
    let e = end - end_loop;
    if start_loop == end_loop {
        return ground_at(sequence, s).inverse() * ground_at(sequence, e);
    }

    let full_loop = ground_at(sequence, 1.0);
    let mut delta = ground_at(sequence, s).inverse() * full_loop;
    let full_loops = (end_loop - start_loop) as i64 - 1;
    for _ in 0..full_loops {
        delta *= full_loop;
    }
    delta * ground_at(sequence, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn walker() -> Sequence {
        // Two ground frames: 1m forward at 0.5, 2m forward at 1.0.
        Sequence::builder("walk", 2, 1.0)
            .cyclic(true)
            .ground_frame([0.0, 0.0, 0.0, 1.0], [1.0, 0.0, 0.0])
            .ground_frame([0.0, 0.0, 0.0, 1.0], [2.0, 0.0, 0.0])
            .build()
            .unwrap()
    }

    #[test]
    fn ground_starts_at_identity_and_hits_frames() {
        let seq = walker();
        assert_eq!(ground_at(&seq, 0.0), Iso3::identity());
        assert_relative_eq!(ground_at(&seq, 0.5).translation.vector.x, 1.0);
        assert_relative_eq!(ground_at(&seq, 0.25).translation.vector.x, 0.5);
        assert_relative_eq!(ground_at(&seq, 1.0).translation.vector.x, 2.0);
    }

    #[test]
    fn deltas_accumulate_across_loops() {
        let seq = walker();
        let one = ground_delta(&seq, 0.0, 1.0, 0.001);
        assert_relative_eq!(one.translation.vector.x, 2.0, epsilon = 1e-5);
        let many = ground_delta(&seq, 0.0, 2.5, 0.001);
        assert_relative_eq!(many.translation.vector.x, 5.0, epsilon = 1e-5);
        let partial = ground_delta(&seq, 0.75, 1.25, 0.001);
        assert_relative_eq!(partial.translation.vector.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn reversed_and_tiny_spans() {
        let seq = walker();
        let back = ground_delta(&seq, 0.5, 0.25, 0.001);
        assert_relative_eq!(back.translation.vector.x, -0.5, epsilon = 1e-5);
        assert_eq!(ground_delta(&seq, 0.5, 0.5004, 0.001), Iso3::identity());
    }
}
