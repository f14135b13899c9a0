//! Secondary animators: object visibility, frame and material frame.
//!
//! Objects no thread animates take their defaults; the rest are written by
//! the first thread in list order that animates them. Blend threads take part
//! like any other thread here.

use crate::bitset::IndexSet;
use crate::interp::{interpolate_visibility, nearest_key};
use crate::sequence::{ObjectState, Sequence};
use crate::shape::{Shape, ShapeObject, SubShape};
use crate::thread_list::ThreadList;

fn animate_objects<T: Copy>(
    shape: &Shape,
    threads: &ThreadList,
    sub: &SubShape,
    out: &mut [T],
    matters: impl Fn(&Sequence) -> &IndexSet,
    default: impl Fn(&ShapeObject) -> T,
    sample: impl Fn(ObjectState, ObjectState, f32) -> T,
) {
    let range = sub.objects();
    if range.is_empty() {
        return;
    }

    let mut defaulted = IndexSet::from_range(range.clone());
    for thread in threads {
        defaulted.take_away(matters(&shape.sequences[thread.sequence().index()]));
    }
    for object in &defaulted {
        out[object] = default(&shape.objects[object]);
    }

    let mut open = IndexSet::from_range(range.clone());
    for thread in threads {
        let seq = &shape.sequences[thread.sequence().index()];
        let animated = matters(seq);
        if seq.num_keyframes == 0 || !animated.intersects_range(&range) {
            continue;
        }
        let (k1, k2, key_pos) = (thread.key_num1(), thread.key_num2(), thread.key_pos());
        let slots = seq.object_matters();
        let stride = slots.len();
        for (rank, object) in slots.ranked() {
            if object >= range.end {
                break;
            }
            if !animated.test(object) || !open.test(object) {
                continue;
            }
            out[object] = sample(
                seq.object_state_strided(k1, rank, stride),
                seq.object_state_strided(k2, rank, stride),
                key_pos,
            );
            open.clear(object);
        }
    }
}

pub(crate) fn animate_visibility(
    shape: &Shape,
    threads: &ThreadList,
    sub: &SubShape,
    cut_threshold: f32,
    out: &mut [f32],
) {
    animate_objects(
        shape,
        threads,
        sub,
        out,
        |seq| &seq.vis_matters,
        |object| object.default_visibility,
        |a, b, t| interpolate_visibility(a.visibility, b.visibility, t, cut_threshold),
    );
}

pub(crate) fn animate_frames(shape: &Shape, threads: &ThreadList, sub: &SubShape, out: &mut [u32]) {
    animate_objects(
        shape,
        threads,
        sub,
        out,
        |seq| &seq.frame_matters,
        |object| object.default_frame,
        |a, b, t| nearest_key(a.frame, b.frame, t),
    );
}

pub(crate) fn animate_mat_frames(
    shape: &Shape,
    threads: &ThreadList,
    sub: &SubShape,
    out: &mut [u32],
) {
    animate_objects(
        shape,
        threads,
        sub,
        out,
        |seq| &seq.mat_frame_matters,
        |object| object.default_mat_frame,
        |a, b, t| nearest_key(a.mat_frame, b.mat_frame, t),
    );
}
