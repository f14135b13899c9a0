//! Composition evaluator.
//!
//! One call resolves every node of a sub-shape:
//! - default pose for nodes no owning thread animates (and masked nodes)
//! - first-writer-wins resolution over non-blend threads in list order
//! - scale, matrix assembly, callbacks, blend layers, transitions
//! - forward hierarchy composition into world transforms

use crate::bitset::IndexSet;
use crate::interp::{lerp_vec3, slerp_quat};
use crate::masks::{CallbackTable, NodeMasks};
use crate::math::{compose, Mat4, Quat, Vec3};
use crate::scale::{ScaleKind, ScaleValue};
use crate::scratch::Scratch;
use crate::shape::{Shape, SubShape};
use crate::thread_list::ThreadList;
use crate::transition::{self, ReferencePose};

/// Borrowed view of an instance for one node evaluation.
pub(crate) struct NodeEval<'a> {
    pub shape: &'a Shape,
    pub threads: &'a ThreadList,
    pub masks: &'a NodeMasks,
    pub callbacks: &'a mut CallbackTable,
    pub scratch: &'a mut Scratch,
    pub reference: &'a ReferencePose,
    pub scale_kind: ScaleKind,
    pub node_transforms: &'a mut [Mat4],
}

pub(crate) fn animate_nodes(eval: &mut NodeEval<'_>, sub: &SubShape) {
    let range = sub.nodes();
    if range.is_empty() {
        return;
    }
    log::trace!("animate_nodes {:?} with {} threads", range, eval.threads.len());

    eval.scratch.begin_frame(range.clone());
    resolve_rotation_translation(eval, sub);
    if eval.scale_kind != ScaleKind::None {
        resolve_scale(eval, sub);
    }
    assemble_locals(eval, sub);
    run_callbacks(eval, sub);
    apply_blends(eval, sub);
    if eval.threads.any_in_transition() {
        transition::apply_transitions(eval, sub);
    }
    compose_hierarchy(eval, sub);
}

/// Default pass followed by per-thread resolution of rotation and translation.
fn resolve_rotation_translation(eval: &mut NodeEval<'_>, sub: &SubShape) {
    let range = sub.nodes();
    let shape = eval.shape;
    let masks = eval.masks;
    let s = &mut *eval.scratch;

    let in_range = IndexSet::from_range(range.clone());
    let mut external = masks.external();
    external.overlap(&in_range);
    let mut masked_rotation = masks.rotation.clone();
    masked_rotation.overlap(&in_range);
    let mut masked_position = masks.any_position();
    masked_position.overlap(&in_range);

    s.need_rotation.clone_from(&in_range);
    s.need_translation.clone_from(&in_range);
    for thread in eval.threads.non_blend() {
        let seq = &shape.sequences[thread.sequence().index()];
        s.need_rotation.take_away(&seq.rotation_matters);
        s.need_translation.take_away(&seq.translation_matters);
    }
    s.need_rotation.union_with(&masked_rotation);
    s.need_rotation.union_with(&external);
    s.need_translation.union_with(&masked_position);
    s.need_translation.union_with(&external);

    for node in &s.need_rotation {
        s.rotations[node] = shape.default_rotation(node);
    }
    for node in &s.need_translation {
        s.translations[node] = shape.default_translation(node);
    }

    // Nodes threads may still write.
    let mut open_rotation = in_range.clone();
    open_rotation.take_away(&masked_rotation);
    open_rotation.take_away(&external);
    let mut open_translation = in_range;
    open_translation.take_away(&external);

    for thread in eval.threads.non_blend() {
        let seq = &shape.sequences[thread.sequence().index()];
        if seq.num_keyframes == 0 {
            continue;
        }
        let (k1, k2, key_pos) = (thread.key_num1(), thread.key_num2(), thread.key_pos());

        for (rank, node) in seq.rotation_matters.ranked() {
            if node >= range.end {
                break;
            }
            if !open_rotation.test(node) {
                continue;
            }
            s.rotations[node] =
                slerp_quat(&seq.rotation(k1, rank), &seq.rotation(k2, rank), key_pos);
            s.rotation_owner[node] = Some(thread.id());
            open_rotation.clear(node);
        }

        for (rank, node) in seq.translation_matters.ranked() {
            if node >= range.end {
                break;
            }
            if !open_translation.test(node) {
                continue;
            }
            let value = lerp_vec3(
                &seq.translation(k1, rank),
                &seq.translation(k2, rank),
                key_pos,
            );
            if masked_position.test(node) {
                let axis_masks = [
                    masks.pos_x.test(node),
                    masks.pos_y.test(node),
                    masks.pos_z.test(node),
                ];
                for (axis, masked) in axis_masks.into_iter().enumerate() {
                    if !masked {
                        s.translations[node][axis] = value[axis];
                    }
                }
            } else {
                s.translations[node] = value;
                s.translation_owner[node] = Some(thread.id());
            }
            open_translation.clear(node);
        }
    }
}

/// Same two-step resolution for scale, widened to the shape's representation.
fn resolve_scale(eval: &mut NodeEval<'_>, sub: &SubShape) {
    let range = sub.nodes();
    let kind = eval.scale_kind;
    let Some(identity) = ScaleValue::identity(kind) else {
        return;
    };
    let shape = eval.shape;
    let s = &mut *eval.scratch;

    let in_range = IndexSet::from_range(range.clone());
    let mut external = eval.masks.external();
    external.overlap(&in_range);

    s.need_scale.clone_from(&in_range);
    for thread in eval.threads.non_blend() {
        s.need_scale
            .take_away(&shape.sequences[thread.sequence().index()].scale_matters);
    }
    s.need_scale.union_with(&external);
    for node in &s.need_scale {
        s.scales[node] = identity;
    }

    let mut open = in_range;
    open.take_away(&external);
    for thread in eval.threads.non_blend() {
        let seq = &shape.sequences[thread.sequence().index()];
        if seq.num_keyframes == 0 {
            continue;
        }
        let (k1, k2, key_pos) = (thread.key_num1(), thread.key_num2(), thread.key_pos());
        for (rank, node) in seq.scale_matters.ranked() {
            if node >= range.end {
                break;
            }
            if !open.test(node) {
                continue;
            }
            s.scales[node] =
                ScaleValue::interpolate(seq.scale(k1, rank), seq.scale(k2, rank), key_pos)
                    .widen(kind);
            s.scale_owner[node] = Some(thread.id());
            open.clear(node);
        }
    }
}

/// Local matrix from components. Hands-off nodes keep the caller's matrix.
fn assemble_locals(eval: &mut NodeEval<'_>, sub: &SubShape) {
    let s = &mut *eval.scratch;
    let with_scale = s.animates_scale();
    for node in sub.nodes() {
        if eval.masks.hands_off.test(node) {
            continue;
        }
        let mut local = compose(&s.rotations[node], &s.translations[node]);
        if with_scale {
            local *= s.scales[node].to_matrix();
        }
        s.local_transforms[node] = local;
    }
}

fn run_callbacks(eval: &mut NodeEval<'_>, sub: &SubShape) {
    if eval.callbacks.is_empty() {
        return;
    }
    let s = &mut *eval.scratch;
    for node in eval.masks.callback.iter_range(sub.nodes()) {
        if let Some(callback) = eval.callbacks.get_mut(node) {
            callback.update(node, &mut s.local_transforms[node]);
            s.local_dirty.set(node);
        }
    }
}

/// Post-multiply blend sequences onto the assembled locals.
fn apply_blends(eval: &mut NodeEval<'_>, sub: &SubShape) {
    let range = sub.nodes();
    let shape = eval.shape;
    let masks = eval.masks;
    let s = &mut *eval.scratch;

    for thread in eval.threads.active_blend() {
        let seq = &shape.sequences[thread.sequence().index()];
        let matters = seq.node_matters();
        if seq.num_keyframes == 0 || !matters.intersects_range(&range) {
            continue;
        }
        let (k1, k2, key_pos) = (thread.key_num1(), thread.key_num2(), thread.key_pos());
        let (mut jrot, mut jtrans, mut jscale) = (0usize, 0usize, 0usize);

        for node in &matters {
            let rot_rank = seq.rotation_matters.test(node).then(|| {
                jrot += 1;
                jrot - 1
            });
            let trans_rank = seq.translation_matters.test(node).then(|| {
                jtrans += 1;
                jtrans - 1
            });
            let scale_rank = seq.scale_matters.test(node).then(|| {
                jscale += 1;
                jscale - 1
            });

            if node < range.start {
                continue;
            }
            if node >= range.end {
                break;
            }
            if masks.disable_blend.test(node) || masks.hands_off.test(node) {
                continue;
            }

            let rotation = rot_rank.map_or_else(Quat::identity, |r| {
                slerp_quat(&seq.rotation(k1, r), &seq.rotation(k2, r), key_pos)
            });
            let translation = trans_rank.map_or_else(Vec3::zeros, |r| {
                lerp_vec3(&seq.translation(k1, r), &seq.translation(k2, r), key_pos)
            });
            let mut blend = compose(&rotation, &translation);
            if let Some(r) = scale_rank {
                blend *= ScaleValue::interpolate(seq.scale(k1, r), seq.scale(k2, r), key_pos)
                    .to_matrix();
            }
            s.local_transforms[node] *= blend;
            s.local_dirty.set(node);
        }
    }
}

/// Forward pass; parents precede children so one sweep suffices.
fn compose_hierarchy(eval: &mut NodeEval<'_>, sub: &SubShape) {
    let locals = &eval.scratch.local_transforms;
    let world = &mut *eval.node_transforms;
    for node in sub.nodes() {
        world[node] = match eval.shape.nodes[node].parent {
            Some(parent) => world[parent] * locals[node],
            None => locals[node],
        };
    }
}
