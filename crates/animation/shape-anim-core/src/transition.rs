//! Transition blending.
//!
//! When a thread switches sequence with a crossfade, the pose of every node
//! the switch can affect is captured into a [`ReferencePose`]. Each evaluation
//! then interpolates from that reference toward the live pose by the
//! controlling thread's transition position: 0 reproduces the reference, 1
//! the live pose.

use crate::animate::NodeEval;
use crate::bitset::IndexSet;
use crate::ids::ThreadId;
use crate::interp::{lerp_vec3, slerp_quat};
use crate::masks::NodeMasks;
use crate::math::{compose, Quat, Vec3};
use crate::scale::{ScaleKind, ScaleValue};
use crate::scratch::Scratch;
use crate::sequence::Sequence;
use crate::shape::{Shape, SubShape};
use crate::thread::Transition;
use crate::thread_list::ThreadList;

/// Pose captured when the most recent transition began.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReferencePose {
    rotations: Vec<Quat>,
    translations: Vec<Vec3>,
    scales: Vec<ScaleValue>,
}

impl ReferencePose {
    pub(crate) fn new(node_count: usize, scale_kind: ScaleKind) -> Self {
        Self {
            rotations: vec![Quat::identity(); node_count],
            translations: vec![Vec3::zeros(); node_count],
            scales: ScaleValue::identity(scale_kind)
                .map(|id| vec![id; node_count])
                .unwrap_or_default(),
        }
    }

    /// Copy the component view of every transition node. The scratch must
    /// have been refreshed for those nodes.
    pub(crate) fn capture(&mut self, scratch: &Scratch, sets: &TransitionSets) {
        for node in &sets.rotation {
            self.rotations[node] = scratch.rotations[node];
        }
        for node in &sets.translation {
            self.translations[node] = scratch.translations[node];
        }
        if scratch.animates_scale() {
            for node in &sets.scale {
                self.scales[node] = scratch.scales[node];
            }
        }
    }
}

/// Nodes whose components crossfade.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionSets {
    pub rotation: IndexSet,
    pub translation: IndexSet,
    pub scale: IndexSet,
}

impl TransitionSets {
    pub fn all(&self) -> IndexSet {
        let mut set = self.rotation.clone();
        set.union_with(&self.translation);
        set.union_with(&self.scale);
        set
    }

    fn restrict(&mut self, range: &IndexSet) {
        self.rotation.overlap(range);
        self.translation.overlap(range);
        self.scale.overlap(range);
    }
}

/// Union over in-transition threads of the nodes they used to control and the
/// nodes they control now. Hands-off nodes never crossfade; masked rotations
/// stay at the default pose and are left out of the rotation set. Callback
/// nodes take part with whatever the callback wrote.
pub fn transition_sets(shape: &Shape, threads: &ThreadList, masks: &NodeMasks) -> TransitionSets {
    let mut sets = TransitionSets::default();
    for thread in threads {
        let Some(transition) = thread.transition() else {
            continue;
        };
        let seq = &shape.sequences[thread.sequence().index()];
        sets.rotation.union_with(&transition.old_rotation_matters);
        sets.rotation.union_with(&seq.rotation_matters);
        sets.translation
            .union_with(&transition.old_translation_matters);
        sets.translation.union_with(&seq.translation_matters);
        sets.scale.union_with(&transition.old_scale_matters);
        sets.scale.union_with(&seq.scale_matters);
    }
    sets.rotation.take_away(&masks.hands_off);
    sets.rotation.take_away(&masks.rotation);
    sets.translation.take_away(&masks.hands_off);
    sets.scale.take_away(&masks.hands_off);
    sets
}

/// Transition position governing `node`: the owning thread's if it is
/// crossfading, else the first crossfading thread that touches the node.
fn controlling_pos(
    shape: &Shape,
    threads: &ThreadList,
    owner: Option<ThreadId>,
    touches: impl Fn(&Transition, &Sequence) -> bool,
) -> Option<f32> {
    if let Some(transition) = owner
        .and_then(|id| threads.get(id))
        .and_then(|t| t.transition())
    {
        return Some(transition.pos);
    }
    threads.iter().find_map(|thread| {
        let transition = thread.transition()?;
        let seq = &shape.sequences[thread.sequence().index()];
        touches(transition, seq).then_some(transition.pos)
    })
}

pub(crate) fn apply_transitions(eval: &mut NodeEval<'_>, sub: &SubShape) {
    let shape = eval.shape;
    let threads = eval.threads;
    let reference = eval.reference;
    let s = &mut *eval.scratch;

    let mut sets = transition_sets(shape, threads, eval.masks);
    sets.restrict(&IndexSet::from_range(sub.nodes()));
    s.refresh_components(&sets.all());
    s.modified.clear_all();

    for node in &sets.rotation {
        let owner = s.rotation_owner[node];
        let Some(t) = controlling_pos(shape, threads, owner, |tr, seq| {
            tr.old_rotation_matters.test(node) || seq.rotation_matters.test(node)
        }) else {
            log::warn!("no transitioning thread controls rotation of node {node}");
            continue;
        };
        if t >= 1.0 {
            continue;
        }
        s.rotations[node] = slerp_quat(&reference.rotations[node], &s.rotations[node], t);
        s.modified.set(node);
    }

    for node in &sets.translation {
        let owner = s.translation_owner[node];
        let Some(t) = controlling_pos(shape, threads, owner, |tr, seq| {
            tr.old_translation_matters.test(node) || seq.translation_matters.test(node)
        }) else {
            log::warn!("no transitioning thread controls translation of node {node}");
            continue;
        };
        if t >= 1.0 {
            continue;
        }
        s.translations[node] =
            lerp_vec3(&reference.translations[node], &s.translations[node], t);
        s.modified.set(node);
    }

    if s.animates_scale() {
        for node in &sets.scale {
            let owner = s.scale_owner[node];
            let Some(t) = controlling_pos(shape, threads, owner, |tr, seq| {
                tr.old_scale_matters.test(node) || seq.scale_matters.test(node)
            }) else {
                log::warn!("no transitioning thread controls scale of node {node}");
                continue;
            };
            if t >= 1.0 {
                continue;
            }
            s.scales[node] = ScaleValue::interpolate(reference.scales[node], s.scales[node], t)
                .widen(eval.scale_kind);
            s.modified.set(node);
        }
    }

    let with_scale = s.animates_scale();
    for node in &s.modified {
        let mut local = compose(&s.rotations[node], &s.translations[node]);
        if with_scale {
            local *= s.scales[node].to_matrix();
        }
        s.local_transforms[node] = local;
    }
}
