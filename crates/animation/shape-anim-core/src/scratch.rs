//! Per-instance node workspace.
//!
//! Holds the component view (rotation, translation, scale) and the matrix view
//! (local transform) of every node. `local_dirty` marks nodes whose matrix was
//! changed after assembly (callbacks, blending) so that the component view no
//! longer matches; consumers that read components must refresh those first.
//! A refresh reads rotation, translation and, when the shape animates scale,
//! the axis scale back out of the matrix.

use std::ops::Range;

use crate::bitset::IndexSet;
use crate::ids::ThreadId;
use crate::math::{basis_scale, decompose, Mat4, Quat, Vec3};
use crate::scale::{ScaleKind, ScaleValue};

#[derive(Debug, Default)]
pub(crate) struct Scratch {
    pub(crate) scale_kind: ScaleKind,
    pub(crate) rotations: Vec<Quat>,
    pub(crate) translations: Vec<Vec3>,
    /// One value per node when the shape animates scale; empty otherwise.
    pub(crate) scales: Vec<ScaleValue>,
    pub(crate) local_transforms: Vec<Mat4>,
    pub(crate) local_dirty: IndexSet,

    pub(crate) rotation_owner: Vec<Option<ThreadId>>,
    pub(crate) translation_owner: Vec<Option<ThreadId>>,
    pub(crate) scale_owner: Vec<Option<ThreadId>>,

    // per-pass working sets
    pub(crate) need_rotation: IndexSet,
    pub(crate) need_translation: IndexSet,
    pub(crate) need_scale: IndexSet,
    pub(crate) modified: IndexSet,
}

impl Scratch {
    pub(crate) fn new(node_count: usize, scale_kind: ScaleKind) -> Self {
        let scales = ScaleValue::identity(scale_kind)
            .map(|id| vec![id; node_count])
            .unwrap_or_default();
        Self {
            scale_kind,
            rotations: vec![Quat::identity(); node_count],
            translations: vec![Vec3::zeros(); node_count],
            scales,
            local_transforms: vec![Mat4::identity(); node_count],
            local_dirty: IndexSet::new(),
            rotation_owner: vec![None; node_count],
            translation_owner: vec![None; node_count],
            scale_owner: vec![None; node_count],
            need_rotation: IndexSet::new(),
            need_translation: IndexSet::new(),
            need_scale: IndexSet::new(),
            modified: IndexSet::new(),
        }
    }

    #[inline]
    pub(crate) fn animates_scale(&self) -> bool {
        !self.scales.is_empty()
    }

    /// Reset per-evaluation state for a node range.
    pub(crate) fn begin_frame(&mut self, nodes: Range<usize>) {
        for node in nodes {
            self.local_dirty.clear(node);
            self.rotation_owner[node] = None;
            self.translation_owner[node] = None;
            self.scale_owner[node] = None;
        }
    }

    /// Re-derive the components of dirty nodes in `nodes` from their local
    /// matrix.
    pub(crate) fn refresh_components(&mut self, nodes: &IndexSet) {
        let mut stale = self.local_dirty.clone();
        stale.overlap(nodes);
        let with_scale = self.animates_scale();
        for node in &stale {
            let local = &self.local_transforms[node];
            let (rotation, translation) = decompose(local);
            self.rotations[node] = rotation;
            self.translations[node] = translation;
            if with_scale {
                if let Some(scale) = ScaleValue::from_axes(basis_scale(local), self.scale_kind) {
                    self.scales[node] = scale;
                }
            }
            self.local_dirty.clear(node);
        }
    }
}
