//! Read-only animation sequence data.
//!
//! Keyframe data is dense and key-major: for a sequence with `N` keys whose
//! `rotation_matters` set has `M` members, `rotations[key * M + rank]` holds
//! the rotation of the `rank`-th member node at `key`. Translation, scale and
//! object state storage follow the same layout over their own sets; object
//! states share one slot per member of `frame ∪ mat_frame ∪ vis` matters.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::bitset::IndexSet;
use crate::error::{Result, ShapeAnimError};
use crate::math::{quat_from_xyzw, vec3_from_array, Quat, Vec3};
use crate::scale::{ScaleKind, ScaleValue};

/// Per-object animated state at one keyframe.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    #[serde(default = "default_visibility")]
    pub visibility: f32,
    #[serde(default)]
    pub frame: u32,
    #[serde(default)]
    pub mat_frame: u32,
}

fn default_visibility() -> f32 {
    1.0
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            visibility: 1.0,
            frame: 0,
            mat_frame: 0,
        }
    }
}

/// An authored animation clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub num_keyframes: usize,
    /// Seconds for one pass through the sequence at time scale 1.
    pub duration: f32,
    /// Cyclic sequences wrap; one-shot sequences clamp at their ends.
    #[serde(default)]
    pub cyclic: bool,
    /// Blend sequences layer onto the composed pose instead of owning nodes.
    #[serde(default)]
    pub blend: bool,
    #[serde(default)]
    pub scale_kind: ScaleKind,

    #[serde(default)]
    pub rotation_matters: IndexSet,
    #[serde(default)]
    pub translation_matters: IndexSet,
    #[serde(default)]
    pub scale_matters: IndexSet,
    #[serde(default)]
    pub vis_matters: IndexSet,
    #[serde(default)]
    pub frame_matters: IndexSet,
    #[serde(default)]
    pub mat_frame_matters: IndexSet,

    /// Quaternions (x, y, z, w).
    #[serde(default)]
    pub rotations: Vec<[f32; 4]>,
    #[serde(default)]
    pub translations: Vec<[f32; 3]>,
    #[serde(default)]
    pub scales: Vec<ScaleValue>,
    #[serde(default)]
    pub object_states: Vec<ObjectState>,

    /// Root-motion keys at positions `1/G ..= G/G`; position 0 is identity.
    #[serde(default)]
    pub ground_rotations: Vec<[f32; 4]>,
    #[serde(default)]
    pub ground_translations: Vec<[f32; 3]>,
}

impl Sequence {
    /// Start building a sequence track by track.
    pub fn builder(name: &str, num_keyframes: usize, duration: f32) -> SequenceBuilder {
        SequenceBuilder::new(name, num_keyframes, duration)
    }

    #[inline]
    pub fn rotation(&self, key: usize, rank: usize) -> Quat {
        let stride = self.rotation_matters.len();
        debug_assert!(rank < stride, "rotation rank out of range");
        quat_from_xyzw(self.rotations[key * stride + rank])
    }

    #[inline]
    pub fn translation(&self, key: usize, rank: usize) -> Vec3 {
        let stride = self.translation_matters.len();
        debug_assert!(rank < stride, "translation rank out of range");
        vec3_from_array(self.translations[key * stride + rank])
    }

    #[inline]
    pub fn scale(&self, key: usize, rank: usize) -> ScaleValue {
        let stride = self.scale_matters.len();
        debug_assert!(rank < stride, "scale rank out of range");
        self.scales[key * stride + rank]
    }

    #[inline]
    pub fn object_state(&self, key: usize, rank: usize) -> ObjectState {
        self.object_state_strided(key, rank, self.object_matters().len())
    }

    /// [`Sequence::object_state`] with the slot count per key supplied by the
    /// caller, avoiding the union of the object sets on every lookup.
    #[inline]
    pub fn object_state_strided(&self, key: usize, rank: usize, stride: usize) -> ObjectState {
        debug_assert!(rank < stride, "object rank out of range");
        self.object_states[key * stride + rank]
    }

    /// Objects with any animated state.
    pub fn object_matters(&self) -> IndexSet {
        let mut set = self.frame_matters.clone();
        set.union_with(&self.mat_frame_matters);
        set.union_with(&self.vis_matters);
        set
    }

    /// Nodes with any animated transform component.
    pub fn node_matters(&self) -> IndexSet {
        let mut set = self.rotation_matters.clone();
        set.union_with(&self.translation_matters);
        set.union_with(&self.scale_matters);
        set
    }

    pub fn animates_transform(&self) -> bool {
        !(self.rotation_matters.is_empty()
            && self.translation_matters.is_empty()
            && self.scale_matters.is_empty())
    }

    #[inline]
    pub fn num_ground_frames(&self) -> usize {
        self.ground_translations.len()
    }

    /// Ground frame `frame` (0-based, i.e. position `(frame + 1) / G`).
    #[inline]
    pub fn ground_frame(&self, frame: usize) -> (Quat, Vec3) {
        (
            quat_from_xyzw(self.ground_rotations[frame]),
            vec3_from_array(self.ground_translations[frame]),
        )
    }

    /// Check storage sizes and index ranges against a shape.
    pub fn validate(&self, node_count: usize, object_count: usize) -> Result<()> {
        let invalid = |reason: String| ShapeAnimError::InvalidSequence {
            sequence: self.name.clone(),
            reason,
        };
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(invalid(format!("duration {} is not usable", self.duration)));
        }
        let n = self.num_keyframes;
        if n == 0 && (self.animates_transform() || !self.object_matters().is_empty()) {
            return Err(invalid("animated sets require at least one keyframe".into()));
        }
        let check_len = |what: &str, actual: usize, members: usize| {
            if actual != n * members {
                Err(invalid(format!(
                    "{what} storage holds {actual} entries, expected {}",
                    n * members
                )))
            } else {
                Ok(())
            }
        };
        check_len("rotation", self.rotations.len(), self.rotation_matters.len())?;
        check_len(
            "translation",
            self.translations.len(),
            self.translation_matters.len(),
        )?;
        check_len("scale", self.scales.len(), self.scale_matters.len())?;
        check_len(
            "object state",
            self.object_states.len(),
            self.object_matters().len(),
        )?;

        if self.ground_rotations.len() != self.ground_translations.len() {
            return Err(invalid(format!(
                "{} ground rotations but {} ground translations",
                self.ground_rotations.len(),
                self.ground_translations.len()
            )));
        }
        if !self.scale_matters.is_empty() && self.scale_kind == ScaleKind::None {
            return Err(invalid("scale keys present but scale kind is None".into()));
        }
        if let Some(bad) = self.scales.iter().find(|s| s.kind() > self.scale_kind) {
            return Err(invalid(format!(
                "scale key {:?} is wider than the sequence kind {:?}",
                bad.kind(),
                self.scale_kind
            )));
        }

        if let Some(max) = self.node_matters().iter().last() {
            if max >= node_count {
                return Err(ShapeAnimError::NodeOutOfRange {
                    index: max,
                    count: node_count,
                });
            }
        }
        if let Some(max) = self.object_matters().iter().last() {
            if max >= object_count {
                return Err(ShapeAnimError::ObjectOutOfRange {
                    index: max,
                    count: object_count,
                });
            }
        }
        Ok(())
    }
}

/// Track-by-track construction of a [`Sequence`], producing the dense layout.
#[derive(Clone, Debug)]
pub struct SequenceBuilder {
    name: String,
    num_keyframes: usize,
    duration: f32,
    cyclic: bool,
    blend: bool,
    rotations: BTreeMap<usize, Vec<[f32; 4]>>,
    translations: BTreeMap<usize, Vec<[f32; 3]>>,
    scales: BTreeMap<usize, Vec<ScaleValue>>,
    visibility: BTreeMap<usize, Vec<f32>>,
    frames: BTreeMap<usize, Vec<u32>>,
    mat_frames: BTreeMap<usize, Vec<u32>>,
    ground: Vec<([f32; 4], [f32; 3])>,
}

impl SequenceBuilder {
    pub fn new(name: &str, num_keyframes: usize, duration: f32) -> Self {
        Self {
            name: name.to_string(),
            num_keyframes,
            duration,
            cyclic: false,
            blend: false,
            rotations: BTreeMap::new(),
            translations: BTreeMap::new(),
            scales: BTreeMap::new(),
            visibility: BTreeMap::new(),
            frames: BTreeMap::new(),
            mat_frames: BTreeMap::new(),
            ground: Vec::new(),
        }
    }

    pub fn cyclic(mut self, cyclic: bool) -> Self {
        self.cyclic = cyclic;
        self
    }

    pub fn blend(mut self, blend: bool) -> Self {
        self.blend = blend;
        self
    }

    /// Rotation keys (xyzw) for `node`, one per keyframe.
    pub fn rotation_track(mut self, node: usize, keys: impl Into<Vec<[f32; 4]>>) -> Self {
        self.rotations.insert(node, keys.into());
        self
    }

    pub fn translation_track(mut self, node: usize, keys: impl Into<Vec<[f32; 3]>>) -> Self {
        self.translations.insert(node, keys.into());
        self
    }

    pub fn scale_track(mut self, node: usize, keys: impl Into<Vec<ScaleValue>>) -> Self {
        self.scales.insert(node, keys.into());
        self
    }

    pub fn visibility_track(mut self, object: usize, keys: impl Into<Vec<f32>>) -> Self {
        self.visibility.insert(object, keys.into());
        self
    }

    pub fn frame_track(mut self, object: usize, keys: impl Into<Vec<u32>>) -> Self {
        self.frames.insert(object, keys.into());
        self
    }

    pub fn mat_frame_track(mut self, object: usize, keys: impl Into<Vec<u32>>) -> Self {
        self.mat_frames.insert(object, keys.into());
        self
    }

    /// Append one ground frame.
    pub fn ground_frame(mut self, rotation: [f32; 4], translation: [f32; 3]) -> Self {
        self.ground.push((rotation, translation));
        self
    }

    fn check_len(&self, index: usize, actual: usize) -> Result<()> {
        if actual != self.num_keyframes {
            return Err(ShapeAnimError::TrackLength {
                sequence: self.name.clone(),
                index,
                expected: self.num_keyframes,
                actual,
            });
        }
        Ok(())
    }

    pub fn build(self) -> Result<Sequence> {
        for (node, keys) in &self.rotations {
            self.check_len(*node, keys.len())?;
        }
        for (node, keys) in &self.translations {
            self.check_len(*node, keys.len())?;
        }
        for (node, keys) in &self.scales {
            self.check_len(*node, keys.len())?;
        }
        for (object, keys) in &self.visibility {
            self.check_len(*object, keys.len())?;
        }
        for (object, keys) in self.frames.iter().chain(self.mat_frames.iter()) {
            self.check_len(*object, keys.len())?;
        }

        let n = self.num_keyframes;
        let scale_kind = self
            .scales
            .values()
            .flatten()
            .map(ScaleValue::kind)
            .max()
            .unwrap_or(ScaleKind::None);

        let objects: BTreeSet<usize> = self
            .visibility
            .keys()
            .chain(self.frames.keys())
            .chain(self.mat_frames.keys())
            .copied()
            .collect();

        let mut rotations = Vec::with_capacity(n * self.rotations.len());
        let mut translations = Vec::with_capacity(n * self.translations.len());
        let mut scales = Vec::with_capacity(n * self.scales.len());
        let mut object_states = Vec::with_capacity(n * objects.len());
        for key in 0..n {
            rotations.extend(self.rotations.values().map(|track| track[key]));
            translations.extend(self.translations.values().map(|track| track[key]));
            scales.extend(self.scales.values().map(|track| track[key].widen(scale_kind)));
            object_states.extend(objects.iter().map(|object| ObjectState {
                visibility: self.visibility.get(object).map_or(1.0, |v| v[key]),
                frame: self.frames.get(object).map_or(0, |v| v[key]),
                mat_frame: self.mat_frames.get(object).map_or(0, |v| v[key]),
            }));
        }

        Ok(Sequence {
            name: self.name,
            num_keyframes: n,
            duration: self.duration,
            cyclic: self.cyclic,
            blend: self.blend,
            scale_kind,
            rotation_matters: self.rotations.keys().copied().collect(),
            translation_matters: self.translations.keys().copied().collect(),
            scale_matters: self.scales.keys().copied().collect(),
            vis_matters: self.visibility.keys().copied().collect(),
            frame_matters: self.frames.keys().copied().collect(),
            mat_frame_matters: self.mat_frames.keys().copied().collect(),
            rotations,
            translations,
            scales,
            object_states,
            ground_rotations: self.ground.iter().map(|(r, _)| *r).collect(),
            ground_translations: self.ground.iter().map(|(_, t)| *t).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_lays_out_key_major_by_node_rank() {
        let seq = Sequence::builder("walk", 2, 1.0)
            .translation_track(5, [[5.0, 0.0, 0.0], [5.5, 0.0, 0.0]])
            .translation_track(2, [[2.0, 0.0, 0.0], [2.5, 0.0, 0.0]])
            .build()
            .unwrap();
        assert_eq!(seq.translation_matters.iter().collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(seq.translation(0, 0).x, 2.0);
        assert_eq!(seq.translation(0, 1).x, 5.0);
        assert_eq!(seq.translation(1, 1).x, 5.5);
        seq.validate(6, 0).unwrap();
    }

    #[test]
    fn builder_rejects_short_tracks() {
        let err = Sequence::builder("bad", 3, 1.0)
            .rotation_track(0, [[0.0, 0.0, 0.0, 1.0]])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ShapeAnimError::TrackLength {
                expected: 3,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn scale_keys_widen_to_the_widest_track() {
        let seq = Sequence::builder("grow", 1, 1.0)
            .scale_track(0, [ScaleValue::Uniform(2.0)])
            .scale_track(1, [ScaleValue::Aligned([1.0, 2.0, 3.0])])
            .build()
            .unwrap();
        assert_eq!(seq.scale_kind, ScaleKind::Aligned);
        assert_eq!(seq.scale(0, 0), ScaleValue::Aligned([2.0; 3]));
    }

    #[test]
    fn object_states_share_one_slot_per_object() {
        let seq = Sequence::builder("flicker", 2, 1.0)
            .visibility_track(3, [0.0, 1.0])
            .frame_track(1, [4, 5])
            .build()
            .unwrap();
        assert_eq!(seq.object_matters().iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(seq.object_state(1, 0).frame, 5);
        assert_eq!(seq.object_state(1, 1).visibility, 1.0);
        assert_eq!(seq.object_state(0, 1).visibility, 0.0);
    }

    #[test]
    fn validate_catches_out_of_range_nodes() {
        let seq = Sequence::builder("far", 1, 1.0)
            .rotation_track(9, [[0.0, 0.0, 0.0, 1.0]])
            .build()
            .unwrap();
        assert!(matches!(
            seq.validate(4, 0),
            Err(ShapeAnimError::NodeOutOfRange { index: 9, count: 4 })
        ));
    }

    #[test]
    fn empty_sequence_is_valid_only_without_tracks() {
        let seq = Sequence::builder("empty", 0, 0.0).build().unwrap();
        seq.validate(1, 0).unwrap();
        let mut bad = seq.clone();
        bad.rotation_matters.set(0);
        assert!(bad.validate(1, 0).is_err());
    }
}
