//! Animation threads: playback cursors over a sequence.
//!
//! A thread owns its normalized position and the keyframe pair derived from
//! it. Sequence data is passed in by the instance; a thread only stores the
//! id of the sequence it plays.

use crate::bitset::IndexSet;
use crate::ids::{SequenceId, ThreadId};
use crate::sequence::Sequence;

/// Crossfade state of a thread that recently switched sequences.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Blend weight toward the live pose, 0..=1.
    pub pos: f32,
    /// +1 while fading in, -1 while reverting.
    pub direction: f32,
    /// Seconds for a full crossfade.
    pub duration: f32,
    /// Playback speed factor of the new sequence during the crossfade.
    pub target_scale: f32,
    pub old_sequence: SequenceId,
    pub old_pos: f32,
    pub old_rotation_matters: IndexSet,
    pub old_translation_matters: IndexSet,
    pub old_scale_matters: IndexSet,
}

impl Transition {
    /// Crossfade away from `old` (currently at `old_pos`).
    pub fn leaving(
        old_sequence: SequenceId,
        old: &Sequence,
        old_pos: f32,
        duration: f32,
        continue_play: bool,
    ) -> Self {
        Self {
            pos: 0.0,
            direction: 1.0,
            duration,
            target_scale: if continue_play { 1.0 } else { 0.0 },
            old_sequence,
            old_pos,
            old_rotation_matters: old.rotation_matters.clone(),
            old_translation_matters: old.translation_matters.clone(),
            old_scale_matters: old.scale_matters.clone(),
        }
    }
}

/// Result of advancing a thread's transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransitionStep {
    Idle,
    Running,
    Completed,
    /// Reverting transition ran out; the thread should return to this state.
    Reverted {
        sequence: SequenceId,
        pos: f32,
    },
}

/// Normalize a position: cyclic wraps into [0, 1), one-shot clamps to [0, 1].
#[inline]
pub fn normalize_pos(sequence: &Sequence, pos: f32) -> f32 {
    if !pos.is_finite() {
        return 0.0;
    }
    if sequence.cyclic {
        let wrapped = pos.rem_euclid(1.0);
        if wrapped >= 1.0 {
            0.0
        } else {
            wrapped
        }
    } else {
        pos.clamp(0.0, 1.0)
    }
}

/// Keyframe pair and fraction for `pos`: `(key_num1, key_num2, key_pos)`.
pub fn resolve_keyframes(sequence: &Sequence, pos: f32) -> (usize, usize, f32) {
    let n = sequence.num_keyframes;
    if n <= 1 {
        return (0, 0, 0.0);
    }
    let last = n - 1;
    let kf = normalize_pos(sequence, pos) * last as f32;
    let k1 = (kf.floor() as usize).min(last);
    let key_pos = (kf - k1 as f32).clamp(0.0, 1.0);
    let k2 = if sequence.cyclic {
        (k1 + 1) % n
    } else {
        (k1 + 1).min(last)
    };
    (k1, k2, key_pos)
}

#[derive(Clone, Debug)]
pub struct AnimThread {
    id: ThreadId,
    sequence: SequenceId,
    pos: f32,
    key_num1: usize,
    key_num2: usize,
    key_pos: f32,
    time_scale: f32,
    priority: f32,
    blend: bool,
    blend_disabled: bool,
    transition: Option<Transition>,
}

impl AnimThread {
    pub fn new(id: ThreadId, sequence_id: SequenceId, sequence: &Sequence) -> Self {
        Self {
            id,
            sequence: sequence_id,
            pos: 0.0,
            key_num1: 0,
            key_num2: resolve_keyframes(sequence, 0.0).1,
            key_pos: 0.0,
            time_scale: 1.0,
            priority: 0.0,
            blend: sequence.blend,
            blend_disabled: false,
            transition: None,
        }
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[inline]
    pub fn sequence(&self) -> SequenceId {
        self.sequence
    }

    #[inline]
    pub fn pos(&self) -> f32 {
        self.pos
    }

    #[inline]
    pub fn key_num1(&self) -> usize {
        self.key_num1
    }

    #[inline]
    pub fn key_num2(&self) -> usize {
        self.key_num2
    }

    #[inline]
    pub fn key_pos(&self) -> f32 {
        self.key_pos
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    #[inline]
    pub fn priority(&self) -> f32 {
        self.priority
    }

    /// Whether the current sequence layers onto the pose rather than owning nodes.
    #[inline]
    pub fn is_blend(&self) -> bool {
        self.blend
    }

    #[inline]
    pub fn blend_disabled(&self) -> bool {
        self.blend_disabled
    }

    #[inline]
    pub fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    #[inline]
    pub fn in_transition(&self) -> bool {
        self.transition.is_some()
    }

    pub(crate) fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale;
    }

    pub(crate) fn set_priority(&mut self, priority: f32) {
        self.priority = priority;
    }

    pub(crate) fn set_blend_disabled(&mut self, disabled: bool) {
        self.blend_disabled = disabled;
    }

    pub(crate) fn transition_mut(&mut self) -> Option<&mut Transition> {
        self.transition.as_mut()
    }

    pub(crate) fn begin_transition(&mut self, transition: Transition) {
        self.transition = Some(transition);
    }

    pub(crate) fn clear_transition(&mut self) -> Option<Transition> {
        self.transition.take()
    }

    /// Switch to another sequence, keeping playback settings.
    pub(crate) fn switch_sequence(&mut self, id: SequenceId, sequence: &Sequence, pos: f32) {
        self.sequence = id;
        self.blend = sequence.blend;
        self.set_pos(sequence, pos);
    }

    /// Move the cursor and re-derive the keyframe pair.
    pub fn set_pos(&mut self, sequence: &Sequence, pos: f32) {
        self.pos = normalize_pos(sequence, pos);
        let (k1, k2, key_pos) = resolve_keyframes(sequence, self.pos);
        self.key_num1 = k1;
        self.key_num2 = k2;
        self.key_pos = key_pos;
    }

    /// Pin the cursor exactly on keyframe `key` (clamped to the last key).
    pub fn set_key_frame_num(&mut self, sequence: &Sequence, key: usize) {
        let n = sequence.num_keyframes;
        let key = key.min(n.saturating_sub(1));
        self.key_num1 = key;
        self.key_num2 = key;
        self.key_pos = 0.0;
        self.pos = if n > 1 {
            key as f32 / (n - 1) as f32
        } else {
            0.0
        };
    }

    /// Advance playback by `dt` seconds. Returns the start and end position
    /// before wrapping so callers can accumulate ground motion across loops.
    pub fn advance(&mut self, sequence: &Sequence, dt: f32) -> (f32, f32) {
        let start = self.pos;
        if sequence.duration <= 0.0 {
            return (start, start);
        }
        let speed = self.transition.as_ref().map_or(1.0, |t| t.target_scale);
        let mut end = start + dt * self.time_scale * speed / sequence.duration;
        if !sequence.cyclic {
            end = end.clamp(0.0, 1.0);
        }
        self.set_pos(sequence, end);
        (start, end)
    }

    /// Advance the crossfade by `dt` seconds.
    pub fn advance_transition(&mut self, dt: f32) -> TransitionStep {
        let Some(transition) = self.transition.as_mut() else {
            return TransitionStep::Idle;
        };
        if transition.duration > 0.0 {
            transition.pos += transition.direction * dt / transition.duration;
        } else {
            transition.pos = if transition.direction < 0.0 { -1.0 } else { 1.0 };
        }
        if transition.pos >= 1.0 {
            self.transition = None;
            TransitionStep::Completed
        } else if transition.pos < 0.0 {
            let step = TransitionStep::Reverted {
                sequence: transition.old_sequence,
                pos: transition.old_pos,
            };
            self.transition = None;
            step
        } else {
            TransitionStep::Running
        }
    }
}
