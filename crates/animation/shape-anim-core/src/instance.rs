//! Shape instance: one animated copy of a shared [`Shape`].
//!
//! The instance owns its threads, masks, callbacks, workspace, reference pose
//! and outputs. Every control-surface call validates its indices and marks the
//! sub-shapes it affects dirty; [`ShapeInstance::animate`] then evaluates only
//! the dirty stages.

use std::sync::Arc;

use bitflags::bitflags;

use crate::animate::{self, NodeEval};
use crate::bitset::IndexSet;
use crate::config::Config;
use crate::error::{Result, ShapeAnimError};
use crate::ground;
use crate::ids::{IdAllocator, SequenceId, ThreadId};
use crate::masks::{CallbackTable, MaskFlags, NodeCallback, NodeMasks};
use crate::math::{Iso3, Mat4};
use crate::outputs::Outputs;
use crate::scale::ScaleKind;
use crate::scratch::Scratch;
use crate::secondary;
use crate::sequence::Sequence;
use crate::shape::{Shape, SubShape};
use crate::thread::{AnimThread, Transition, TransitionStep};
use crate::thread_list::ThreadList;
use crate::transition::{transition_sets, ReferencePose};

bitflags! {
    /// Evaluation stages a sub-shape needs on the next `animate()`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u8 {
        const TRANSFORM = 1 << 0;
        const VISIBILITY = 1 << 1;
        const FRAME = 1 << 2;
        const MAT_FRAME = 1 << 3;
    }
}

/// Log a control-surface error before handing it back to the caller.
fn rejected(err: ShapeAnimError) -> ShapeAnimError {
    log::warn!("[{}] {}", err.category(), err);
    err
}

#[derive(Debug)]
pub struct ShapeInstance {
    shape: Arc<Shape>,
    config: Config,
    scale_kind: ScaleKind,
    sub_shapes: Vec<SubShape>,
    dirty: Vec<DirtyFlags>,
    ids: IdAllocator,
    threads: ThreadList,
    masks: NodeMasks,
    callbacks: CallbackTable,
    scratch: Scratch,
    reference: ReferencePose,
    outputs: Outputs,
}

impl ShapeInstance {
    /// Validate `shape` and create an instance at its rest pose.
    pub fn new(shape: Arc<Shape>, config: Config) -> Result<Self> {
        shape.validate().map_err(rejected)?;
        if !config.visibility_cut_threshold.is_finite() || config.ground_min_span < 0.0 {
            return Err(rejected(ShapeAnimError::Config {
                reason: "visibility_cut_threshold must be finite and ground_min_span >= 0".into(),
            }));
        }
        let scale_kind = shape.scale_mode();
        let sub_shapes = shape.sub_shape_ranges();
        let node_count = shape.node_count();
        log::debug!(
            "creating instance of '{}' ({} nodes, {} objects, {} sub-shapes, scale {:?})",
            shape.name,
            node_count,
            shape.object_count(),
            sub_shapes.len(),
            scale_kind
        );
        Ok(Self {
            dirty: vec![DirtyFlags::all(); sub_shapes.len()],
            sub_shapes,
            scale_kind,
            ids: IdAllocator::new(),
            threads: ThreadList::with_capacity(config.thread_capacity),
            masks: NodeMasks::default(),
            callbacks: CallbackTable::default(),
            scratch: Scratch::new(node_count, scale_kind),
            reference: ReferencePose::new(node_count, scale_kind),
            outputs: Outputs::for_shape(&shape),
            shape,
            config,
        })
    }

    // ----- accessors -----

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn node_transforms(&self) -> &[Mat4] {
        &self.outputs.node_transforms
    }

    pub fn node_transform(&self, node: usize) -> Result<&Mat4> {
        self.check_node(node)?;
        Ok(&self.outputs.node_transforms[node])
    }

    /// Local matrix produced by the last evaluation.
    pub fn local_transform(&self, node: usize) -> Result<&Mat4> {
        self.check_node(node)?;
        Ok(&self.scratch.local_transforms[node])
    }

    pub fn object_visibility(&self) -> &[f32] {
        &self.outputs.object_visibility
    }

    pub fn object_frames(&self) -> &[u32] {
        &self.outputs.object_frames
    }

    pub fn object_mat_frames(&self) -> &[u32] {
        &self.outputs.object_mat_frames
    }

    pub fn ground_transform(&self) -> &Iso3 {
        &self.outputs.ground_transform
    }

    pub fn threads(&self) -> &ThreadList {
        &self.threads
    }

    pub fn thread(&self, id: ThreadId) -> Result<&AnimThread> {
        self.threads
            .get(id)
            .ok_or(ShapeAnimError::ThreadNotFound { id })
    }

    pub fn sub_shapes(&self) -> &[SubShape] {
        &self.sub_shapes
    }

    /// Pending stages of sub-shape `index`.
    pub fn dirty(&self, index: usize) -> DirtyFlags {
        self.dirty.get(index).copied().unwrap_or_default()
    }

    // ----- threads -----

    /// Start playing `sequence` at position 0 on a new thread.
    pub fn add_thread(&mut self, sequence: SequenceId) -> Result<ThreadId> {
        let seq = self.shape.sequence(sequence)?;
        let id = self.ids.alloc_thread();
        let thread = AnimThread::new(id, sequence, seq);
        log::debug!("thread {:?} added playing '{}'", id, seq.name);
        self.mark_thread_dirty(&thread);
        self.threads.insert(thread);
        Ok(id)
    }

    pub fn remove_thread(&mut self, id: ThreadId) -> Result<()> {
        let thread = self
            .threads
            .remove(id)
            .ok_or_else(|| rejected(ShapeAnimError::ThreadNotFound { id }))?;
        log::debug!("thread {:?} removed", id);
        self.mark_thread_dirty(&thread);
        Ok(())
    }

    /// Switch a thread to `sequence` at `pos` immediately, dropping any
    /// transition in progress.
    pub fn set_sequence(&mut self, id: ThreadId, sequence: SequenceId, pos: f32) -> Result<()> {
        let shape = Arc::clone(&self.shape);
        let seq = shape.sequence(sequence)?;
        let thread = self.thread_mut(id)?;
        let before = thread.clone();
        thread.clear_transition();
        thread.switch_sequence(sequence, seq, pos);
        let after = thread.clone();
        self.threads.resort();
        self.mark_thread_dirty(&before);
        self.mark_thread_dirty(&after);
        Ok(())
    }

    /// Crossfade a thread from its current sequence to `sequence`.
    ///
    /// The current pose of every sub-shape is evaluated and captured as the
    /// reference; other transitions in progress restart from that pose over
    /// their remaining time. With `continue_play` false the new sequence holds
    /// still until the crossfade completes.
    pub fn transition_to_sequence(
        &mut self,
        id: ThreadId,
        sequence: SequenceId,
        pos: f32,
        duration: f32,
        continue_play: bool,
    ) -> Result<()> {
        let shape = Arc::clone(&self.shape);
        let new_seq = shape.sequence(sequence)?;
        let thread = self.thread(id)?;
        if thread.in_transition() {
            return Err(rejected(ShapeAnimError::AlreadyInTransition { id }));
        }
        let old_id = thread.sequence();
        let old_pos = thread.pos();
        let old_seq = shape.sequence(old_id)?;

        self.animate_nodes();

        for other in self.threads.iter_mut() {
            if other.id() == id {
                continue;
            }
            if let Some(transition) = other.transition_mut() {
                transition.duration *= 1.0 - transition.pos;
                transition.pos = 0.0;
            }
        }

        let thread = self.thread_mut(id)?;
        thread.switch_sequence(sequence, new_seq, pos);
        thread.begin_transition(Transition::leaving(
            old_id,
            old_seq,
            old_pos,
            duration,
            continue_play,
        ));
        let snapshot = thread.clone();
        self.threads.resort();

        self.capture_reference();
        self.mark_thread_dirty(&snapshot);
        log::debug!(
            "thread {:?} transitioning '{}' -> '{}' over {}s",
            id,
            old_seq.name,
            new_seq.name,
            duration
        );
        Ok(())
    }

    fn capture_reference(&mut self) {
        let sets = transition_sets(&self.shape, &self.threads, &self.masks);
        self.scratch.refresh_components(&sets.all());
        self.reference.capture(&self.scratch, &sets);
    }

    /// Drop a thread's transition; the live pose applies from the next evaluation.
    pub fn clear_transition(&mut self, id: ThreadId) -> Result<()> {
        let thread = self.thread_mut(id)?;
        if let Some(transition) = thread.clear_transition() {
            let mut touched = transition.old_rotation_matters;
            touched.union_with(&transition.old_translation_matters);
            touched.union_with(&transition.old_scale_matters);
            let snapshot = thread.clone();
            self.mark_nodes_dirty(&touched);
            self.mark_thread_dirty(&snapshot);
        }
        Ok(())
    }

    pub fn set_transition_pos(&mut self, id: ThreadId, pos: f32) -> Result<()> {
        let thread = self.thread_mut(id)?;
        let transition = thread
            .transition_mut()
            .ok_or_else(|| rejected(ShapeAnimError::NotInTransition { id }))?;
        transition.pos = pos.clamp(0.0, 1.0);
        let snapshot = thread.clone();
        self.mark_thread_dirty(&snapshot);
        Ok(())
    }

    /// Play a transition backward; once it runs out the thread returns to the
    /// sequence and position it left.
    pub fn reverse_transition(&mut self, id: ThreadId) -> Result<()> {
        let transition = self
            .thread_mut(id)?
            .transition_mut()
            .ok_or_else(|| rejected(ShapeAnimError::NotInTransition { id }))?;
        transition.direction = -transition.direction;
        Ok(())
    }

    pub fn set_pos(&mut self, id: ThreadId, pos: f32) -> Result<()> {
        let shape = Arc::clone(&self.shape);
        let thread = self.thread_mut(id)?;
        thread.set_pos(shape.sequence(thread.sequence())?, pos);
        let snapshot = thread.clone();
        self.mark_thread_dirty(&snapshot);
        Ok(())
    }

    pub fn pos(&self, id: ThreadId) -> Result<f32> {
        Ok(self.thread(id)?.pos())
    }

    pub fn set_time_scale(&mut self, id: ThreadId, scale: f32) -> Result<()> {
        self.thread_mut(id)?.set_time_scale(scale);
        Ok(())
    }

    pub fn time_scale(&self, id: ThreadId) -> Result<f32> {
        Ok(self.thread(id)?.time_scale())
    }

    pub fn set_priority(&mut self, id: ThreadId, priority: f32) -> Result<()> {
        let thread = self.thread_mut(id)?;
        thread.set_priority(priority);
        let snapshot = thread.clone();
        self.threads.resort();
        self.mark_thread_dirty(&snapshot);
        Ok(())
    }

    pub fn priority(&self, id: ThreadId) -> Result<f32> {
        Ok(self.thread(id)?.priority())
    }

    pub fn set_key_frame_num(&mut self, id: ThreadId, key: usize) -> Result<()> {
        let shape = Arc::clone(&self.shape);
        let thread = self.thread_mut(id)?;
        thread.set_key_frame_num(shape.sequence(thread.sequence())?, key);
        let snapshot = thread.clone();
        self.mark_thread_dirty(&snapshot);
        Ok(())
    }

    pub fn key_frame_num(&self, id: ThreadId) -> Result<usize> {
        Ok(self.thread(id)?.key_num1())
    }

    /// Enable or disable a blend thread's contribution.
    pub fn set_blend_enabled(&mut self, id: ThreadId, enabled: bool) -> Result<()> {
        let thread = self.thread_mut(id)?;
        thread.set_blend_disabled(!enabled);
        let snapshot = thread.clone();
        self.mark_thread_dirty(&snapshot);
        Ok(())
    }

    // ----- masks, callbacks, hands-off -----

    pub fn set_node_mask(&mut self, node: usize, flags: MaskFlags, enabled: bool) -> Result<()> {
        self.check_node(node)?;
        self.masks.set(node, flags, enabled);
        self.mark_node_dirty(node);
        Ok(())
    }

    pub fn node_mask(&self, node: usize) -> Result<MaskFlags> {
        self.check_node(node)?;
        Ok(self.masks.get(node))
    }

    /// Register a callback that rewrites `node`'s local matrix every evaluation.
    pub fn set_node_callback<C>(&mut self, node: usize, callback: C) -> Result<()>
    where
        C: NodeCallback + 'static,
    {
        self.check_node(node)?;
        self.callbacks.insert(node, Box::new(callback));
        self.masks.set(node, MaskFlags::CALLBACK, true);
        self.mark_node_dirty(node);
        Ok(())
    }

    pub fn clear_node_callback(&mut self, node: usize) -> Result<()> {
        self.check_node(node)?;
        self.callbacks.remove(node);
        self.masks.set(node, MaskFlags::CALLBACK, false);
        self.mark_node_dirty(node);
        Ok(())
    }

    /// Local matrix for a `HANDS_OFF` node; kept until replaced.
    pub fn set_hands_off_transform(&mut self, node: usize, local: Mat4) -> Result<()> {
        self.check_node(node)?;
        self.scratch.local_transforms[node] = local;
        self.mark_node_dirty(node);
        Ok(())
    }

    // ----- time and evaluation -----

    /// Advance every thread by `dt` seconds and record this tick's ground motion.
    pub fn advance_time(&mut self, dt: f32) {
        let shape = Arc::clone(&self.shape);
        let min_span = self.config.ground_min_span;
        let mut ground: Option<Iso3> = None;
        let mut resort = false;
        let mut touched = Vec::new();

        for thread in self.threads.iter_mut() {
            let seq = &shape.sequences[thread.sequence().index()];
            let (start, end) = thread.advance(seq, dt);
            if ground.is_none() && !thread.is_blend() && seq.num_ground_frames() > 0 {
                ground = Some(ground::ground_delta(seq, start, end, min_span));
            }
            let leaving = thread.transition().map(|t| t.old_sequence);
            match thread.advance_transition(dt) {
                TransitionStep::Idle | TransitionStep::Running => {}
                TransitionStep::Completed => {
                    log::debug!("thread {:?} finished its transition", thread.id());
                    // nodes only the old sequence animated settle on the live pose
                    touched.extend(
                        leaving
                            .and_then(|old| shape.sequence(old).ok())
                            .map(Sequence::node_matters),
                    );
                }
                TransitionStep::Reverted { sequence, pos } => {
                    log::debug!("thread {:?} reverted to {:?}", thread.id(), sequence);
                    touched.push(seq.node_matters());
                    if let Ok(old) = shape.sequence(sequence) {
                        thread.switch_sequence(sequence, old, pos);
                        resort = true;
                    }
                }
            }
        }
        if resort {
            self.threads.resort();
        }
        self.outputs.ground_transform = ground.unwrap_or_else(Iso3::identity);

        if dt != 0.0 {
            let snapshot: Vec<AnimThread> = self.threads.iter().cloned().collect();
            for thread in &snapshot {
                self.mark_thread_dirty(thread);
            }
        }
        for nodes in touched {
            self.mark_nodes_dirty(&nodes);
        }
    }

    /// Evaluate the dirty stages of every sub-shape.
    pub fn animate(&mut self) {
        let force_transform = !self.callbacks.is_empty();
        for index in 0..self.sub_shapes.len() {
            let mut flags = self.dirty[index];
            if force_transform {
                flags |= DirtyFlags::TRANSFORM;
            }
            if flags.is_empty() {
                continue;
            }
            let sub = self.sub_shapes[index];
            if flags.contains(DirtyFlags::TRANSFORM) {
                self.evaluate_nodes(&sub);
            }
            if flags.contains(DirtyFlags::VISIBILITY) {
                self.evaluate_visibility(&sub);
            }
            if flags.contains(DirtyFlags::FRAME) {
                self.evaluate_frames(&sub);
            }
            if flags.contains(DirtyFlags::MAT_FRAME) {
                self.evaluate_mat_frames(&sub);
            }
            self.dirty[index] = DirtyFlags::empty();
        }
    }

    /// Evaluate node transforms of every sub-shape regardless of dirty state.
    pub fn animate_nodes(&mut self) {
        for index in 0..self.sub_shapes.len() {
            let sub = self.sub_shapes[index];
            self.evaluate_nodes(&sub);
            self.dirty[index].remove(DirtyFlags::TRANSFORM);
        }
    }

    pub fn animate_visibility(&mut self) {
        for index in 0..self.sub_shapes.len() {
            let sub = self.sub_shapes[index];
            self.evaluate_visibility(&sub);
            self.dirty[index].remove(DirtyFlags::VISIBILITY);
        }
    }

    pub fn animate_frames(&mut self) {
        for index in 0..self.sub_shapes.len() {
            let sub = self.sub_shapes[index];
            self.evaluate_frames(&sub);
            self.dirty[index].remove(DirtyFlags::FRAME);
        }
    }

    pub fn animate_mat_frames(&mut self) {
        for index in 0..self.sub_shapes.len() {
            let sub = self.sub_shapes[index];
            self.evaluate_mat_frames(&sub);
            self.dirty[index].remove(DirtyFlags::MAT_FRAME);
        }
    }

    /// Ground motion of a thread's current sequence between two unwrapped
    /// positions.
    pub fn ground_delta(&self, id: ThreadId, start: f32, end: f32) -> Result<Iso3> {
        let thread = self.thread(id)?;
        let seq = self.shape.sequence(thread.sequence())?;
        Ok(ground::ground_delta(
            seq,
            start,
            end,
            self.config.ground_min_span,
        ))
    }

    fn evaluate_nodes(&mut self, sub: &SubShape) {
        let mut eval = NodeEval {
            shape: &self.shape,
            threads: &self.threads,
            masks: &self.masks,
            callbacks: &mut self.callbacks,
            scratch: &mut self.scratch,
            reference: &self.reference,
            scale_kind: self.scale_kind,
            node_transforms: &mut self.outputs.node_transforms,
        };
        animate::animate_nodes(&mut eval, sub);
    }

    fn evaluate_visibility(&mut self, sub: &SubShape) {
        secondary::animate_visibility(
            &self.shape,
            &self.threads,
            sub,
            self.config.visibility_cut_threshold,
            &mut self.outputs.object_visibility,
        );
    }

    fn evaluate_frames(&mut self, sub: &SubShape) {
        secondary::animate_frames(
            &self.shape,
            &self.threads,
            sub,
            &mut self.outputs.object_frames,
        );
    }

    fn evaluate_mat_frames(&mut self, sub: &SubShape) {
        secondary::animate_mat_frames(
            &self.shape,
            &self.threads,
            sub,
            &mut self.outputs.object_mat_frames,
        );
    }

    // ----- helpers -----

    fn thread_mut(&mut self, id: ThreadId) -> Result<&mut AnimThread> {
        self.threads
            .get_mut(id)
            .ok_or_else(|| rejected(ShapeAnimError::ThreadNotFound { id }))
    }

    fn check_node(&self, node: usize) -> Result<()> {
        let count = self.shape.node_count();
        if node >= count {
            return Err(rejected(ShapeAnimError::NodeOutOfRange { index: node, count }));
        }
        Ok(())
    }

    fn mark_node_dirty(&mut self, node: usize) {
        for (sub, flags) in self.sub_shapes.iter().zip(self.dirty.iter_mut()) {
            if sub.nodes().contains(&node) {
                *flags |= DirtyFlags::TRANSFORM;
            }
        }
    }

    fn mark_nodes_dirty(&mut self, nodes: &IndexSet) {
        for (sub, flags) in self.sub_shapes.iter().zip(self.dirty.iter_mut()) {
            if nodes.intersects_range(&sub.nodes()) {
                *flags |= DirtyFlags::TRANSFORM;
            }
        }
    }

    /// Mark every stage the thread's current (and transition source) sequence
    /// can influence.
    fn mark_thread_dirty(&mut self, thread: &AnimThread) {
        let shape = &self.shape;
        let sequences = std::iter::once(thread.sequence())
            .chain(thread.transition().map(|t| t.old_sequence))
            .filter_map(|id| shape.sequence(id).ok());
        for seq in sequences {
            let nodes = seq.node_matters();
            for (sub, flags) in self.sub_shapes.iter().zip(self.dirty.iter_mut()) {
                if nodes.intersects_range(&sub.nodes()) {
                    *flags |= DirtyFlags::TRANSFORM;
                }
                let objects = sub.objects();
                if seq.vis_matters.intersects_range(&objects) {
                    *flags |= DirtyFlags::VISIBILITY;
                }
                if seq.frame_matters.intersects_range(&objects) {
                    *flags |= DirtyFlags::FRAME;
                }
                if seq.mat_frame_matters.intersects_range(&objects) {
                    *flags |= DirtyFlags::MAT_FRAME;
                }
            }
        }
        if thread.in_transition() {
            let sets = transition_sets(shape, &self.threads, &self.masks).all();
            for (sub, flags) in self.sub_shapes.iter().zip(self.dirty.iter_mut()) {
                if sets.intersects_range(&sub.nodes()) {
                    *flags |= DirtyFlags::TRANSFORM;
                }
            }
        }
    }
}
