//! Priority-ordered thread collection.
//!
//! Order: non-blend threads before blend threads, then priority descending,
//! then most recently created first. Evaluation walks this order and the first
//! writer of a node wins, so the list is re-sorted whenever a key changes.

use std::cmp::Ordering;

use crate::ids::ThreadId;
use crate::thread::AnimThread;

fn evaluation_order(a: &AnimThread, b: &AnimThread) -> Ordering {
    a.is_blend()
        .cmp(&b.is_blend())
        .then_with(|| b.priority().total_cmp(&a.priority()))
        .then_with(|| b.id().cmp(&a.id()))
}

#[derive(Clone, Debug, Default)]
pub struct ThreadList {
    threads: Vec<AnimThread>,
}

impl ThreadList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            threads: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, thread: AnimThread) {
        let at = self
            .threads
            .partition_point(|t| evaluation_order(t, &thread) == Ordering::Less);
        self.threads.insert(at, thread);
    }

    pub fn remove(&mut self, id: ThreadId) -> Option<AnimThread> {
        let index = self.position(id)?;
        Some(self.threads.remove(index))
    }

    /// Restore the ordering after a priority or sequence change.
    pub fn resort(&mut self) {
        self.threads.sort_by(evaluation_order);
    }

    #[inline]
    pub fn position(&self, id: ThreadId) -> Option<usize> {
        self.threads.iter().position(|t| t.id() == id)
    }

    #[inline]
    pub fn get(&self, id: ThreadId) -> Option<&AnimThread> {
        self.threads.iter().find(|t| t.id() == id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut AnimThread> {
        self.threads.iter_mut().find(|t| t.id() == id)
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, AnimThread> {
        self.threads.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, AnimThread> {
        self.threads.iter_mut()
    }

    /// Threads that own nodes, in evaluation order.
    pub fn non_blend(&self) -> impl Iterator<Item = &AnimThread> {
        self.threads.iter().filter(|t| !t.is_blend())
    }

    /// Blend threads that currently contribute, in evaluation order.
    pub fn active_blend(&self) -> impl Iterator<Item = &AnimThread> {
        self.threads
            .iter()
            .filter(|t| t.is_blend() && !t.blend_disabled())
    }

    pub fn any_in_transition(&self) -> bool {
        self.threads.iter().any(AnimThread::in_transition)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.threads.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

impl<'a> IntoIterator for &'a ThreadList {
    type Item = &'a AnimThread;
    type IntoIter = std::slice::Iter<'a, AnimThread>;

    fn into_iter(self) -> Self::IntoIter {
        self.threads.iter()
    }
}
