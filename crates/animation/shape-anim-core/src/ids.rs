//! Identifiers and a simple allocator for animation threads.

use serde::{Deserialize, Serialize};

/// Index of a sequence within its shape.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub u32);

impl SequenceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable handle to a thread on a shape instance. Survives re-sorting of the
/// thread list.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub u32);

/// Monotonic allocator for ThreadId.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_thread: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_thread(&mut self) -> ThreadId {
        let id = ThreadId(self.next_thread);
        self.next_thread = self.next_thread.wrapping_add(1);
        id
    }
}
