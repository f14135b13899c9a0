//! Per-node masks and the callback table.
//!
//! Masks override what threads may write: masked rotations and position axes
//! keep the default pose, `DISABLE_BLEND` nodes ignore blend sequences,
//! `HANDS_OFF` nodes keep a caller-owned local matrix and `CALLBACK` nodes are
//! rewritten by a registered [`NodeCallback`] after assembly.

use bitflags::bitflags;
use hashbrown::HashMap;

use crate::bitset::IndexSet;
use crate::math::Mat4;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaskFlags: u8 {
        const ROTATION = 1 << 0;
        const POS_X = 1 << 1;
        const POS_Y = 1 << 2;
        const POS_Z = 1 << 3;
        const DISABLE_BLEND = 1 << 4;
        const HANDS_OFF = 1 << 5;
        const CALLBACK = 1 << 6;

        const POSITION = Self::POS_X.bits() | Self::POS_Y.bits() | Self::POS_Z.bits();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeMasks {
    pub rotation: IndexSet,
    pub pos_x: IndexSet,
    pub pos_y: IndexSet,
    pub pos_z: IndexSet,
    pub disable_blend: IndexSet,
    pub hands_off: IndexSet,
    pub callback: IndexSet,
}

impl NodeMasks {
    fn sets_mut(&mut self) -> [(MaskFlags, &mut IndexSet); 7] {
        [
            (MaskFlags::ROTATION, &mut self.rotation),
            (MaskFlags::POS_X, &mut self.pos_x),
            (MaskFlags::POS_Y, &mut self.pos_y),
            (MaskFlags::POS_Z, &mut self.pos_z),
            (MaskFlags::DISABLE_BLEND, &mut self.disable_blend),
            (MaskFlags::HANDS_OFF, &mut self.hands_off),
            (MaskFlags::CALLBACK, &mut self.callback),
        ]
    }

    /// Set (`enabled`) or clear every flag in `flags` for `node`.
    pub fn set(&mut self, node: usize, flags: MaskFlags, enabled: bool) {
        for (flag, set) in self.sets_mut() {
            if flags.contains(flag) {
                if enabled {
                    set.set(node);
                } else {
                    set.clear(node);
                }
            }
        }
    }

    pub fn get(&self, node: usize) -> MaskFlags {
        let mut flags = MaskFlags::empty();
        flags.set(MaskFlags::ROTATION, self.rotation.test(node));
        flags.set(MaskFlags::POS_X, self.pos_x.test(node));
        flags.set(MaskFlags::POS_Y, self.pos_y.test(node));
        flags.set(MaskFlags::POS_Z, self.pos_z.test(node));
        flags.set(MaskFlags::DISABLE_BLEND, self.disable_blend.test(node));
        flags.set(MaskFlags::HANDS_OFF, self.hands_off.test(node));
        flags.set(MaskFlags::CALLBACK, self.callback.test(node));
        flags
    }

    /// Nodes with at least one masked position axis.
    pub fn any_position(&self) -> IndexSet {
        let mut set = self.pos_x.clone();
        set.union_with(&self.pos_y);
        set.union_with(&self.pos_z);
        set
    }

    /// Nodes whose local matrix threads never produce.
    pub fn external(&self) -> IndexSet {
        let mut set = self.hands_off.clone();
        set.union_with(&self.callback);
        set
    }
}

/// Rewrites a node's local matrix after assembly.
pub trait NodeCallback: Send {
    fn update(&mut self, node: usize, local: &mut Mat4);
}

impl<F> NodeCallback for F
where
    F: FnMut(usize, &mut Mat4) + Send,
{
    fn update(&mut self, node: usize, local: &mut Mat4) {
        self(node, local)
    }
}

/// Sparse node → callback table.
#[derive(Default)]
pub struct CallbackTable {
    callbacks: HashMap<usize, Box<dyn NodeCallback>>,
}

impl CallbackTable {
    pub fn insert(&mut self, node: usize, callback: Box<dyn NodeCallback>) {
        self.callbacks.insert(node, callback);
    }

    pub fn remove(&mut self, node: usize) -> bool {
        self.callbacks.remove(&node).is_some()
    }

    #[inline]
    pub fn get_mut(&mut self, node: usize) -> Option<&mut (dyn NodeCallback + 'static)> {
        self.callbacks.get_mut(&node).map(|cb| cb.as_mut())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl std::fmt::Debug for CallbackTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut nodes: Vec<_> = self.callbacks.keys().copied().collect();
        nodes.sort_unstable();
        f.debug_struct("CallbackTable").field("nodes", &nodes).finish()
    }
}
