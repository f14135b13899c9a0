//! Shape Anim Core
//!
//! Evaluates hierarchical skeletons ("shapes") driven by any number of
//! concurrently playing animation threads. Threads compose by priority with
//! first-writer-wins per node; blend sequences layer on top, and transitions
//! crossfade from a captured reference pose. Secondary animators resolve
//! per-object visibility, frame and material frame, and the ground extractor
//! reports root motion per tick.
//!
//! The shape and its sequences are shared read-only (`Arc<Shape>`); all
//! mutable state lives in a [`ShapeInstance`].

mod animate;
pub mod bitset;
pub mod config;
pub mod error;
pub mod ground;
pub mod ids;
pub mod instance;
pub mod interp;
pub mod masks;
pub mod math;
pub mod outputs;
pub mod scale;
mod scratch;
mod secondary;
pub mod sequence;
pub mod shape;
pub mod thread;
pub mod thread_list;
pub mod transition;

// Re-exports for consumers
pub use bitset::IndexSet;
pub use config::Config;
pub use error::{Result, ShapeAnimError};
pub use ground::{ground_at, ground_delta};
pub use ids::{IdAllocator, SequenceId, ThreadId};
pub use instance::{DirtyFlags, ShapeInstance};
pub use masks::{MaskFlags, NodeCallback, NodeMasks};
pub use math::{Iso3, Mat4, Quat, Vec3};
pub use outputs::Outputs;
pub use scale::{ScaleKind, ScaleValue};
pub use sequence::{ObjectState, Sequence, SequenceBuilder};
pub use shape::{Shape, ShapeNode, ShapeObject, SubShape};
pub use thread::{resolve_keyframes, AnimThread, Transition, TransitionStep};
pub use thread_list::ThreadList;
pub use transition::TransitionSets;
