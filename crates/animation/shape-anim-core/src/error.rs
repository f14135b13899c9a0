//! Error types for shape instances and their data model.

use crate::ids::ThreadId;

/// Errors reported by the control surface and by shape/sequence validation.
///
/// Evaluation itself never fails: content edge cases degrade to the default
/// pose and hot-path index contracts are checked with `debug_assert!`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ShapeAnimError {
    /// A node references a parent that does not precede it.
    #[error("Node {node} has parent {parent}; parents must precede their children")]
    ParentOrder { node: usize, parent: usize },

    /// Node index outside the shape.
    #[error("Node index {index} out of range (shape has {count} nodes)")]
    NodeOutOfRange { index: usize, count: usize },

    /// Object index outside the shape.
    #[error("Object index {index} out of range (shape has {count} objects)")]
    ObjectOutOfRange { index: usize, count: usize },

    /// Sequence index outside the shape.
    #[error("Sequence not found: {id}")]
    SequenceNotFound { id: u32 },

    /// Thread id not present on the instance.
    #[error("Thread not found: {id:?}")]
    ThreadNotFound { id: ThreadId },

    /// A transition was requested on a thread that is already crossfading.
    #[error("Thread {id:?} is already in transition")]
    AlreadyInTransition { id: ThreadId },

    /// A transition operation was requested on a thread that is not crossfading.
    #[error("Thread {id:?} is not in transition")]
    NotInTransition { id: ThreadId },

    /// A keyframe track has the wrong number of keys.
    #[error("Sequence '{sequence}': track for index {index} has {actual} keys, expected {expected}")]
    TrackLength {
        sequence: String,
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Structural problem in a sequence.
    #[error("Sequence '{sequence}': {reason}")]
    InvalidSequence { sequence: String, reason: String },

    /// Sub-shape ranges are malformed.
    #[error("Sub-shape {index} is invalid: {reason}")]
    InvalidSubShape { index: usize, reason: String },

    /// Configuration could not be parsed.
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

impl ShapeAnimError {
    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ParentOrder { .. }
            | Self::TrackLength { .. }
            | Self::InvalidSequence { .. }
            | Self::InvalidSubShape { .. } => "data",
            Self::NodeOutOfRange { .. }
            | Self::ObjectOutOfRange { .. }
            | Self::SequenceNotFound { .. }
            | Self::ThreadNotFound { .. } => "index",
            Self::AlreadyInTransition { .. } | Self::NotInTransition { .. } => "transition",
            Self::Config { .. } => "config",
        }
    }
}

impl From<serde_json::Error> for ShapeAnimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config {
            reason: err.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, ShapeAnimError>;
