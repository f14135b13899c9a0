//! Scale representations.
//!
//! A shape animates scale in at most one representation at a time, the widest
//! one any of its sequences uses. Values coming from a sequence with a simpler
//! representation are widened (uniform → aligned → arbitrary), never narrowed.

use serde::{Deserialize, Serialize};

use crate::interp::functions::{lerp_array3, lerp_f32, slerp_quat};
use crate::math::{quat_from_xyzw, quat_to_xyzw, vec3_from_array, Mat4};

/// Scale representation tag, ordered from narrowest to widest.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ScaleKind {
    #[default]
    None,
    Uniform,
    Aligned,
    Arbitrary,
}

const IDENTITY_ROTATION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// A scale value in one of the three representations.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ScaleValue {
    /// Same factor on all axes.
    Uniform(f32),
    /// Per-axis factors in the node's local frame.
    Aligned([f32; 3]),
    /// Per-axis factors in a frame rotated by `rotation` (xyzw).
    Arbitrary { scale: [f32; 3], rotation: [f32; 4] },
}

impl ScaleValue {
    #[inline]
    pub fn kind(&self) -> ScaleKind {
        match self {
            ScaleValue::Uniform(_) => ScaleKind::Uniform,
            ScaleValue::Aligned(_) => ScaleKind::Aligned,
            ScaleValue::Arbitrary { .. } => ScaleKind::Arbitrary,
        }
    }

    /// Identity scale in the given representation; `None` has no value.
    pub fn identity(kind: ScaleKind) -> Option<Self> {
        match kind {
            ScaleKind::None => None,
            ScaleKind::Uniform => Some(ScaleValue::Uniform(1.0)),
            ScaleKind::Aligned => Some(ScaleValue::Aligned([1.0; 3])),
            ScaleKind::Arbitrary => Some(ScaleValue::Arbitrary {
                scale: [1.0; 3],
                rotation: IDENTITY_ROTATION,
            }),
        }
    }

    /// Convert to `kind` if it is wider than the current representation.
    /// Requests for the same or a narrower representation return `self`.
    pub fn widen(self, kind: ScaleKind) -> Self {
        if kind <= self.kind() {
            return self;
        }
        match (self, kind) {
            (ScaleValue::Uniform(s), ScaleKind::Aligned) => ScaleValue::Aligned([s; 3]),
            (ScaleValue::Uniform(s), ScaleKind::Arbitrary) => ScaleValue::Arbitrary {
                scale: [s; 3],
                rotation: IDENTITY_ROTATION,
            },
            (ScaleValue::Aligned(v), ScaleKind::Arbitrary) => ScaleValue::Arbitrary {
                scale: v,
                rotation: IDENTITY_ROTATION,
            },
            (value, _) => value,
        }
    }

    /// Per-axis factors read back from a matrix, expressed in `kind`.
    /// Uniform takes the mean of the three factors; the arbitrary frame is
    /// the node's own.
    pub fn from_axes(axes: [f32; 3], kind: ScaleKind) -> Option<Self> {
        match kind {
            ScaleKind::None => None,
            ScaleKind::Uniform => Some(ScaleValue::Uniform(
                (axes[0] + axes[1] + axes[2]) / 3.0,
            )),
            ScaleKind::Aligned => Some(ScaleValue::Aligned(axes)),
            ScaleKind::Arbitrary => Some(ScaleValue::Arbitrary {
                scale: axes,
                rotation: IDENTITY_ROTATION,
            }),
        }
    }

    /// Interpolate two scales, widening both to the wider representation.
    pub fn interpolate(a: ScaleValue, b: ScaleValue, t: f32) -> ScaleValue {
        let kind = a.kind().max(b.kind());
        match (a.widen(kind), b.widen(kind)) {
            (ScaleValue::Uniform(x), ScaleValue::Uniform(y)) => {
                ScaleValue::Uniform(lerp_f32(x, y, t))
            }
            (ScaleValue::Aligned(x), ScaleValue::Aligned(y)) => {
                ScaleValue::Aligned(lerp_array3(x, y, t))
            }
            (
                ScaleValue::Arbitrary {
                    scale: sa,
                    rotation: ra,
                },
                ScaleValue::Arbitrary {
                    scale: sb,
                    rotation: rb,
                },
            ) => {
                let rotation = slerp_quat(&quat_from_xyzw(ra), &quat_from_xyzw(rb), t);
                ScaleValue::Arbitrary {
                    scale: lerp_array3(sa, sb, t),
                    rotation: quat_to_xyzw(&rotation),
                }
            }
            (left, _) => left,
        }
    }

    /// Scale matrix to post-multiply onto a local transform. Arbitrary scale
    /// is applied in its own frame: `R · S · R⁻¹`.
    pub fn to_matrix(&self) -> Mat4 {
        match self {
            ScaleValue::Uniform(s) => Mat4::new_scaling(*s),
            ScaleValue::Aligned(v) => Mat4::new_nonuniform_scaling(&vec3_from_array(*v)),
            ScaleValue::Arbitrary { scale, rotation } => {
                let r = quat_from_xyzw(*rotation).to_homogeneous();
                r * Mat4::new_nonuniform_scaling(&vec3_from_array(*scale)) * r.transpose()
            }
        }
    }
}
