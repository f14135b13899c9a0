//! Read-only skeleton description: nodes, renderable objects, sub-shapes and
//! the sequences authored against them.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShapeAnimError};
use crate::ids::SequenceId;
use crate::math::{quat_from_xyzw, vec3_from_array, Quat, Vec3};
use crate::scale::ScaleKind;
use crate::sequence::Sequence;

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn one() -> f32 {
    1.0
}

/// Skeleton node with its rest pose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeNode {
    #[serde(default)]
    pub name: String,
    /// Parent index; always smaller than this node's own index.
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default = "identity_rotation")]
    pub default_rotation: [f32; 4],
    #[serde(default)]
    pub default_translation: [f32; 3],
}

impl ShapeNode {
    pub fn new(name: &str, parent: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            default_rotation: identity_rotation(),
            default_translation: [0.0; 3],
        }
    }

    pub fn with_translation(mut self, translation: [f32; 3]) -> Self {
        self.default_translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: [f32; 4]) -> Self {
        self.default_rotation = rotation;
        self
    }
}

/// Renderable object attached to a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeObject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub node: Option<usize>,
    #[serde(default = "one")]
    pub default_visibility: f32,
    #[serde(default)]
    pub default_frame: u32,
    #[serde(default)]
    pub default_mat_frame: u32,
}

impl ShapeObject {
    pub fn new(name: &str, node: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            node,
            default_visibility: 1.0,
            default_frame: 0,
            default_mat_frame: 0,
        }
    }
}

/// Contiguous node and object ranges evaluated as one unit.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubShape {
    pub first_node: usize,
    pub num_nodes: usize,
    pub first_object: usize,
    pub num_objects: usize,
}

impl SubShape {
    #[inline]
    pub fn nodes(&self) -> std::ops::Range<usize> {
        self.first_node..self.first_node + self.num_nodes
    }

    #[inline]
    pub fn objects(&self) -> std::ops::Range<usize> {
        self.first_object..self.first_object + self.num_objects
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<ShapeNode>,
    #[serde(default)]
    pub objects: Vec<ShapeObject>,
    /// Empty means a single sub-shape spanning everything.
    #[serde(default)]
    pub sub_shapes: Vec<SubShape>,
    #[serde(default)]
    pub sequences: Vec<Sequence>,
}

impl Shape {
    /// Parse and validate a shape from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let shape: Shape = serde_json::from_str(json)?;
        shape.validate()?;
        Ok(shape)
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Add a sequence and return its id.
    pub fn push_sequence(&mut self, sequence: Sequence) -> SequenceId {
        self.sequences.push(sequence);
        SequenceId((self.sequences.len() - 1) as u32)
    }

    pub fn sequence(&self, id: SequenceId) -> Result<&Sequence> {
        self.sequences
            .get(id.index())
            .ok_or(ShapeAnimError::SequenceNotFound { id: id.0 })
    }

    pub fn find_sequence(&self, name: &str) -> Option<SequenceId> {
        self.sequences
            .iter()
            .position(|s| s.name == name)
            .map(|i| SequenceId(i as u32))
    }

    /// Widest scale representation any sequence uses.
    pub fn scale_mode(&self) -> ScaleKind {
        self.sequences
            .iter()
            .map(|s| s.scale_kind)
            .max()
            .unwrap_or(ScaleKind::None)
    }

    /// Declared sub-shapes, or one covering the whole shape.
    pub fn sub_shape_ranges(&self) -> Vec<SubShape> {
        if self.sub_shapes.is_empty() {
            vec![SubShape {
                first_node: 0,
                num_nodes: self.nodes.len(),
                first_object: 0,
                num_objects: self.objects.len(),
            }]
        } else {
            self.sub_shapes.clone()
        }
    }

    #[inline]
    pub fn default_rotation(&self, node: usize) -> Quat {
        quat_from_xyzw(self.nodes[node].default_rotation)
    }

    #[inline]
    pub fn default_translation(&self, node: usize) -> Vec3 {
        vec3_from_array(self.nodes[node].default_translation)
    }

    /// Check hierarchy order, object bindings, sub-shape tiling and every
    /// sequence against this shape.
    pub fn validate(&self) -> Result<()> {
        for (node, n) in self.nodes.iter().enumerate() {
            if let Some(parent) = n.parent {
                if parent >= node {
                    return Err(ShapeAnimError::ParentOrder { node, parent });
                }
            }
        }
        for object in &self.objects {
            if let Some(node) = object.node {
                if node >= self.nodes.len() {
                    return Err(ShapeAnimError::NodeOutOfRange {
                        index: node,
                        count: self.nodes.len(),
                    });
                }
            }
        }
        self.validate_sub_shapes()?;
        for sequence in &self.sequences {
            sequence.validate(self.nodes.len(), self.objects.len())?;
        }
        Ok(())
    }

    fn validate_sub_shapes(&self) -> Result<()> {
        if self.sub_shapes.is_empty() {
            return Ok(());
        }
        let (mut node_end, mut object_end) = (0, 0);
        for (index, sub) in self.sub_shapes.iter().enumerate() {
            let invalid = |reason: String| ShapeAnimError::InvalidSubShape { index, reason };
            if sub.first_node != node_end || sub.first_object != object_end {
                return Err(invalid(format!(
                    "starts at node {} / object {}, expected {node_end} / {object_end}",
                    sub.first_node, sub.first_object
                )));
            }
            for node in sub.nodes() {
                let Some(n) = self.nodes.get(node) else {
                    return Err(invalid(format!("node {node} is past the end of the shape")));
                };
                if let Some(parent) = n.parent {
                    if parent < sub.first_node {
                        return Err(invalid(format!(
                            "node {node} has parent {parent} outside the sub-shape"
                        )));
                    }
                }
            }
            node_end = sub.nodes().end;
            object_end = sub.objects().end;
        }
        if node_end != self.nodes.len() || object_end != self.objects.len() {
            return Err(ShapeAnimError::InvalidSubShape {
                index: self.sub_shapes.len() - 1,
                reason: format!(
                    "sub-shapes cover {node_end} nodes / {object_end} objects, shape has {} / {}",
                    self.nodes.len(),
                    self.objects.len()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Shape {
        Shape {
            name: "chain".into(),
            nodes: vec![
                ShapeNode::new("root", None),
                ShapeNode::new("mid", Some(0)),
                ShapeNode::new("tip", Some(1)),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn parents_must_precede_children() {
        let mut shape = chain();
        shape.validate().unwrap();
        shape.nodes[1].parent = Some(2);
        assert_eq!(
            shape.validate(),
            Err(ShapeAnimError::ParentOrder { node: 1, parent: 2 })
        );
    }

    #[test]
    fn implicit_sub_shape_covers_everything() {
        let shape = chain();
        let subs = shape.sub_shape_ranges();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].nodes(), 0..3);
    }

    #[test]
    fn sub_shapes_must_tile_and_contain_parents() {
        let mut shape = chain();
        shape.sub_shapes = vec![
            SubShape {
                first_node: 0,
                num_nodes: 1,
                ..Default::default()
            },
            SubShape {
                first_node: 1,
                num_nodes: 2,
                ..Default::default()
            },
        ];
        // node 1's parent (0) lives in the first sub-shape
        assert!(matches!(
            shape.validate(),
            Err(ShapeAnimError::InvalidSubShape { index: 1, .. })
        ));

        shape.nodes[1].parent = None;
        shape.validate().unwrap();

        shape.sub_shapes[1].num_nodes = 1;
        assert!(shape.validate().is_err());
    }

    #[test]
    fn scale_mode_is_the_widest_sequence_kind() {
        let mut shape = chain();
        assert_eq!(shape.scale_mode(), ScaleKind::None);
        let mut seq = Sequence::builder("s", 1, 1.0).build().unwrap();
        seq.scale_kind = ScaleKind::Aligned;
        shape.push_sequence(seq.clone());
        seq.scale_kind = ScaleKind::Uniform;
        shape.push_sequence(seq);
        assert_eq!(shape.scale_mode(), ScaleKind::Aligned);
        assert_eq!(shape.find_sequence("s"), Some(SequenceId(0)));
        assert!(shape.sequence(SequenceId(7)).is_err());
    }
}
