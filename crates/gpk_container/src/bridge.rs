//! Interchange shapes exchanged with mesh import and export tooling.
//!
//! These are plain data, keyed by name, so they can be produced by tooling that
//! knows nothing about the container layout. With the `serde` feature enabled
//! they (de)serialize as JSON objects of the same shape.

use indexmap::IndexMap;

use crate::records::Matrix;
use crate::vertex::{AttributeValues, VertexUsage};

/// A bone hierarchy addressed by bone name
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneTree {
    /// Name of the root bone
    pub root: String,
    pub bones: Vec<BoneNode>,
}

/// One bone of a [`BoneTree`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneNode {
    pub name: String,
    pub rel_transform: Matrix,
    pub abs_transform: Matrix,
    pub inv_transform: Matrix,
    /// Names of the child bones, in order
    pub children: Vec<String>,
}

/// Vertex attributes grouped by usage
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexData {
    pub vertex_count: u32,
    pub attributes: IndexMap<VertexUsage, Vec<VertexStream>>,
}

/// Values of one attribute for every vertex
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexStream {
    pub name: String,
    pub semantic_index: u16,
    pub values: AttributeValues,
}
