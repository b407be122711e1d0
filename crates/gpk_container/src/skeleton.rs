//! Skeleton hierarchies and their record encoding.
//!
//! Bones live in a flat arena ([`Skeleton::bones`]) and refer to each other by
//! index. On disk a skeleton is a `SKEL` record whose child is the root `BONE`
//! record; every bone record nests its children as `BONE` records. The shape
//! of the tree is stored twice: as the step code of the `SKEL` payload and as
//! the child offsets of every bone payload.
//!
//! The step code walks the bones in pre-order. For every bone but the last it
//! holds the transition to the next one: [`DESCEND`] when the next bone is a
//! child, `0` for a sibling and `k` when the walk climbs `k` levels before
//! reaching the next bone's parent. The trailing code is the depth of the last
//! bone, which climbs back to the root.

use std::io::{Read, Seek, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::bridge::{BoneNode, BoneTree};
use crate::cursor::bounded_count;
use crate::error::{Error, Result};
use crate::node::RecordNode;
use crate::records::{
    read_matrix, write_matrix, DecodeContext, EncodeContext, Matrix, Payload, RecordCodec,
    IDENTITY,
};
use crate::types::{latin1_to_string, string_to_latin1, Tag};

/// Step code moving from a bone to its first child
pub const DESCEND: i32 = -1;

/// Size of a bone payload without its child offsets
pub const BONE_RECORD_SIZE: u32 = 208;

/// Payload of the `SKEL` root record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonRoot {
    /// One step code per bone
    pub steps: Vec<i32>,
}

impl RecordCodec for SkeletonRoot {
    fn decode<R: Read + Seek>(reader: &mut R, _ctx: &DecodeContext<'_>) -> Result<Self> {
        let count = reader.read_u32::<BigEndian>()?;
        let mut steps = vec![0i32; bounded_count(reader, count, 4)?];
        reader.read_i32_into::<BigEndian>(&mut steps)?;
        Ok(SkeletonRoot { steps })
    }

    fn encode<W: Write>(&self, writer: &mut W, _ctx: &EncodeContext<'_>) -> Result<()> {
        writer.write_u32::<BigEndian>(self.steps.len() as u32)?;
        for step in &self.steps {
            writer.write_i32::<BigEndian>(*step)?;
        }
        Ok(())
    }
}

/// Payload of a `BONE` record
#[derive(Debug, Clone, PartialEq)]
pub struct BoneRecord {
    /// Position of the bone in pre-order
    pub index: i32,
    /// Depth of the bone, stored as its group index
    pub depth: i32,
    pub rel_transform: Matrix,
    pub abs_transform: Matrix,
    pub inv_transform: Matrix,
    /// Data block offsets of the child bone records, assigned by layout
    pub child_offsets: Vec<u32>,
}

impl Default for BoneRecord {
    fn default() -> Self {
        BoneRecord {
            index: 0,
            depth: 0,
            rel_transform: IDENTITY,
            abs_transform: IDENTITY,
            inv_transform: IDENTITY,
            child_offsets: Vec::new(),
        }
    }
}

impl RecordCodec for BoneRecord {
    fn decode<R: Read + Seek>(reader: &mut R, ctx: &DecodeContext<'_>) -> Result<Self> {
        let index = reader.read_i32::<BigEndian>()?;
        let depth = reader.read_i32::<BigEndian>()?;
        let child_count = reader.read_u32::<BigEndian>()?;
        let _reserved = reader.read_u32::<BigEndian>()?;
        if child_count != ctx.child_count() {
            return Err(Error::InconsistentSkeleton(latin1_to_string(ctx.name)));
        }

        let rel_transform = read_matrix(reader)?;
        let abs_transform = read_matrix(reader)?;
        let inv_transform = read_matrix(reader)?;
        let mut child_offsets = vec![0u32; bounded_count(reader, child_count, 4)?];
        reader.read_u32_into::<BigEndian>(&mut child_offsets)?;

        Ok(BoneRecord {
            index,
            depth,
            rel_transform,
            abs_transform,
            inv_transform,
            child_offsets,
        })
    }

    fn encode<W: Write>(&self, writer: &mut W, ctx: &EncodeContext<'_>) -> Result<()> {
        writer.write_i32::<BigEndian>(self.index)?;
        writer.write_i32::<BigEndian>(self.depth)?;
        writer.write_u32::<BigEndian>(ctx.child_count())?;
        writer.write_u32::<BigEndian>(0)?;
        write_matrix(writer, &self.rel_transform)?;
        write_matrix(writer, &self.abs_transform)?;
        write_matrix(writer, &self.inv_transform)?;
        for offset in ctx.child_offsets {
            writer.write_u32::<BigEndian>(*offset)?;
        }
        Ok(())
    }
}

/// Arena element of a [`Skeleton`]
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: Vec<u8>,
    pub rel_transform: Matrix,
    pub abs_transform: Matrix,
    pub inv_transform: Matrix,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub index: i32,
    pub depth: i32,
}

impl Bone {
    pub fn new(name: impl Into<Vec<u8>>) -> Bone {
        Bone {
            name: name.into(),
            rel_transform: IDENTITY,
            abs_transform: IDENTITY,
            inv_transform: IDENTITY,
            parent: None,
            children: Vec::new(),
            index: 0,
            depth: 0,
        }
    }

    pub fn name_str(&self) -> String {
        latin1_to_string(&self.name)
    }
}

/// A bone hierarchy with a single root
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    /// Name of the `SKEL` record
    pub name: Vec<u8>,
    pub bones: Vec<Bone>,
    /// Arena index of the root bone, `0` once linearized
    pub root: usize,
}

impl Skeleton {
    /// Build a linearized skeleton from an interchange bone tree
    ///
    /// Bones which do not descend from the root are attached to it.
    #[instrument(skip_all, fields(root = %tree.root))]
    pub fn from_bone_tree(tree: &BoneTree) -> Result<Skeleton> {
        let mut by_name: IndexMap<&str, usize> = IndexMap::new();
        let mut definitions = Vec::with_capacity(tree.bones.len());
        let mut bones = Vec::with_capacity(tree.bones.len());
        for node in &tree.bones {
            if by_name.contains_key(node.name.as_str()) {
                warn!(name = %node.name, "bone is defined twice, keeping the first");
                continue;
            }
            by_name.insert(&node.name, bones.len());
            definitions.push(node);
            bones.push(Bone {
                rel_transform: node.rel_transform,
                abs_transform: node.abs_transform,
                inv_transform: node.inv_transform,
                ..Bone::new(string_to_latin1(&node.name))
            });
        }

        let root = *by_name
            .get(tree.root.as_str())
            .ok_or_else(|| Error::MissingBone(tree.root.clone()))?;

        for (parent, node) in definitions.iter().enumerate() {
            for child_name in &node.children {
                let child = *by_name
                    .get(child_name.as_str())
                    .ok_or_else(|| Error::MissingBone(child_name.clone()))?;
                if child == root || bones[child].parent.is_some() {
                    return Err(Error::CycleDetected(child_name.clone()));
                }
                bones[child].parent = Some(parent);
                bones[parent].children.push(child);
            }
        }

        let mut skeleton = Skeleton {
            name: Vec::new(),
            bones,
            root,
        };
        skeleton.merge_orphans()?;
        skeleton.linearize();
        Ok(skeleton)
    }

    /// Attach the top ancestor of every chain that does not reach the root to the root
    pub fn merge_orphans(&mut self) -> Result<()> {
        for start in 0..self.bones.len() {
            let mut top = start;
            let mut steps = 0;
            while let Some(parent) = self.bones[top].parent {
                top = parent;
                steps += 1;
                if steps > self.bones.len() {
                    return Err(Error::CycleDetected(self.bones[start].name_str()));
                }
            }

            if top != self.root {
                debug!(bone = %self.bones[top].name_str(), "attaching orphan to the root");
                self.bones[top].parent = Some(self.root);
                self.bones[self.root].children.push(top);
            }
        }
        Ok(())
    }

    /// Reorder the arena into pre-order and assign `index` and `depth`
    ///
    /// Bones not reachable from the root are dropped, run [`Skeleton::merge_orphans`]
    /// first to keep them.
    pub fn linearize(&mut self) {
        let mut order = Vec::with_capacity(self.bones.len());
        let mut depths = Vec::with_capacity(self.bones.len());
        let mut stack = vec![(self.root, 0i32)];
        while let Some((bone, depth)) = stack.pop() {
            order.push(bone);
            depths.push(depth);
            stack.extend(self.bones[bone].children.iter().rev().map(|&c| (c, depth + 1)));
        }

        let mut position = vec![usize::MAX; self.bones.len()];
        for (new, &old) in order.iter().enumerate() {
            position[old] = new;
        }

        let mut bones = order
            .iter()
            .zip(&depths)
            .enumerate()
            .map(|(new, (&old, &depth))| {
                let bone = &self.bones[old];
                Bone {
                    parent: bone.parent.map(|p| position[p]),
                    children: bone.children.iter().map(|&c| position[c]).collect(),
                    index: new as i32,
                    depth,
                    ..bone.clone()
                }
            })
            .collect::<Vec<_>>();
        if let Some(root) = bones.first_mut() {
            root.parent = None;
        }

        self.bones = bones;
        self.root = 0;
    }

    /// Step code of the linearized skeleton, one code per bone
    pub fn steps(&self) -> Vec<i32> {
        let mut steps = self
            .bones
            .windows(2)
            .map(|pair| match pair[1].depth - pair[0].depth {
                1 => DESCEND,
                delta => -delta.min(0),
            })
            .collect::<Vec<_>>();
        if let Some(last) = self.bones.last() {
            steps.push(last.depth);
        }
        steps
    }

    /// Rebuild parent and child links of pre-ordered `bones` from a step code
    ///
    /// `index` and `depth` of every bone are reassigned.
    pub fn from_steps(mut bones: Vec<Bone>, steps: &[i32]) -> Result<Skeleton> {
        if bones.is_empty() || steps.len() != bones.len() {
            return Err(Error::InvalidStepCode {
                position: steps.len().min(bones.len()),
                code: steps.last().copied().unwrap_or_default(),
            });
        }

        for bone in bones.iter_mut() {
            bone.parent = None;
            bone.children.clear();
        }

        // ancestors of the current bone, the current bone last
        let mut path = vec![0usize];
        bones[0].index = 0;
        bones[0].depth = 0;
        for (position, &code) in steps[..steps.len() - 1].iter().enumerate() {
            let next = position + 1;
            let climb = match code {
                DESCEND => 0,
                code if code >= 0 && (code as usize) + 1 < path.len() => code as usize + 1,
                code => return Err(Error::InvalidStepCode { position, code }),
            };
            path.truncate(path.len() - climb);

            let parent = path[path.len() - 1];
            bones[next].parent = Some(parent);
            bones[next].index = next as i32;
            bones[next].depth = path.len() as i32;
            bones[parent].children.push(next);
            path.push(next);
        }

        let position = steps.len() - 1;
        if steps[position] != (path.len() - 1) as i32 {
            return Err(Error::InvalidStepCode {
                position,
                code: steps[position],
            });
        }

        Ok(Skeleton {
            name: Vec::new(),
            bones,
            root: 0,
        })
    }

    /// Encode as a `SKEL` record with the bone records nested below it
    pub fn to_record(&self) -> RecordNode {
        let record = RecordNode::new(
            Tag::SKELETON,
            self.name.clone(),
            Payload::SkeletonRoot(SkeletonRoot {
                steps: self.steps(),
            }),
        );
        match self.bones.get(self.root) {
            Some(_) => record.with_child(self.bone_record(self.root)),
            None => record,
        }
    }

    fn bone_record(&self, index: usize) -> RecordNode {
        let bone = &self.bones[index];
        let mut node = RecordNode::new(
            Tag::BONE,
            bone.name.clone(),
            Payload::Bone(BoneRecord {
                index: bone.index,
                depth: bone.depth,
                rel_transform: bone.rel_transform,
                abs_transform: bone.abs_transform,
                inv_transform: bone.inv_transform,
                child_offsets: vec![0; bone.children.len()],
            }),
        );
        node.children = bone.children.iter().map(|&c| self.bone_record(c)).collect();
        node
    }

    /// Decode a `SKEL` record and its bone records
    ///
    /// The tree described by the step code must match the nesting of the bone
    /// records, their explicit child offsets and their stored depths.
    #[instrument(skip_all, fields(name = %node.name_str()))]
    pub fn from_record(node: &RecordNode) -> Result<Skeleton> {
        let Payload::SkeletonRoot(root) = &node.payload else {
            return Err(Error::InvalidRecord(format!(
                "{} is not a skeleton root",
                node.name_str()
            )));
        };
        let root_bone = node
            .children
            .iter()
            .find(|c| c.type_tag == Tag::BONE)
            .ok_or_else(|| Error::MissingBone(node.name_str()))?;

        let mut bones = Vec::new();
        let mut record_children = Vec::new();
        collect_bones(root_bone, &mut bones, &mut record_children)?;
        let stored_depths = bones.iter().map(|b| b.depth).collect::<Vec<_>>();

        let mut skeleton = Skeleton::from_steps(bones, &root.steps)?;
        skeleton.name = node.name.clone();

        for ((bone, children), depth) in skeleton
            .bones
            .iter()
            .zip(&record_children)
            .zip(stored_depths)
        {
            if bone.children != *children || bone.depth != depth {
                return Err(Error::InconsistentSkeleton(bone.name_str()));
            }
        }
        Ok(skeleton)
    }

    /// Interchange form, bones in arena order
    pub fn to_bone_tree(&self) -> BoneTree {
        BoneTree {
            root: self
                .bones
                .get(self.root)
                .map(Bone::name_str)
                .unwrap_or_default(),
            bones: self
                .bones
                .iter()
                .map(|bone| BoneNode {
                    name: bone.name_str(),
                    rel_transform: bone.rel_transform,
                    abs_transform: bone.abs_transform,
                    inv_transform: bone.inv_transform,
                    children: bone
                        .children
                        .iter()
                        .filter_map(|&c| self.bones.get(c).map(Bone::name_str))
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Flatten bone records in pre-order, recording the pre-order indices of each one's children
fn collect_bones(
    node: &RecordNode,
    bones: &mut Vec<Bone>,
    record_children: &mut Vec<Vec<usize>>,
) -> Result<usize> {
    let Payload::Bone(record) = &node.payload else {
        return Err(Error::InconsistentSkeleton(node.name_str()));
    };

    let position = bones.len();
    let offsets = node.children.iter().map(|c| c.layout.offset).collect::<Vec<_>>();
    if record.index != position as i32 || record.child_offsets != offsets {
        return Err(Error::InconsistentSkeleton(node.name_str()));
    }

    bones.push(Bone {
        depth: record.depth,
        rel_transform: record.rel_transform,
        abs_transform: record.abs_transform,
        inv_transform: record.inv_transform,
        ..Bone::new(node.name.clone())
    });
    record_children.push(Vec::new());

    for child in &node.children {
        let index = collect_bones(child, bones, record_children)?;
        record_children[position].push(index);
    }
    Ok(position)
}
