use gpk_container::{
    bridge::{BoneNode, BoneTree},
    config::CodecConfig,
    error::Result,
    node::RecordNode,
    records::{MeshRecord, Payload, SceneNode, SceneNodeKind, ShapeRecord, IDENTITY},
    types::Tag,
    vertex::{AttributeValues, VertexAttribute, VertexUsage},
    Container, Skeleton, VertexBuffer,
};
use pretty_assertions::assert_eq;
use tracing::info;
use tracing_test::traced_test;

fn bone(name: &str, children: &[&str]) -> BoneNode {
    BoneNode {
        name: name.to_string(),
        rel_transform: IDENTITY,
        abs_transform: IDENTITY,
        inv_transform: IDENTITY,
        children: children.iter().map(|c| c.to_string()).collect(),
    }
}

fn skeleton() -> Result<Skeleton> {
    let mut skeleton = Skeleton::from_bone_tree(&BoneTree {
        root: "root".to_string(),
        bones: vec![
            bone("root", &["spine", "hipL", "hipR"]),
            bone("spine", &["head"]),
            bone("head", &[]),
            bone("hipL", &["kneeL"]),
            bone("kneeL", &[]),
            bone("hipR", &[]),
        ],
    })?;
    skeleton.name = b"body".to_vec();
    Ok(skeleton)
}

fn vertex_buffer() -> Result<VertexBuffer> {
    VertexBuffer::new(
        2,
        vec![
            VertexAttribute::new(
                VertexUsage::Positions,
                "position",
                0,
                AttributeValues::Float(vec![vec![0.0, 1.0, 2.0], vec![3.0, 4.0, 5.0]]),
            ),
            VertexAttribute::new(
                VertexUsage::Uvs,
                "map1",
                0,
                AttributeValues::Float(vec![vec![0.0, 0.5], vec![1.0, 0.5]]),
            ),
            VertexAttribute::new(
                VertexUsage::BoneWeights,
                "weight0",
                0,
                AttributeValues::Float(vec![vec![1.0], vec![1.0]]),
            ),
            VertexAttribute::new(
                VertexUsage::BoneIndices,
                "index0",
                0,
                AttributeValues::Uint(vec![2, 4]),
            ),
        ],
    )
}

fn character() -> Result<Container> {
    let mut container = Container::new(b"character.gctr".to_vec());

    let mut skeleton_record = skeleton()?.to_record();
    skeleton_record.children.push(RecordNode::new(
        Tag(*b"FACE"),
        b"eyeInfo".to_vec(),
        Payload::Opaque(vec![1, 2, 3, 4, 5]),
    ));
    container.insert_record(skeleton_record);
    container.insert_record(RecordNode::new(
        Tag::SKELETON,
        b"boneInfoTable".to_vec(),
        Payload::Opaque(vec![0xEE; 12]),
    ));

    let mesh = RecordNode::new(
        Tag::MESH,
        b"bodyMesh".to_vec(),
        Payload::Mesh(MeshRecord {
            flags: 1,
            bounds_min: [-1.0, 0.0, -1.0],
            bounds_max: [1.0, 2.0, 1.0],
        }),
    )
    .with_child(RecordNode::new(
        Tag::SCENE_NODE,
        b"bodyShapeNode".to_vec(),
        Payload::SceneNode(SceneNode {
            kind: SceneNodeKind::Shape,
            target: b"bodyShape".to_vec(),
            transform: IDENTITY,
        }),
    ))
    .with_child(RecordNode::new(
        Tag::SHAPE,
        b"bodyShape".to_vec(),
        Payload::Shape(ShapeRecord {
            vertex_buffer: b"bodyVertices".to_vec(),
            material: Vec::new(),
            primitive: 4,
            indices: vec![0, 1, 0],
        }),
    ))
    .with_child(RecordNode::new(
        Tag::VERTEX_BUFFER,
        b"bodyVertices".to_vec(),
        Payload::VertexBuffer(vertex_buffer()?),
    ));
    container.insert_record(mesh);
    container.insert_record(RecordNode::new(
        Tag(*b"ANIM"),
        b"idle".to_vec(),
        Payload::Opaque(vec![9; 7]),
    ));

    Ok(container)
}

#[traced_test]
#[test]
fn container_round_trip() -> Result<()> {
    let config = CodecConfig::default();
    let mut container = character()?;

    let data = container.write(&config)?;
    info!("wrote {} bytes", data.len());

    let mut read = Container::from_bytes(&data, &config)?;
    assert_eq!(read, container);

    // writing what was read reproduces the same bytes
    assert_eq!(read.write(&config)?, data);

    Ok(())
}

#[test]
fn skeleton_survives_the_container() -> Result<()> {
    let config = CodecConfig::default();
    let mut container = character()?;
    let data = container.write(&config)?;

    let read = Container::from_bytes(&data, &config)?;
    let skeletons = read.skeletons()?;

    assert_eq!(skeletons.len(), 1);
    assert_eq!(skeletons[0].to_bone_tree(), skeleton()?.to_bone_tree());
    assert_eq!(skeletons[0].steps(), skeleton()?.steps());

    Ok(())
}

#[test]
fn bones_and_eye_info_are_aligned() -> Result<()> {
    let config = CodecConfig::default();
    let mut container = character()?;
    container.write(&config)?;

    let skeleton_record = container
        .group(Tag::SKELETON)
        .and_then(|g| g.records.first())
        .cloned()
        .unwrap_or_default();

    assert_eq!(skeleton_record.children[0].layout.offset % 16, 0);
    assert_eq!(skeleton_record.children[1].layout.offset % 16, 0);

    let mut bone_offsets = Vec::new();
    skeleton_record.children[0].walk(&mut |node, _| {
        if !node.children.is_empty() {
            bone_offsets.push(node.children[0].layout.offset);
        }
    });
    assert!(bone_offsets.iter().all(|offset| offset % 16 == 0));

    Ok(())
}

#[test]
fn vertex_buffers_are_decoded() -> Result<()> {
    let config = CodecConfig::default();
    let mut container = character()?;
    let data = container.write(&config)?;

    let read = Container::from_bytes(&data, &config)?;
    let buffers = read.vertex_buffers();

    assert_eq!(buffers.len(), 1);
    assert_eq!(buffers[0].0, b"bodyVertices");
    assert_eq!(buffers[0].1, &vertex_buffer()?);

    Ok(())
}

#[test]
fn string_padding_is_honored() -> Result<()> {
    let config = CodecConfig::builder().string_padding(4).build();
    let mut container = character()?;
    let data = container.write(&config)?;

    assert_eq!(Container::from_bytes(&data, &config)?, container);

    Ok(())
}
