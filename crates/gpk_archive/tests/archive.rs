use std::io::Cursor;

use gpk_archive::{
    dispatch::EntryPayload,
    error::{Error, Result},
    read::ReadOptions,
    write::ArchiveWriterOptions,
    Archive, ArchiveWriter, ZlibCodec,
};
use gpk_container::{
    records::Payload, types::Tag, CodecConfig, Container, RecordNode,
};
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

fn blob(size: usize, seed: u8) -> Vec<u8> {
    (0..size).map(|i| seed.wrapping_add(i as u8)).collect()
}

fn three_entries() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("textures/a.bin", blob(10, 1)),
        ("meshes/body.bin", blob(37, 50)),
        ("readme.txt", blob(5, 200)),
    ]
}

fn write_archive(entries: &[(&str, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveWriterOptions::default());
    for (name, data) in entries {
        writer.add_entry(name, data)?;
    }
    Ok(writer.finish()?.into_inner())
}

fn small_container() -> Container {
    let mut container = Container::new(b"props.gctr".to_vec());
    container.insert_record(RecordNode::new(
        Tag(*b"ANIM"),
        b"wave".to_vec(),
        Payload::Opaque(vec![7; 9]),
    ));
    container
}

#[traced_test]
#[test]
fn entries_round_trip() -> Result<()> {
    let entries = three_entries();
    let data = write_archive(&entries)?;

    let archive = Archive::new(Cursor::new(data))?;
    assert_eq!(archive.len(), 3);
    assert_eq!(
        archive.file_names().collect::<Vec<_>>(),
        vec!["textures/a.bin", "meshes/body.bin", "readme.txt"]
    );

    for (entry, (name, bytes)) in archive.entries().zip(&entries) {
        assert_eq!(entry.name, *name);
        assert_eq!(entry.size as usize, bytes.len());
        assert_eq!(entry.data(), bytes.as_slice());
        assert_eq!(entry.offset % 16, 0);
    }

    Ok(())
}

#[test]
fn rewriting_is_stable() -> Result<()> {
    let data = write_archive(&three_entries())?;
    let archive = Archive::new(Cursor::new(data.clone()))?;

    let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveWriterOptions::default());
    for entry in archive.entries() {
        writer.add_entry(&entry.name, entry.data())?;
    }

    assert_eq!(writer.finish()?.into_inner(), data);

    Ok(())
}

#[traced_test]
#[test]
fn duplicate_names_keep_every_entry() -> Result<()> {
    let entries = vec![("a", vec![1]), ("a", vec![2]), ("b", vec![3])];
    let data = write_archive(&entries)?;

    let archive = Archive::new(Cursor::new(data.clone()))?;
    assert_eq!(archive.len(), 3);
    assert_eq!(archive.file_names().collect::<Vec<_>>(), vec!["a", "a", "b"]);
    assert_eq!(archive.by_index(0)?.data(), [1]);
    assert_eq!(archive.by_index(1)?.data(), [2]);
    assert_eq!(archive.name_for_index(1), Some("a"));

    assert_eq!(archive.by_name("a")?.data(), [2]);
    assert_eq!(archive.index_for_name("a"), Some(1));
    assert_eq!(archive.index_for_name("b"), Some(2));
    assert!(logs_contain("duplicate entry a"));

    let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveWriterOptions::default());
    for entry in archive.entries() {
        writer.add_entry(&entry.name, entry.data())?;
    }
    assert_eq!(writer.finish()?.into_inner(), data);

    Ok(())
}

#[test]
fn container_entries_are_decoded() -> Result<()> {
    let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveWriterOptions::default());
    writer.add_entry("notes.txt", b"plain")?;
    writer.add_container("props.gctr", &mut small_container())?;
    let data = writer.finish()?.into_inner();

    let archive = Archive::new(Cursor::new(data))?;
    assert_eq!(archive.by_name("notes.txt")?.payload, EntryPayload::Opaque);

    let container = archive
        .by_name("props.gctr")?
        .container()
        .cloned()
        .unwrap_or_default();
    assert_eq!(container.name, b"props.gctr");
    assert_eq!(container.record_count(), 1);

    Ok(())
}

#[test]
fn container_padding_comes_from_options() -> Result<()> {
    let config = CodecConfig::builder().string_padding(8).build();
    let mut writer = ArchiveWriter::new(
        Cursor::new(Vec::new()),
        ArchiveWriterOptions::builder().config(config.clone()).build(),
    );
    writer.add_container("props.gctr", &mut small_container())?;
    let data = writer.finish()?.into_inner();

    let archive = Archive::with_options(
        Cursor::new(data),
        &ReadOptions::builder().config(config).build(),
    )?;
    let entry = archive.by_index(0)?;

    assert!(entry.container().is_some());

    Ok(())
}

#[test]
fn compressed_round_trip() -> Result<()> {
    let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveWriterOptions::default());
    for (name, data) in three_entries() {
        writer.add_entry(name, &data)?;
    }
    let packed = writer.finish_compressed(&ZlibCodec::default())?.into_inner();

    assert!(Archive::new(Cursor::new(packed.clone())).is_err());

    let archive = Archive::decompress(
        Cursor::new(packed),
        &ZlibCodec::default(),
        &ReadOptions::default(),
    )?;
    assert_eq!(archive.len(), 3);
    assert_eq!(archive.by_name("meshes/body.bin")?.data(), blob(37, 50).as_slice());

    Ok(())
}

#[traced_test]
#[test]
fn broken_container_falls_back_to_raw() -> Result<()> {
    let data = write_archive(&[("broken.gctr", b"not a container".to_vec())])?;

    let archive = Archive::new(Cursor::new(data))?;
    let entry = archive.by_name("broken.gctr")?;

    assert_eq!(entry.payload, EntryPayload::Opaque);
    assert_eq!(entry.data(), b"not a container");
    assert!(logs_contain("unknown sub-format"));

    Ok(())
}

#[test]
fn truncated_container_is_fatal() -> Result<()> {
    let full = small_container().write(&CodecConfig::default())?;
    let data = write_archive(&[("props.bin", full[..24].to_vec())])?;

    let result = Archive::new(Cursor::new(data));
    assert!(matches!(result, Err(Error::ContainerError(_))));

    Ok(())
}

#[test]
fn oversized_container_regions_are_errors() -> Result<()> {
    let mut full = small_container().write(&CodecConfig::default())?;
    full[16..20].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xF0]);
    let data = write_archive(&[("props.bin", full.clone())])?;

    let result = Archive::new(Cursor::new(data));
    assert!(matches!(
        result,
        Err(Error::ContainerError(gpk_container::error::Error::InvalidHeader(_)))
    ));

    // a data block claiming more bytes than the entry holds
    full[16..20].copy_from_slice(&[0x00, 0x00, 0x00, 0x0C]);
    full[28..32].copy_from_slice(&[0x7F, 0xFF, 0xFF, 0xFF]);
    let data = write_archive(&[("props.bin", full)])?;

    let result = Archive::new(Cursor::new(data));
    assert!(matches!(
        result,
        Err(Error::ContainerError(gpk_container::error::Error::InvalidHeader(_)))
    ));

    Ok(())
}

#[cfg(unix)]
#[test]
fn command_codec_round_trip() -> Result<()> {
    use gpk_archive::CommandCodec;

    let codec = CommandCodec::builder().program("cat".to_string()).build();

    let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveWriterOptions::default());
    writer.add_entry("a.bin", &blob(10, 3))?;
    let packed = writer.finish_compressed(&codec)?.into_inner();

    let archive = Archive::decompress(Cursor::new(packed), &codec, &ReadOptions::default())?;
    assert_eq!(archive.by_index(0)?.data(), blob(10, 3).as_slice());

    Ok(())
}

#[cfg(unix)]
#[test]
fn command_codec_failure_is_surfaced() {
    use gpk_archive::CommandCodec;

    let codec = CommandCodec::builder().program("false".to_string()).build();
    let writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveWriterOptions::default());

    let result = writer.finish_compressed(&codec);
    assert!(matches!(result, Err(Error::ExternalToolError { .. })));
}
