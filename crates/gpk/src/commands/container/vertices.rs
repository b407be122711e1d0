use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use serde_json::{Map, Value};
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

use gpk_container::{
    bridge::VertexData,
    records::Payload,
    types::{latin1_to_string, string_to_latin1, Tag},
    Container, VertexBuffer,
};

use crate::commands::options::{create_output, read_json, write_json, ContainerSource};

#[derive(Args)]
pub struct VerticesArgs {
    #[command(flatten)]
    source: ContainerSource,

    /// Only handle the vertex buffer record with this name
    #[arg(short, long, value_name = "NAME")]
    name: Option<String>,

    /// Replace the vertex buffer NAME with this vertex data and write the container to OUTPUT
    #[arg(long, value_name = "JSON", requires_all = ["name", "output"], conflicts_with = "entry")]
    replace: Option<PathBuf>,

    /// Target file, stdout when omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

/// Vertex data of every buffer in `container`, keyed by record name
pub fn vertices_json(container: &Container, name: Option<&[u8]>) -> Result<Map<String, Value>> {
    let mut buffers = Map::new();
    for (record, buffer) in container.vertex_buffers() {
        if name.is_some_and(|n| n != record) {
            continue;
        }
        buffers.insert(
            latin1_to_string(record),
            serde_json::to_value(buffer.to_vertex_data()).into_diagnostic()?,
        );
    }
    Ok(buffers)
}

impl VerticesArgs {
    fn export(&self) -> Result<()> {
        let container = self.source.load()?;
        let name = self.name.as_deref().map(string_to_latin1);

        let buffers = vertices_json(&container, name.as_deref())?;
        if buffers.is_empty() {
            return Err(miette!("no matching vertex buffer found"));
        }

        write_json(&Value::Object(buffers), self.output.as_deref(), self.overwrite)
    }

    fn replace(&self, json: &Path, name: &str, output: &Path) -> Result<()> {
        let data: VertexData = read_json(json)?;
        let buffer = VertexBuffer::from_vertex_data(&data)?;
        info!(
            "replacing {} with {} vertices in {} attributes",
            name,
            buffer.vertex_count,
            buffer.attributes.len()
        );

        let name_raw = string_to_latin1(name);
        let mut container = self.source.load()?;
        let record = container
            .find_record_mut(|r| {
                r.type_tag == Tag::VERTEX_BUFFER
                    && r.name == name_raw
                    && matches!(r.payload, Payload::VertexBuffer(_))
            })
            .ok_or_else(|| miette!("no vertex buffer named {name}"))?;
        record.payload = Payload::VertexBuffer(buffer);

        let data = container.write(&self.source.config.config())?;
        let mut out = create_output(output, self.overwrite)?;
        out.write_all(&data)
            .into_diagnostic()
            .context(format!("writing {}", output.display()))
    }

    pub fn handle(&self) -> Result<()> {
        match (&self.replace, &self.name, &self.output) {
            (Some(json), Some(name), Some(output)) => self.replace(json, name, output),
            (Some(_), _, _) => Err(miette!("--replace needs --name and --output")),
            _ => self.export(),
        }
    }
}
