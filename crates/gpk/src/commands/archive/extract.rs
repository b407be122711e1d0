use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use serde_json::{json, Value};
use std::{io::Write, path::PathBuf};
use tracing::{info, warn};

use gpk_container::Container;

use crate::commands::{
    container::{skeleton::skeleton_json, vertices::vertices_json},
    options::{create_output, entry_path, open_archive, CodecArgs, ConfigArgs},
};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Also write skeletons and vertex buffers of every container as JSON into this directory
    #[arg(long, value_name = "DIR")]
    dump: Option<PathBuf>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    #[command(flatten)]
    codec: CodecArgs,

    #[command(flatten)]
    config: ConfigArgs,
}

/// Bone trees and vertex data of a container as one JSON document
pub fn dump_container(container: &Container) -> Result<Value> {
    let skeletons = container
        .skeletons()?
        .iter()
        .map(skeleton_json)
        .collect::<Result<Vec<_>>>()?;

    Ok(json!({
        "skeletons": skeletons,
        "vertex_buffers": vertices_json(container, None)?,
    }))
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = open_archive(&self.file, &self.codec, &self.config.config())?;

        for entry in archive.entries() {
            let p = entry_path(&self.directory, &entry.name)?;
            info!("writing {}", p.display());

            let mut out = create_output(&p, self.overwrite)?;
            out.write_all(entry.data())
                .into_diagnostic()
                .context(format!("writing {}", p.display()))?;

            let (Some(dump), Some(container)) = (&self.dump, entry.container()) else {
                continue;
            };

            let document = match dump_container(container) {
                Ok(document) => document,
                Err(e) => {
                    warn!("skipping dump of {}: {e}", entry.name);
                    continue;
                }
            };

            let p = entry_path(dump, &format!("{}.json", entry.name))?;
            info!("dumping {}", p.display());
            let out = create_output(&p, self.overwrite)?;
            serde_json::to_writer_pretty(out, &document)
                .into_diagnostic()
                .context(format!("writing {}", p.display()))?;
        }
        Ok(())
    }
}
