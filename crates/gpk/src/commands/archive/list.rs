use clap::Args;
use miette::Result;
use std::path::PathBuf;

use gpk_archive::EntryPayload;

use crate::commands::options::{open_archive, CodecArgs, ConfigArgs};

#[derive(Args)]
pub struct ListArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    #[command(flatten)]
    codec: CodecArgs,

    #[command(flatten)]
    config: ConfigArgs,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = open_archive(&self.file, &self.codec, &self.config.config())?;

        println!("version {}, {} entries", archive.version(), archive.len());
        for entry in archive.entries() {
            let detail = match &entry.payload {
                EntryPayload::Container(container) => format!(
                    "container, {} groups, {} records",
                    container.groups.len(),
                    container.record_count()
                ),
                EntryPayload::Opaque => entry.payload.label().to_string(),
            };
            println!(
                "{:#010x} {:>10} {} ({})",
                entry.offset, entry.size, entry.name, detail
            );
        }

        Ok(())
    }
}
