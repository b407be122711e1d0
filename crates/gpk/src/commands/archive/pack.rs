use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{fs::File, path::PathBuf};
use tracing::info;
use walkdir::WalkDir;

use gpk_archive::{write::ArchiveWriterOptions, ArchiveWriter};

use crate::commands::options::{create_output, CodecArgs};

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Archive format version
    #[arg(long, default_value_t = 1)]
    version: u32,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    #[command(flatten)]
    codec: CodecArgs,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.file.display());

        let files = WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();

        if files.is_empty() {
            return Err(miette!("directory is empty"));
        }

        let out = create_output(&self.file, self.overwrite)?;
        let mut archive = ArchiveWriter::new(
            out,
            ArchiveWriterOptions::builder().version(self.version).build(),
        );

        for file in files {
            let name = file
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;
            let name = name
                .components()
                .map(|c| c.as_os_str().to_str())
                .collect::<Option<Vec<_>>>()
                .ok_or(miette!("unable to convert {} to a string", name.display()))?
                .join("/");
            info!("packing {}", name);

            archive
                .start_entry(&name)
                .context(format!("starting entry for {}", name))?;

            let mut f = File::open(file.path())
                .into_diagnostic()
                .context(format!("opening {}", file.path().display()))?;

            std::io::copy(&mut f, &mut archive)
                .into_diagnostic()
                .context(format!("copying {}", file.path().display()))?;
        }

        match self.codec.codec() {
            Some(codec) => archive
                .finish_compressed(codec.as_ref())
                .context("finalizing compressed archive")?,
            None => archive.finish().context("finalizing archive")?,
        };

        Ok(())
    }
}
