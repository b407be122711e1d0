//! Arguments and helpers shared by several commands

use clap::Args;
use gpk_archive::{read::ReadOptions, Archive, CommandCodec, ExternalCodec, ZlibCodec};
use gpk_container::{types::string_to_latin1, CodecConfig, Container};
use miette::{miette, Context, IntoDiagnostic, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Component, Path, PathBuf},
};
use tracing::debug;

/// How the whole archive is compressed
#[derive(Args, Debug, Clone, Default)]
pub struct CodecArgs {
    /// The archive is compressed with zlib
    #[arg(long, default_value_t = false)]
    pub compressed: bool,

    /// Pipe the archive through this program instead of zlib
    #[arg(long, value_name = "PROGRAM")]
    pub codec_command: Option<String>,

    /// Argument passed to the program when compressing, may be repeated
    #[arg(long = "compress-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub compress_args: Vec<String>,

    /// Argument passed to the program when decompressing, may be repeated
    #[arg(long = "decompress-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub decompress_args: Vec<String>,
}

impl CodecArgs {
    pub fn codec(&self) -> Option<Box<dyn ExternalCodec>> {
        match &self.codec_command {
            Some(program) => Some(Box::new(
                CommandCodec::builder()
                    .program(program.clone())
                    .compress_args(self.compress_args.clone())
                    .decompress_args(self.decompress_args.clone())
                    .build(),
            )),
            None if self.compressed => Some(Box::new(ZlibCodec::default())),
            None => None,
        }
    }
}

/// Container codec settings
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Pad pool strings with NULs to a multiple of this value
    #[arg(long, value_name = "BYTES", default_value_t = 1)]
    pub padding: u32,

    /// Additional record name whose placement is rounded up to 16 bytes, may be repeated
    #[arg(long = "aligned-name", value_name = "NAME")]
    pub aligned_names: Vec<String>,
}

impl ConfigArgs {
    pub fn config(&self) -> CodecConfig {
        CodecConfig::builder()
            .string_padding(self.padding.max(1))
            .aligned_names(
                self.aligned_names
                    .iter()
                    .map(|n| string_to_latin1(n))
                    .collect(),
            )
            .build()
    }
}

/// Where to load a container from
#[derive(Args, Debug, Clone)]
pub struct ContainerSource {
    /// A container file, or an archive holding the container
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// Name of the entry to load when FILE is an archive
    #[arg(short, long, value_name = "NAME")]
    pub entry: Option<String>,

    #[command(flatten)]
    pub codec: CodecArgs,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl ContainerSource {
    pub fn load(&self) -> Result<Container> {
        let config = self.config.config();

        let Some(name) = &self.entry else {
            let data = std::fs::read(&self.file)
                .into_diagnostic()
                .context(format!("path: {}", &self.file.display()))?;
            return Container::from_bytes(&data, &config)
                .context(format!("reading {}", &self.file.display()));
        };

        let archive = open_archive(&self.file, &self.codec, &config)?;
        let entry = archive.by_name(name)?;
        entry
            .container()
            .cloned()
            .ok_or_else(|| miette!("{} is not a typed container", entry.name))
    }
}

/// Read an archive, decompressing it first when requested
pub fn open_archive(path: &Path, codec: &CodecArgs, config: &CodecConfig) -> Result<Archive> {
    let file = File::open(path)
        .into_diagnostic()
        .context(format!("path: {}", path.display()))?;
    let options = ReadOptions::builder().config(config.clone()).build();

    let archive = match codec.codec() {
        Some(codec) => Archive::decompress(BufReader::new(file), codec.as_ref(), &options),
        None => Archive::with_options(BufReader::new(file), &options),
    }
    .context(format!("reading {}", path.display()))?;

    debug!("{} holds {} entries", path.display(), archive.len());
    Ok(archive)
}

/// Create `path`, refusing to replace an existing file unless `overwrite` is set
pub fn create_output(path: &Path, overwrite: bool) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .into_diagnostic()
            .context(format!("creating {}", parent.display()))?;
    }

    if !overwrite {
        File::create_new(path)
            .into_diagnostic()
            .context(format!("creating {}", path.display()))
    } else {
        File::create(path)
            .into_diagnostic()
            .context(format!("creating {}", path.display()))
    }
}

/// Pretty print `value` to `output`, or to stdout when there is none
pub fn write_json(value: &Value, output: Option<&Path>, overwrite: bool) -> Result<()> {
    match output {
        Some(path) => {
            let out = create_output(path, overwrite)?;
            serde_json::to_writer_pretty(out, value)
                .into_diagnostic()
                .context(format!("writing {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, value).into_diagnostic()?;
            writeln!(stdout).into_diagnostic()
        }
    }
}

/// Parse a JSON document from a file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .into_diagnostic()
        .context(format!("path: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .into_diagnostic()
        .context(format!("parsing {}", path.display()))
}

/// Join an entry name onto `root`, rejecting names that could escape it
pub fn entry_path(root: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    if name.is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(miette!("refusing to extract {name:?}: not a plain relative path"));
    }
    Ok(root.join(relative))
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use crate::commands::options::{entry_path, CodecArgs};

    #[test]
    fn entry_paths_stay_inside() -> miette::Result<()> {
        let root = Path::new("out");

        assert_eq!(entry_path(root, "meshes/body.gctr")?, root.join("meshes/body.gctr"));
        assert!(entry_path(root, "../escape.bin").is_err());
        assert!(entry_path(root, "/etc/shadow").is_err());
        assert!(entry_path(root, "a/./b").is_ok());
        assert!(entry_path(root, "").is_err());

        Ok(())
    }

    #[test]
    fn codec_selection() {
        assert!(CodecArgs::default().codec().is_none());

        let zlib = CodecArgs {
            compressed: true,
            ..Default::default()
        };
        assert!(zlib.codec().is_some());
    }
}
