pub mod diff;
pub mod extract;
pub mod list;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum ArchiveCommands {
    /// Compare two archives
    Diff(diff::DiffArgs),
    /// Extract an archive into a directory
    Extract(extract::ExtractArgs),
    /// List the entries of an archive
    List(list::ListArgs),
    /// Pack a directory into an archive
    Pack(pack::PackArgs),
}

impl ArchiveCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ArchiveCommands::Diff(diff) => diff.handle(),
            ArchiveCommands::Extract(extract) => extract.handle(),
            ArchiveCommands::List(list) => list.handle(),
            ArchiveCommands::Pack(pack) => pack.handle(),
        }
    }
}
