pub mod archive;
pub mod container;
pub mod options;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle package archives
    Archive {
        #[command(subcommand)]
        command: archive::ArchiveCommands,
    },
    /// Handle typed containers, on their own or inside an archive
    Container {
        #[command(subcommand)]
        command: container::ContainerCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Archive { command } => command.handle(),
            Commands::Container { command } => command.handle(),
        }
    }
}
