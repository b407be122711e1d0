pub mod inspect;
pub mod skeleton;
pub mod vertices;

#[derive(clap::Subcommand)]
pub enum ContainerCommands {
    /// Print the record tree of a container
    Inspect(inspect::InspectArgs),
    /// Export or replace a skeleton as a JSON bone tree
    Skeleton(skeleton::SkeletonArgs),
    /// Export or replace a vertex buffer as JSON vertex data
    Vertices(vertices::VerticesArgs),
}

impl ContainerCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ContainerCommands::Inspect(inspect) => inspect.handle(),
            ContainerCommands::Skeleton(skeleton) => skeleton.handle(),
            ContainerCommands::Vertices(vertices) => vertices.handle(),
        }
    }
}
