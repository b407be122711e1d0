use clap::Args;
use miette::Result;

use crate::commands::options::ContainerSource;

#[derive(Args)]
pub struct InspectArgs {
    #[command(flatten)]
    source: ContainerSource,
}

impl InspectArgs {
    pub fn handle(&self) -> Result<()> {
        let container = self.source.load()?;
        print!("{}", container.render_tree());
        Ok(())
    }
}
