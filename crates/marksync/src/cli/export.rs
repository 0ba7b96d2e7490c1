use camino::Utf8PathBuf;
use clap::Parser;
use const_format::concatcp;
use eyre::Result as EyreResult;

use crate::cli::Environment;
use crate::common::{load_tree, CommandList};

pub const EXAMPLES: &str = r"
  # Print the inserts that rebuild a tree from nothing
  $ marksync --output-format json export tree.json > full.json
";

#[derive(Debug, Parser)]
#[command(about = "Print a full insert commandset for a tree")]
#[command(after_help = concatcp!(
    "Examples:",
    EXAMPLES
))]
pub struct ExportCommand {
    /// Tree to export
    #[arg(value_name = "TREE")]
    pub tree: Utf8PathBuf,
}

impl ExportCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<()> {
        let config = environment.config()?;
        let mut tree = load_tree(&self.tree, &config).await?;

        let commands = tree.provide_commandset().await?;

        environment.output.write(&CommandList(&commands));

        Ok(())
    }
}
