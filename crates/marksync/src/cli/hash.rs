use camino::Utf8PathBuf;
use clap::Parser;
use const_format::concatcp;
use eyre::Result as EyreResult;
use marksync_primitives::hash::HashEntry;
use serde::Serialize;

use crate::cli::Environment;
use crate::common::{load_tree, save_tree};
use crate::output::Report;

pub const EXAMPLES: &str = r"
  # Print the hash list of a tree
  $ marksync --output-format json hash tree.json

  # Hash on names only and keep the digests in the file
  $ marksync hash tree.json --attrs name --save
";

#[derive(Debug, Parser)]
#[command(about = "Compute rollup digests and print the hash list")]
#[command(after_help = concatcp!(
    "Examples:",
    EXAMPLES
))]
pub struct HashCommand {
    /// Tree to hash
    #[arg(value_name = "TREE")]
    pub tree: Utf8PathBuf,

    /// Fields feeding each digest; defaults to the configured list
    #[arg(long, value_name = "ATTR", value_delimiter = ',')]
    pub attrs: Option<Vec<String>>,

    /// Write the digests back into TREE
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct HashReport(Vec<HashEntry>);

impl Report for HashReport {
    fn report(&self) {
        for entry in &self.0 {
            println!("{} {}", entry.hash, entry.nid);
        }
    }
}

impl HashCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<()> {
        let config = environment.config()?;
        let mut tree = load_tree(&self.tree, &config).await?;
        let attrs = self.attrs.unwrap_or(config.hash.attrs);

        tree.hash_tree(&attrs).await?;
        let entries = tree.hash_list().await?;

        if self.save {
            save_tree(&tree, &self.tree).await?;
        }

        environment.output.write(&HashReport(entries));

        Ok(())
    }
}
