use camino::Utf8PathBuf;
use clap::Parser;
use const_format::concatcp;
use eyre::Result as EyreResult;
use serde::Serialize;

use crate::cli::Environment;
use crate::common::{load_tree, save_tree};
use crate::datasource::OfflineDatasource;
use crate::output::Report;

pub const EXAMPLES: &str = r"
  # Fold a second machine's bookmarks into ours
  $ marksync merge ours.json theirs.json --output merged.json
";

#[derive(Debug, Parser)]
#[command(about = "Merge one tree into another without overwriting anything")]
#[command(after_help = concatcp!(
    "Examples:",
    EXAMPLES
))]
pub struct MergeCommand {
    /// Tree that receives the merge
    #[arg(value_name = "DEST")]
    pub dest: Utf8PathBuf,

    /// Tree merged in
    #[arg(value_name = "SOURCE")]
    pub source: Utf8PathBuf,

    /// Write the result here instead of over DEST
    #[arg(long, value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,
}

#[derive(Clone, Copy, Debug, Serialize)]
struct MergeReport {
    matched: usize,
    replicated: usize,
    nodes: usize,
}

impl Report for MergeReport {
    fn report(&self) {
        println!(
            "matched {} nodes, copied {} new; tree holds {} nodes",
            self.matched, self.replicated, self.nodes
        );
    }
}

impl MergeCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<()> {
        let config = environment.config()?;
        let mut dest = load_tree(&self.dest, &config).await?;
        let source = load_tree(&self.source, &config).await?;

        let stats = dest.merge(&source, &OfflineDatasource::new(&config))?;

        save_tree(&dest, self.output.as_ref().unwrap_or(&self.dest)).await?;

        environment.output.write(&MergeReport {
            matched: stats.matched,
            replicated: stats.replicated,
            nodes: dest.len(),
        });

        Ok(())
    }
}
