use camino::Utf8PathBuf;
use clap::Parser;
use const_format::concatcp;
use eyre::Result as EyreResult;
use marksync_primitives::command::Commandset;
use serde::Serialize;
use tracing::info;

use crate::cli::Environment;
use crate::common::{load_tree, read_json, save_tree};
use crate::datasource::OfflineDatasource;
use crate::output::Report;

pub const EXAMPLES: &str = r"
  # Replay a compare result against a copy of the original tree
  $ marksync apply tree.json commands.json --output converged.json

  # Restore content in reverse, re-deriving positions from a baseline
  $ marksync apply tree.json restore.json --reverse --fallback baseline.json
";

#[derive(Debug, Parser)]
#[command(about = "Execute a commandset against a tree")]
#[command(after_help = concatcp!(
    "Examples:",
    EXAMPLES
))]
pub struct ApplyCommand {
    /// Tree the commands are applied to
    #[arg(value_name = "TREE")]
    pub tree: Utf8PathBuf,

    /// JSON array of wire commands
    #[arg(value_name = "COMMANDS")]
    pub commands: Utf8PathBuf,

    /// Execute the last command first
    #[arg(long)]
    pub reverse: bool,

    /// Skip commands that no longer fit, using this baseline to re-derive
    /// insert positions
    #[arg(long, value_name = "BASELINE", requires = "reverse")]
    pub fallback: Option<Utf8PathBuf>,

    /// Write the result here instead of over TREE
    #[arg(long, value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,
}

#[derive(Clone, Copy, Debug, Serialize)]
struct ApplyReport {
    applied: usize,
    skipped: usize,
    nodes: usize,
}

impl Report for ApplyReport {
    fn report(&self) {
        println!(
            "applied {} commands, skipped {}; tree holds {} nodes",
            self.applied, self.skipped, self.nodes
        );
    }
}

impl ApplyCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<()> {
        let config = environment.config()?;
        let mut tree = load_tree(&self.tree, &config).await?;
        let commands: Commandset = read_json(&self.commands).await?;

        let applied = if let Some(baseline) = &self.fallback {
            let baseline = load_tree(baseline, &config).await?;
            tree.apply_with_fallback(&commands, &baseline, &OfflineDatasource::new(&config))
        } else if self.reverse {
            tree.execute_all(&commands.reversed())?;
            commands.len()
        } else {
            tree.execute_all(&commands)?;
            commands.len()
        };

        let output = self.output.as_ref().unwrap_or(&self.tree);
        save_tree(&tree, output).await?;

        info!(applied, total = commands.len(), %output, "applied commandset");

        environment.output.write(&ApplyReport {
            applied,
            skipped: commands.len().saturating_sub(applied),
            nodes: tree.len(),
        });

        Ok(())
    }
}
