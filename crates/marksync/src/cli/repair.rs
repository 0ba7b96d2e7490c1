use camino::Utf8PathBuf;
use clap::Parser;
use const_format::concatcp;
use eyre::Result as EyreResult;
use marksync_primitives::node::Node;
use serde::Serialize;

use crate::cli::Environment;
use crate::common::{load_tree, read_json, save_tree, CommandList};
use crate::datasource::OfflineDatasource;
use crate::output::Report;

pub const EXAMPLES: &str = r"
  # Reconcile a tree with the nodes another replica reported as changed
  $ marksync repair tree.json updates.json
";

#[derive(Debug, Parser)]
#[command(about = "Bring a tree in line with per-node snapshots")]
#[command(after_help = concatcp!(
    "Examples:",
    EXAMPLES
))]
pub struct RepairCommand {
    /// Tree to repair
    #[arg(value_name = "TREE")]
    pub tree: Utf8PathBuf,

    /// JSON array of node snapshots
    #[arg(value_name = "UPDATES")]
    pub updates: Utf8PathBuf,

    /// Write the result here instead of over TREE
    #[arg(long, value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,
}

#[derive(Debug, Serialize)]
struct RepairReport<'a> {
    commands: CommandList<'a>,
    reinsert: CommandList<'a>,
}

impl Report for RepairReport<'_> {
    fn report(&self) {
        self.commands.report();
        if !self.reinsert.0.is_empty() {
            println!("to re-create the deleted nodes:");
            self.reinsert.report();
        }
    }
}

impl RepairCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<()> {
        let config = environment.config()?;
        let mut tree = load_tree(&self.tree, &config).await?;
        let updates: Vec<Node> = read_json(&self.updates).await?;

        let repair = tree.process_hash_updates(&updates, &OfflineDatasource::new(&config))?;

        save_tree(&tree, self.output.as_ref().unwrap_or(&self.tree)).await?;

        environment.output.write(&RepairReport {
            commands: CommandList(&repair.commands),
            reinsert: CommandList(&repair.reinsert),
        });

        Ok(())
    }
}
