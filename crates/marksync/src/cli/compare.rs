use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::owo_colors::OwoColorize;
use const_format::concatcp;
use eyre::Result as EyreResult;
use marksync_primitives::id::NodeId;
use serde::Serialize;

use crate::cli::Environment;
use crate::common::{load_tree, save_tree, CommandList};
use crate::datasource::OfflineDatasource;
use crate::output::Report;

pub const EXAMPLES: &str = r"
  # Print the commands that turn local.json into remote.json
  $ marksync compare local.json remote.json

  # Keep the rewritten tree as well
  $ marksync compare local.json remote.json --output merged.json
";

#[derive(Debug, Parser)]
#[command(about = "Rewrite a tree into the shape of another and print the edit script")]
#[command(after_help = concatcp!(
    "Examples:",
    EXAMPLES
))]
pub struct CompareCommand {
    /// Tree that is rewritten
    #[arg(value_name = "LOCAL")]
    pub local: Utf8PathBuf,

    /// Tree to converge to
    #[arg(value_name = "REMOTE")]
    pub remote: Utf8PathBuf,

    /// Write the rewritten tree to this file
    #[arg(long, value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,
}

#[derive(Debug, Serialize)]
struct CompareReport<'a> {
    commands: CommandList<'a>,
    duplicates: &'a [NodeId],
}

impl Report for CompareReport<'_> {
    fn report(&self) {
        self.commands.report();
        println!(
            "{} commands, {} duplicates removed",
            self.commands.0.len().bold(),
            self.duplicates.len().bold()
        );
    }
}

impl CompareCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<()> {
        let config = environment.config()?;
        let mut local = load_tree(&self.local, &config).await?;
        let remote = load_tree(&self.remote, &config).await?;
        let mut datasource = OfflineDatasource::new(&config);

        let commands = local.compare(&remote, &mut datasource).await?;

        if let Some(output) = &self.output {
            save_tree(&local, output).await?;
        }

        environment.output.write(&CompareReport {
            commands: CommandList(&commands),
            duplicates: datasource.removed(),
        });

        Ok(())
    }
}
