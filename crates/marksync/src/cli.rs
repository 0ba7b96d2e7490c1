use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use color_eyre::owo_colors::OwoColorize;
use const_format::concatcp;
use eyre::{Report as EyreReport, Result as EyreResult};
use marksync_config::{default_home, ConfigFile};
use marksync_nodeset::{NodesetError, StoreError};
use serde::{Serialize, Serializer};
use thiserror::Error as ThisError;

use crate::output::{Format, Output, Report};

mod apply;
mod compare;
mod export;
mod hash;
mod init;
mod merge;
mod pull;
mod repair;

#[cfg(test)]
#[path = "tests/cli.rs"]
mod tests;

use apply::ApplyCommand;
use compare::CompareCommand;
use export::ExportCommand;
use hash::HashCommand;
use init::InitCommand;
use merge::MergeCommand;
use pull::PullCommand;
use repair::RepairCommand;

pub const EXAMPLES: &str = r"
  # Set up a home directory with an empty store and baseline
  $ marksync --home data/ init

  # Diff two trees and print the edit script
  $ marksync compare local.json remote.json

  # Bring the store in line with a remote tree
  $ marksync --home data/ pull remote.json
";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = concatcp!(
    "Environment variables:\n",
    "  MARKSYNC_HOME    Directory for config, store and baseline\n\n",
    "Examples:",
    EXAMPLES
))]
pub struct RootCommand {
    #[command(flatten)]
    pub args: RootArgs,

    #[command(subcommand)]
    pub action: SubCommands,
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    Init(InitCommand),
    #[command(alias = "diff")]
    Compare(CompareCommand),
    Apply(ApplyCommand),
    Merge(MergeCommand),
    Hash(HashCommand),
    Repair(RepairCommand),
    Export(ExportCommand),
    #[command(alias = "sync")]
    Pull(PullCommand),
}

#[derive(Debug, Parser)]
pub struct RootArgs {
    /// Directory for config, store and baseline
    #[arg(long, value_name = "PATH", default_value_t = default_home())]
    #[arg(env = "MARKSYNC_HOME", hide_env_values = true)]
    pub home: Utf8PathBuf,

    #[arg(long, value_name = "FORMAT", default_value_t, value_enum)]
    pub output_format: Format,
}

#[derive(Debug)]
pub struct Environment {
    pub output: Output,
    pub home: Utf8PathBuf,
}

impl Environment {
    pub const fn new(output: Output, home: Utf8PathBuf) -> Self {
        Self { output, home }
    }

    /// The home's configuration, or the defaults before `init` ran.
    pub fn config(&self) -> EyreResult<ConfigFile> {
        ConfigFile::load_or_default(&self.home)
    }
}

impl RootCommand {
    pub async fn run(self) -> Result<(), CliError> {
        let environment = Environment::new(Output::new(self.args.output_format), self.args.home);

        let result = match self.action {
            SubCommands::Init(init) => init.run(&environment).await,
            SubCommands::Compare(compare) => compare.run(&environment).await,
            SubCommands::Apply(apply) => apply.run(&environment).await,
            SubCommands::Merge(merge) => merge.run(&environment).await,
            SubCommands::Hash(hash) => hash.run(&environment).await,
            SubCommands::Repair(repair) => repair.run(&environment).await,
            SubCommands::Export(export) => export.run(&environment).await,
            SubCommands::Pull(pull) => pull.run(&environment).await,
        };

        if let Err(err) = result {
            let err = CliError::from(err);
            environment.output.write(&err);
            return Err(err);
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, ThisError)]
pub enum CliError {
    #[error("sync failed with status {status}: {message}")]
    Sync { status: i32, message: String },

    #[error(transparent)]
    Other(#[serde(serialize_with = "serialize_eyre_report")] EyreReport),
}

impl From<EyreReport> for CliError {
    fn from(report: EyreReport) -> Self {
        let status = report
            .chain()
            .find_map(|cause| {
                cause
                    .downcast_ref::<NodesetError>()
                    .map(NodesetError::status)
                    .or_else(|| cause.downcast_ref::<StoreError>().map(StoreError::status))
            });

        match status {
            Some(status) => Self::Sync {
                status,
                message: format!("{report:#}"),
            },
            None => Self::Other(report),
        }
    }
}

impl From<CliError> for ExitCode {
    fn from(error: CliError) -> Self {
        match error {
            CliError::Sync { .. } => Self::from(2),
            CliError::Other(_) => Self::FAILURE,
        }
    }
}

impl Report for CliError {
    fn report(&self) {
        match self {
            Self::Sync { status, message } => {
                eprintln!("{} status {status}: {message}", "[ERROR]".red());
            }
            Self::Other(report) => eprintln!("{} {report:?}", "[ERROR]".red()),
        }
    }
}

fn serialize_eyre_report<S>(report: &EyreReport, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(report.chain().map(ToString::to_string))
}
