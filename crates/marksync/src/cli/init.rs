use clap::Parser;
use const_format::concatcp;
use eyre::{bail, Result as EyreResult, WrapErr};
use marksync_config::ConfigFile;
use marksync_nodeset::Nodeset;
use marksync_store::MemoryStore;
use tokio::fs::create_dir_all;
use tracing::info;

use crate::cli::Environment;
use crate::common::save_tree;
use crate::output::InfoLine;

pub const EXAMPLES: &str = r"
  # Initialize the default home directory
  $ marksync init

  # Reset the configuration of an existing home, keeping its store
  $ marksync --home data/ init --force
";

#[derive(Clone, Copy, Debug, Parser)]
#[command(about = "Write a default config, an empty store and its baseline")]
#[command(after_help = concatcp!(
    "Examples:",
    EXAMPLES
))]
pub struct InitCommand {
    /// Overwrite an existing configuration
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<()> {
        let home = &environment.home;

        if ConfigFile::exists(home) && !self.force {
            bail!("{home} is already initialized; pass --force to overwrite its configuration");
        }

        create_dir_all(home)
            .await
            .wrap_err_with(|| format!("failed to create home directory {home}"))?;

        let config = ConfigFile::default();
        config.save(home)?;

        let native_path = config.store.native_path(home);
        let ids_path = config.store.ids_path(home);
        let mut store = MemoryStore::open(&native_path, &ids_path, config.attributes.clone())
            .await
            .wrap_err("failed to open the native store")?;

        let baseline = Nodeset::fetch_from_native(&mut store, None).await?;
        save_tree(&baseline, &config.store.baseline_path(home)).await?;
        store.persist(&native_path, &ids_path).await?;

        info!(%home, nodes = baseline.len(), "initialized home directory");

        environment
            .output
            .write(&InfoLine(&format!("Initialized marksync home at {home}")));

        Ok(())
    }
}
