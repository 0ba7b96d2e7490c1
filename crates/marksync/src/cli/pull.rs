use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use const_format::concatcp;
use eyre::{Result as EyreResult, WrapErr};
use marksync_nodeset::Nodeset;
use marksync_store::MemoryStore;
use serde::Serialize;
use tokio::fs::try_exists;
use tracing::{debug, info};

use crate::cli::Environment;
use crate::common::{load_tree, save_tree};
use crate::datasource::OfflineDatasource;
use crate::output::Report;

pub const EXAMPLES: &str = r"
  # Make the local store match a remote tree
  $ marksync --home data/ pull remote.json
";

#[derive(Debug, Parser)]
#[command(about = "Converge the local store to a remote tree and record a new baseline")]
#[command(after_help = concatcp!(
    "Examples:",
    EXAMPLES
))]
pub struct PullCommand {
    /// Remote tree to converge to
    #[arg(value_name = "REMOTE")]
    pub remote: Utf8PathBuf,
}

#[derive(Clone, Copy, Debug, Serialize)]
struct PullReport {
    revision: u64,
    commands: usize,
    baseline_changes: usize,
    nodes: usize,
}

impl Report for PullReport {
    fn report(&self) {
        println!(
            "revision {}: {} commands applied, {} changes since the last baseline, store holds {} nodes",
            self.revision, self.commands, self.baseline_changes, self.nodes
        );
    }
}

impl PullCommand {
    pub async fn run(self, environment: &Environment) -> EyreResult<()> {
        let home = &environment.home;
        let config = environment.config()?;

        let native_path = config.store.native_path(home);
        let ids_path = config.store.ids_path(home);
        let baseline_path = config.store.baseline_path(home);

        let mut store = MemoryStore::open(&native_path, &ids_path, config.attributes.clone())
            .await
            .wrap_err("failed to open the native store")?
            .with_order_is_important(config.sync.order_is_important);

        let baseline = if try_exists(&baseline_path).await? {
            Some(Arc::new(load_tree(&baseline_path, &config).await?))
        } else {
            debug!(%baseline_path, "no baseline yet");
            None
        };

        let mut local = Nodeset::fetch_from_native(&mut store, baseline.as_deref())
            .await?
            .with_slice(config.sync.walk_slice);
        let remote = load_tree(&self.remote, &config).await?;

        let commands = local.compare(&remote, &mut store).await?;

        local.flush_to_native(&mut store).await?;

        let revision = baseline
            .as_deref()
            .map_or(0, Nodeset::revision)
            .saturating_add(1);

        // The next baseline starts as a copy-on-write view of the last one.
        let (mut next, baseline_changes) = match baseline {
            Some(baseline) => {
                let mut next = Nodeset::clone_of(baseline).with_slice(config.sync.walk_slice);
                let changes = next
                    .compare(&local, &mut OfflineDatasource::new(&config))
                    .await?;
                next.declone().await?;
                (next, changes.len())
            }
            None => (local, commands.len()),
        };
        next.set_revision(revision);
        save_tree(&next, &baseline_path).await?;

        store
            .persist(&native_path, &ids_path)
            .await
            .wrap_err("failed to persist the native store")?;

        info!(revision, commands = commands.len(), baseline_changes, "pulled remote tree");

        environment.output.write(&PullReport {
            revision,
            commands: commands.len(),
            baseline_changes,
            nodes: next.len(),
        });

        Ok(())
    }
}
