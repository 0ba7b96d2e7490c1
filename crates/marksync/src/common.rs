use camino::Utf8Path;
use eyre::{Result as EyreResult, WrapErr};
use marksync_config::ConfigFile;
use marksync_nodeset::Nodeset;
use marksync_primitives::command::Commandset;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use crate::output::Report;

/// Reads a tree file, using the configured walk slice for it.
pub async fn load_tree(path: &Utf8Path, config: &ConfigFile) -> EyreResult<Nodeset> {
    let nodeset = Nodeset::load(path.as_std_path())
        .await
        .wrap_err_with(|| format!("failed to load tree from {path}"))?;

    Ok(nodeset.with_slice(config.sync.walk_slice))
}

pub async fn save_tree(nodeset: &Nodeset, path: &Utf8Path) -> EyreResult<()> {
    nodeset
        .save(path.as_std_path())
        .await
        .wrap_err_with(|| format!("failed to save tree to {path}"))
}

pub async fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> EyreResult<T> {
    let content = fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("failed to read {path}"))?;

    serde_json::from_str(&content).wrap_err_with(|| format!("failed to parse {path}"))
}

/// One line per command, in order.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(transparent)]
pub struct CommandList<'a>(pub &'a Commandset);

impl Report for CommandList<'_> {
    fn report(&self) {
        for command in self.0.iter() {
            let mut line = format!("{:<8} {}", command.action(), command.id());
            if let Some(parent_id) = command.parent_id() {
                line.push_str(" under ");
                line.push_str(parent_id.as_str());
            }
            if let Some(before_id) = command.before_id() {
                line.push_str(" before ");
                line.push_str(before_id.as_str());
            }
            println!("{line}");
        }
    }
}
