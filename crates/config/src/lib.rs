//! The `config.toml` file of a marksync home directory.

#![cfg_attr(
    test,
    allow(
        clippy::missing_assert_message,
        clippy::unwrap_used,
        reason = "Not useful in unit tests"
    )
)]

#[cfg(test)]
#[path = "tests/config.rs"]
mod tests;

use core::time::Duration;
use std::fs::{read_to_string, write};

use camino::{Utf8Path, Utf8PathBuf};
use dirs::home_dir;
use eyre::{Result as EyreResult, WrapErr};
use marksync_nodeset::hash::DEFAULT_HASH_ATTRS;
use marksync_nodeset::nodeset::DEFAULT_WALK_SLICE;
use marksync_nodeset::AttributePolicy;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_MARKSYNC_HOME: &str = ".marksync";

/// `~/.marksync`, or the working directory when there is no home directory.
#[must_use]
pub fn default_home() -> Utf8PathBuf {
    home_dir()
        .and_then(|home| Utf8PathBuf::from_path_buf(home).ok())
        .map_or_else(Utf8PathBuf::default, |home| home.join(DEFAULT_MARKSYNC_HOME))
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub attributes: AttributePolicy,

    #[serde(default)]
    pub hash: HashConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Time a traversal runs before yielding.
    #[serde(rename = "walk_slice_ms", with = "serde_duration")]
    pub walk_slice: Duration,
    /// Whether child order is significant when comparing trees.
    pub order_is_important: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            walk_slice: DEFAULT_WALK_SLICE,
            order_is_important: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct HashConfig {
    /// Fields feeding each node's digest, in order.
    pub attrs: Vec<String>,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            attrs: DEFAULT_HASH_ATTRS.iter().map(|&attr| attr.to_owned()).collect(),
        }
    }
}

/// Files of the reference store. Relative paths resolve against the home
/// directory.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct StoreConfig {
    pub native: Utf8PathBuf,
    pub ids: Utf8PathBuf,
    pub baseline: Utf8PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            native: "places.json".into(),
            ids: "ids.json".into(),
            baseline: "baseline.json".into(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub const fn new(native: Utf8PathBuf, ids: Utf8PathBuf, baseline: Utf8PathBuf) -> Self {
        Self {
            native,
            ids,
            baseline,
        }
    }

    #[must_use]
    pub fn native_path(&self, home: &Utf8Path) -> Utf8PathBuf {
        home.join(&self.native)
    }

    #[must_use]
    pub fn ids_path(&self, home: &Utf8Path) -> Utf8PathBuf {
        home.join(&self.ids)
    }

    #[must_use]
    pub fn baseline_path(&self, home: &Utf8Path) -> Utf8PathBuf {
        home.join(&self.baseline)
    }
}

impl ConfigFile {
    #[must_use]
    pub const fn new(
        sync: SyncConfig,
        attributes: AttributePolicy,
        hash: HashConfig,
        store: StoreConfig,
    ) -> Self {
        Self {
            sync,
            attributes,
            hash,
            store,
        }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration in {path:?}"))
    }

    /// Loads the file when present, otherwise the defaults.
    pub fn load_or_default(dir: &Utf8Path) -> EyreResult<Self> {
        if Self::exists(dir) {
            Self::load(dir)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }
}

mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
