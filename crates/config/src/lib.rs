//! Layered configuration for updrop.
//!
//! Values are merged from, lowest precedence first:
//! 1. built-in defaults,
//! 2. `config.toml`, `config.yaml` or `config.json` in the platform config
//!    directory (e.g. `~/.config/updrop` on Linux),
//! 3. an explicitly supplied file,
//! 4. `UPDROP_`-prefixed environment variables (`UPDROP_CONCURRENCY=5`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_PAGE_SIZE: usize = 100;
const ENV_PREFIX: &str = "UPDROP_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of uploads running at the same time.
    pub concurrency: usize,
    /// Maximum number of directory children read per page.
    pub page_size: usize,
    /// Root directory for the local transport, if one is used.
    pub destination: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY, page_size: DEFAULT_PAGE_SIZE, destination: None }
    }
}

impl Config {
    /// Loads and validates configuration from every layer.
    ///
    /// A missing file in the config directory is fine; a missing explicit
    /// file is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path
            && !path.is_file()
        {
            exn::bail!(ErrorKind::Invalid(format!("configuration file not found: {}", path.display())));
        }
        Self::from_figment(Self::figment(path))
    }

    /// The merged provider stack used by [`load`](Self::load), for callers
    /// that want to add their own layers on top.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(dirs) = ProjectDirs::from("", "", "updrop") {
            let dir = dirs.config_dir();
            debug!(dir = %dir.display(), "Looking for configuration files");
            figment = figment
                .merge(Toml::file(dir.join("config.toml")))
                .merge(Yaml::file(dir.join("config.yaml")))
                .merge(Json::file(dir.join("config.json")));
        }
        if let Some(path) = path {
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("concurrency must be at least 1".to_string()));
        }
        if self.page_size == 0 {
            exn::bail!(ErrorKind::Invalid("page_size must be at least 1".to_string()));
        }
        if let Some(destination) = &self.destination
            && !destination.is_absolute()
        {
            exn::bail!(ErrorKind::Invalid(format!("destination must be absolute: {}", destination.display())));
        }
        Ok(())
    }
}
