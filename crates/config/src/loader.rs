use crate::Config;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};
use tracing::instrument;

const ENV_PREFIX: &str = "X360MSE_";
const ENV_SEPARATOR: &str = "__";

/// Builds a [`Config`] from the layered sources.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_dir: Option<PathBuf>,
    file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// A loader reading from the platform's user configuration directory.
    pub fn new() -> Self {
        Self {
            user_dir: ProjectDirs::from("", "", "x360mse").map(|dirs| dirs.config_dir().to_path_buf()),
            file: None,
        }
    }

    /// Read user configuration from `dir` instead, or skip it with `None`.
    pub fn with_user_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_dir = dir;
        self
    }

    /// Layer an explicit configuration file over the user configuration.
    /// Unlike the user configuration, this file must exist.
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// The merged (but not yet extracted) configuration sources.
    pub fn figment(&self) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dir) = &self.user_dir {
            tracing::trace!(dir = %dir.display(), "Checking user configuration directory");
            figment = figment
                .merge(Toml::file(dir.join("config.toml")))
                .merge(Yaml::file(dir.join("config.yaml")))
                .merge(Json::file(dir.join("config.json")));
        }
        if let Some(file) = &self.file {
            figment = merge_file(figment, file)?;
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR)))
    }

    /// Load and validate the configuration.
    #[instrument(skip(self), fields(file = ?self.file))]
    pub fn load(&self) -> Result<Config> {
        let config: Config = self.figment()?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }
}

fn merge_file(figment: Figment, file: &Path) -> Result<Figment> {
    if !file.is_file() {
        exn::bail!(ErrorKind::NotFound(file.to_path_buf()));
    }
    let extension = file.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
    Ok(match extension.as_str() {
        "toml" => figment.merge(Toml::file(file)),
        "yaml" | "yml" => figment.merge(Yaml::file(file)),
        "json" => figment.merge(Json::file(file)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(extension)),
    })
}
