//! Configuration loading: defaults, then the user's config file, then a
//! per-map `mindfold.toml`, then `MINDFOLD_*` environment overrides.

use crate::error::MapError;
use crate::layout::LayoutConfig;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MindfoldConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl MindfoldConfig {
    /// Load configuration, layering the XDG config file, an optional
    /// map-local `mindfold.toml`, and `MINDFOLD_*` environment variables
    /// (nested keys separated by `__`, e.g. `MINDFOLD_LAYOUT__VERTICAL_STEP`).
    pub fn load(map_root: Option<&Path>) -> Result<Self, MapError> {
        let mut builder = Config::builder();
        if let Some(dirs) = directories::ProjectDirs::from("", "mindfold", "mindfold") {
            let user_config = dirs.config_dir().join("config.toml");
            builder = builder.add_source(File::from(user_config).required(false));
        }
        if let Some(root) = map_root {
            builder = builder.add_source(File::from(root.join("mindfold.toml")).required(false));
        }
        builder = builder.add_source(Environment::with_prefix("MINDFOLD").separator("__"));
        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| MapError::Config(e.to_string()))
    }
}
