//! Configuration loading and parsing.
//!
//! Parses `gridview.toml` (or an override path provided by the binary):
//!
//! ```toml
//! [layout]
//! container_width = 310.0
//! spacing = 10.0
//! columns = 3
//! seed_items = 8
//!
//! [runtime]
//! command_channel_capacity = 256
//! ```
//!
//! Every field is optional. A missing file or a parse error falls back to
//! defaults; unknown fields are ignored so the file can evolve ahead of the
//! binary. Values are not validated here: the layout engine rejects bad
//! geometry at its own boundary. CLI flags are layered on top with
//! [`Config::apply_overrides`].

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "gridview.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LayoutSection {
    #[serde(default = "LayoutSection::default_container_width")]
    pub container_width: f64,
    #[serde(default = "LayoutSection::default_spacing")]
    pub spacing: f64,
    #[serde(default = "LayoutSection::default_columns")]
    pub columns: usize,
    #[serde(default = "LayoutSection::default_seed_items")]
    pub seed_items: usize,
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            container_width: Self::default_container_width(),
            spacing: Self::default_spacing(),
            columns: Self::default_columns(),
            seed_items: Self::default_seed_items(),
        }
    }
}

impl LayoutSection {
    const fn default_container_width() -> f64 {
        310.0
    }
    const fn default_spacing() -> f64 {
        10.0
    }
    const fn default_columns() -> usize {
        3
    }
    const fn default_seed_items() -> usize {
        8
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeSection {
    #[serde(default = "RuntimeSection::default_command_channel_capacity")]
    pub command_channel_capacity: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            command_channel_capacity: Self::default_command_channel_capacity(),
        }
    }
}

impl RuntimeSection {
    const fn default_command_channel_capacity() -> usize {
        256
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub layout: LayoutSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub path: Option<PathBuf>, // where `raw` came from
    pub file: ConfigFile, // parsed (or default) data
}

/// Values supplied on the command line; `None` keeps the file value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutOverrides {
    pub container_width: Option<f64>,
    pub spacing: Option<f64>,
    pub columns: Option<usize>,
    pub seed_items: Option<usize>,
}

/// Config path following platform conventions: working directory first, then
/// the platform config dir (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("gridview").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config {
            raw: Some(content),
            path: Some(path),
            file,
        }),
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Layer CLI overrides over the file values. Returns how many fields
    /// were replaced.
    pub fn apply_overrides(&mut self, overrides: &LayoutOverrides) -> usize {
        let layout = &mut self.file.layout;
        let mut applied = 0;
        if let Some(width) = overrides.container_width {
            info!(target: "config", from = layout.container_width, to = width, "container_width_overridden");
            layout.container_width = width;
            applied += 1;
        }
        if let Some(spacing) = overrides.spacing {
            info!(target: "config", from = layout.spacing, to = spacing, "spacing_overridden");
            layout.spacing = spacing;
            applied += 1;
        }
        if let Some(columns) = overrides.columns {
            info!(target: "config", from = layout.columns, to = columns, "columns_overridden");
            layout.columns = columns;
            applied += 1;
        }
        if let Some(seed) = overrides.seed_items {
            info!(target: "config", from = layout.seed_items, to = seed, "seed_items_overridden");
            layout.seed_items = seed;
            applied += 1;
        }
        applied
    }

    /// Channel capacity with zero clamped to one (tokio rejects empty
    /// bounded channels).
    pub fn command_channel_capacity(&self) -> usize {
        self.file.runtime.command_channel_capacity.max(1)
    }
}
