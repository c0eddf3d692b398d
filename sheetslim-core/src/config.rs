//! Configuration for the lightening run

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Main lightener configuration, loadable from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightenConfig {
    /// Replace every formula with its cached value
    #[serde(default = "default_convert_formulas")]
    pub convert_formulas: bool,

    /// Quality for lossy re-encoding of embedded JPEG images
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Named cell styles beyond this cap are deleted from the end
    #[serde(default = "default_style_cap")]
    pub style_cap: usize,

    /// Where the lightened copy lands; defaults to the desktop folder
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Step ids to skip entirely
    #[serde(default)]
    pub disabled_steps: HashSet<String>,
}

fn default_convert_formulas() -> bool {
    true
}

fn default_jpeg_quality() -> u8 {
    65
}

fn default_style_cap() -> usize {
    256
}

impl Default for LightenConfig {
    fn default() -> Self {
        Self {
            convert_formulas: default_convert_formulas(),
            jpeg_quality: default_jpeg_quality(),
            style_cap: default_style_cap(),
            output_dir: None,
            disabled_steps: HashSet::new(),
        }
    }
}

impl LightenConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: LightenConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn is_step_enabled(&self, step_id: &str) -> bool {
        !self.disabled_steps.contains(step_id)
    }

    /// Validate configured step ids against the registry
    pub fn validate_steps(&self, valid_ids: &HashSet<String>) -> Result<()> {
        for id in &self.disabled_steps {
            if !valid_ids.contains(id) {
                anyhow::bail!("Configuration error: unknown step id '{}' in disabled_steps", id);
            }
        }
        Ok(())
    }
}
