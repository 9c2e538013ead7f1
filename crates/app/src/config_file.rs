//! Optional TOML settings file. Everything has a default; CLI flags win over
//! the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use rta_dsp::config::AnalysisConfig;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Input device name; host default when absent.
    pub device: Option<String>,
    pub analysis: AnalysisConfig,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(settings)
    }
}
