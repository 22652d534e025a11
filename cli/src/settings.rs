//! Configuration layering: defaults, then a YAML file, then environment
//! variables and flags (clap merges those two, flags winning).

use std::path::{Path, PathBuf};

use blockdex_core::config::IndexerConfig;
use blockdex_core::error::IndexerError;

/// Used when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "config/local.yaml";

/// Command-line overrides applied on top of the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub database: Option<String>,
    pub endpoint: Option<String>,
}

/// The file to read: the explicit path, or the default one if present.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.is_file().then_some(default)
        }
    }
}

pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<IndexerConfig, IndexerError> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| IndexerError::Config(format!("cannot read {}: {e}", path.display())))?;
            tracing::info!(path = %path.display(), "using config file");
            parse(&text).map_err(|e| IndexerError::Config(format!("{}: {e}", path.display())))?
        }
        None => IndexerConfig::default(),
    };

    if let Some(database) = overrides.database {
        config.database_url = Some(database);
    }
    if let Some(endpoint) = overrides.endpoint {
        config.endpoint_url = Some(endpoint);
    }
    Ok(config)
}

fn parse(text: &str) -> Result<IndexerConfig, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(IndexerConfig::default());
    }
    serde_yaml::from_str(text)
}
