use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use preview_engine::PreviewConfig;
use preview_logging::{preview_info, preview_warn};

pub const CONFIG_FILENAME: &str = "preview.ron";
pub const CONFIG_PATH_ENV: &str = "PREVIEW_CONFIG";
pub const BACKEND_URL_ENV: &str = "PREVIEW_BACKEND_URL";

/// Where configuration values come from, in increasing precedence.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Explicit config file; a missing file is an error.
    pub explicit_file: Option<PathBuf>,
    /// Config file that is read only if it exists.
    pub default_file: Option<PathBuf>,
    pub env_backend_url: Option<String>,
    pub arg_backend_url: Option<String>,
}

impl ConfigSources {
    pub fn from_environment() -> Self {
        Self {
            explicit_file: std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
            default_file: Some(PathBuf::from(CONFIG_FILENAME)),
            env_backend_url: std::env::var(BACKEND_URL_ENV).ok(),
            arg_backend_url: std::env::args().nth(1),
        }
    }
}

pub fn load_config(sources: &ConfigSources) -> anyhow::Result<PreviewConfig> {
    let mut config = match (&sources.explicit_file, &sources.default_file) {
        (Some(path), _) => read_config_file(path)?,
        (None, Some(path)) if path.exists() => read_config_file(path)?,
        _ => PreviewConfig::default(),
    };

    let overrides = [&sources.env_backend_url, &sources.arg_backend_url];
    for url in overrides.into_iter().flatten() {
        if url.trim().is_empty() {
            preview_warn!("Ignoring empty backend url override");
            continue;
        }
        config.backend_url = Some(url.trim().to_string());
    }

    config.validate().context("invalid preview configuration")?;
    Ok(config)
}

fn read_config_file(path: &Path) -> anyhow::Result<PreviewConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {path:?}"))?;
    let config: PreviewConfig = ron::from_str(&content)
        .with_context(|| format!("failed to parse config file {path:?}"))?;
    preview_info!("Loaded preview configuration from {:?}", path);
    Ok(config)
}
