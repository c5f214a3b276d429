use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{CommandSpec, FetchSettings, PipelineSettings};

/// Path of the project endpoint below the backend root.
pub const PROJECT_ENDPOINT: &str = "api/project";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("backend url is not configured")]
    MissingBackendUrl,
    #[error("invalid backend url '{url}': {reason}")]
    InvalidBackendUrl { url: String, reason: String },
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
    #[error("{field} has an empty program")]
    EmptyCommand { field: &'static str },
}

/// Everything one preview session needs, handed to the engine at construction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Backend root; the project is fetched from `{backend_url}/api/project`.
    pub backend_url: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_response_bytes: u64,
    pub install_command: CommandSpec,
    pub dev_command: CommandSpec,
    pub spinner_interval_ms: u64,
    pub tip_interval_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            backend_url: None,
            connect_timeout_ms: fetch.connect_timeout.as_millis() as u64,
            request_timeout_ms: fetch.request_timeout.as_millis() as u64,
            max_response_bytes: fetch.max_bytes,
            install_command: CommandSpec::npm_install(),
            dev_command: CommandSpec::npm_run_dev(),
            spinner_interval_ms: 150,
            tip_interval_ms: 3000,
        }
    }
}

impl PreviewConfig {
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    /// Resolves `{backend_url}/api/project`, tolerating a trailing slash.
    pub fn project_endpoint(&self) -> Result<Url, ConfigError> {
        let raw = self
            .backend_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingBackendUrl)?;
        let invalid = |reason: String| ConfigError::InvalidBackendUrl {
            url: raw.to_string(),
            reason,
        };

        let mut base = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(PROJECT_ENDPOINT)
            .map_err(|err| invalid(err.to_string()))
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_bytes: self.max_response_bytes,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            install_command: self.install_command.clone(),
            dev_command: self.dev_command.clone(),
        }
    }

    pub fn spinner_interval(&self) -> Duration {
        Duration::from_millis(self.spinner_interval_ms)
    }

    pub fn tip_interval(&self) -> Duration {
        Duration::from_millis(self.tip_interval_ms)
    }

    /// Checks everything the engine relies on before any pipeline runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.project_endpoint()?;
        for (field, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("max_response_bytes", self.max_response_bytes),
            ("spinner_interval_ms", self.spinner_interval_ms),
            ("tip_interval_ms", self.tip_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroValue { field });
            }
        }
        for (field, command) in [
            ("install_command", &self.install_command),
            ("dev_command", &self.dev_command),
        ] {
            if command.program.trim().is_empty() {
                return Err(ConfigError::EmptyCommand { field });
            }
        }
        Ok(())
    }
}
