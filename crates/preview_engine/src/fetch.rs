use std::time::Duration;

use futures_util::StreamExt;
use preview_logging::{preview_debug, preview_info};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{EngineEvent, FetchError, FetchFailureKind, ProjectPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Retrieves the generated project from the backend.
///
/// One call issues one request; retrying is left to the caller.
#[async_trait::async_trait]
pub trait ProjectFetcher: Send + Sync {
    async fn fetch(&self) -> Result<ProjectPayload, FetchError>;
}

/// Wire shape of `GET {backend}/api/project`.
#[derive(Debug, Deserialize)]
struct ProjectResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    app: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ReqwestProjectFetcher {
    endpoint: Url,
    settings: FetchSettings,
}

impl ReqwestProjectFetcher {
    pub fn new(endpoint: Url, settings: FetchSettings) -> Self {
        Self { endpoint, settings }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn build_client(&self) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FetchFailureKind::Network, err.to_string()))
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FetchFailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }
}

#[async_trait::async_trait]
impl ProjectFetcher for ReqwestProjectFetcher {
    async fn fetch(&self) -> Result<ProjectPayload, FetchError> {
        let client = self.build_client()?;
        preview_info!("Fetching project from {}", self.endpoint);

        let response = client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            body.extend_from_slice(&chunk);
        }
        preview_debug!("Project response: status={} bytes={}", status, body.len());

        // The backend reports "no project" in the body, whatever the status.
        match serde_json::from_slice::<ProjectResponse>(&body) {
            Ok(parsed) => payload_from_response(parsed),
            Err(_) if !status.is_success() => Err(FetchError::new(
                FetchFailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            )),
            Err(err) => Err(FetchError::new(FetchFailureKind::Parse, err.to_string())),
        }
    }
}

fn payload_from_response(response: ProjectResponse) -> Result<ProjectPayload, FetchError> {
    if !response.success {
        return Err(FetchError::new(
            FetchFailureKind::NotFound,
            "backend reported success=false",
        ));
    }
    match response.app {
        None | Some(Value::Null) => Err(FetchError::new(
            FetchFailureKind::NotFound,
            "backend response has no app",
        )),
        Some(Value::Object(tree)) => Ok(ProjectPayload::new(tree)),
        Some(other) => Err(FetchError::new(
            FetchFailureKind::Parse,
            format!("expected a file tree object, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FetchFailureKind::Timeout, err.to_string());
    }
    FetchError::new(FetchFailureKind::Network, err.to_string())
}
