use std::fmt;
use std::sync::Arc;

use preview_core::{Failure, OrchestrationState, Stage};
use serde_json::{Map, Value};
use thiserror::Error;

/// Generated project file tree, consumed verbatim by the runtime's mount.
///
/// Immutable once fetched; clones share the same tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPayload {
    tree: Arc<Map<String, Value>>,
}

impl ProjectPayload {
    pub fn new(tree: Map<String, Value>) -> Self {
        Self {
            tree: Arc::new(tree),
        }
    }

    pub fn tree(&self) -> &Map<String, Value> {
        &self.tree
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The orchestrator moved to a new state.
    StateChanged(OrchestrationState),
    /// Fast presenter timer fired.
    SpinnerTick,
    /// Slow presenter timer fired.
    TipTick,
}

/// Readiness notification from the sandbox runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerReady {
    pub port: u16,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub kind: FetchFailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == FetchFailureKind::NotFound
    }

    /// Message shown to the user: "no project found" is kept distinct from
    /// transport and parsing problems.
    pub fn user_message(&self) -> String {
        if self.is_not_found() {
            "no project found".to_string()
        } else {
            format!("error while fetching the project data: {}", self.message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailureKind {
    /// Backend answered but has no project (`success: false` or no `app`).
    NotFound,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Parse,
    Network,
}

impl fmt::Display for FetchFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailureKind::NotFound => write!(f, "no project found"),
            FetchFailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FetchFailureKind::Timeout => write!(f, "timeout"),
            FetchFailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FetchFailureKind::Parse => write!(f, "malformed project response"),
            FetchFailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Failure reported by a sandbox runtime operation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{0}")]
    Message(String),
    #[error("invalid project path '{0}'")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn msg(message: impl Into<String>) -> Self {
        RuntimeError::Message(message.into())
    }
}

/// A stage failure, before it is flattened into a [`Failure`].
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{}", .0.user_message())]
    Fetch(FetchError),
    #[error("{0}")]
    Boot(RuntimeError),
    #[error("{0}")]
    Mount(RuntimeError),
    #[error("could not spawn dependency installation: {0}")]
    InstallSpawn(RuntimeError),
    #[error("dependency installation exited with code {0}")]
    InstallExit(i32),
    #[error("dependency installation terminated abnormally")]
    InstallAbnormal,
    #[error("could not spawn development server: {0}")]
    StartSpawn(RuntimeError),
    #[error("development server exited with code {0} before becoming ready")]
    ServerExited(i32),
    #[error("development server terminated abnormally before becoming ready")]
    ServerAbnormal,
    #[error("sandbox dropped the readiness subscription")]
    ReadinessLost,
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Fetch(_) => Stage::Fetch,
            StageError::Boot(_) => Stage::Boot,
            StageError::Mount(_) => Stage::Mount,
            StageError::InstallSpawn(_)
            | StageError::InstallExit(_)
            | StageError::InstallAbnormal => Stage::Install,
            StageError::StartSpawn(_)
            | StageError::ServerExited(_)
            | StageError::ServerAbnormal
            | StageError::ReadinessLost => Stage::Start,
        }
    }

    pub fn to_failure(&self) -> Failure {
        Failure::new(self.stage(), self.to_string())
    }
}
