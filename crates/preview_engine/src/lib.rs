//! Preview engine: project fetch, sandbox orchestration and effect execution.
mod config;
mod engine;
mod fetch;
mod local;
mod orchestrator;
mod runtime;
mod timers;
mod types;

pub use config::{ConfigError, PreviewConfig, PROJECT_ENDPOINT};
pub use engine::{EngineError, EngineHandle};
pub use fetch::{ChannelProgressSink, FetchSettings, ProgressSink, ProjectFetcher, ReqwestProjectFetcher};
pub use local::{LocalInstance, LocalRuntime};
pub use orchestrator::{PipelineSettings, SandboxHandle, SandboxOrchestrator};
pub use runtime::{CommandSpec, ProcessHandle, ReadyListener, SandboxInstance, SandboxRuntime};
pub use timers::PresenterTimers;
pub use types::{
    EngineEvent, FetchError, FetchFailureKind, ProjectPayload, RuntimeError, ServerReady,
    StageError,
};
