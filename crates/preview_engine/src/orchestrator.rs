//! Sandbox lifecycle orchestration.
//!
//! Drives fetch → boot → mount → install → start → ready exactly once per
//! orchestrator, publishing every transition to a [`ProgressSink`].

use std::future::Future;
use std::sync::Arc;

use preview_core::{OrchestrationState, Stage};
use preview_logging::{preview_debug, preview_info, preview_warn};
use tokio_util::sync::CancellationToken;

use crate::{
    CommandSpec, EngineEvent, ProcessHandle, ProgressSink, ProjectFetcher, ProjectPayload,
    ReadyListener, SandboxInstance, SandboxRuntime, StageError,
};

/// Commands run inside the sandbox once the project is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub install_command: CommandSpec,
    pub dev_command: CommandSpec,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            install_command: CommandSpec::npm_install(),
            dev_command: CommandSpec::npm_run_dev(),
        }
    }
}

/// The single live sandbox instance, plus the server process running in it.
pub struct SandboxHandle<I> {
    instance: I,
    server: Option<ProcessHandle>,
}

impl<I> SandboxHandle<I> {
    fn new(instance: I) -> Self {
        Self {
            instance,
            server: None,
        }
    }
}

/// Why a pipeline run stopped short of `Ready`.
enum Interrupt {
    Cancelled,
    Failed(StageError),
}

impl From<StageError> for Interrupt {
    fn from(err: StageError) -> Self {
        Interrupt::Failed(err)
    }
}

pub struct SandboxOrchestrator<F, R: SandboxRuntime> {
    fetcher: F,
    runtime: R,
    settings: PipelineSettings,
    sink: Arc<dyn ProgressSink>,
    state: OrchestrationState,
    payload: Option<ProjectPayload>,
    handle: Option<SandboxHandle<R::Instance>>,
    cancel: CancellationToken,
}

impl<F, R> SandboxOrchestrator<F, R>
where
    F: ProjectFetcher,
    R: SandboxRuntime,
{
    pub fn new(
        fetcher: F,
        runtime: R,
        settings: PipelineSettings,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            fetcher,
            runtime,
            settings,
            sink,
            state: OrchestrationState::Idle,
            payload: None,
            handle: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> &OrchestrationState {
        &self.state
    }

    pub fn served_url(&self) -> Option<&str> {
        self.state.served_url()
    }

    pub fn has_sandbox(&self) -> bool {
        self.handle.is_some()
    }

    pub fn payload(&self) -> Option<&ProjectPayload> {
        self.payload.as_ref()
    }

    /// Token that stops the pipeline from making further progress when
    /// cancelled from outside, e.g. while `start` is still running.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the pipeline to `Ready`, `Failed` or cancellation.
    ///
    /// A no-op when a sandbox handle already exists or this orchestrator has
    /// already left `Idle`.
    pub async fn start(&mut self) {
        if self.handle.is_some() {
            preview_debug!("start ignored: sandbox already exists");
            return;
        }
        if self.state != OrchestrationState::Idle || self.cancel.is_cancelled() {
            preview_debug!("start ignored: orchestrator is {:?}", self.state);
            return;
        }

        match self.run_pipeline().await {
            Ok(()) => {}
            Err(Interrupt::Failed(err)) => {
                preview_warn!("Preview pipeline failed at {}: {}", err.stage(), err);
                self.transition(OrchestrationState::Failed(err.to_failure()));
            }
            Err(Interrupt::Cancelled) => {
                preview_info!("Preview pipeline cancelled while {:?}", self.state);
            }
        }
    }

    /// Releases the sandbox slot and stops any further pipeline progress.
    ///
    /// In-flight runtime calls are not aborted; their results are dropped.
    pub fn teardown(&mut self) {
        self.cancel.cancel();
        if self.handle.take().is_some() {
            preview_info!("Sandbox handle released");
        }
        self.payload = None;
    }

    async fn run_pipeline(&mut self) -> Result<(), Interrupt> {
        let cancel = self.cancel.clone();

        self.transition(OrchestrationState::Fetching);
        let payload = until_cancelled(&cancel, self.fetcher.fetch())
            .await?
            .map_err(StageError::Fetch)?;
        preview_debug!("Fetched project with {} top-level entries", payload.tree().len());
        self.payload = Some(payload.clone());

        self.transition(OrchestrationState::Booting);
        if self.handle.is_none() {
            let instance = until_cancelled(&cancel, self.runtime.boot())
                .await?
                .map_err(StageError::Boot)?;
            self.handle = Some(SandboxHandle::new(instance));
        } else {
            preview_debug!("Reusing existing sandbox instance");
        }

        self.transition(OrchestrationState::Mounting);
        until_cancelled(&cancel, self.instance()?.mount(&payload))
            .await?
            .map_err(StageError::Mount)?;

        self.transition(OrchestrationState::Installing);
        let mut install = until_cancelled(
            &cancel,
            self.instance()?.spawn(&self.settings.install_command),
        )
        .await?
        .map_err(StageError::InstallSpawn)?;
        match until_cancelled(&cancel, install.exit_code()).await? {
            Some(0) => {}
            Some(code) => return Err(StageError::InstallExit(code).into()),
            None => return Err(StageError::InstallAbnormal.into()),
        }

        self.transition(OrchestrationState::Starting);
        let mut server = until_cancelled(&cancel, self.instance()?.spawn(&self.settings.dev_command))
            .await?
            .map_err(StageError::StartSpawn)?;
        let (listener, ready_rx) = ReadyListener::channel();
        self.instance()?.on_server_ready(listener);

        // The server runs indefinitely; only its readiness is awaited.
        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Interrupt::Cancelled),
            ready = ready_rx => ready.map_err(|_| StageError::ReadinessLost)?,
            code = server.exit_code() => {
                return Err(match code {
                    Some(code) => StageError::ServerExited(code),
                    None => StageError::ServerAbnormal,
                }
                .into());
            }
        };

        if let Some(handle) = self.handle.as_mut() {
            handle.server = Some(server);
        }
        preview_info!("Development server ready on port {} at {}", ready.port, ready.url);
        self.transition(OrchestrationState::Ready {
            served_url: ready.url,
        });
        Ok(())
    }

    fn instance(&self) -> Result<&R::Instance, Interrupt> {
        self.handle
            .as_ref()
            .map(|handle| &handle.instance)
            .ok_or(Interrupt::Cancelled)
    }

    fn transition(&mut self, next: OrchestrationState) {
        if !self.state.can_transition_to(&next) {
            preview_warn!("Ignoring transition {:?} -> {:?}", self.state, next);
            return;
        }
        match next.stage() {
            Some(stage) => preview_info!("Stage {}: {:?}", stage_ordinal(stage), next),
            None => preview_info!("Preview {:?}", next),
        }
        self.state = next;
        self.sink.emit(EngineEvent::StateChanged(self.state.clone()));
    }
}

impl<F, R: SandboxRuntime> Drop for SandboxOrchestrator<F, R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn stage_ordinal(stage: Stage) -> &'static str {
    match stage {
        Stage::Fetch => "1/5",
        Stage::Boot => "2/5",
        Stage::Mount => "3/5",
        Stage::Install => "4/5",
        Stage::Start => "5/5",
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, Interrupt> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        value = fut => Ok(value),
    }
}
