use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use preview_logging::{preview_info, preview_warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::fetch::ChannelProgressSink;
use crate::{
    ConfigError, EngineEvent, PresenterTimers, PreviewConfig, ProgressSink, ReqwestProjectFetcher,
    SandboxOrchestrator, SandboxRuntime,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not start engine runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

enum EngineCommand {
    Start,
    Teardown,
}

/// Host-side handle to one preview session.
///
/// The orchestrator and both presenter timers run as cooperative tasks on a
/// single-threaded tokio runtime owned by a worker thread. Events come back
/// over a channel the host drains with [`EngineHandle::try_recv`].
pub struct EngineHandle {
    cmd_tx: tokio::sync::mpsc::UnboundedSender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    pipeline_cancel: CancellationToken,
    timers_cancel: CancellationToken,
    worker: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn new<R>(config: PreviewConfig, runtime: R) -> Result<Self, EngineError>
    where
        R: SandboxRuntime + 'static,
    {
        config.validate()?;
        let fetcher = ReqwestProjectFetcher::new(config.project_endpoint()?, config.fetch_settings());

        let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();
        let sink: Arc<dyn ProgressSink> = Arc::new(ChannelProgressSink::new(event_tx));

        let mut orchestrator =
            SandboxOrchestrator::new(fetcher, runtime, config.pipeline_settings(), sink.clone());
        let pipeline_cancel = orchestrator.cancel_token();
        let timers_cancel = CancellationToken::new();
        let worker_timers_cancel = timers_cancel.clone();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let worker = thread::spawn(move || {
            rt.block_on(async move {
                while let Some(command) = cmd_rx.recv().await {
                    match command {
                        EngineCommand::Start => {
                            let timers = PresenterTimers::spawn(
                                &worker_timers_cancel,
                                config.spinner_interval(),
                                config.tip_interval(),
                                sink.clone(),
                            );
                            orchestrator.start().await;
                            // Terminal or cancelled: the cosmetic timers stop here.
                            timers.shutdown().await;
                        }
                        EngineCommand::Teardown => break,
                    }
                }
                orchestrator.teardown();
                preview_info!("Preview engine stopped");
            });
        });

        Ok(Self {
            cmd_tx,
            event_rx,
            pipeline_cancel,
            timers_cancel,
            worker: Some(worker),
        })
    }

    /// Starts the pipeline; later calls are ignored by the orchestrator.
    pub fn start(&self) {
        if self.cmd_tx.send(EngineCommand::Start).is_err() {
            preview_warn!("Preview engine is no longer running");
        }
    }

    pub fn stop_timers(&self) {
        self.timers_cancel.cancel();
    }

    /// Stops timers and pipeline progress and releases the sandbox.
    pub fn teardown(&self) {
        self.timers_cancel.cancel();
        self.pipeline_cancel.cancel();
        let _ = self.cmd_tx.send(EngineCommand::Teardown);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Tears down and waits for the worker thread to exit.
    pub fn shutdown(mut self) {
        self.teardown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                preview_warn!("Preview engine worker panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}
