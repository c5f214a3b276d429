#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use preview_core::OrchestrationState;
use preview_engine::{
    CommandSpec, EngineEvent, FetchError, PipelineSettings, ProcessHandle, ProgressSink,
    ProjectFetcher, ProjectPayload, ReadyListener, RuntimeError, SandboxInstance, SandboxRuntime,
    ServerReady,
};
use serde_json::Value;
use tokio::sync::oneshot;

/// Shared, ordered record of every collaborator call.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == call).count()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states(&self) -> Vec<OrchestrationState> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::StateChanged(state) => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &EngineEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| *event == wanted)
            .count()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn payload(value: Value) -> ProjectPayload {
    match value {
        Value::Object(tree) => ProjectPayload::new(tree),
        other => panic!("payload must be an object, got {other}"),
    }
}

pub fn hello_payload() -> ProjectPayload {
    payload(serde_json::json!({ "index.html": "<h1>hi</h1>" }))
}

pub struct StaticFetcher {
    result: Result<ProjectPayload, FetchError>,
    log: CallLog,
}

impl StaticFetcher {
    pub fn new(result: Result<ProjectPayload, FetchError>, log: CallLog) -> Self {
        Self { result, log }
    }
}

#[async_trait::async_trait]
impl ProjectFetcher for StaticFetcher {
    async fn fetch(&self) -> Result<ProjectPayload, FetchError> {
        self.log.push("fetch");
        tokio::task::yield_now().await;
        self.result.clone()
    }
}

#[derive(Debug, Clone)]
pub enum InstallOutcome {
    Exit(i32),
    Abnormal,
    Hang,
}

#[derive(Debug, Clone)]
pub enum ServerOutcome {
    Ready { port: u16, url: String },
    ExitBeforeReady(i32),
    Silent,
    /// The runtime discards the readiness listener without firing it.
    DropListener,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub boot_error: Option<String>,
    pub mount_error: Option<String>,
    pub install_spawn_error: Option<String>,
    pub server_spawn_error: Option<String>,
    /// Readiness event the runtime raises while dependencies install.
    pub install_announces: Option<ServerReady>,
    pub install: InstallOutcome,
    pub server: ServerOutcome,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            boot_error: None,
            mount_error: None,
            install_spawn_error: None,
            server_spawn_error: None,
            install_announces: None,
            install: InstallOutcome::Exit(0),
            server: ServerOutcome::Ready {
                port: 5173,
                url: "http://localhost:5173/".to_string(),
            },
        }
    }
}

/// Scripted runtime that records every call into a [`CallLog`].
pub struct FakeRuntime {
    log: CallLog,
    script: Script,
}

impl FakeRuntime {
    pub fn new(script: Script, log: CallLog) -> Self {
        Self { log, script }
    }
}

#[async_trait::async_trait]
impl SandboxRuntime for FakeRuntime {
    type Instance = FakeInstance;

    async fn boot(&self) -> Result<FakeInstance, RuntimeError> {
        self.log.push("boot");
        tokio::task::yield_now().await;
        if let Some(message) = &self.script.boot_error {
            return Err(RuntimeError::msg(message.clone()));
        }
        Ok(FakeInstance {
            log: self.log.clone(),
            script: self.script.clone(),
            install_command: PipelineSettings::default().install_command,
            held_exits: Mutex::new(Vec::new()),
            held_listener: Mutex::new(None),
            server_spawned: AtomicBool::new(false),
        })
    }
}

pub struct FakeInstance {
    log: CallLog,
    script: Script,
    install_command: CommandSpec,
    held_exits: Mutex<Vec<oneshot::Sender<i32>>>,
    held_listener: Mutex<Option<ReadyListener>>,
    server_spawned: AtomicBool,
}

#[async_trait::async_trait]
impl SandboxInstance for FakeInstance {
    async fn mount(&self, payload: &ProjectPayload) -> Result<(), RuntimeError> {
        self.log.push("mount");
        tokio::task::yield_now().await;
        if let Some(message) = &self.script.mount_error {
            return Err(RuntimeError::msg(message.clone()));
        }
        assert!(!payload.is_empty());
        Ok(())
    }

    async fn spawn(&self, command: &CommandSpec) -> Result<ProcessHandle, RuntimeError> {
        self.log.push(format!("spawn {command}"));
        let is_install = *command == self.install_command;
        let spawn_error = if is_install {
            &self.script.install_spawn_error
        } else {
            &self.script.server_spawn_error
        };
        if let Some(message) = spawn_error {
            return Err(RuntimeError::msg(message.clone()));
        }
        let (exit_tx, handle) = ProcessHandle::channel();

        if is_install {
            if let Some(ready) = &self.script.install_announces {
                // Delivered only to a listener registered at this point.
                if let Some(listener) = self.held_listener.lock().unwrap().take() {
                    listener.fire(ready.clone());
                }
            }
            match self.script.install {
                InstallOutcome::Exit(code) => {
                    let _ = exit_tx.send(code);
                }
                InstallOutcome::Abnormal => drop(exit_tx),
                InstallOutcome::Hang => self.held_exits.lock().unwrap().push(exit_tx),
            }
        } else {
            self.server_spawned.store(true, Ordering::SeqCst);
            match self.script.server {
                ServerOutcome::ExitBeforeReady(code) => {
                    let _ = exit_tx.send(code);
                }
                _ => self.held_exits.lock().unwrap().push(exit_tx),
            }
        }
        Ok(handle)
    }

    fn on_server_ready(&self, listener: ReadyListener) {
        self.log.push("on server-ready");
        match &self.script.server {
            ServerOutcome::Ready { port, url } if self.server_spawned.load(Ordering::SeqCst) => {
                listener.fire(ServerReady {
                    port: *port,
                    url: url.clone(),
                });
            }
            ServerOutcome::DropListener => drop(listener),
            _ => *self.held_listener.lock().unwrap() = Some(listener),
        }
    }
}
