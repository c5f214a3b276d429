//! Boundary of the external sandbox runtime.
//!
//! The orchestrator only ever talks to these traits: boot an instance, mount
//! a file tree into it, spawn processes inside it and subscribe once to its
//! readiness event.

use std::fmt;

use serde::Deserialize;
use tokio::sync::oneshot;

use crate::{ProjectPayload, RuntimeError, ServerReady};

/// Program plus arguments to run inside a sandbox instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn npm_install() -> Self {
        Self::new("npm", ["install"])
    }

    pub fn npm_run_dev() -> Self {
        Self::new("npm", ["run", "dev"])
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A process running inside a sandbox instance.
///
/// The runtime only signals completion; interpreting the exit code is up to
/// the caller. Dropping the handle tells the runtime nobody is waiting.
#[derive(Debug)]
pub struct ProcessHandle {
    exit: oneshot::Receiver<i32>,
}

impl ProcessHandle {
    pub fn new(exit: oneshot::Receiver<i32>) -> Self {
        Self { exit }
    }

    /// Pairs a handle with the sender a runtime uses to report the exit code.
    pub fn channel() -> (oneshot::Sender<i32>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self::new(rx))
    }

    /// Waits for the exit code; `None` means the process ended without one.
    ///
    /// Must not be awaited again once it has resolved.
    pub async fn exit_code(&mut self) -> Option<i32> {
        (&mut self.exit).await.ok()
    }
}

/// One-shot subscription to the runtime's server-ready event.
#[derive(Debug)]
pub struct ReadyListener {
    tx: oneshot::Sender<ServerReady>,
}

impl ReadyListener {
    pub fn channel() -> (Self, oneshot::Receiver<ServerReady>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Delivers the event; false when the subscriber has already gone away.
    pub fn fire(self, ready: ServerReady) -> bool {
        self.tx.send(ready).is_ok()
    }

    pub fn is_subscribed(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[async_trait::async_trait]
pub trait SandboxRuntime: Send + Sync {
    type Instance: SandboxInstance + 'static;

    /// Boots a fresh isolated instance.
    async fn boot(&self) -> Result<Self::Instance, RuntimeError>;
}

#[async_trait::async_trait]
pub trait SandboxInstance: Send + Sync {
    /// Mounts the project file tree into the instance filesystem.
    async fn mount(&self, payload: &ProjectPayload) -> Result<(), RuntimeError>;

    /// Spawns a process inside the instance without waiting for it.
    async fn spawn(&self, command: &CommandSpec) -> Result<ProcessHandle, RuntimeError>;

    /// Registers the listener for the next server-ready event.
    fn on_server_ready(&self, listener: ReadyListener);
}
