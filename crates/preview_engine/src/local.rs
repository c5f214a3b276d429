//! Process-backed sandbox runtime for headless hosts.
//!
//! Each boot creates a private temporary directory; the project tree is
//! written into it and commands run with it as their working directory.
//! Readiness fires on the first `http(s)://host:port` URL printed by the most
//! recently spawned process.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use preview_logging::{preview_debug, preview_info, preview_warn};
use serde_json::{Map, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use url::Url;

use crate::{
    CommandSpec, ProcessHandle, ProjectPayload, ReadyListener, RuntimeError, SandboxInstance,
    SandboxRuntime, ServerReady,
};

#[derive(Debug, Clone, Default)]
pub struct LocalRuntime {
    parent_dir: Option<PathBuf>,
}

impl LocalRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Boots instances below `dir` instead of the system temp directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            parent_dir: Some(dir.into()),
        }
    }
}

#[async_trait::async_trait]
impl SandboxRuntime for LocalRuntime {
    type Instance = LocalInstance;

    async fn boot(&self) -> Result<LocalInstance, RuntimeError> {
        let dir = match &self.parent_dir {
            Some(parent) => tempfile::Builder::new()
                .prefix("sandbox-preview-")
                .tempdir_in(parent)?,
            None => tempfile::Builder::new()
                .prefix("sandbox-preview-")
                .tempdir()?,
        };
        preview_info!("Booted local sandbox at {:?}", dir.path());
        Ok(LocalInstance {
            dir,
            ready: Arc::new(Mutex::new(ReadySlot::default())),
        })
    }
}

/// Readiness bookkeeping: an event seen before anyone subscribed is kept
/// until the listener arrives, and only the first event is ever delivered.
///
/// Only output of the latest spawn counts; each spawn starts a new
/// generation and forgets anything earlier processes printed.
#[derive(Default)]
struct ReadySlot {
    listener: Option<ReadyListener>,
    pending: Option<ServerReady>,
    delivered: bool,
    generation: u64,
}

impl ReadySlot {
    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.pending = None;
        self.delivered = false;
        self.generation
    }

    fn offer(&mut self, generation: u64, ready: ServerReady) {
        if generation != self.generation || self.delivered || self.pending.is_some() {
            return;
        }
        match self.listener.take() {
            Some(listener) => self.delivered = listener.fire(ready),
            None => self.pending = Some(ready),
        }
    }

    fn subscribe(&mut self, listener: ReadyListener) {
        if self.delivered {
            return;
        }
        match self.pending.take() {
            Some(ready) => self.delivered = listener.fire(ready),
            None => self.listener = Some(listener),
        }
    }
}

pub struct LocalInstance {
    dir: TempDir,
    ready: Arc<Mutex<ReadySlot>>,
}

impl LocalInstance {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn ready_slot(&self) -> MutexGuard<'_, ReadySlot> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl SandboxInstance for LocalInstance {
    async fn mount(&self, payload: &ProjectPayload) -> Result<(), RuntimeError> {
        let entries = flatten_tree(payload.tree())?;
        for entry in &entries {
            let target = self.root().join(&entry.path);
            match &entry.contents {
                Some(contents) => {
                    if let Some(parent) = target.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&target, contents).await?;
                }
                None => tokio::fs::create_dir_all(&target).await?,
            }
        }
        preview_debug!("Mounted {} entries into {:?}", entries.len(), self.root());
        Ok(())
    }

    async fn spawn(&self, command: &CommandSpec) -> Result<ProcessHandle, RuntimeError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(self.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| RuntimeError::msg(format!("failed to spawn '{command}': {err}")))?;
        preview_info!("Spawned '{}' (pid {:?})", command, child.id());

        let generation = self.ready_slot().next_generation();
        if let Some(stdout) = child.stdout.take() {
            watch_output(stdout, generation, self.ready.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            watch_output(stderr, generation, self.ready.clone());
        }

        let (mut exit_tx, handle) = ProcessHandle::channel();
        let label = command.to_string();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => Some(status),
                // Nobody waits for this process any more: stop it.
                _ = exit_tx.closed() => None,
            };
            match status {
                Some(Ok(status)) => match status.code() {
                    Some(code) => {
                        preview_debug!("'{}' exited with code {}", label, code);
                        let _ = exit_tx.send(code);
                    }
                    None => preview_warn!("'{}' terminated without an exit code", label),
                },
                Some(Err(err)) => preview_warn!("Waiting for '{}' failed: {}", label, err),
                None => {
                    let _ = child.kill().await;
                    preview_debug!("Stopped '{}'", label);
                }
            }
        });
        Ok(handle)
    }

    fn on_server_ready(&self, listener: ReadyListener) {
        self.ready_slot().subscribe(listener);
    }
}

fn watch_output<R>(stream: R, generation: u64, ready: Arc<Mutex<ReadySlot>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            preview_debug!("sandbox> {}", line);
            if let Some(event) = detect_server_url(&line) {
                ready
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .offer(generation, event);
            }
        }
    });
}

/// One file or directory to create, relative to the instance root.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MountEntry {
    path: PathBuf,
    /// `None` for a directory.
    contents: Option<String>,
}

/// Flattens a project tree into mount entries, parents before children.
///
/// A string leaf is file contents; `{"file": {"contents": ..}}` is a file;
/// `{"directory": {..}}` or any other object is a directory.
fn flatten_tree(tree: &Map<String, Value>) -> Result<Vec<MountEntry>, RuntimeError> {
    let mut entries = Vec::new();
    flatten_into(Path::new(""), tree, &mut entries)?;
    Ok(entries)
}

fn flatten_into(
    base: &Path,
    tree: &Map<String, Value>,
    entries: &mut Vec<MountEntry>,
) -> Result<(), RuntimeError> {
    for (name, node) in tree {
        let path = base.join(safe_relative(name)?);
        match node {
            Value::String(contents) => entries.push(MountEntry {
                path,
                contents: Some(contents.clone()),
            }),
            Value::Object(object) => {
                if let Some(file) = object.get("file") {
                    let contents = file
                        .get("contents")
                        .and_then(Value::as_str)
                        .ok_or_else(|| RuntimeError::msg(format!("file '{name}' has no text contents")))?;
                    entries.push(MountEntry {
                        path,
                        contents: Some(contents.to_string()),
                    });
                    continue;
                }
                let children = match object.get("directory") {
                    Some(Value::Object(children)) => children,
                    Some(_) => {
                        return Err(RuntimeError::msg(format!(
                            "directory '{name}' is not an object"
                        )))
                    }
                    None => object,
                };
                entries.push(MountEntry {
                    path: path.clone(),
                    contents: None,
                });
                flatten_into(&path, children, entries)?;
            }
            _ => {
                return Err(RuntimeError::msg(format!(
                    "unsupported entry '{name}' in project tree"
                )))
            }
        }
    }
    Ok(())
}

fn safe_relative(name: &str) -> Result<PathBuf, RuntimeError> {
    let path = Path::new(name);
    let is_safe = !name.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if is_safe {
        Ok(path.to_path_buf())
    } else {
        Err(RuntimeError::InvalidPath(name.to_string()))
    }
}

/// Finds the first http(s) URL with an explicit port in a line of output.
fn detect_server_url(line: &str) -> Option<ServerReady> {
    let clean = strip_ansi(line);
    let start = ["http://", "https://"]
        .iter()
        .filter_map(|scheme| clean.find(scheme))
        .min()?;
    let candidate: String = clean[start..]
        .chars()
        .take_while(|ch| !ch.is_whitespace())
        .collect();
    let candidate = candidate.trim_end_matches(|ch: char| matches!(ch, ',' | '.' | ')' | ']' | '\'' | '"'));
    let url = Url::parse(candidate).ok()?;
    let port = url.port()?;
    Some(ServerReady {
        port,
        url: url.to_string(),
    })
}

fn strip_ansi(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // CSI sequence: ESC '[' params final-byte
            if chars.next() == Some('[') {
                for next in chars.by_ref() {
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn flattens_plain_and_container_style_trees() {
        let entries = flatten_tree(&tree(json!({
            "index.html": "<h1>hi</h1>",
            "src": {
                "directory": {
                    "main.js": { "file": { "contents": "console.log(1)" } }
                }
            },
            "public": { "robots.txt": "" }
        })))
        .unwrap();

        assert!(entries.contains(&MountEntry {
            path: PathBuf::from("index.html"),
            contents: Some("<h1>hi</h1>".into()),
        }));
        assert!(entries.contains(&MountEntry {
            path: PathBuf::from("src/main.js"),
            contents: Some("console.log(1)".into()),
        }));
        let src_dir = entries.iter().position(|e| e.path == Path::new("src")).unwrap();
        let main_js = entries
            .iter()
            .position(|e| e.path == Path::new("src/main.js"))
            .unwrap();
        assert!(src_dir < main_js);
        assert!(entries.iter().any(|e| e.path == Path::new("public/robots.txt")));
    }

    #[test]
    fn rejects_escaping_paths() {
        let err = flatten_tree(&tree(json!({ "../evil": "x" }))).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidPath(_)));

        let err = flatten_tree(&tree(json!({ "/etc/passwd": "x" }))).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidPath(_)));
    }

    #[test]
    fn rejects_non_text_leaves() {
        assert!(flatten_tree(&tree(json!({ "n": 3 }))).is_err());
    }

    #[test]
    fn detects_vite_style_url_with_colors() {
        let line = "  \u{1b}[32m➜\u{1b}[39m  \u{1b}[1mLocal\u{1b}[22m:   \u{1b}[36mhttp://localhost:\u{1b}[1m5173\u{1b}[22m/\u{1b}[39m";
        let ready = detect_server_url(line).unwrap();
        assert_eq!(ready.port, 5173);
        assert_eq!(ready.url, "http://localhost:5173/");
    }

    #[test]
    fn ignores_urls_without_explicit_port() {
        assert_eq!(
            detect_server_url("npm notice New version at https://github.com/npm/cli."),
            None
        );
        assert_eq!(detect_server_url("added 12 packages in 2s"), None);
    }

    #[test]
    fn ready_slot_delivers_only_first_event() {
        let mut slot = ReadySlot::default();
        let generation = slot.next_generation();
        slot.offer(generation, ServerReady {
            port: 1,
            url: "http://a:1/".into(),
        });
        slot.offer(generation, ServerReady {
            port: 2,
            url: "http://b:2/".into(),
        });

        let (listener, mut rx) = ReadyListener::channel();
        slot.subscribe(listener);
        assert_eq!(rx.try_recv().unwrap().port, 1);

        let (listener, mut rx) = ReadyListener::channel();
        slot.subscribe(listener);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn earlier_process_output_is_forgotten_on_next_spawn() {
        let mut slot = ReadySlot::default();
        let install = slot.next_generation();
        slot.offer(install, ServerReady {
            port: 4873,
            url: "http://registry.local:4873/".into(),
        });

        let server = slot.next_generation();
        let (listener, mut rx) = ReadyListener::channel();
        slot.subscribe(listener);
        assert!(rx.try_recv().is_err());

        // Late lines from the finished install are still ignored.
        slot.offer(install, ServerReady {
            port: 4874,
            url: "http://registry.local:4874/".into(),
        });
        assert!(rx.try_recv().is_err());

        slot.offer(server, ServerReady {
            port: 5173,
            url: "http://localhost:5173/".into(),
        });
        assert_eq!(rx.try_recv().unwrap().port, 5173);
    }

    #[test]
    fn earliest_url_on_a_line_wins() {
        let ready =
            detect_server_url("proxy https://secure.local:8443/ then http://localhost:5173/")
                .unwrap();
        assert_eq!(ready.port, 8443);
        assert_eq!(ready.url, "https://secure.local:8443/");
    }
}
