use std::fmt;

use crate::view_model::AppViewModel;

/// One sequential phase of the preview pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch,
    Boot,
    Mount,
    Install,
    Start,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Boot => "boot",
            Stage::Mount => "mount",
            Stage::Install => "install",
            Stage::Start => "start",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one stage, carrying the underlying error text verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub stage: Stage,
    pub message: String,
}

impl Failure {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

/// Lifecycle of a single preview run.
///
/// Moves strictly forward on success; any state with a stage in flight may
/// move to `Failed`. `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrchestrationState {
    #[default]
    Idle,
    Fetching,
    Booting,
    Mounting,
    Installing,
    Starting,
    Ready {
        served_url: String,
    },
    Failed(Failure),
}

impl OrchestrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationState::Ready { .. } | OrchestrationState::Failed(_)
        )
    }

    /// The stage currently in flight, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            OrchestrationState::Fetching => Some(Stage::Fetch),
            OrchestrationState::Booting => Some(Stage::Boot),
            OrchestrationState::Mounting => Some(Stage::Mount),
            OrchestrationState::Installing => Some(Stage::Install),
            OrchestrationState::Starting => Some(Stage::Start),
            OrchestrationState::Idle
            | OrchestrationState::Ready { .. }
            | OrchestrationState::Failed(_) => None,
        }
    }

    /// Present only in `Ready`.
    pub fn served_url(&self) -> Option<&str> {
        match self {
            OrchestrationState::Ready { served_url } => Some(served_url),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            OrchestrationState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Position along the success path; terminal states share the last slot.
    fn ordinal(&self) -> u8 {
        match self {
            OrchestrationState::Idle => 0,
            OrchestrationState::Fetching => 1,
            OrchestrationState::Booting => 2,
            OrchestrationState::Mounting => 3,
            OrchestrationState::Installing => 4,
            OrchestrationState::Starting => 5,
            OrchestrationState::Ready { .. } | OrchestrationState::Failed(_) => 6,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: &OrchestrationState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrchestrationState::Failed(_) => self.stage().is_some(),
            OrchestrationState::Idle => false,
            _ => next.ordinal() == self.ordinal() + 1,
        }
    }
}

/// Presenter state: the last published orchestration state plus the
/// cosmetic counters driven by the presenter timers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    orchestration: OrchestrationState,
    opened: bool,
    closed: bool,
    spinner_index: usize,
    tip_index: usize,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel::from_state(self)
    }

    pub fn orchestration(&self) -> &OrchestrationState {
        &self.orchestration
    }

    /// True while the pipeline is running and the view is alive.
    pub fn is_loading(&self) -> bool {
        !self.closed && !self.orchestration.is_terminal()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn spinner_index(&self) -> usize {
        self.spinner_index
    }

    pub fn tip_index(&self) -> usize {
        self.tip_index
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns and clears the render-needed flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Records the first open; returns false when already opened.
    pub(crate) fn open(&mut self) -> bool {
        if self.opened || self.closed {
            return false;
        }
        self.opened = true;
        self.mark_dirty();
        true
    }

    /// Records the close; returns false when already closed.
    pub(crate) fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.mark_dirty();
        true
    }

    /// Applies a published transition; illegal transitions are ignored.
    pub(crate) fn apply_state(&mut self, next: OrchestrationState) -> bool {
        if !self.orchestration.can_transition_to(&next) {
            return false;
        }
        self.orchestration = next;
        self.mark_dirty();
        true
    }

    pub(crate) fn advance_spinner(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.spinner_index = (self.spinner_index + 1) % len;
        self.mark_dirty();
    }

    pub(crate) fn advance_tip(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.tip_index = (self.tip_index + 1) % len;
        self.mark_dirty();
    }
}
