#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start the sandbox pipeline together with the presenter timers.
    StartPreview,
    /// Cancel both presenter timers.
    StopTimers,
    /// Release the sandbox handle and stop any further pipeline progress.
    Teardown,
}
