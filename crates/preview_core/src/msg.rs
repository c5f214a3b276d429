#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The preview view was opened; the pipeline should run once.
    ViewOpened,
    /// The preview view is being dismantled.
    ViewClosed,
    /// Orchestrator published a state transition.
    StateChanged(crate::OrchestrationState),
    /// Fast presenter tick advancing the progress glyph.
    SpinnerTick,
    /// Slow presenter tick advancing the setup tip.
    TipTick,
}
