use crate::{status_label, AppState, PreviewFrame, SETUP_TIPS, SPINNER_GLYPHS};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    /// Header is hidden once the preview frame takes over.
    pub show_header: bool,
    /// `None` once the preview frame is shown.
    pub status_label: Option<String>,
    /// Progress glyph, only while loading.
    pub spinner: Option<char>,
    /// Setup tip, only while loading.
    pub tip: Option<&'static str>,
    pub preview: Option<PreviewFrame>,
    pub failed: bool,
    pub dirty: bool,
}

impl AppViewModel {
    pub(crate) fn from_state(state: &AppState) -> Self {
        let orchestration = state.orchestration();
        let preview = PreviewFrame::from_served_url(orchestration.served_url());
        let loading = state.is_loading();

        Self {
            show_header: preview.is_none(),
            status_label: preview.is_none().then(|| status_label(orchestration)),
            spinner: loading.then(|| SPINNER_GLYPHS[state.spinner_index() % SPINNER_GLYPHS.len()]),
            tip: loading.then(|| SETUP_TIPS[state.tip_index() % SETUP_TIPS.len()]),
            preview,
            failed: orchestration.failure().is_some(),
            dirty: state.is_dirty(),
        }
    }
}
