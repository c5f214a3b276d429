//! Status derivation for the preview view.
//!
//! Everything here is a pure function of [`OrchestrationState`]; the only
//! moving parts are the glyph and tip indices advanced by presenter ticks.

use crate::OrchestrationState;

pub const HEADER_TITLE: &str = "Sandbox Preview";

/// Progress glyphs cycled by the fast presenter tick.
pub const SPINNER_GLYPHS: [char; 6] = ['\\', '|', '/', '-', '\\', '|'];

/// Informational tips rotated by the slow presenter tick.
pub const SETUP_TIPS: &[&str] = &[
    "Projects with less content or a smaller scroll area produce more accurate previews.",
    "Placeholders are used in place of images found in your design.",
    "The first preview is the slowest: dependencies are installed from scratch inside the sandbox.",
    "Generated text may be inaccurate. Always check the content before deployment.",
    "The preview runs entirely inside an isolated sandbox; nothing touches your machine.",
];

pub fn status_label(state: &OrchestrationState) -> String {
    match state {
        OrchestrationState::Idle => "Initializing…".to_string(),
        OrchestrationState::Fetching => "Fetching project…".to_string(),
        OrchestrationState::Booting => "Booting sandbox…".to_string(),
        OrchestrationState::Mounting => "Mounting project files…".to_string(),
        OrchestrationState::Installing => "Installing dependencies…".to_string(),
        OrchestrationState::Starting => "Starting development server…".to_string(),
        OrchestrationState::Ready { .. } => "Preview Ready".to_string(),
        OrchestrationState::Failed(failure) => format!("[Error] {failure}"),
    }
}
