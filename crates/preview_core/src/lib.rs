//! Preview core: pure orchestration state machine and status presentation.
mod effect;
mod msg;
mod presenter;
mod preview;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use presenter::{status_label, HEADER_TITLE, SETUP_TIPS, SPINNER_GLYPHS};
pub use preview::PreviewFrame;
pub use state::{AppState, Failure, OrchestrationState, Stage};
pub use update::update;
pub use view_model::AppViewModel;
