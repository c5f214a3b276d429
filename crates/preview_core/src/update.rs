use crate::{AppState, Effect, Msg, SETUP_TIPS, SPINNER_GLYPHS};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ViewOpened => {
            if state.open() {
                vec![Effect::StartPreview]
            } else {
                Vec::new()
            }
        }
        Msg::ViewClosed => {
            if state.close() {
                vec![Effect::StopTimers, Effect::Teardown]
            } else {
                Vec::new()
            }
        }
        Msg::StateChanged(next) => {
            if state.is_closed() || !state.apply_state(next) {
                return (state, Vec::new());
            }
            let orchestration = state.orchestration();
            if orchestration.failure().is_some() {
                // A failed run keeps nothing worth holding on to.
                vec![Effect::StopTimers, Effect::Teardown]
            } else if orchestration.is_terminal() {
                // Ready keeps the sandbox alive for the embedded preview.
                vec![Effect::StopTimers]
            } else {
                Vec::new()
            }
        }
        Msg::SpinnerTick => {
            if state.is_loading() {
                state.advance_spinner(SPINNER_GLYPHS.len());
            }
            Vec::new()
        }
        Msg::TipTick => {
            if state.is_loading() {
                state.advance_tip(SETUP_TIPS.len());
            }
            Vec::new()
        }
    };

    (state, effects)
}
