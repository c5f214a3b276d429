use preview_core::{Effect, Msg};
use preview_engine::{EngineEvent, EngineHandle, LocalRuntime, PreviewConfig};
use preview_logging::preview_debug;

/// Executes core effects against the preview engine and turns engine
/// events back into messages for the update loop.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(config: PreviewConfig) -> anyhow::Result<Self> {
        let engine = EngineHandle::new(config, LocalRuntime::new())?;
        Ok(Self { engine })
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            preview_debug!("Running effect {:?}", effect);
            match effect {
                Effect::StartPreview => self.engine.start(),
                Effect::StopTimers => self.engine.stop_timers(),
                Effect::Teardown => self.engine.teardown(),
            }
        }
    }

    /// Drains every engine event received so far.
    pub fn poll(&self) -> Vec<Msg> {
        std::iter::from_fn(|| self.engine.try_recv())
            .map(map_event)
            .collect()
    }

    /// Tears the engine down and waits for its worker to stop.
    pub fn shutdown(self) {
        self.engine.shutdown();
    }
}

fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::StateChanged(state) => Msg::StateChanged(state),
        EngineEvent::SpinnerTick => Msg::SpinnerTick,
        EngineEvent::TipTick => Msg::TipTick,
    }
}
