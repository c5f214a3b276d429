use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{EngineEvent, ProgressSink};

/// The two cosmetic presenter timers: a fast glyph tick and a slow tip tick.
///
/// Each timer has its own token so either can be stopped alone; both stop
/// when the parent token is cancelled. Ticks never gate the pipeline.
pub struct PresenterTimers {
    spinner: CancellationToken,
    tips: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl PresenterTimers {
    /// Spawns both timers on the current tokio runtime.
    pub fn spawn(
        parent: &CancellationToken,
        spinner_every: Duration,
        tip_every: Duration,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let spinner = parent.child_token();
        let tips = parent.child_token();
        let tasks = vec![
            spawn_ticker(spinner.clone(), spinner_every, sink.clone(), EngineEvent::SpinnerTick),
            spawn_ticker(tips.clone(), tip_every, sink, EngineEvent::TipTick),
        ];
        Self {
            spinner,
            tips,
            tasks,
        }
    }

    pub fn stop_spinner(&self) {
        self.spinner.cancel();
    }

    pub fn stop_tips(&self) {
        self.tips.cancel();
    }

    pub fn stop(&self) {
        self.stop_spinner();
        self.stop_tips();
    }

    pub fn is_stopped(&self) -> bool {
        self.spinner.is_cancelled() && self.tips.is_cancelled()
    }

    /// Stops both timers and waits for their tasks to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
    }
}

impl Drop for PresenterTimers {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_ticker(
    token: CancellationToken,
    period: Duration,
    sink: Arc<dyn ProgressSink>,
    event: EngineEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately; the glyph starts at index 0.
        interval.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => sink.emit(event.clone()),
            }
        }
    })
}
