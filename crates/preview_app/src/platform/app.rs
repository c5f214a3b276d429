use std::io::{self, IsTerminal, Write};
use std::sync::mpsc;
use std::time::Duration;

use log::LevelFilter;
use preview_core::{update, AppState, Msg};
use preview_logging::{preview_error, preview_info, LogDestination};

use super::config::{load_config, ConfigSources};
use super::effects::EffectRunner;
use super::ui;
use super::ui::constants::ANSI_CLEAR_BELOW;
use super::ui::render::FrameLine;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn run_app() -> anyhow::Result<()> {
    preview_logging::initialize(LogDestination::File, LevelFilter::Info);
    let config = load_config(&ConfigSources::from_environment()).inspect_err(|err| {
        preview_error!("Configuration rejected: {:#}", err);
    })?;
    preview_info!("Previewing project from {:?}", config.backend_url);

    let effects = EffectRunner::new(config)?;
    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let close_tx = msg_tx.clone();
    ctrlc::set_handler(move || {
        let _ = close_tx.send(Msg::ViewClosed);
    })?;

    let mut terminal = Terminal::new(io::stdout());
    let mut state = AppState::new();
    let _ = msg_tx.send(Msg::ViewOpened);

    let outcome = loop {
        let mut inbox: Vec<Msg> = msg_rx.try_iter().collect();
        inbox.extend(effects.poll());
        if inbox.is_empty() {
            match msg_rx.recv_timeout(POLL_INTERVAL) {
                Ok(msg) => inbox.push(msg),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break Ok(()),
            }
        }

        for msg in inbox {
            let (next, pending) = update(state, msg);
            state = next;
            effects.enqueue(pending);
        }
        if state.consume_dirty() {
            terminal.draw(&ui::render::render(&state.view()))?;
        }

        if state.is_closed() {
            break Ok(());
        }
        if let Some(failure) = state.orchestration().failure() {
            break Err(anyhow::anyhow!("preview failed: {failure}"));
        }
    };

    effects.shutdown();
    preview_info!("Preview host exiting");
    outcome
}

/// Redraws the frame in place on interactive terminals; elsewhere only
/// lines that changed are printed.
struct Terminal<W: Write> {
    out: W,
    interactive: bool,
    last_frame: Vec<FrameLine>,
}

impl Terminal<io::Stdout> {
    fn new(out: io::Stdout) -> Self {
        let interactive = out.is_terminal();
        Self {
            out,
            interactive,
            last_frame: Vec::new(),
        }
    }
}

impl<W: Write> Terminal<W> {
    fn draw(&mut self, frame: &[FrameLine]) -> io::Result<()> {
        if frame == self.last_frame.as_slice() {
            return Ok(());
        }
        if self.interactive {
            if !self.last_frame.is_empty() {
                write!(self.out, "\u{1b}[{}F", self.last_frame.len())?;
            }
            write!(self.out, "{ANSI_CLEAR_BELOW}")?;
            for line in frame {
                writeln!(self.out, "{}", line.styled())?;
            }
        } else {
            for line in frame.iter().filter(|line| !self.last_frame.contains(line)) {
                writeln!(self.out, "{}", line.text)?;
            }
        }
        self.out.flush()?;
        self.last_frame = frame.to_vec();
        Ok(())
    }
}
