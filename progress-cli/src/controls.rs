use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use progress_lib::ProgressEngine;

use crate::host::SimulatedHost;

const PROGRESS_STEP: f64 = 5.0;
const BAR_WIDTH: usize = 20;

/// State of one interactive run.
pub struct Session {
    pub engine: ProgressEngine,
    pub host: SimulatedHost,
    pub progress: f64,
}

impl Session {
    fn step_progress(&mut self, delta: f64) {
        self.progress = (self.progress + delta).clamp(0.0, 100.0);
        self.host.progress_tone(self.progress);
    }
}

pub struct StatusSnapshot {
    pub text: String,
}

pub fn status_text(session: &Session) -> StatusSnapshot {
    let engine = &session.engine;
    let config = engine.config();
    let stats = engine.stats();

    let filled = ((session.progress / 100.0) * BAR_WIDTH as f64).round() as usize;
    let bar = format!(
        "[{}{}]",
        "#".repeat(filled.min(BAR_WIDTH)),
        ".".repeat(BAR_WIDTH - filled.min(BAR_WIDTH))
    );
    let host_hz = SimulatedHost::progress_frequency(session.progress);
    let device = stats
        .device_index
        .map(|index| format!("device {}", index))
        .unwrap_or_else(|| "default device".to_string());

    let lines = [
        format!(
            "{} {:>5.1}%   host {:.1}Hz -> {:.1}Hz",
            bar,
            session.progress,
            host_hz,
            engine.mapped_frequency(host_hz)
        ),
        format!(
            "Tones: {} | worker {} | {}",
            if stats.enabled { "on" } else { "off" },
            stats.worker_state,
            device
        ),
        format!(
            "Config: {} / {} fade, volume {:.1}, {:.0}-{:.0}Hz, {:.0}ms clips",
            config.waveform_type,
            config.fade_algorithm,
            config.volume,
            config.target_min_freq,
            config.target_max_freq,
            config.clip_duration_secs * 1000.0
        ),
        format!(
            "Played {}  skipped {}  failed {}  reopens {}",
            stats.worker.played,
            stats.worker.skipped,
            stats.worker.failed,
            stats.worker.reopens
        ),
        format!(
            "Cache {}/{} (hits {}, misses {}, evicted {}) | native beeps {}",
            stats.cache.size,
            stats.cache.capacity,
            stats.cache.hits,
            stats.cache.misses,
            stats.cache.evictions,
            session.host.native_beeps()
        ),
    ];
    let text = lines.join("\n");

    StatusSnapshot { text }
}

/// Handle at most one key press. Returns `false` when the user quits.
pub fn handle_key_event(session: &mut Session) -> bool {
    if event::poll(Duration::from_millis(100)).unwrap_or(false) {
        if let Ok(Event::Key(key)) = event::read() {
            if key.kind != KeyEventKind::Press {
                return true;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    session.engine.shutdown();
                    return false;
                }
                KeyCode::Left => session.step_progress(-PROGRESS_STEP),
                KeyCode::Right => session.step_progress(PROGRESS_STEP),
                KeyCode::Char('t') | KeyCode::Char('T') => {
                    session.engine.toggle_enabled();
                }
                KeyCode::Char('r') | KeyCode::Char('R') => {
                    session.engine.reconfigure();
                }
                KeyCode::Char('b') | KeyCode::Char('B') => session.host.notify_tone(),
                _ => {}
            }
        }
    }

    true
}
