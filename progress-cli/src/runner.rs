use std::{io, sync::Arc, thread::sleep, time::Duration};

use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info};
use progress_lib::config::{ConfigSource, JsonConfigFile, PlaybackConfig, SharedConfig};
use progress_lib::device::ExactNameResolver;
use progress_lib::hook::ProgressToneFilter;
use progress_lib::sink::{AudioBackend, MemoryBackend, RodioBackend};
use progress_lib::{ProgressEngine, Result};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::controls::{self, Session};
use crate::host::SimulatedHost;
use crate::logging::{self, LogBuffer};
use crate::{cli, ui};

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32> {
    let quiet = args.get_flag("quiet");
    match args.subcommand() {
        Some(("create", sub)) => run_create(sub, quiet),
        Some(("classify", sub)) => run_classify(sub, quiet),
        Some(("render", sub)) => cli::render::run_render(sub, quiet),
        Some(("sweep", sub)) => run_sweep(args, sub, quiet),
        Some(("run", sub)) => run_interactive(args, sub.get_flag("no-audio"), quiet, log_buffer),
        _ => run_interactive(args, false, quiet, log_buffer),
    }
}

fn config_source(args: &ArgMatches) -> Box<dyn ConfigSource> {
    match args.get_one::<String>("config") {
        Some(path) => Box::new(JsonConfigFile::new(path)),
        None => Box::new(SharedConfig::default()),
    }
}

fn build_engine(args: &ArgMatches, no_audio: bool) -> ProgressEngine {
    let backend: Arc<dyn AudioBackend> = if no_audio {
        Arc::new(MemoryBackend::new())
    } else {
        Arc::new(RodioBackend::new())
    };
    ProgressEngine::new(config_source(args), backend, ExactNameResolver::system())
}

fn run_create(args: &ArgMatches, quiet: bool) -> Result<i32> {
    match args.subcommand() {
        Some(("config-json", _)) => {
            let json = serde_json::to_string_pretty(&PlaybackConfig::default())?;
            if !quiet {
                println!("{}", json);
            }
            Ok(0)
        }
        _ => Ok(2),
    }
}

fn run_classify(args: &ArgMatches, quiet: bool) -> Result<i32> {
    let frequency = args.get_one::<f64>("FREQ").copied().unwrap_or_default();
    let length_ms = args.get_one::<u32>("LENGTH_MS").copied().unwrap_or_default();
    let left = args.get_one::<u8>("LEFT").copied().unwrap_or_default();
    let right = args.get_one::<u8>("RIGHT").copied().unwrap_or_default();

    let class = ProgressToneFilter::default().classify(frequency, length_ms, left, right);
    if !quiet {
        println!("{}", class);
    }
    Ok(0)
}

fn run_sweep(args: &ArgMatches, sub: &ArgMatches, quiet: bool) -> Result<i32> {
    let steps = sub.get_one::<u32>("steps").copied().unwrap_or(20);
    let interval_ms = sub.get_one::<u64>("interval-ms").copied().unwrap_or(150);

    let host = SimulatedHost::new();
    let mut engine = build_engine(args, sub.get_flag("no-audio"));
    engine.start(host.slot())?;

    let report = cli::sweep::run_sweep(&engine, &host, steps, Duration::from_millis(interval_ms));
    engine.shutdown();

    if !quiet {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(0)
}

fn run_interactive(
    args: &ArgMatches,
    no_audio: bool,
    quiet: bool,
    log_buffer: LogBuffer,
) -> Result<i32> {
    info!("starting pleasant progress simulator");
    let host = SimulatedHost::new();
    let mut engine = build_engine(args, no_audio);
    if let Err(err) = engine.start(host.slot()) {
        error!("{}", err);
        return Ok(1);
    }

    let mut session = Session {
        engine,
        host,
        progress: 0.0,
    };

    let _raw_mode = RawModeGuard::enable().ok();
    let mut terminal = if !quiet {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).ok()
    } else {
        None
    };
    let _stderr_capture = terminal
        .as_ref()
        .and_then(|_| logging::capture_stderr(log_buffer.clone()));

    // UI / input loop.
    loop {
        if let Some(term) = terminal.as_mut() {
            let log_lines = logging::snapshot(&log_buffer);
            let status = controls::status_text(&session);
            ui::draw_status(term, &status, &log_lines);
        }

        if !controls::handle_key_event(&mut session) {
            break;
        }

        sleep(Duration::from_millis(50));
    }

    // Restore the terminal state before exiting.
    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let stdout = term.backend_mut();
        let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
    }

    Ok(0)
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
