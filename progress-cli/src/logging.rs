//! In-memory log ring shared by the TUI log panel and stderr capture.

use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::JoinHandle;

const LOG_CAPACITY: usize = 500;

/// Set to anything but `0` to mirror log lines on stderr.
const ECHO_ENV: &str = "PLEASANT_PROGRESS_LOG_STDERR";

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

struct RingLogger {
    level: LevelFilter,
    buffer: LogBuffer,
    echo_stderr: bool,
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!(
            "[{}] {}: {}",
            record.level(),
            short_target(record.target()),
            record.args()
        );
        if self.echo_stderr {
            eprintln!("{}", line);
        }
        push_line(&self.buffer, line);
    }

    fn flush(&self) {}
}

static LOG_BUFFER: OnceLock<LogBuffer> = OnceLock::new();
static LOGGER: OnceLock<RingLogger> = OnceLock::new();

/// `progress_lib::worker::runner` becomes `worker::runner`; the panel is
/// narrow and every line would otherwise carry the crate name.
fn short_target(target: &str) -> &str {
    target
        .split_once("::")
        .map(|(_, rest)| rest)
        .unwrap_or(target)
}

fn push_line(buffer: &LogBuffer, line: String) {
    let mut buffer = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    while buffer.len() >= LOG_CAPACITY {
        buffer.pop_front();
    }
    buffer.push_back(line);
}

/// Unset or unparsable values mean `info`.
fn parse_level(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|value| LevelFilter::from_str(value.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the ring logger. Level comes from `RUST_LOG`.
pub fn init() -> LogBuffer {
    let buffer = LOG_BUFFER
        .get_or_init(|| Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CAPACITY))))
        .clone();

    let level = parse_level(std::env::var("RUST_LOG").ok().as_deref());
    let echo_stderr = std::env::var(ECHO_ENV)
        .map(|value| value != "0")
        .unwrap_or(false);

    let logger = LOGGER.get_or_init(|| RingLogger {
        level,
        buffer: buffer.clone(),
        echo_stderr,
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }

    buffer
}

pub fn snapshot(buffer: &LogBuffer) -> Vec<String> {
    buffer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .cloned()
        .collect()
}

fn close_fds(fds: &[RawFd]) {
    for fd in fds {
        unsafe {
            libc::close(*fd);
        }
    }
}

/// Restores the original stderr when dropped.
pub struct StderrCaptureGuard {
    saved_fd: RawFd,
    stderr_fd: RawFd,
    reader: Option<JoinHandle<()>>,
}

impl Drop for StderrCaptureGuard {
    fn drop(&mut self) {
        // Pointing fd 2 back at the terminal drops the last write end of the
        // pipe, so the reader sees EOF and can be joined.
        unsafe {
            libc::dup2(self.saved_fd, self.stderr_fd);
        }
        close_fds(&[self.saved_fd]);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

fn forward_lines(read_fd: RawFd, buffer: LogBuffer) {
    let file = unsafe { File::from_raw_fd(read_fd) };
    for line in BufReader::new(file).lines().map_while(|line| line.ok()) {
        let line = line.trim_end();
        if !line.is_empty() {
            push_line(&buffer, format!("[STDERR] {}", line));
        }
    }
}

/// Redirect process stderr into the log ring so audio backend chatter does
/// not draw over the TUI. Returns `None` if the pipe cannot be set up.
pub fn capture_stderr(buffer: LogBuffer) -> Option<StderrCaptureGuard> {
    let stderr_fd = std::io::stderr().as_raw_fd();
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return None;
    }
    let [read_fd, write_fd] = fds;

    let saved_fd = unsafe { libc::dup(stderr_fd) };
    if saved_fd < 0 {
        close_fds(&[read_fd, write_fd]);
        return None;
    }
    if unsafe { libc::dup2(write_fd, stderr_fd) } < 0 {
        close_fds(&[read_fd, write_fd, saved_fd]);
        return None;
    }
    close_fds(&[write_fd]);

    let reader = std::thread::Builder::new()
        .name("stderr-capture".into())
        .spawn(move || forward_lines(read_fd, buffer));
    match reader {
        Ok(handle) => Some(StderrCaptureGuard {
            saved_fd,
            stderr_fd,
            reader: Some(handle),
        }),
        Err(_) => {
            unsafe {
                libc::dup2(saved_fd, stderr_fd);
            }
            close_fds(&[saved_fd, read_fd]);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_keeps_only_the_newest_lines() {
        let buffer: LogBuffer = Arc::new(Mutex::new(VecDeque::new()));
        for index in 0..LOG_CAPACITY + 3 {
            push_line(&buffer, format!("line {}", index));
        }
        let lines = snapshot(&buffer);
        assert_eq!(lines.len(), LOG_CAPACITY);
        assert_eq!(lines[0], "line 3");
        assert_eq!(lines[LOG_CAPACITY - 1], format!("line {}", LOG_CAPACITY + 2));
    }

    #[test]
    fn level_parsing_defaults_to_info() {
        assert_eq!(parse_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(parse_level(Some(" WARN ")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("off")), LevelFilter::Off);
        assert_eq!(parse_level(Some("loud")), LevelFilter::Info);
        assert_eq!(parse_level(None), LevelFilter::Info);
    }

    #[test]
    fn targets_drop_the_crate_name() {
        assert_eq!(short_target("progress_lib::worker::runner"), "worker::runner");
        assert_eq!(short_target("pleasant_progress"), "pleasant_progress");
    }
}
