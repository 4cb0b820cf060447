//! Recording backend used for tests and silent simulation runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ProgressError, Result};
use crate::tools::lock;

use super::{AudioBackend, OutputStream, StreamSettings};

/// One recorded write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub frames: usize,
    pub bytes: usize,
    /// Largest absolute sample value in the buffer.
    pub peak: u16,
    pub exception_on_underflow: bool,
}

/// Everything the backend saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEvent {
    Open(StreamSettings),
    Write(WriteRecord),
    Close,
}

#[derive(Debug, Default)]
struct MemoryState {
    events: Vec<MemoryEvent>,
    live: Vec<Arc<AtomicBool>>,
    fail_opens: bool,
    failing_writes: usize,
}

/// Backend that keeps every open/write/close in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MemoryEvent> {
        lock(&self.state).events.clone()
    }

    pub fn opens(&self) -> usize {
        self.count(|event| matches!(event, MemoryEvent::Open(_)))
    }

    pub fn writes(&self) -> usize {
        self.count(|event| matches!(event, MemoryEvent::Write(_)))
    }

    pub fn closes(&self) -> usize {
        self.count(|event| matches!(event, MemoryEvent::Close))
    }

    pub fn last_write(&self) -> Option<WriteRecord> {
        lock(&self.state).events.iter().rev().find_map(|event| match event {
            MemoryEvent::Write(record) => Some(record.clone()),
            _ => None,
        })
    }

    /// Settings of the most recent open.
    pub fn last_open(&self) -> Option<StreamSettings> {
        lock(&self.state).events.iter().rev().find_map(|event| match event {
            MemoryEvent::Open(settings) => Some(*settings),
            _ => None,
        })
    }

    /// Make every subsequent `open` fail until cleared.
    pub fn set_fail_opens(&self, fail: bool) {
        lock(&self.state).fail_opens = fail;
    }

    /// Make the next `count` writes fail.
    pub fn fail_next_writes(&self, count: usize) {
        lock(&self.state).failing_writes = count;
    }

    /// Report every currently open stream as inactive.
    pub fn deactivate_streams(&self) {
        for flag in lock(&self.state).live.drain(..) {
            flag.store(false, Ordering::SeqCst);
        }
    }

    fn count(&self, predicate: impl Fn(&MemoryEvent) -> bool) -> usize {
        lock(&self.state).events.iter().filter(|event| predicate(event)).count()
    }
}

impl AudioBackend for MemoryBackend {
    fn open(&self, settings: &StreamSettings) -> Result<Box<dyn OutputStream>> {
        let mut state = lock(&self.state);
        if state.fail_opens {
            return Err(ProgressError::Device("memory backend refused to open".into()));
        }
        let active = Arc::new(AtomicBool::new(true));
        state.live.push(active.clone());
        state.events.push(MemoryEvent::Open(*settings));
        Ok(Box::new(MemoryStream {
            state: self.state.clone(),
            active,
        }))
    }
}

struct MemoryStream {
    state: Arc<Mutex<MemoryState>>,
    active: Arc<AtomicBool>,
}

impl OutputStream for MemoryStream {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn write(
        &mut self,
        bytes: &[u8],
        frame_count: usize,
        exception_on_underflow: bool,
    ) -> Result<()> {
        let mut state = lock(&self.state);
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(ProgressError::Device("memory backend write failed".into()));
        }
        let peak = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]).unsigned_abs())
            .max()
            .unwrap_or(0);
        state.events.push(MemoryEvent::Write(WriteRecord {
            frames: frame_count,
            bytes: bytes.len(),
            peak,
            exception_on_underflow,
        }));
        Ok(())
    }

    fn close(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        let mut state = lock(&self.state);
        let active = self.active.clone();
        state.live.retain(|flag| !Arc::ptr_eq(flag, &active));
        state.events.push(MemoryEvent::Close);
    }
}
