//! Audio output seam.
//!
//! An [`AudioBackend`] opens [`OutputStream`]s; the playback worker owns the
//! single open stream through an [`OutputSlot`], which reopens it lazily
//! after failures.

mod memory;
mod rodio_backend;

pub use memory::{MemoryBackend, MemoryEvent, WriteRecord};
pub use rodio_backend::RodioBackend;

use log::{debug, info, warn};

use crate::error::{ProgressError, Result};
use crate::synth::AudioClip;

/// Parameters for opening an output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub frames_per_buffer: u32,
    /// Backend device index; `None` is the system default.
    pub device_index: Option<usize>,
    pub exception_on_underflow: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            sample_rate: crate::config::DEFAULT_SAMPLE_RATE,
            channels: 1,
            frames_per_buffer: crate::config::DEFAULT_FRAMES_PER_BUFFER,
            device_index: None,
            exception_on_underflow: false,
        }
    }
}

/// Factory for output streams. Shared between worker generations.
pub trait AudioBackend: Send + Sync {
    fn open(&self, settings: &StreamSettings) -> Result<Box<dyn OutputStream>>;
}

/// An open hardware stream. Lives on the worker thread only.
pub trait OutputStream {
    fn is_active(&self) -> bool;

    /// Write interleaved little-endian 16-bit PCM.
    fn write(
        &mut self,
        bytes: &[u8],
        frame_count: usize,
        exception_on_underflow: bool,
    ) -> Result<()>;

    fn close(&mut self);
}

/// Lazily (re)opened stream owned by the playback worker.
pub struct OutputSlot {
    backend: std::sync::Arc<dyn AudioBackend>,
    settings: StreamSettings,
    stream: Option<Box<dyn OutputStream>>,
    reopens: u64,
}

impl OutputSlot {
    pub fn new(backend: std::sync::Arc<dyn AudioBackend>, settings: StreamSettings) -> Self {
        Self {
            backend,
            settings,
            stream: None,
            reopens: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Number of times the stream was reopened after the first open.
    pub fn reopens(&self) -> u64 {
        self.reopens
    }

    /// Open the stream if it is not open yet.
    pub fn ensure_open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = self.backend.open(&self.settings)?;
        info!(
            "output stream open: {}Hz, {} frames/buffer, device {}",
            self.settings.sample_rate,
            self.settings.frames_per_buffer,
            self.settings
                .device_index
                .map(|index| index.to_string())
                .unwrap_or_else(|| "default".to_string())
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Close and forget the stream; the next write reopens it.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            debug!("output stream closed");
        }
    }

    fn reopen(&mut self) -> Result<()> {
        self.close();
        self.reopens += 1;
        self.ensure_open()
    }

    /// Write one clip, reopening an inactive stream first. A failed write
    /// closes the stream so the next call starts from a fresh one.
    pub fn write_clip(&mut self, clip: &AudioClip) -> Result<()> {
        self.ensure_open()?;
        let healthy = self.stream.as_ref().map(|stream| stream.is_active()).unwrap_or(false);
        if !healthy {
            warn!("output stream inactive, reopening");
            self.reopen()?;
        }

        let exception_on_underflow = self.settings.exception_on_underflow;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ProgressError::Device("output stream unavailable".into()))?;
        let result = stream.write(&clip.pcm_bytes(), clip.frame_count(), exception_on_underflow);
        if result.is_err() {
            self.close();
            self.reopens += 1;
        }
        result
    }
}

impl Drop for OutputSlot {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn clip() -> AudioClip {
        AudioClip::from_samples(vec![100, -100, 200, -200])
    }

    #[test]
    fn opens_lazily_and_writes() {
        let backend = MemoryBackend::new();
        let mut slot = OutputSlot::new(Arc::new(backend.clone()), StreamSettings::default());
        assert!(!slot.is_open());

        slot.write_clip(&clip()).expect("write");
        assert!(slot.is_open());
        assert_eq!(backend.opens(), 1);
        assert_eq!(backend.writes(), 1);
        assert_eq!(backend.last_write().expect("write").frames, 4);
    }

    #[test]
    fn inactive_stream_is_reopened_before_writing() {
        let backend = MemoryBackend::new();
        let mut slot = OutputSlot::new(Arc::new(backend.clone()), StreamSettings::default());
        slot.ensure_open().expect("open");
        backend.deactivate_streams();

        slot.write_clip(&clip()).expect("write");
        assert_eq!(backend.opens(), 2);
        assert_eq!(backend.closes(), 1);
        assert_eq!(slot.reopens(), 1);
        assert_eq!(backend.writes(), 1);
    }

    #[test]
    fn failed_write_closes_for_the_next_attempt() {
        let backend = MemoryBackend::new();
        let mut slot = OutputSlot::new(Arc::new(backend.clone()), StreamSettings::default());
        backend.fail_next_writes(1);

        assert!(slot.write_clip(&clip()).is_err());
        assert!(!slot.is_open());

        slot.write_clip(&clip()).expect("second write");
        assert_eq!(backend.opens(), 2);
        assert_eq!(backend.writes(), 1);
    }

    #[test]
    fn open_failure_surfaces_as_device_error() {
        let backend = MemoryBackend::new();
        backend.set_fail_opens(true);
        let mut slot = OutputSlot::new(Arc::new(backend.clone()), StreamSettings::default());
        assert!(matches!(slot.write_clip(&clip()), Err(ProgressError::Device(_))));
        assert!(!slot.is_open());
    }

    #[test]
    fn drop_closes_the_stream() {
        let backend = MemoryBackend::new();
        {
            let mut slot = OutputSlot::new(Arc::new(backend.clone()), StreamSettings::default());
            slot.ensure_open().expect("open");
        }
        assert_eq!(backend.closes(), 1);
    }
}
