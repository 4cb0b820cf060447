//! Hardware output through rodio.

use log::warn;
use rodio::buffer::SamplesBuffer;
use rodio::cpal::traits::HostTrait;
use rodio::cpal::BufferSize;
use rodio::{OutputStreamBuilder, Sink};

use crate::error::{ProgressError, Result};

use super::{AudioBackend, OutputStream, StreamSettings};

/// Opens rodio output streams on the default host.
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioBackend;

impl RodioBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for RodioBackend {
    fn open(&self, settings: &StreamSettings) -> Result<Box<dyn OutputStream>> {
        let stream = open_output_stream(settings)?;
        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(1.0);
        sink.play();
        Ok(Box::new(RodioStream {
            _stream: stream,
            sink,
            channels: settings.channels.max(1),
            sample_rate: settings.sample_rate,
        }))
    }
}

/// Open the requested device, falling back to the system default when the
/// index is unknown or the device refuses to open.
fn open_output_stream(settings: &StreamSettings) -> Result<rodio::OutputStream> {
    let buffer_size = BufferSize::Fixed(settings.frames_per_buffer);

    if let Some(index) = settings.device_index {
        match output_device_at(index) {
            Some(device) => {
                let opened = OutputStreamBuilder::from_device(device).and_then(|builder| {
                    builder
                        .with_buffer_size(buffer_size)
                        .open_stream_or_fallback()
                });
                match opened {
                    Ok(stream) => return Ok(stream),
                    Err(err) => warn!(
                        "open: output device {} failed ({}), using default device",
                        index, err
                    ),
                }
            }
            None => warn!("open: output device {} not found, using default device", index),
        }
    }

    OutputStreamBuilder::from_default_device()
        .and_then(|builder| {
            builder
                .with_buffer_size(buffer_size)
                .open_stream_or_fallback()
        })
        .map_err(|err| ProgressError::Device(format!("open default output stream: {}", err)))
}

fn output_device_at(index: usize) -> Option<rodio::cpal::Device> {
    rodio::cpal::default_host().output_devices().ok()?.nth(index)
}

struct RodioStream {
    _stream: rodio::OutputStream,
    sink: Sink,
    channels: u16,
    sample_rate: u32,
}

impl OutputStream for RodioStream {
    fn is_active(&self) -> bool {
        !self.sink.is_paused()
    }

    /// rodio pads underruns with silence, so `exception_on_underflow` has no
    /// effect on this backend.
    fn write(
        &mut self,
        bytes: &[u8],
        frame_count: usize,
        _exception_on_underflow: bool,
    ) -> Result<()> {
        let expected = frame_count * self.channels as usize * 2;
        if bytes.len() < expected {
            return Err(ProgressError::Device(format!(
                "write: buffer holds {} bytes, {} frames need {}",
                bytes.len(),
                frame_count,
                expected
            )));
        }

        let samples: Vec<f32> = bytes[..expected]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32_768.0)
            .collect();
        self.sink
            .append(SamplesBuffer::new(self.channels, self.sample_rate, samples));
        Ok(())
    }

    fn close(&mut self) {
        self.sink.stop();
    }
}
