//! # Pleasant Progress
//!
//! Replaces a screen reader's harsh progress-bar beeps with short synthesized
//! clips, pitch-mapped from the host's native sweep into a configurable band.
//!
//! The pipeline, leaf to root:
//! - [`synth`] renders one clip for a frequency, waveform and fade.
//! - [`cache`] keeps rendered clips in a bounded FIFO store.
//! - [`mapping`] moves an observed frequency into the target band.
//! - [`channel`] hands the latest request from the hook to the worker.
//! - [`worker`] polls the channel and writes clips to the [`sink`].
//! - [`hook`] sits over the host's tone function and classifies calls.
//!
//! [`engine::ProgressEngine`] wires all of it together.

pub mod cache;
pub mod channel;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod hook;
pub mod mapping;
pub mod sink;
pub mod synth;
mod tools;
pub mod worker;

pub use engine::{EngineStats, ProgressEngine};
pub use error::{ProgressError, Result};
