//! Playback worker loop implementation.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::channel::PlaybackRequest;
use crate::mapping::{map_frequency, FrequencyRange};
use crate::sink::OutputSlot;
use crate::synth::ClipParams;
use crate::tools::lock;

use super::context::WorkerContext;
use super::guard::WorkerThreadGuard;
use super::WorkerState;

/// Upper bound on a single sleep slice so `stop` is noticed quickly.
const ABORT_CHECK_MS: u64 = 10;

/// Ranges and clip template derived once per worker generation.
struct LoopState {
    source: FrequencyRange,
    target: FrequencyRange,
    template: ClipParams,
    poll_interval: Duration,
    reported_reopens: u64,
}

impl LoopState {
    fn new(ctx: &WorkerContext) -> Self {
        let config = &ctx.config;
        Self {
            source: FrequencyRange::NATIVE_SWEEP,
            target: config.target_range(),
            template: ClipParams {
                frequency: FrequencyRange::NATIVE_SWEEP.min,
                duration_secs: config.clip_duration_secs,
                sample_rate: config.sample_rate,
                volume: config.volume,
                waveform: config.waveform_type,
                fade: config.fade_algorithm,
            },
            poll_interval: config.poll_interval(),
            reported_reopens: 0,
        }
    }
}

/// Run one worker generation until `abort` is raised.
pub(super) fn run_worker_thread(ctx: WorkerContext) {
    {
        let mut state = lock(&ctx.state);
        if *state == WorkerState::Starting {
            *state = WorkerState::Running;
        }
    }
    let _thread_guard = WorkerThreadGuard::new(ctx.live_threads.clone());

    let mut loop_state = LoopState::new(&ctx);
    let mut output = OutputSlot::new(ctx.backend.clone(), ctx.settings);
    if let Err(err) = output.ensure_open() {
        warn!("open: {}; retrying on the next request", err);
    }

    info!(
        "playback worker running, polling every {}ms",
        loop_state.poll_interval.as_millis()
    );

    while !ctx.abort.load(Ordering::SeqCst) {
        let last_seen = ctx.last_seen.load(Ordering::SeqCst);
        if let Some(request) = ctx.channel.try_take_if_new(last_seen) {
            // Recorded before playing: a failed request is never retried.
            ctx.last_seen.store(request.id, Ordering::SeqCst);
            let id = request.id;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                play_request(&ctx, &mut loop_state, &mut output, request)
            }));
            if outcome.is_err() {
                ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!("play: request {} panicked, dropping the output stream", id);
                output.close();
            }
        }
        sleep_unless_aborted(&ctx.abort, loop_state.poll_interval);
    }

    output.close();
    report_reopens(&ctx, &mut loop_state, &output);

    #[cfg(feature = "debug")]
    log::info!("playback worker loop finished");
}

fn play_request(
    ctx: &WorkerContext,
    loop_state: &mut LoopState,
    output: &mut OutputSlot,
    request: PlaybackRequest,
) {
    if !ctx.enabled.load(Ordering::SeqCst) {
        ctx.counters.skipped.fetch_add(1, Ordering::Relaxed);
        debug!(
            "skip: request {} at {:.1}Hz while disabled",
            request.id, request.frequency
        );
        return;
    }

    let frequency = map_frequency(request.frequency, &loop_state.source, &loop_state.target);
    let params = ClipParams {
        frequency,
        ..loop_state.template
    };

    #[cfg(feature = "debug")]
    log::info!(
        "map: request {} {:.1}Hz -> {:.1}Hz",
        request.id,
        request.frequency,
        frequency
    );

    let clip = match lock(&ctx.cache).get_or_create(&params) {
        Ok(clip) => clip,
        Err(err) => {
            ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                "synthesize: {:.1}Hz (observed {:.1}Hz): {}",
                frequency, request.frequency, err
            );
            return;
        }
    };

    let started = Instant::now();
    let result = output.write_clip(&clip);
    report_reopens(ctx, loop_state, output);
    match result {
        Ok(()) => {
            ctx.counters.played.fetch_add(1, Ordering::Relaxed);
            debug!(
                "write: {:.1}Hz, {} frames in {:?}",
                frequency,
                clip.frame_count(),
                started.elapsed()
            );
        }
        Err(err) => {
            ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                "write: {:.1}Hz (observed {:.1}Hz): {}; stream reopens next time",
                frequency, request.frequency, err
            );
        }
    }
}

fn report_reopens(ctx: &WorkerContext, loop_state: &mut LoopState, output: &OutputSlot) {
    let total = output.reopens();
    if total > loop_state.reported_reopens {
        ctx.counters
            .reopens
            .fetch_add(total - loop_state.reported_reopens, Ordering::Relaxed);
        loop_state.reported_reopens = total;
    }
}

fn sleep_unless_aborted(abort: &AtomicBool, interval: Duration) {
    let deadline = Instant::now() + interval;
    loop {
        if abort.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(ABORT_CHECK_MS)));
    }
}
