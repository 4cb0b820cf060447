//! `render`: one synthesized clip written to a 16-bit mono WAV file.

use std::io;
use std::path::Path;

use clap::ArgMatches;
use log::info;
use progress_lib::synth::{synthesize, AudioClip, ClipParams, FadeAlgorithm, Waveform};
use progress_lib::{ProgressError, Result};

/// Build clip parameters from the `render` arguments.
pub fn clip_params(args: &ArgMatches) -> Result<ClipParams> {
    let waveform = args
        .get_one::<String>("waveform")
        .map(|name| name.parse::<Waveform>().map_err(ProgressError::Config))
        .transpose()?
        .unwrap_or_default();
    let fade = args
        .get_one::<String>("fade")
        .map(|name| name.parse::<FadeAlgorithm>().map_err(ProgressError::Config))
        .transpose()?
        .unwrap_or_default();

    Ok(ClipParams {
        frequency: args.get_one::<f64>("freq").copied().unwrap_or(440.0),
        duration_secs: args.get_one::<f64>("duration").copied().unwrap_or(0.08),
        sample_rate: args.get_one::<u32>("sample-rate").copied().unwrap_or(48_000),
        volume: args.get_one::<f64>("volume").copied().unwrap_or(0.4),
        waveform,
        fade,
    })
}

pub fn write_wav(path: &Path, clip: &AudioClip, sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_error)?;
    for sample in clip.samples() {
        writer.write_sample(*sample).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)
}

fn wav_error(err: hound::Error) -> ProgressError {
    match err {
        hound::Error::IoError(err) => ProgressError::Io(err),
        other => ProgressError::Io(io::Error::new(io::ErrorKind::Other, other.to_string())),
    }
}

pub fn run_render(args: &ArgMatches, quiet: bool) -> Result<i32> {
    let Some(output) = args.get_one::<String>("OUTPUT") else {
        return Err(ProgressError::Config("render needs an output path".into()));
    };
    let params = clip_params(args)?;
    let clip = synthesize(&params)?;
    write_wav(Path::new(output), &clip, params.sample_rate)?;

    info!(
        "render: {:.1}Hz {}/{} -> {}",
        params.frequency, params.waveform, params.fade, output
    );
    if !quiet {
        println!(
            "wrote {} frames of {:.1}Hz {} ({} fade) to {}",
            clip.frame_count(),
            params.frequency,
            params.waveform,
            params.fade,
            output
        );
    }
    Ok(0)
}
