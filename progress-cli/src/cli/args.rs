//! CLI argument definitions for `pleasant-progress`.

use clap::{value_parser, Arg, ArgAction, Command};
use progress_lib::synth::{FadeAlgorithm, Waveform};

fn waveform_names() -> Vec<&'static str> {
    Waveform::ALL.iter().map(|waveform| waveform.name()).collect()
}

fn fade_names() -> Vec<&'static str> {
    FadeAlgorithm::ALL.iter().map(|fade| fade.name()).collect()
}

fn no_audio_arg() -> Arg {
    Arg::new("no-audio")
        .long("no-audio")
        .action(ArgAction::SetTrue)
        .help("Write clips to an in-memory sink instead of the sound card")
}

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("pleasant-progress")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Replace a screen reader's progress beeps with synthesized tones")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .global(true)
                .help("JSON configuration file (defaults are used when it is missing)"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Suppress all console output"),
        )
        .subcommand(
            Command::new("run")
                .about("Interactive host simulator (the default command)")
                .arg(no_audio_arg()),
        )
        .subcommand(
            Command::new("sweep")
                .about("Sweep the host's progress tone from 0% to 100% and print statistics")
                .arg(
                    Arg::new("steps")
                        .long("steps")
                        .value_name("COUNT")
                        .default_value("20")
                        .value_parser(value_parser!(u32).range(1..=1000))
                        .help("Number of progress increments"),
                )
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .value_name("MS")
                        .default_value("150")
                        .value_parser(value_parser!(u64))
                        .help("Delay between progress tones"),
                )
                .arg(no_audio_arg()),
        )
        .subcommand(
            Command::new("render")
                .about("Synthesize one clip into a WAV file")
                .arg(
                    Arg::new("OUTPUT")
                        .help("Path of the WAV file to write")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("freq")
                        .long("freq")
                        .value_name("HZ")
                        .default_value("440")
                        .value_parser(value_parser!(f64))
                        .help("Tone frequency"),
                )
                .arg(
                    Arg::new("waveform")
                        .long("waveform")
                        .short('w')
                        .value_name("SHAPE")
                        .default_value("sine")
                        .value_parser(waveform_names())
                        .help("Waveform shape"),
                )
                .arg(
                    Arg::new("fade")
                        .long("fade")
                        .value_name("ALGORITHM")
                        .default_value("cosine")
                        .value_parser(fade_names())
                        .help("Fade envelope"),
                )
                .arg(
                    Arg::new("volume")
                        .long("volume")
                        .value_name("VOLUME")
                        .default_value("0.4")
                        .value_parser(value_parser!(f64))
                        .help("Volume in (0, 1]"),
                )
                .arg(
                    Arg::new("duration")
                        .long("duration")
                        .value_name("SECONDS")
                        .default_value("0.08")
                        .value_parser(value_parser!(f64))
                        .help("Clip length"),
                )
                .arg(
                    Arg::new("sample-rate")
                        .long("sample-rate")
                        .value_name("HZ")
                        .default_value("48000")
                        .value_parser(value_parser!(u32))
                        .help("Output sample rate"),
                ),
        )
        .subcommand(
            Command::new("classify")
                .about("Report whether a tone call would be treated as a progress tone")
                .arg(
                    Arg::new("FREQ")
                        .required(true)
                        .value_parser(value_parser!(f64))
                        .index(1),
                )
                .arg(
                    Arg::new("LENGTH_MS")
                        .required(true)
                        .value_parser(value_parser!(u32))
                        .index(2),
                )
                .arg(
                    Arg::new("LEFT")
                        .required(true)
                        .value_parser(value_parser!(u8))
                        .index(3),
                )
                .arg(
                    Arg::new("RIGHT")
                        .required(true)
                        .value_parser(value_parser!(u8))
                        .index(4),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Emit default JSON payloads")
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("config-json").about("Print the default configuration record"),
                ),
        )
}
