//! Tape playback CLI.
//!
//! Loads a TAP/TZX/Z80 image and either plays it live through the
//! default audio device (the default), captures it to a WAV file, or
//! re-serializes it as a TZX container. The `--turbo` flag re-encodes
//! data blocks with the fast-loading profile first.

mod audio;

use std::path::Path;

use tapecast::render::{RenderConfig, RenderState, SampleStream};
use tapecast::turbo::transform_items;
use tapecast::{TapeItem, load_path, render_to_wav, write_tzx};

use crate::audio::AudioOutput;

struct Args {
    image: String,
    turbo: bool,
    wav_out: Option<String>,
    tzx_out: Option<String>,
    sample_rate: u32,
}

fn usage() -> ! {
    eprintln!("Usage: runner <image.tap|.tzx|.z80> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --turbo        re-encode data blocks with the fast-loading profile");
    eprintln!("  --wav <file>   capture to a WAV file instead of playing live");
    eprintln!("  --tzx <file>   write the item sequence as a TZX container");
    eprintln!("  --rate <hz>    sample rate (default 44100)");
    std::process::exit(1);
}

fn parse_args() -> Args {
    let mut args = std::env::args().skip(1);
    let Some(image) = args.next() else { usage() };
    if image.starts_with("--") {
        usage();
    }

    let mut parsed = Args {
        image,
        turbo: false,
        wav_out: None,
        tzx_out: None,
        sample_rate: 44_100,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--turbo" => parsed.turbo = true,
            "--wav" => parsed.wav_out = args.next().or_else(|| usage()),
            "--tzx" => parsed.tzx_out = args.next().or_else(|| usage()),
            "--rate" => {
                let value = args.next().unwrap_or_else(|| usage());
                match value.parse() {
                    Ok(rate) => parsed.sample_rate = rate,
                    Err(_) => usage(),
                }
            }
            _ => usage(),
        }
    }

    parsed
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args();
    if let Err(err) = run(&args) {
        tracing::error!(%err, "playback failed");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut items = load_path(Path::new(&args.image))?;
    tracing::info!(image = %args.image, items = items.len(), "tape image loaded");

    if args.turbo {
        items = transform_items(&items);
        tracing::info!("re-encoded data blocks with turbo profile");
    }

    if let Some(out) = &args.tzx_out {
        let bytes = write_tzx(&items)?;
        std::fs::write(out, &bytes)?;
        tracing::info!(file = %out, bytes = bytes.len(), "TZX container written");
        return Ok(());
    }

    let config = RenderConfig {
        sample_rate: args.sample_rate,
        ..RenderConfig::default()
    };

    if let Some(out) = &args.wav_out {
        render_to_wav(&items, config, Path::new(out))?;
        tracing::info!(file = %out, "WAV capture written");
        return Ok(());
    }

    play_live(&items, config)
}

/// Stream the sequence to the audio device, pausing at stop-the-tape
/// markers until the user presses Enter.
fn play_live(items: &[TapeItem], config: RenderConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut output = AudioOutput::new(config.sample_rate, -config.amplitude)
        .map_err(tapecast::RenderError::PlaybackFailed)?;
    let mut stream = SampleStream::new(items, config);
    let mut buf = [0.0f32; 4096];

    loop {
        let (n, state) = stream.fill(&mut buf)?;
        output
            .push_samples(&buf[..n])
            .map_err(tapecast::RenderError::PlaybackFailed)?;

        match state {
            RenderState::Running => {}
            RenderState::Stopped => {
                println!("Tape stopped. Press Enter to continue...");
                let mut line = String::new();
                std::io::stdin().read_line(&mut line)?;
                // The ring legitimately ran dry during the pause.
                output.clear_underrun();
                stream.resume();
            }
            RenderState::Finished => break,
        }
    }

    tracing::info!("playback finished");
    Ok(())
}
