//! repeater-tool - offline companion for the repeater signal engine
//!
//! Renders the roger-beep and beacon as WAV files, runs recorded audio
//! through the DTMF decoder and shows the next beacon slot.

use anyhow::{bail, Context, Result};
use repeater::audio::dtmf::DtmfDecoder;
use repeater::audio::pcm::write_wav_file;
use repeater::audio::sequence::{render_bbc_pips_with, render_kenwood_beep_with};
use repeater::audio::window::WindowAssembler;
use repeater::beacon::schedule::{delay_until, next_top_of_hour, Clock, SystemClock};
use repeater::config::RepeaterConfig;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

/// Samples read from a WAV file per chunk when decoding
const DECODE_CHUNK: usize = 4096;

enum Command {
    RenderBeacon(PathBuf),
    RenderRoger(PathBuf),
    Decode(PathBuf),
    NextBeacon,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("repeater=info".parse()?)
                .add_directive("repeater_core=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut command: Option<Command> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--version" | "-v" => {
                println!("repeater-tool {}", repeater::VERSION);
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --config requires a path");
                    return Ok(());
                }
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
                continue;
            }
            "render-beacon" | "render-roger" | "decode" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: {} requires a file path", args[i]);
                    return Ok(());
                }
                let path = PathBuf::from(&args[i + 1]);
                command = Some(match args[i].as_str() {
                    "render-beacon" => Command::RenderBeacon(path),
                    "render-roger" => Command::RenderRoger(path),
                    _ => Command::Decode(path),
                });
                i += 2;
                continue;
            }
            "next-beacon" => {
                command = Some(Command::NextBeacon);
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                return Ok(());
            }
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => RepeaterConfig::load(path),
        None => RepeaterConfig::default(),
    };

    match command {
        Some(Command::RenderBeacon(path)) => render_beacon(&config, &path),
        Some(Command::RenderRoger(path)) => render_roger(&config, &path),
        Some(Command::Decode(path)) => decode(&config, &path),
        Some(Command::NextBeacon) => {
            next_beacon();
            Ok(())
        }
        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Usage: repeater-tool [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  render-beacon FILE   Write the BBC pips beacon as a WAV file");
    println!("  render-roger FILE    Write the roger-beep as a WAV file");
    println!("  decode FILE          Print DTMF digits found in a mono 16-bit WAV file");
    println!("  next-beacon          Show when the beacon fires next");
    println!();
    println!("Options:");
    println!("  -c, --config PATH    Load settings from a JSON config file");
    println!("  -v, --version        Show version");
    println!("  -h, --help           Show this help");
    println!();
    println!("Examples:");
    println!("  repeater-tool render-beacon pips.wav");
    println!("  repeater-tool --config repeater.json decode keypad.wav");
}

fn render_beacon(config: &RepeaterConfig, path: &Path) -> Result<()> {
    let (pcm, duration_ms) = render_bbc_pips_with(
        config.baliza.tone_hz,
        config.baliza.volume,
        config.audio.sample_rate,
    );
    write_wav_file(path, &pcm).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), duration_ms, "beacon_rendered");
    println!(
        "Wrote {} ({} samples, {} ms)",
        path.display(),
        pcm.sample_count(),
        duration_ms
    );
    Ok(())
}

fn render_roger(config: &RepeaterConfig, path: &Path) -> Result<()> {
    let beep = &config.roger_beep;
    let pcm = render_kenwood_beep_with(
        beep.tones_hz,
        beep.volume,
        beep.duration_ms,
        config.audio.sample_rate,
    );
    write_wav_file(path, &pcm).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), duration_ms = pcm.duration_ms(), "roger_rendered");
    println!(
        "Wrote {} ({} samples, {} ms)",
        path.display(),
        pcm.sample_count(),
        pcm.duration_ms()
    );
    Ok(())
}

fn decode(config: &RepeaterConfig, path: &Path) -> Result<()> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 {
        bail!(
            "{}: expected mono 16-bit PCM, got {} channel(s) at {} bits",
            path.display(),
            spec.channels,
            spec.bits_per_sample
        );
    }

    let mut decoder = DtmfDecoder::new(spec.sample_rate, &config.dtmf);
    let mut assembler = WindowAssembler::new(decoder.window_size());

    // Timestamps follow the file's own timeline so cooldowns match real time
    let window_duration = Duration::from_secs_f64(
        decoder.window_size() as f64 / f64::from(spec.sample_rate.max(1)),
    );
    let origin = Instant::now();
    let mut window_index: u32 = 0;
    let mut digits = String::new();
    let mut chunk = Vec::with_capacity(DECODE_CHUNK);

    let mut samples = reader.samples::<i16>();
    loop {
        chunk.clear();
        for sample in samples.by_ref().take(DECODE_CHUNK) {
            chunk.push(sample.with_context(|| format!("reading {}", path.display()))?);
        }
        if chunk.is_empty() {
            break;
        }

        for window in assembler.push_i16(&chunk) {
            let at = origin + window_duration * window_index;
            window_index += 1;
            if let Some(digit) = decoder.detect_at(&window, at) {
                let offset_ms = (window_duration * window_index).as_millis();
                println!("{:>8} ms  {}", offset_ms, digit);
                digits.push(digit);
            }
        }
    }

    let stats = decoder.stats();
    info!(
        windows = stats.windows,
        fft_runs = stats.fft_runs,
        confirmations = stats.confirmations,
        "decode_finished"
    );
    if digits.is_empty() {
        println!("No DTMF digits found.");
    } else {
        println!("Digits: {}", digits);
    }
    Ok(())
}

fn next_beacon() {
    let now = SystemClock.now();
    let next = next_top_of_hour(&now);
    let wait = delay_until(&now, &next);
    println!(
        "Next beacon: {} (in {}m {:02}s)",
        next.format("%Y-%m-%d %H:%M:%S %:z"),
        wait.as_secs() / 60,
        wait.as_secs() % 60
    );
}
