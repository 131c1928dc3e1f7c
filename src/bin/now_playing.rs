//! Fullscreen "now playing" display fed by the microphone.
//!
//! A background loop records a clip, recognizes it and rewrites the song
//! file; the display re-reads that file every few seconds. Either half can
//! run alone, so the two can also live in separate processes.
//!
//! Usage:
//!     now_playing [--source alsa:default] [--no-capture | --no-display]

use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use clap::Parser;

use songtag::cli::{self, CommonArgs};
use songtag::kiosk::Kiosk;
use songtag::{create_recognizer, Config, Producer, Settings};

#[derive(Parser, Debug)]
#[command(name = "now_playing")]
#[command(about = "Show the song currently playing, recognized from a microphone")]
#[command(version)]
struct Args {
    /// Only show the display; another process writes the song file
    #[arg(long, conflicts_with = "no_display")]
    no_capture: bool,

    /// Only capture and recognize, without the display
    #[arg(long)]
    no_display: bool,

    /// Capture device, e.g. alsa:default, hw:1,0 or pwpipe:<target>
    #[arg(short, long)]
    source: Option<String>,

    /// Length of each recording in seconds
    #[arg(long, value_name = "SECS")]
    record_seconds: Option<u32>,

    /// Display refresh interval in seconds
    #[arg(long, value_name = "SECS")]
    refresh: Option<u64>,

    /// Shared song file
    #[arg(long, value_name = "FILE")]
    song_file: Option<String>,

    /// Where downloaded cover art is stored
    #[arg(long, value_name = "FILE")]
    album_art: Option<String>,

    /// Image shown when there is no cover
    #[arg(long, value_name = "FILE")]
    default_art: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() {
    let args = Args::parse();

    // Log output would scribble over the display
    let default_filter = if args.no_display { "info" } else { "off" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let overrides = Config {
        source: args.source.clone(),
        record_seconds: args.record_seconds,
        refresh_seconds: args.refresh,
        song_file: args.song_file.clone(),
        album_art: args.album_art.clone(),
        default_album_art: args.default_art.clone(),
        ..Config::new()
    };
    let (config, settings) = match cli::load_settings(&args.common, &overrides) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    if args.common.show_config {
        config.print("Effective settings");
        return;
    }

    let stop = Arc::new(AtomicBool::new(false));

    if args.no_capture {
        run_display(&settings, &stop);
        return;
    }

    let producer = match build_producer(&settings) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if args.no_display {
        println!("Recognizing from {} every {}s. Press Ctrl+C to stop.", settings.source, settings.record_seconds);
        producer.run(&stop);
        return;
    }

    let producer_stop = Arc::clone(&stop);
    thread::spawn(move || producer.run(&producer_stop));

    // Returning ends the producer thread along with the process
    run_display(&settings, &stop);
}

fn build_producer(settings: &Settings) -> Result<Producer, String> {
    let recognizer = create_recognizer(settings).map_err(|e| format!("Configuration error: {}", e))?;
    Producer::new(recognizer, settings).map_err(|e| format!("Capture error: {}", e))
}

fn run_display(settings: &Settings, stop: &AtomicBool) {
    let mut kiosk = Kiosk::new(
        settings.song_file.clone(),
        settings.default_album_art.clone(),
        settings.refresh,
    );
    if let Err(e) = kiosk.run(stop) {
        eprintln!("Display error: {}", e);
        process::exit(1);
    }
}
