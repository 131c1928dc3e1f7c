//! Recognize and tag every audio file in a folder.
//!
//! Each file is processed on its own: a file that cannot be recognized or
//! opened is reported and the batch moves on.
//!
//! Usage:
//!     tag_folder [--rename] [--skip-tagged] [--force] [--recursive] [--ext mp3] [FOLDER]

use std::path::PathBuf;
use std::process;

use clap::Parser;

use songtag::cli::{self, CommonArgs};
use songtag::pipeline::find_audio_files;
use songtag::{create_recognizer, BatchSummary, Config, Pipeline, TagWriter};

#[derive(Parser, Debug)]
#[command(name = "tag_folder")]
#[command(about = "Recognize and tag all audio files in a folder")]
#[command(version)]
struct Args {
    /// Folder containing the audio files
    folder: Option<PathBuf>,

    /// Rename files to "artist - title" after tagging
    #[arg(long)]
    rename: bool,

    /// Only rename files that already have a title and an artist
    #[arg(long)]
    skip_tagged: bool,

    /// Recognize every file, even with --skip-tagged
    #[arg(long)]
    force: bool,

    /// Descend into subfolders
    #[arg(short, long)]
    recursive: bool,

    /// File extensions to process (repeatable), default mp3
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Minimum milliseconds between two recognition requests
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let overrides = Config {
        rename: args.rename.then_some(true),
        skip_tagged: args.skip_tagged.then_some(true),
        force_recognition: args.force.then_some(true),
        recursive: args.recursive.then_some(true),
        extensions: (!args.extensions.is_empty()).then(|| args.extensions.clone()),
        request_interval_ms: args.interval,
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

    let folder = match args.folder {
        Some(folder) => folder,
        None => match cli::prompt_path("Folder with the audio files:") {
            Ok(Some(folder)) => folder,
            Ok(None) => {
                eprintln!("No folder selected.");
                process::exit(1);
            }
            Err(e) => {
                eprintln!("Could not read input: {}", e);
                process::exit(1);
            }
        },
    };
    if !folder.is_dir() {
        eprintln!("Invalid folder: {}", folder.display());
        process::exit(1);
    }

    let files = match find_audio_files(&folder, &settings.extensions, settings.recursive) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Could not list {}: {}", folder.display(), e);
            process::exit(1);
        }
    };
    if files.is_empty() {
        println!(
            "No {} files found in {}",
            settings.extensions.join("/"),
            folder.display()
        );
        return;
    }

    let recognizer = match create_recognizer(&settings) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    println!("=== Tagging {} file(s) with {} ===", files.len(), recognizer.name());
    println!();

    let mut pipeline = Pipeline::new(
        recognizer.as_ref(),
        TagWriter::new(settings.http_agent()),
        settings.pipeline,
    )
    .with_request_interval(settings.request_interval);

    let mut reports = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        let report = pipeline.process_file(file);
        println!("[{}/{}] {}", i + 1, files.len(), report);
        reports.push(report);
    }

    println!();
    println!("{}", BatchSummary::from_reports(&reports));
}
