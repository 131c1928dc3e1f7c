//! Recognize one audio file and write its ID3 tags.
//!
//! Usage:
//!     tag_file [--rename] [--backend shazam|acrcloud] [FILE]
//!
//! Without FILE the path is asked for on stdin.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use songtag::cli::{self, CommonArgs};
use songtag::{create_recognizer, Config, FileOutcome, Pipeline, PipelineOptions, TagWriter};

#[derive(Parser, Debug)]
#[command(name = "tag_file")]
#[command(about = "Recognize a song and write title, artist, album, year and cover into its tags")]
#[command(version)]
struct Args {
    /// Audio file to tag
    file: Option<PathBuf>,

    /// Rename the file to "artist - title" after tagging
    #[arg(long)]
    rename: bool,

    #[command(flatten)]
    common: CommonArgs,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let overrides = Config {
        rename: args.rename.then_some(true),
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

    let file = match args.file {
        Some(file) => file,
        None => match cli::prompt_path("Path to the audio file:") {
            Ok(Some(file)) => file,
            Ok(None) => {
                eprintln!("No file given.");
                process::exit(1);
            }
            Err(e) => {
                eprintln!("Could not read input: {}", e);
                process::exit(1);
            }
        },
    };
    if !file.is_file() {
        eprintln!("File not found: {}", file.display());
        process::exit(1);
    }

    let recognizer = match create_recognizer(&settings) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    // A single file is always recognized
    let options = PipelineOptions {
        skip_tagged: false,
        force_recognition: true,
        ..settings.pipeline
    };
    let mut pipeline = Pipeline::new(
        recognizer.as_ref(),
        TagWriter::new(settings.http_agent()),
        options,
    );

    println!("Recognizing {} with {}...", file.display(), recognizer.name());
    let report = pipeline.process_file(&file);

    if let Some(metadata) = &report.metadata {
        println!();
        println!("{}", metadata.summary());
        println!();
    }
    println!("{}", report);

    match report.outcome {
        FileOutcome::Failed(_) | FileOutcome::NotRecognized => process::exit(1),
        _ => {}
    }
}
