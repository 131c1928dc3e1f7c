pub mod acrcloud;
pub mod artwork;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod kiosk;
pub mod metadata;
pub mod now_playing;
pub mod pipeline;
pub mod preprocess;
pub mod rate_limiter;
pub mod recognizer;
pub mod renamer;
pub mod shazam;
pub mod tagger;
pub mod wavfile;

pub use acrcloud::AcrCloudClient;
pub use config::{Backend, Config, Settings};
pub use error::{PipelineError, RecognizeError, TagError};
pub use metadata::{CoverArt, SongMetadata};
pub use now_playing::{NowPlaying, Producer};
pub use pipeline::{BatchSummary, FileOutcome, FileReport, Pipeline, PipelineOptions};
pub use recognizer::{create_recognizer, Recognition, Recognizer};
pub use shazam::SongrecClient;
pub use tagger::TagWriter;
