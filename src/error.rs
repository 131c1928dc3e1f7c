//! Error types shared across the recognition, tagging and display modules.

use std::io;
use std::path::PathBuf;

/// Failure talking to a recognition backend.
///
/// None of these abort a batch: the pipeline reports them per file and
/// callers that need a record fall back to [`crate::SongMetadata::unknown`].
#[derive(Debug, thiserror::Error)]
pub enum RecognizeError {
    #[error("HTTP request failed: {0}")]
    Transport(String),
    #[error("service returned status {code}: {message}")]
    Service { code: i64, message: String },
    /// The service is throttling this client.
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("recognition client failed: {0}")]
    Client(String),
    #[error("could not parse service response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("could not prepare sample: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<ureq::Error> for RecognizeError {
    fn from(e: ureq::Error) -> Self {
        RecognizeError::Transport(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("no audio track found")]
    NoAudioTrack,
    #[error("sample too small for identification ({size} bytes)")]
    TooSmall { size: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    /// The file could not be opened or is not a valid audio container.
    #[error("cannot open {path}: {message}")]
    Open { path: PathBuf, message: String },
    #[error("{0} does not support ID3v2 tags")]
    Unsupported(PathBuf),
    #[error("failed to write tags to {path}: {message}")]
    Write { path: PathBuf, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ArtworkError {
    #[error("cover request failed: {0}")]
    Http(String),
    #[error("cover response was empty")]
    Empty,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<ureq::Error> for ArtworkError {
    fn from(e: ureq::Error) -> Self {
        ArtworkError::Http(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to start {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("capture ended after {got} of {expected} bytes")]
    ShortRead { got: usize, expected: usize },
    #[error("unsupported capture source: {0}")]
    UnsupportedSource(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HOME environment variable not set")]
    NoHome,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Why a single file in a batch could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("recognition failed: {0}")]
    Recognition(#[from] RecognizeError),
    /// The audio file itself could not be read or written.
    #[error(transparent)]
    Malformed(#[from] TagError),
}
