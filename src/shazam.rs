//! Shazam song recognition through the `songrec` client.
//!
//! `songrec audio-file-to-recognized-song <file>` fingerprints the file and
//! prints the raw Shazam JSON response on stdout. This module runs it and
//! flattens the response into a [`SongMetadata`].
//!
//! # Example
//! ```no_run
//! use songtag::shazam::SongrecClient;
//! use songtag::Recognizer;
//!
//! let client = SongrecClient::new("songrec");
//! let result = client.recognize(std::path::Path::new("song.mp3"));
//! ```

use std::path::Path;
use std::process::Command;

use log::debug;
use serde_json::Value;

use crate::error::RecognizeError;
use crate::metadata::{CoverArt, SongMetadata};
use crate::recognizer::{Recognition, Recognizer};

/// Runs the `songrec` binary for each recognition.
pub struct SongrecClient {
    program: String,
}

impl SongrecClient {
    pub fn new(program: &str) -> Self {
        SongrecClient {
            program: program.to_string(),
        }
    }
}

impl Recognizer for SongrecClient {
    fn name(&self) -> &str {
        "Shazam (songrec)"
    }

    fn recognize(&self, path: &Path) -> Result<Recognition, RecognizeError> {
        debug!("Running {} on {}", self.program, path.display());

        let output = Command::new(&self.program)
            .arg("audio-file-to-recognized-song")
            .arg(path)
            .output()
            .map_err(|e| RecognizeError::Client(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure_from_stderr(&self.program, &output.status.to_string(), stderr.trim()));
        }

        let json: Value = serde_json::from_slice(&output.stdout)?;
        Ok(parse_response(&json))
    }
}

/// Shazam answers a throttled client with a body songrec cannot decode.
fn failure_from_stderr(program: &str, status: &str, stderr: &str) -> RecognizeError {
    if stderr.contains("Decode") || stderr.contains("expected value") {
        RecognizeError::RateLimited(format!("{} could not decode the Shazam reply", program))
    } else {
        RecognizeError::Client(format!("{} exited with {}: {}", program, status, stderr))
    }
}

/// Parse a Shazam response. A response without a `track` object is a
/// "not recognized" answer, never an error.
pub fn parse_response(raw: &Value) -> Recognition {
    match raw.get("track") {
        Some(track) if track.is_object() => Recognition::Recognized(parse_track(track)),
        _ => Recognition::NotRecognized,
    }
}

/// Flatten a Shazam `track` object. Every path is optional and falls back
/// to "Unknown" (or no cover) when absent.
pub fn parse_track(track: &Value) -> SongMetadata {
    let title = str_field(track, "title");
    let artist = str_field(track, "subtitle");
    let album = section_metadata(track, "Album");
    let year = section_metadata(track, "Released");
    let cover_art = track
        .get("images")
        .and_then(|images| {
            images
                .get("coverart")
                .or_else(|| images.get("coverarthq"))
        })
        .and_then(|v| v.as_str())
        .filter(|url| !url.is_empty())
        .map(|url| CoverArt::Url(url.to_string()));

    SongMetadata::from_parts(title, artist, album, year, cover_art)
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(String::from)
}

/// Text of the item labelled `label` in the first section's metadata list.
fn section_metadata(track: &Value, label: &str) -> Option<String> {
    track
        .get("sections")
        .and_then(|s| s.as_array())
        .and_then(|sections| sections.first())
        .and_then(|section| section.get("metadata"))
        .and_then(|m| m.as_array())
        .and_then(|items| {
            items
                .iter()
                .find(|item| item.get("title").and_then(|t| t.as_str()) == Some(label))
        })
        .and_then(|item| str_field(item, "text"))
}
