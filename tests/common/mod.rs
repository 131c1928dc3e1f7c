//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use songtag::{RecognizeError, Recognition, Recognizer, SongMetadata};

/// Write a short run of silent MPEG-1 Layer III frames (128 kbps, 44.1 kHz).
pub fn write_silent_mp3(path: &Path) {
    let mut frame = vec![0u8; 417];
    frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x44]);
    let data: Vec<u8> = frame.iter().copied().cycle().take(417 * 40).collect();
    fs::write(path, data).unwrap();
}

pub fn song(title: &str, artist: &str) -> SongMetadata {
    SongMetadata::from_parts(
        Some(title.to_string()),
        Some(artist.to_string()),
        Some("Album".to_string()),
        Some("2020".to_string()),
        None,
    )
}

/// Answers by file stem; unknown stems are "not recognized".
pub struct StubRecognizer {
    answers: HashMap<String, SongMetadata>,
    pub calls: Mutex<Vec<String>>,
}

impl StubRecognizer {
    pub fn new(answers: &[(&str, SongMetadata)]) -> Self {
        StubRecognizer {
            answers: answers
                .iter()
                .map(|(stem, m)| (stem.to_string(), m.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Recognizer for StubRecognizer {
    fn name(&self) -> &str {
        "stub"
    }

    fn recognize(&self, path: &Path) -> Result<Recognition, RecognizeError> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(stem.clone());
        if stem.starts_with("offline") {
            return Err(RecognizeError::Transport("connection reset".to_string()));
        }
        Ok(match self.answers.get(&stem) {
            Some(m) => Recognition::Recognized(m.clone()),
            None => Recognition::NotRecognized,
        })
    }
}
