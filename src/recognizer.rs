//! Song recognition with pluggable backends.
//!
//! The [`Recognizer`] trait is the common interface for submitting an audio
//! file to a third-party recognition service. Implementations live in
//! separate modules:
//!
//! * [`crate::shazam::SongrecClient`]
//! * [`crate::acrcloud::AcrCloudClient`]
//!
//! Only one backend is used per run; [`create_recognizer`] picks it from the
//! resolved [`Settings`].

use std::path::Path;

use log::warn;

use crate::acrcloud::AcrCloudClient;
use crate::config::{Backend, Settings};
use crate::error::{ConfigError, RecognizeError};
use crate::metadata::SongMetadata;
use crate::shazam::SongrecClient;

/// Outcome of a successful round trip to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    Recognized(SongMetadata),
    /// The service answered but found no matching track.
    NotRecognized,
}

impl Recognition {
    pub fn into_metadata(self) -> Option<SongMetadata> {
        match self {
            Recognition::Recognized(m) => Some(m),
            Recognition::NotRecognized => None,
        }
    }
}

/// A backend that maps an audio file to catalog metadata.
pub trait Recognizer {
    /// Short display name, e.g. "Shazam (songrec)".
    fn name(&self) -> &str;

    /// Submit the audio at `path`. Returns `Ok(NotRecognized)` when the
    /// service has no match; transport and service failures are errors.
    fn recognize(&self, path: &Path) -> Result<Recognition, RecognizeError>;
}

/// Build the recognizer selected in `settings`. The result is `Send` so the
/// now-playing producer can own it on its own thread.
pub fn create_recognizer(settings: &Settings) -> Result<Box<dyn Recognizer + Send>, ConfigError> {
    match settings.backend {
        Backend::Shazam => Ok(Box::new(SongrecClient::new(&settings.songrec_path))),
        Backend::AcrCloud => {
            let creds = settings.acrcloud.clone().ok_or_else(|| {
                ConfigError::Invalid("ACRCloud credentials are not configured".to_string())
            })?;
            Ok(Box::new(AcrCloudClient::new(creds, settings.http_agent())))
        }
    }
}

/// Recognize `path`, degrading every failure to [`SongMetadata::unknown`].
///
/// Used where a record must always be produced, such as the now-playing loop.
pub fn recognize_or_default(recognizer: &dyn Recognizer, path: &Path) -> SongMetadata {
    match recognizer.recognize(path) {
        Ok(Recognition::Recognized(m)) => m,
        Ok(Recognition::NotRecognized) => {
            warn!("{}: track not recognized", recognizer.name());
            SongMetadata::unknown()
        }
        Err(e) => {
            warn!("{}: could not recognize track: {}", recognizer.name(), e);
            SongMetadata::unknown()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    struct Failing;

    impl Recognizer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn recognize(&self, _path: &Path) -> Result<Recognition, RecognizeError> {
            Err(RecognizeError::Transport("connection refused".to_string()))
        }
    }

    struct Silent;

    impl Recognizer for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        fn recognize(&self, _path: &Path) -> Result<Recognition, RecognizeError> {
            Ok(Recognition::NotRecognized)
        }
    }

    #[test]
    fn test_recognize_or_default_degrades() {
        let path = Path::new("missing.wav");
        assert_eq!(recognize_or_default(&Failing, path), SongMetadata::unknown());
        assert_eq!(recognize_or_default(&Silent, path), SongMetadata::unknown());
    }

    #[test]
    fn test_create_recognizer_picks_backend() {
        let settings = Config::new().resolve().unwrap();
        let recognizer = create_recognizer(&settings).unwrap();
        assert_eq!(recognizer.name(), "Shazam (songrec)");

        let settings = Config {
            backend: Some("acrcloud".to_string()),
            acr_access_key: Some("k".to_string()),
            acr_access_secret: Some("s".to_string()),
            ..Config::new()
        }
        .resolve()
        .unwrap();
        let recognizer = create_recognizer(&settings).unwrap();
        assert_eq!(recognizer.name(), "ACRCloud");
    }

    #[test]
    fn test_into_metadata() {
        assert_eq!(Recognition::NotRecognized.into_metadata(), None);
        let m = SongMetadata::unknown();
        assert_eq!(Recognition::Recognized(m.clone()).into_metadata(), Some(m));
    }
}
