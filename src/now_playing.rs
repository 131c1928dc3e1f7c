//! The shared "now playing" file and the capture loop that feeds it.
//!
//! The producer records a short clip, recognizes it and overwrites the song
//! file with a small JSON object. The kiosk polls the same file. The two sides
//! only share the file: writes replace it atomically, and readers fall back to
//! [`NowPlaying::fallback`] whenever it is missing or unreadable.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::artwork;
use crate::capture::{self, CaptureSource};
use crate::config::Settings;
use crate::error::CaptureError;
use crate::metadata::SongMetadata;
use crate::recognizer::{recognize_or_default, Recognizer};

/// One record of the shared song file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    /// Local image path, absolute or relative to the working directory.
    pub album_art: String,
}

impl NowPlaying {
    pub fn from_metadata(metadata: &SongMetadata, album_art: &Path) -> Self {
        NowPlaying {
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            album: metadata.album.clone(),
            year: metadata.year.clone(),
            album_art: album_art.display().to_string(),
        }
    }

    /// Shown when the song file cannot be read.
    pub fn fallback(default_album_art: &Path) -> Self {
        NowPlaying {
            title: "Error".to_string(),
            artist: "Error loading data".to_string(),
            album: "The song might not be recognized yet".to_string(),
            year: "Check the data.song file".to_string(),
            album_art: default_album_art.display().to_string(),
        }
    }
}

/// Replace `path` with `record` through a temp file in the same directory.
pub fn write_now_playing(path: &Path, record: &NowPlaying) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, record)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn read_now_playing(path: &Path) -> io::Result<NowPlaying> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Read the song file, substituting the fallback record on any failure.
pub fn read_or_fallback(path: &Path, default_album_art: &Path) -> NowPlaying {
    match read_now_playing(path) {
        Ok(record) => record,
        Err(e) => {
            warn!("Error reading song data from {}: {}", path.display(), e);
            NowPlaying::fallback(default_album_art)
        }
    }
}

/// Delete the song file. A file that is already gone is not an error.
pub fn remove_now_playing(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Capture, recognize and publish, forever or until stopped.
pub struct Producer {
    recognizer: Box<dyn Recognizer + Send>,
    agent: ureq::Agent,
    source: CaptureSource,
    record_seconds: u32,
    clip_path: PathBuf,
    song_file: PathBuf,
    album_art: PathBuf,
    default_album_art: PathBuf,
    retry_delay: Duration,
}

impl Producer {
    pub fn new(
        recognizer: Box<dyn Recognizer + Send>,
        settings: &Settings,
    ) -> Result<Self, CaptureError> {
        Ok(Producer {
            recognizer,
            agent: settings.http_agent(),
            source: capture::parse_source(&settings.source)?,
            record_seconds: settings.record_seconds,
            clip_path: std::env::temp_dir().join(format!("songtag-{}.wav", std::process::id())),
            song_file: settings.song_file.clone(),
            album_art: settings.album_art.clone(),
            default_album_art: settings.default_album_art.clone(),
            retry_delay: settings.refresh,
        })
    }

    /// Record one clip and publish what it was recognized as.
    pub fn run_cycle(&self) -> Result<NowPlaying, CaptureError> {
        let recorded = capture::record_clip(&self.source, self.record_seconds, &self.clip_path);
        if let Err(e) = recorded {
            remove_clip(&self.clip_path);
            return Err(e);
        }
        Ok(self.process_clip(&self.clip_path)?)
    }

    /// Recognize `clip`, write the song file and delete the clip.
    pub fn process_clip(&self, clip: &Path) -> io::Result<NowPlaying> {
        let metadata = recognize_or_default(self.recognizer.as_ref(), clip);
        remove_clip(clip);
        self.publish(&metadata)
    }

    /// Write the record for `metadata`, downloading its cover to the album
    /// art path. Without a usable cover the default art is referenced.
    pub fn publish(&self, metadata: &SongMetadata) -> io::Result<NowPlaying> {
        let art = match metadata.cover_url() {
            Some(url) => match artwork::download_cover(&self.agent, url, &self.album_art) {
                Ok(()) => self.album_art.as_path(),
                Err(e) => {
                    warn!("Failed to retrieve the cover, default will be used: {}", e);
                    self.default_album_art.as_path()
                }
            },
            None => self.default_album_art.as_path(),
        };

        let record = NowPlaying::from_metadata(metadata, art);
        write_now_playing(&self.song_file, &record)?;
        if metadata.is_unknown() {
            info!("Could not recognize track");
        } else {
            info!("Recognized: {} [{}, {}]", metadata, metadata.album, metadata.year);
        }
        Ok(record)
    }

    /// Loop until `stop` is set. Capture failures are logged and retried
    /// after a delay; recognition failures publish the unknown record.
    pub fn run(&self, stop: &AtomicBool) {
        info!("Producer started ({} via {:?})", self.recognizer.name(), self.source);
        while !stop.load(Ordering::Relaxed) {
            match self.run_cycle() {
                Ok(record) => debug!("Published {:?}", record),
                Err(e) => {
                    error!("Capture failed: {}", e);
                    sleep_unless_stopped(self.retry_delay, stop);
                }
            }
        }
        remove_clip(&self.clip_path);
        info!("Producer stopped");
    }
}

fn remove_clip(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Could not delete {}: {}", path.display(), e);
        }
    }
}

/// Sleep for `duration` in short steps, returning early once `stop` is set.
pub fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(100)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::RecognizeError;
    use crate::metadata::CoverArt;
    use crate::recognizer::Recognition;
    use pretty_assertions::assert_eq;

    struct Always(Option<SongMetadata>);

    impl Recognizer for Always {
        fn name(&self) -> &str {
            "always"
        }

        fn recognize(&self, _path: &Path) -> Result<Recognition, RecognizeError> {
            Ok(match &self.0 {
                Some(m) => Recognition::Recognized(m.clone()),
                None => Recognition::NotRecognized,
            })
        }
    }

    fn producer(dir: &Path, recognized: Option<SongMetadata>) -> Producer {
        let config = Config {
            song_file: Some(dir.join("data.song").display().to_string()),
            album_art: Some(dir.join("album-cover.png").display().to_string()),
            default_album_art: Some(dir.join("default.png").display().to_string()),
            http_timeout_secs: Some(2),
            ..Config::new()
        };
        let settings = config.resolve().unwrap();
        Producer::new(Box::new(Always(recognized)), &settings).unwrap()
    }

    fn song() -> SongMetadata {
        SongMetadata {
            title: "Song".to_string(),
            artist: "Band".to_string(),
            album: "Record".to_string(),
            year: "1999".to_string(),
            cover_art: None,
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.song");
        let record = NowPlaying::from_metadata(&song(), Path::new("album-cover.png"));
        write_now_playing(&path, &record).unwrap();
        assert_eq!(read_now_playing(&path).unwrap(), record);

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["album_art"], "album-cover.png");
        assert_eq!(raw["year"], "1999");
    }

    #[test]
    fn test_overwrite_replaces_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.song");
        let first = NowPlaying::from_metadata(&song(), Path::new("a.png"));
        write_now_playing(&path, &first).unwrap();
        let second = NowPlaying::from_metadata(&SongMetadata::unknown(), Path::new("b.png"));
        write_now_playing(&path, &second).unwrap();
        assert_eq!(read_now_playing(&path).unwrap(), second);
    }

    #[test]
    fn test_unreadable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.song");
        let default_art = Path::new("album-cover-default.png");

        let missing = read_or_fallback(&path, default_art);
        assert_eq!(missing, NowPlaying::fallback(default_art));
        assert_eq!(missing.title, "Error");
        assert_eq!(missing.album_art, "album-cover-default.png");

        fs::write(&path, "{\"title\": \"half").unwrap();
        assert_eq!(read_or_fallback(&path, default_art), NowPlaying::fallback(default_art));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.song");
        fs::write(&path, "{}").unwrap();
        remove_now_playing(&path).unwrap();
        assert!(!path.exists());
        remove_now_playing(&path).unwrap();
    }

    #[test]
    fn test_cycle_recognized_without_cover_uses_default_art() {
        let dir = tempfile::tempdir().unwrap();
        let p = producer(dir.path(), Some(song()));
        let clip = dir.path().join("mic.wav");
        fs::write(&clip, b"RIFF").unwrap();

        let record = p.process_clip(&clip).unwrap();
        assert!(!clip.exists());
        assert_eq!(record.title, "Song");
        assert_eq!(record.album_art, dir.path().join("default.png").display().to_string());
        assert_eq!(read_now_playing(&dir.path().join("data.song")).unwrap(), record);
    }

    #[test]
    fn test_cycle_failed_cover_download_uses_default_art() {
        let dir = tempfile::tempdir().unwrap();
        let mut recognized = song();
        recognized.cover_art = Some(CoverArt::Url("http://127.0.0.1:9/c.jpg".to_string()));
        let p = producer(dir.path(), Some(recognized));
        let clip = dir.path().join("mic.wav");
        fs::write(&clip, b"RIFF").unwrap();

        let record = p.process_clip(&clip).unwrap();
        assert_eq!(record.artist, "Band");
        assert_eq!(record.album_art, dir.path().join("default.png").display().to_string());
    }

    #[test]
    fn test_cycle_not_recognized_writes_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let p = producer(dir.path(), None);
        let clip = dir.path().join("mic.wav");
        fs::write(&clip, b"RIFF").unwrap();

        let record = p.process_clip(&clip).unwrap();
        assert!(!clip.exists());
        assert_eq!(
            record,
            NowPlaying::from_metadata(&SongMetadata::unknown(), &dir.path().join("default.png"))
        );
    }

    #[test]
    fn test_sleep_returns_when_stopped() {
        let stop = AtomicBool::new(true);
        let start = Instant::now();
        sleep_unless_stopped(Duration::from_secs(10), &stop);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
