//! Recognize, tag and rename audio files, one at a time or a folder at a time.
//!
//! The three behaviours a run can toggle (renaming, skipping files that are
//! already tagged, forcing recognition) are options of a single [`Pipeline`].
//! Every file yields one [`FileReport`]; a failing file never stops a batch.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{PipelineError, RecognizeError};
use crate::metadata::SongMetadata;
use crate::rate_limiter::RateLimiter;
use crate::recognizer::{Recognition, Recognizer};
use crate::renamer::{self, RenameOutcome};
use crate::tagger::{self, TagWriter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Rename files to "artist - title.ext" after tagging.
    pub rename: bool,
    /// Skip recognition for files that already carry a title and an artist.
    pub skip_tagged: bool,
    /// Always recognize, even when `skip_tagged` is set.
    pub force_recognition: bool,
}

impl PipelineOptions {
    fn checks_existing_tags(&self) -> bool {
        self.skip_tagged && !self.force_recognition
    }
}

/// What happened to one file.
#[derive(Debug)]
pub enum FileOutcome {
    Tagged {
        cover_embedded: bool,
        renamed_to: Option<PathBuf>,
    },
    /// Existing tags were kept; only the renamer ran (when enabled).
    AlreadyTagged { renamed_to: Option<PathBuf> },
    NotRecognized,
    Failed(PipelineError),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
    /// The recognized record, when recognition ran and matched.
    pub metadata: Option<SongMetadata>,
}

impl FileReport {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, FileOutcome::Failed(_))
    }

    /// Where the file lives after processing.
    pub fn final_path(&self) -> &Path {
        let renamed = match &self.outcome {
            FileOutcome::Tagged { renamed_to, .. } => renamed_to.as_deref(),
            FileOutcome::AlreadyTagged { renamed_to } => renamed_to.as_deref(),
            _ => None,
        };
        renamed.unwrap_or(&self.path)
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());

        match &self.outcome {
            FileOutcome::Tagged {
                cover_embedded,
                renamed_to,
            } => {
                write!(f, "✓ {}", name)?;
                if let Some(m) = &self.metadata {
                    write!(f, ": {}", m)?;
                }
                if !cover_embedded {
                    write!(f, " (no cover)")?;
                }
                if let Some(new_path) = renamed_to {
                    write!(f, " -> {}", new_path.display())?;
                }
                Ok(())
            }
            FileOutcome::AlreadyTagged { renamed_to } => {
                write!(f, "= {}: already tagged", name)?;
                if let Some(new_path) = renamed_to {
                    write!(f, " -> {}", new_path.display())?;
                }
                Ok(())
            }
            FileOutcome::NotRecognized => write!(f, "? {}: not recognized", name),
            FileOutcome::Failed(e) => write!(f, "✗ {}: {}", name, e),
        }
    }
}

/// Per-outcome counts over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub tagged: usize,
    pub already_tagged: usize,
    pub not_recognized: usize,
    pub failed: usize,
    pub renamed: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let mut summary = BatchSummary::default();
        for report in reports {
            match &report.outcome {
                FileOutcome::Tagged { renamed_to, .. } => {
                    summary.tagged += 1;
                    summary.renamed += renamed_to.is_some() as usize;
                }
                FileOutcome::AlreadyTagged { renamed_to } => {
                    summary.already_tagged += 1;
                    summary.renamed += renamed_to.is_some() as usize;
                }
                FileOutcome::NotRecognized => summary.not_recognized += 1,
                FileOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.tagged + self.already_tagged + self.not_recognized + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} tagged, {} already tagged, {} not recognized, {} failed, {} renamed",
            self.total(),
            self.tagged,
            self.already_tagged,
            self.not_recognized,
            self.failed,
            self.renamed
        )
    }
}

/// Files under `dir` whose extension matches one of `extensions`
/// (case-insensitive, without the dot), in sorted path order.
///
/// Only an unreadable `dir` is an error. Subfolders that cannot be read are
/// logged and skipped.
pub fn find_audio_files(dir: &Path, extensions: &[String], recursive: bool) -> io::Result<Vec<PathBuf>> {
    fs::read_dir(dir)?;

    let mut walker = WalkDir::new(dir).min_depth(1).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| extensions.iter().any(|want| want.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

pub struct Pipeline<'a> {
    recognizer: &'a dyn Recognizer,
    tag_writer: TagWriter,
    options: PipelineOptions,
    rate_limiter: RateLimiter,
}

impl<'a> Pipeline<'a> {
    pub fn new(recognizer: &'a dyn Recognizer, tag_writer: TagWriter, options: PipelineOptions) -> Self {
        Pipeline {
            recognizer,
            tag_writer,
            options,
            rate_limiter: RateLimiter::new(recognizer.name(), Duration::ZERO),
        }
    }

    /// Keep consecutive recognition requests at least `interval` apart.
    /// Backoff on throttling applies whatever the interval.
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.rate_limiter = RateLimiter::new(self.recognizer.name(), interval);
        self
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Run recognition, tagging and renaming for one file.
    pub fn process_file(&mut self, path: &Path) -> FileReport {
        info!("Processing {}", path.display());

        if self.options.checks_existing_tags() {
            match tagger::read_title_artist(path) {
                Ok(Some((title, artist))) => {
                    info!("Already tagged ({} - {}), skipping recognition", artist, title);
                    let renamed_to = self.rename_if_enabled(path, &artist, &title);
                    return FileReport {
                        path: path.to_path_buf(),
                        outcome: FileOutcome::AlreadyTagged { renamed_to },
                        metadata: None,
                    };
                }
                Ok(None) => {}
                // Unreadable tags fall through; the tag write reports the file
                Err(e) => debug!("Could not read existing tags: {}", e),
            }
        }

        let metadata = match self.recognize(path) {
            Ok(Recognition::Recognized(m)) => m,
            Ok(Recognition::NotRecognized) => {
                warn!("Could not recognize {}", path.display());
                return FileReport {
                    path: path.to_path_buf(),
                    outcome: FileOutcome::NotRecognized,
                    metadata: None,
                };
            }
            Err(e) => {
                warn!("Recognition of {} failed: {}", path.display(), e);
                return FileReport {
                    path: path.to_path_buf(),
                    outcome: FileOutcome::Failed(e.into()),
                    metadata: None,
                };
            }
        };
        info!("Recognized: {}", metadata);

        let outcome = match self.tag_writer.write(path, &metadata) {
            Ok(report) => {
                info!("Tags written to {}", path.display());
                FileOutcome::Tagged {
                    cover_embedded: report.cover_embedded,
                    renamed_to: self.rename_if_enabled(path, &metadata.artist, &metadata.title),
                }
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                FileOutcome::Failed(e.into())
            }
        };

        FileReport {
            path: path.to_path_buf(),
            outcome,
            metadata: Some(metadata),
        }
    }

    /// Process every matching file under `dir`. Only a failure to list the
    /// directory is an error; per-file failures are in the reports.
    pub fn process_folder(
        &mut self,
        dir: &Path,
        extensions: &[String],
        recursive: bool,
    ) -> io::Result<Vec<FileReport>> {
        let files = find_audio_files(dir, extensions, recursive)?;
        if files.is_empty() {
            warn!("No matching audio files in {}", dir.display());
        }
        Ok(files.iter().map(|path| self.process_file(path)).collect())
    }

    fn recognize(&mut self, path: &Path) -> Result<Recognition, RecognizeError> {
        self.rate_limiter.pace();
        let result = self.recognizer.recognize(path);
        self.rate_limiter.observe(&result);
        result
    }

    fn rename_if_enabled(&self, path: &Path, artist: &str, title: &str) -> Option<PathBuf> {
        if !self.options.rename {
            return None;
        }
        match renamer::rename_to_metadata(path, artist, title) {
            RenameOutcome::Renamed(new_path) => Some(new_path),
            RenameOutcome::Unchanged | RenameOutcome::Failed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn write_silent_mp3(path: &Path) {
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x44]);
        let data: Vec<u8> = frame.iter().copied().cycle().take(417 * 40).collect();
        fs::write(path, data).unwrap();
    }

    /// Recognizes every file as the same track and counts calls.
    struct Fixed {
        calls: Cell<usize>,
    }

    impl Fixed {
        fn new() -> Self {
            Fixed { calls: Cell::new(0) }
        }
    }

    impl Recognizer for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _path: &Path) -> Result<Recognition, RecognizeError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Recognition::Recognized(SongMetadata::from_parts(
                Some("Title".to_string()),
                Some("Artist".to_string()),
                Some("Album".to_string()),
                Some("2001".to_string()),
                None,
            )))
        }
    }

    struct Unreachable;

    impl Recognizer for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        fn recognize(&self, _path: &Path) -> Result<Recognition, RecognizeError> {
            Err(RecognizeError::Transport("connection refused".to_string()))
        }
    }

    struct Throttled;

    impl Recognizer for Throttled {
        fn name(&self) -> &str {
            "throttled"
        }

        fn recognize(&self, _path: &Path) -> Result<Recognition, RecognizeError> {
            Err(RecognizeError::RateLimited("quota".to_string()))
        }
    }

    struct Nothing;

    impl Recognizer for Nothing {
        fn name(&self) -> &str {
            "nothing"
        }

        fn recognize(&self, _path: &Path) -> Result<Recognition, RecognizeError> {
            Ok(Recognition::NotRecognized)
        }
    }

    fn pipeline<'a>(recognizer: &'a dyn Recognizer, options: PipelineOptions) -> Pipeline<'a> {
        Pipeline::new(recognizer, TagWriter::new(ureq::agent()), options)
    }

    #[test]
    fn test_find_audio_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.MP3", "c.txt", "d.flac"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("e.mp3"), b"x").unwrap();

        let exts = vec!["mp3".to_string()];
        let flat = find_audio_files(dir.path(), &exts, false).unwrap();
        assert_eq!(flat, vec![dir.path().join("a.MP3"), dir.path().join("b.mp3")]);

        let deep = find_audio_files(dir.path(), &exts, true).unwrap();
        assert_eq!(deep.len(), 3);
        assert_eq!(deep[2], dir.path().join("sub").join("e.mp3"));

        assert!(find_audio_files(&dir.path().join("missing"), &exts, false).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subfolder_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden.mp3"), b"x").unwrap();
        fs::create_dir(dir.path().join("open")).unwrap();
        fs::write(dir.path().join("open").join("b.mp3"), b"x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permissions do not apply to root
        let readable = fs::read_dir(&locked).is_ok();
        let found = find_audio_files(dir.path(), &["mp3".to_string()], true);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if readable {
            return;
        }

        assert_eq!(
            found.unwrap(),
            vec![dir.path().join("a.mp3"), dir.path().join("open").join("b.mp3")]
        );
    }

    #[test]
    fn test_tag_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track01.mp3");
        write_silent_mp3(&path);

        let recognizer = Fixed::new();
        let options = PipelineOptions {
            rename: true,
            ..Default::default()
        };
        let report = pipeline(&recognizer, options).process_file(&path);

        let expected = dir.path().join("Artist - Title.mp3");
        match &report.outcome {
            FileOutcome::Tagged { renamed_to, cover_embedded } => {
                assert_eq!(renamed_to.as_deref(), Some(expected.as_path()));
                assert!(!cover_embedded);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(report.final_path(), expected.as_path());
        assert!(!path.exists());
        assert_eq!(
            tagger::read_title_artist(&expected).unwrap(),
            Some(("Title".to_string(), "Artist".to_string()))
        );
    }

    #[test]
    fn test_skip_tagged_and_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.mp3");
        write_silent_mp3(&path);

        let recognizer = Fixed::new();
        let skip = PipelineOptions {
            skip_tagged: true,
            ..Default::default()
        };

        // First pass has nothing to skip
        let report = pipeline(&recognizer, skip).process_file(&path);
        assert!(matches!(report.outcome, FileOutcome::Tagged { .. }));
        assert_eq!(recognizer.calls.get(), 1);

        let report = pipeline(&recognizer, skip).process_file(&path);
        assert!(matches!(report.outcome, FileOutcome::AlreadyTagged { renamed_to: None }));
        assert_eq!(recognizer.calls.get(), 1);

        let forced = PipelineOptions {
            force_recognition: true,
            ..skip
        };
        let report = pipeline(&recognizer, forced).process_file(&path);
        assert!(matches!(report.outcome, FileOutcome::Tagged { .. }));
        assert_eq!(recognizer.calls.get(), 2);
    }

    #[test]
    fn test_not_recognized_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.mp3");
        write_silent_mp3(&path);
        let before = fs::read(&path).unwrap();

        let report = pipeline(&Nothing, PipelineOptions::default()).process_file(&path);
        assert!(matches!(report.outcome, FileOutcome::NotRecognized));
        assert!(!report.is_error());
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_transport_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.mp3");
        write_silent_mp3(&path);

        let report = pipeline(&Unreachable, PipelineOptions::default()).process_file(&path);
        assert!(report.is_error());
        assert!(matches!(
            report.outcome,
            FileOutcome::Failed(PipelineError::Recognition(RecognizeError::Transport(_)))
        ));
    }

    #[test]
    fn test_folder_continues_past_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        write_silent_mp3(&dir.path().join("1.mp3"));
        fs::write(dir.path().join("2.mp3"), b"garbage").unwrap();
        write_silent_mp3(&dir.path().join("3.mp3"));

        let recognizer = Fixed::new();
        let reports = pipeline(&recognizer, PipelineOptions::default())
            .process_folder(dir.path(), &["mp3".to_string()], false)
            .unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(recognizer.calls.get(), 3);
        let errors: Vec<_> = reports.iter().filter(|r| r.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, dir.path().join("2.mp3"));
        assert!(matches!(errors[0].outcome, FileOutcome::Failed(PipelineError::Malformed(_))));

        let summary = BatchSummary::from_reports(&reports);
        assert_eq!(summary.tagged, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn test_request_interval_sets_gap() {
        let recognizer = Fixed::new();
        let p = pipeline(&recognizer, PipelineOptions::default());
        assert_eq!(p.rate_limiter.current_gap(), Duration::ZERO);
        let p = p.with_request_interval(Duration::from_millis(10));
        assert_eq!(p.rate_limiter.current_gap(), Duration::from_millis(10));
    }

    #[test]
    fn test_throttling_slows_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.mp3");
        write_silent_mp3(&path);

        let mut p = pipeline(&Throttled, PipelineOptions::default());
        let report = p.process_file(&path);
        assert!(matches!(
            report.outcome,
            FileOutcome::Failed(PipelineError::Recognition(RecognizeError::RateLimited(_)))
        ));
        assert!(p.rate_limiter.current_gap() > Duration::ZERO);

        // Ordinary failures do not
        let mut p = pipeline(&Unreachable, PipelineOptions::default());
        p.process_file(&path);
        assert_eq!(p.rate_limiter.current_gap(), Duration::ZERO);
    }
}
