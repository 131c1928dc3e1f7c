//! Rename audio files to "artist - title.ext".
//!
//! Renaming is cosmetic: failures are logged and reported, never propagated.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

/// Characters not allowed in file names on common filesystems.
const INVALID_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The file already has the computed name.
    Unchanged,
    Renamed(PathBuf),
    Failed(String),
}

impl RenameOutcome {
    pub fn new_path(&self) -> Option<&Path> {
        match self {
            RenameOutcome::Renamed(path) => Some(path.as_path()),
            _ => None,
        }
    }
}

/// Remove every invalid character, leaving everything else untouched.
pub fn sanitize_filename(name: &str) -> String {
    name.chars().filter(|c| !INVALID_CHARS.contains(c)).collect()
}

/// "artist - title" plus the original extension, in the file's directory.
pub fn target_path(current: &Path, artist: &str, title: &str) -> PathBuf {
    let mut name = format!("{} - {}", sanitize_filename(artist), sanitize_filename(title));
    if let Some(ext) = current.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    match current.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// First of `path`, `base (1).ext`, `base (2).ext`, ... that does not exist.
pub fn resolve_collision(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut count = 1;
    loop {
        let name = match &ext {
            Some(ext) => format!("{} ({}).{}", stem, count, ext),
            None => format!("{} ({})", stem, count),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        count += 1;
    }
}

/// Rename `current` after the given artist and title.
pub fn rename_to_metadata(current: &Path, artist: &str, title: &str) -> RenameOutcome {
    let target = target_path(current, artist, title);
    if target == current {
        info!("File name already correct: {}", current.display());
        return RenameOutcome::Unchanged;
    }

    let target = resolve_collision(&target);
    match fs::rename(current, &target) {
        Ok(()) => {
            info!("Renamed {} -> {}", current.display(), target.display());
            RenameOutcome::Renamed(target)
        }
        Err(e) => {
            warn!("Could not rename {}: {}", current.display(), e);
            RenameOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_removes_invalid_chars_only() {
        assert_eq!(sanitize_filename(r#"a\b/c*d?e:f"g<h>i|j"#), "abcdefghij");
        assert_eq!(sanitize_filename("AC/DC"), "ACDC");
        assert_eq!(sanitize_filename("Sigur Rós – Hoppípolla (Live) [2008] & co."), "Sigur Rós – Hoppípolla (Live) [2008] & co.");
        assert_eq!(sanitize_filename("???"), "");
    }

    #[test]
    fn test_target_path_keeps_dir_and_extension() {
        let target = target_path(Path::new("/music/track01.MP3"), "AC/DC", "Back: In Black?");
        assert_eq!(target, PathBuf::from("/music/ACDC - Back In Black.MP3"));

        let bare = target_path(Path::new("noext"), "A", "B");
        assert_eq!(bare, PathBuf::from("A - B"));
    }

    #[test]
    fn test_collision_suffixes_increase() {
        let dir = tempfile::tempdir().unwrap();
        let wanted = dir.path().join("X - Y.mp3");
        assert_eq!(resolve_collision(&wanted), wanted);

        fs::write(&wanted, b"a").unwrap();
        let first = resolve_collision(&wanted);
        assert_eq!(first, dir.path().join("X - Y (1).mp3"));

        fs::write(&first, b"b").unwrap();
        assert_eq!(resolve_collision(&wanted), dir.path().join("X - Y (2).mp3"));
    }

    #[test]
    fn test_rename_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("X - Y.mp3");
        fs::write(&existing, b"original").unwrap();

        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let first = rename_to_metadata(&a, "X", "Y");
        assert_eq!(first, RenameOutcome::Renamed(dir.path().join("X - Y (1).mp3")));
        let second = rename_to_metadata(&b, "X", "Y");
        assert_eq!(second, RenameOutcome::Renamed(dir.path().join("X - Y (2).mp3")));

        assert_eq!(fs::read(&existing).unwrap(), b"original");
        assert_eq!(fs::read(dir.path().join("X - Y (1).mp3")).unwrap(), b"a");
        assert_eq!(fs::read(dir.path().join("X - Y (2).mp3")).unwrap(), b"b");
    }

    #[test]
    fn test_rename_noop_when_name_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X - Y.mp3");
        fs::write(&path, b"a").unwrap();
        assert_eq!(rename_to_metadata(&path, "X", "Y"), RenameOutcome::Unchanged);
        assert!(path.exists());
    }

    #[test]
    fn test_rename_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.mp3");
        match rename_to_metadata(&missing, "X", "Y") {
            RenameOutcome::Failed(_) => {}
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
