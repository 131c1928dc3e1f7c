//! The flat song record produced by every recognition backend.

use std::fmt;
use std::path::PathBuf;

/// Placeholder for any field the service did not return.
pub const UNKNOWN: &str = "Unknown";

/// Where the album artwork for a record lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverArt {
    /// Remote image, fetched on demand.
    Url(String),
    /// Image already on local disk.
    File(PathBuf),
}

/// Title, artist, album, year and cover reference of one recognized track.
///
/// Built fresh from each recognition response and consumed immediately by
/// the tag writer or the now-playing file; nothing is merged or kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub cover_art: Option<CoverArt>,
}

impl SongMetadata {
    /// Record used when nothing could be recognized.
    pub fn unknown() -> Self {
        SongMetadata {
            title: UNKNOWN.to_string(),
            artist: UNKNOWN.to_string(),
            album: UNKNOWN.to_string(),
            year: UNKNOWN.to_string(),
            cover_art: None,
        }
    }

    /// Build a record from optional fields, defaulting each missing or blank
    /// value to [`UNKNOWN`].
    pub fn from_parts(
        title: Option<String>,
        artist: Option<String>,
        album: Option<String>,
        year: Option<String>,
        cover_art: Option<CoverArt>,
    ) -> Self {
        SongMetadata {
            title: or_unknown(title),
            artist: or_unknown(artist),
            album: or_unknown(album),
            year: or_unknown(year),
            cover_art,
        }
    }

    /// Remote cover URL, if the record points at one.
    pub fn cover_url(&self) -> Option<&str> {
        match &self.cover_art {
            Some(CoverArt::Url(url)) => Some(url.as_str()),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.title == UNKNOWN && self.artist == UNKNOWN
    }

    /// Multi-line summary printed by the command-line tools.
    pub fn summary(&self) -> String {
        let cover = match &self.cover_art {
            Some(CoverArt::Url(url)) => url.clone(),
            Some(CoverArt::File(path)) => path.display().to_string(),
            None => "(no cover)".to_string(),
        };
        format!(
            "Title:  {}\nArtist: {}\nAlbum:  {}\nYear:   {}\nCover:  {}",
            self.title, self.artist, self.album, self.year, cover
        )
    }
}

impl fmt::Display for SongMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

fn or_unknown(value: Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNKNOWN.to_string(),
    }
}
