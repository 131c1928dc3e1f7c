//! ID3v2 tag writing.
//!
//! Sets TIT2/TPE1/TALB/TDRC from a [`SongMetadata`] and embeds the cover as
//! an APIC front-cover frame. The cover is best-effort: when it cannot be
//! fetched the text frames are still written.
//!
//! Files are opened in relaxed mode. A TDRC frame that is not a timestamp
//! (the "Unknown" year, or what other taggers leave behind) is skipped on
//! read instead of making the whole file unreadable, and the next write
//! replaces it.

use std::fs;
use std::path::Path;

use lofty::config::{ParseOptions, ParsingMode, WriteOptions};
use lofty::file::{TaggedFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt, TagType};
use log::{info, warn};

use crate::artwork;
use crate::error::TagError;
use crate::metadata::{CoverArt, SongMetadata};

/// What a successful tag write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagReport {
    pub cover_embedded: bool,
}

/// Writes tags, downloading cover art with the given HTTP agent.
pub struct TagWriter {
    agent: ureq::Agent,
}

impl TagWriter {
    pub fn new(agent: ureq::Agent) -> Self {
        TagWriter { agent }
    }

    /// Open `path`, fetch the record's cover and persist all fields.
    ///
    /// The file is opened before any download so corrupt files fail fast.
    pub fn write(&self, path: &Path, metadata: &SongMetadata) -> Result<TagReport, TagError> {
        let mut tagged_file = open_tagged(path)?;
        let cover = self.cover_for(metadata);
        apply_tags(&mut tagged_file, path, metadata, cover)
    }

    fn cover_for(&self, metadata: &SongMetadata) -> Option<Vec<u8>> {
        match &metadata.cover_art {
            Some(CoverArt::Url(url)) => match artwork::fetch_cover(&self.agent, url) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("Could not download cover art, writing tags without it: {}", e);
                    None
                }
            },
            Some(CoverArt::File(path)) => match fs::read(path) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("Could not read cover art {}: {}", path.display(), e);
                    None
                }
            },
            None => {
                info!("No cover to add");
                None
            }
        }
    }
}

/// Write the text fields and, when given, the cover image to `path`.
pub fn write_tags(
    path: &Path,
    metadata: &SongMetadata,
    cover: Option<Vec<u8>>,
) -> Result<TagReport, TagError> {
    let mut tagged_file = open_tagged(path)?;
    apply_tags(&mut tagged_file, path, metadata, cover)
}

/// Existing non-empty title and artist, if the file carries both.
pub fn read_title_artist(path: &Path) -> Result<Option<(String, String)>, TagError> {
    let tagged_file = open_tagged(path)?;
    let tag = match tagged_file
        .tag(TagType::Id3v2)
        .or_else(|| tagged_file.primary_tag())
    {
        Some(tag) => tag,
        None => return Ok(None),
    };

    let title = tag.title().map(|t| t.trim().to_string()).unwrap_or_default();
    let artist = tag.artist().map(|a| a.trim().to_string()).unwrap_or_default();
    if title.is_empty() || artist.is_empty() {
        return Ok(None);
    }
    Ok(Some((title, artist)))
}

fn open_tagged(path: &Path) -> Result<TaggedFile, TagError> {
    let open_error = |e: lofty::error::LoftyError| TagError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    Probe::open(path)
        .map_err(open_error)?
        .options(parse_options())
        .read()
        .map_err(open_error)
}

fn parse_options() -> ParseOptions {
    ParseOptions::new().parsing_mode(ParsingMode::Relaxed)
}

fn apply_tags(
    tagged_file: &mut TaggedFile,
    path: &Path,
    metadata: &SongMetadata,
    cover: Option<Vec<u8>>,
) -> Result<TagReport, TagError> {
    // Reuse the existing ID3v2 tag, or add one
    if tagged_file.tag(TagType::Id3v2).is_none() {
        tagged_file.insert_tag(Tag::new(TagType::Id3v2));
    }
    let tag = tagged_file
        .tag_mut(TagType::Id3v2)
        .ok_or_else(|| TagError::Unsupported(path.to_path_buf()))?;

    tag.set_title(metadata.title.clone());
    tag.set_artist(metadata.artist.clone());
    tag.set_album(metadata.album.clone());
    tag.insert_text(ItemKey::RecordingDate, metadata.year.clone());

    let cover_embedded = match cover {
        Some(data) => {
            tag.remove_picture_type(PictureType::CoverFront);
            tag.push_picture(Picture::new_unchecked(
                PictureType::CoverFront,
                Some(MimeType::Jpeg),
                Some("Cover".to_string()),
                data,
            ));
            true
        }
        None => false,
    };

    tag.save_to_path(path, WriteOptions::default())
        .map_err(|e| TagError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(TagReport { cover_embedded })
}
