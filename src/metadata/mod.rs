//! Audio file tag reading and writing.
//!
//! The rest of the crate talks to tags through the [`TagBackend`] trait so
//! tests can substitute an in-memory implementation. [`LoftyBackend`] is the
//! production implementation built on the lofty crate.

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt, TagType};
use std::path::Path;

use crate::error::{Error, Result};

/// Tag values as found in a file, before any normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTags {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub year: Option<u32>,
    pub track: Option<u32>,
    pub duration_secs: u64,
}

/// Final tag values to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFields {
    pub album_artist: Option<String>,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub year: Option<u32>,
    pub track: Option<u32>,
}

/// ID3v2 revision to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Id3v2Version {
    V23,
    V24,
}

/// Which tag formats a write produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagWriteOptions {
    pub id3v1: bool,
    pub id3v2: Option<Id3v2Version>,
}

impl TagWriteOptions {
    pub fn from_config(tags: &crate::config::TagsConfig) -> Self {
        let version = if tags.id3v2_version == "2.3" {
            Id3v2Version::V23
        } else {
            Id3v2Version::V24
        };
        Self {
            id3v1: tags.write_id3v1,
            id3v2: tags.write_id3v2.then_some(version),
        }
    }
}

/// Tag reader/writer collaborator.
pub trait TagBackend {
    /// Read tags and duration; an error means the file is broken.
    fn read(&self, path: &Path) -> Result<RawTags>;

    /// Remove every existing tag, then write `fields` in the requested formats.
    fn write(&self, path: &Path, fields: &TagFields, options: &TagWriteOptions) -> Result<()>;
}

/// [`TagBackend`] backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyBackend;

impl TagBackend for LoftyBackend {
    fn read(&self, path: &Path) -> Result<RawTags> {
        let tagged_file = Probe::open(path)
            .map_err(|e| Error::metadata(path, format!("failed to open file: {e}")))?
            .read()
            .map_err(|e| Error::metadata(path, format!("failed to read tags: {e}")))?;

        // Get the primary tag, or fall back to the first available tag
        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());

        Ok(RawTags {
            artist: tag.and_then(|t| t.artist().map(|s| s.to_string())),
            album: tag.and_then(|t| t.album().map(|s| s.to_string())),
            title: tag.and_then(|t| t.title().map(|s| s.to_string())),
            year: tag.and_then(|t| t.year()),
            track: tag.and_then(|t| t.track()),
            duration_secs: tagged_file.properties().duration().as_secs(),
        })
    }

    fn write(&self, path: &Path, fields: &TagFields, options: &TagWriteOptions) -> Result<()> {
        for tag_type in [TagType::Id3v1, TagType::Id3v2, TagType::Ape] {
            tag_type
                .remove_from_path(path)
                .map_err(|e| Error::metadata(path, format!("failed to clear {tag_type:?}: {e}")))?;
        }

        if let Some(version) = options.id3v2 {
            let mut tag = Tag::new(TagType::Id3v2);
            fill_tag(&mut tag, fields);
            if let Some(album_artist) = &fields.album_artist {
                tag.insert_text(ItemKey::AlbumArtist, album_artist.clone());
            }
            let write_options = WriteOptions::default().use_id3v23(version == Id3v2Version::V23);
            tag.save_to_path(path, write_options)
                .map_err(|e| Error::metadata(path, format!("failed to write ID3v2: {e}")))?;
        }

        if options.id3v1 {
            let mut tag = Tag::new(TagType::Id3v1);
            fill_tag(&mut tag, fields);
            tag.save_to_path(path, WriteOptions::default())
                .map_err(|e| Error::metadata(path, format!("failed to write ID3v1: {e}")))?;
        }

        Ok(())
    }
}

fn fill_tag(tag: &mut Tag, fields: &TagFields) {
    tag.set_artist(fields.artist.clone());
    tag.set_album(fields.album.clone());
    tag.set_title(fields.title.clone());
    if let Some(year) = fields.year {
        tag.set_year(year);
    }
    if let Some(track) = fields.track {
        tag.set_track(track);
    }
}
