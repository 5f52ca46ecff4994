//! Turns raw file tags into the normalized [`TrackRecord`] written to the
//! changes document.
//!
//! Everything is trimmed and lowercased here; casing is restored later by
//! the text rules. Extraction never fails on a missing tag, only on a file
//! the [`TagBackend`] cannot load.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::config::TextConfig;
use crate::error::{Error, Result};
use crate::metadata::{RawTags, TagBackend};
use crate::model::{AlbumContext, TrackRecord};
use crate::rules::roman::roman_to_arabic;

static TRACK_IN_FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d\d?").unwrap());

static EP_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r" [\(\[]?[Ee][Pp][\)\]]?$").unwrap());

/// A standalone "EP" token not used as an abbreviation ("Ep. 2")
static EP_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[Ee][Pp]\b[^.]").unwrap());

static REPEATED_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",{2,}").unwrap());

/// The batch a track is extracted for.
#[derive(Debug, Clone, Copy)]
pub enum Batch<'a> {
    Single,
    Album(&'a AlbumContext),
}

/// Reads and normalizes one file's tags.
#[derive(Debug, Clone)]
pub struct TagExtractor {
    feature: Regex,
    /// Feature marker plus everything after it
    feature_tail: Regex,
    roman_to_arabic: bool,
    ep_detection: bool,
    ep_max_secs: u64,
}

impl TagExtractor {
    pub fn from_config(text: &TextConfig) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| Error::config(format!("text.feature_pattern is invalid: {e}")))
        };
        Ok(Self {
            feature: compile(&text.feature_pattern)?,
            feature_tail: compile(&format!("(?:{}).+", text.feature_pattern))?,
            roman_to_arabic: text.roman_to_arabic,
            ep_detection: text.ep_detection,
            ep_max_secs: text.ep_max_length_secs,
        })
    }

    /// Read `path` through `backend` and normalize its tags.
    pub fn extract(
        &self,
        backend: &dyn TagBackend,
        path: &Path,
        batch: Batch<'_>,
    ) -> Result<TrackRecord> {
        let raw = backend.read(path)?;
        Ok(self.normalize(&raw, path, batch))
    }

    /// Build a record from already-read tags.
    pub fn normalize(&self, raw: &RawTags, path: &Path, batch: Batch<'_>) -> TrackRecord {
        let clean = |tag: &Option<String>| {
            tag.as_deref()
                .map(|t| t.replace(char::is_control, " ").trim().to_lowercase())
                .unwrap_or_default()
        };

        let title = match (&raw.title, self.roman_to_arabic) {
            (Some(title), true) => Some(roman_to_arabic(title)),
            (title, _) => title.clone(),
        };
        let mut title = clean(&title);
        let mut artist = clean(&raw.artist);
        let mut album = clean(&raw.album);

        let date: String = raw
            .year
            .map(|y| y.to_string().chars().take(4).collect())
            .unwrap_or_default();

        let track_num = raw
            .track
            .filter(|&n| n > 0)
            .or_else(|| track_from_filename(path));

        (artist, title) = self.split_features(&artist, &title);

        let album_artist = match batch {
            Batch::Single => None,
            Batch::Album(ctx) => {
                if !ctx.artist_has_comma {
                    artist = artist.replace(", ", ",");
                }
                album = EP_SUFFIX.replace(&album, "").into_owned();
                if self.ep_detection
                    && ctx.total_secs < self.ep_max_secs
                    && !EP_TOKEN.is_match(&album)
                {
                    album.push_str(" EP");
                }
                Some(escape_quotes(&ctx.album_artist().trim().to_lowercase()))
            }
        };

        TrackRecord {
            album_artist,
            artist: escape_quotes(&artist),
            album: escape_quotes(&album),
            title: escape_quotes(&title),
            date,
            track_num,
            source_path: path.to_path_buf(),
        }
    }

    /// Move featured artists out of the title into the comma-separated
    /// artist list. Returns `(artist, title)`; the moved segment is
    /// lowercased.
    pub fn split_features(&self, artist: &str, title: &str) -> (String, String) {
        let mut artist = if self.feature.is_match(artist) {
            self.feature.replace_all(artist, ",").into_owned()
        } else {
            artist.to_string()
        };
        let mut title = title.to_string();

        if let Some(tail) = self.feature_tail.find(&title) {
            let start = tail.start();
            let guests = self.feature.replace_all(tail.as_str(), "");
            let guests = guests
                .trim_end_matches([']', ')', ' '])
                .replace(", ", ",")
                .to_lowercase();
            title.truncate(start);
            artist = format!("{artist},{guests}");
        }

        let artist = REPEATED_COMMA.replace_all(&artist, ",").into_owned();
        (artist, title)
    }
}

/// First one- or two-digit number within the first five characters of the
/// file name.
fn track_from_filename(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_string_lossy();
    let head: String = name.chars().take(5).collect();
    TRACK_IN_FILENAME
        .find(&head)
        .and_then(|m| m.as_str().parse().ok())
        .filter(|&n| n > 0)
}

/// Values are double-quoted, one per line, in the changes document.
fn escape_quotes(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '"' => '\'',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect()
}
