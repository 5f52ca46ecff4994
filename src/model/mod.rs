//! Core records flowing through a cleaning run.
//!
//! Defines [`TrackRecord`] and [`ImageRecord`], the two kinds of
//! [`Entry`] held by the changes document, plus the per-album
//! [`AlbumContext`] derived before extraction.

use std::path::PathBuf;

/// Whether a track is a loose single or part of an album directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Single,
    Album,
}

/// Editable tag values for one audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    /// Present exactly when the track belongs to an album batch
    pub album_artist: Option<String>,
    pub artist: String,
    pub album: String,
    pub title: String,
    /// Four-digit year, or empty
    pub date: String,
    pub track_num: Option<u32>,
    pub source_path: PathBuf,
}

impl TrackRecord {
    pub fn category(&self) -> Category {
        if self.album_artist.is_some() {
            Category::Album
        } else {
            Category::Single
        }
    }
}

/// A cover image queued for relocation next to its album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub source_path: PathBuf,
}

/// One block of the changes document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Track(TrackRecord),
    Image(ImageRecord),
}

impl Entry {
    pub fn source_path(&self) -> &PathBuf {
        match self {
            Entry::Track(t) => &t.source_path,
            Entry::Image(i) => &i.source_path,
        }
    }
}

/// Facts about an album directory gathered in the first pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumContext {
    /// Sum of all track durations
    pub total_secs: u64,
    /// Raw artist tags, stably sorted by length
    pub artist_tags: Vec<String>,
    /// Chosen album artist already uses ", " as its separator
    pub artist_has_comma: bool,
}

impl AlbumContext {
    /// Build the context from raw `(artist, duration)` pairs.
    pub fn from_tracks<I>(tracks: I) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut total_secs = 0;
        let mut artist_tags = Vec::new();
        for (artist, secs) in tracks {
            total_secs += secs;
            artist_tags.push(artist);
        }
        // Vec::sort_by_key is stable: equal lengths keep file order
        artist_tags.sort_by_key(|a| a.chars().count());

        let mut ctx = Self {
            total_secs,
            artist_tags,
            artist_has_comma: false,
        };
        ctx.artist_has_comma = ctx.album_artist().contains(", ");
        ctx
    }

    /// The shortest non-empty artist tag, on the assumption that it carries
    /// no featured artists. Empty when every tag is empty.
    pub fn album_artist(&self) -> &str {
        self.artist_tags
            .iter()
            .find(|a| !a.trim().is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_follows_album_artist() {
        let mut record = crate::test_utils::mock_track_record();
        assert_eq!(record.category(), Category::Single);
        record.album_artist = Some("band".to_string());
        assert_eq!(record.category(), Category::Album);
    }

    #[test]
    fn test_album_artist_is_shortest() {
        let ctx = AlbumContext::from_tracks(vec![
            ("Band feat. Guest".to_string(), 200),
            ("Band".to_string(), 300),
            ("Band & Friend".to_string(), 100),
        ]);
        assert_eq!(ctx.album_artist(), "Band");
        assert_eq!(ctx.total_secs, 600);
        assert!(!ctx.artist_has_comma);
    }

    #[test]
    fn test_album_artist_tie_keeps_file_order() {
        let ctx = AlbumContext::from_tracks(vec![
            ("Abcd".to_string(), 1),
            ("Wxyz".to_string(), 1),
        ]);
        assert_eq!(ctx.album_artist(), "Abcd");
    }

    #[test]
    fn test_album_artist_comma_detected() {
        let ctx = AlbumContext::from_tracks(vec![
            ("Crosby, Stills, Nash & Young".to_string(), 1),
            ("Crosby, Stills & Nash".to_string(), 1),
        ]);
        assert_eq!(ctx.album_artist(), "Crosby, Stills & Nash");
        assert!(ctx.artist_has_comma);
    }

    #[test]
    fn test_album_artist_skips_untagged_tracks() {
        let ctx = AlbumContext::from_tracks(vec![
            ("Band".to_string(), 1),
            (String::new(), 1),
        ]);
        assert_eq!(ctx.album_artist(), "Band");
    }

    #[test]
    fn test_album_artist_all_empty() {
        let ctx = AlbumContext::from_tracks(vec![(String::new(), 10)]);
        assert_eq!(ctx.album_artist(), "");
    }
}
