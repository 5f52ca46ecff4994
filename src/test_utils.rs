//! Test utilities and fixtures for mp3-tidy tests.
//!
//! This module provides in-memory collaborators and record factories to
//! reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use mp3_tidy::test_utils::{MockTagBackend, mock_raw_tags};
//!
//! let backend = MockTagBackend::new();
//! backend.insert("/in/song.mp3", mock_raw_tags());
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cover::ImageTools;
use crate::error::{Error, Result};
use crate::metadata::{RawTags, TagBackend, TagFields, TagWriteOptions};
use crate::model::{ImageRecord, TrackRecord};

/// In-memory [`TagBackend`].
///
/// Reading a path that was never inserted fails like an unreadable file.
/// Writes are only recorded.
#[derive(Default)]
pub struct MockTagBackend {
    files: RefCell<HashMap<PathBuf, RawTags>>,
    writes: RefCell<Vec<(PathBuf, TagFields)>>,
}

impl MockTagBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, tags: RawTags) {
        self.files.borrow_mut().insert(path.into(), tags);
    }

    /// Every write so far, in order.
    pub fn writes(&self) -> Vec<(PathBuf, TagFields)> {
        self.writes.borrow().clone()
    }
}

impl TagBackend for MockTagBackend {
    fn read(&self, path: &Path) -> Result<RawTags> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::metadata(path, "no audio frames found"))
    }

    fn write(&self, path: &Path, fields: &TagFields, _options: &TagWriteOptions) -> Result<()> {
        self.writes
            .borrow_mut()
            .push((path.to_path_buf(), fields.clone()));
        Ok(())
    }
}

/// Recording [`ImageTools`] that never shells out.
///
/// Conversion copies the source bytes to the destination.
pub struct MockImageTools {
    quality: u8,
    calls: RefCell<Vec<String>>,
}

impl MockImageTools {
    pub fn new() -> Self {
        Self::with_quality(90)
    }

    /// Every JPEG reports `quality`.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Calls made so far, as `"<tool> [args] <file name>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

fn name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ImageTools for MockImageTools {
    fn jpeg_quality(&self, path: &Path) -> Result<u8> {
        self.record(format!("identify {}", name(path)));
        Ok(self.quality)
    }

    fn optimize_jpeg(&self, path: &Path, max_quality: u8) -> Result<()> {
        self.record(format!("jpegoptim -m{max_quality} {}", name(path)));
        Ok(())
    }

    fn png_to_jpeg(&self, source: &Path, dest: &Path) -> Result<()> {
        self.record(format!("convert {} {}", name(source), name(dest)));
        fs::copy(source, dest)?;
        Ok(())
    }
}

/// Creates raw tags with sensible defaults.
///
/// Customize using struct update syntax:
///
/// ```ignore
/// let tags = RawTags {
///     title: Some("Custom".to_string()),
///     ..mock_raw_tags()
/// };
/// ```
pub fn mock_raw_tags() -> RawTags {
    RawTags {
        artist: Some("Test Artist".to_string()),
        album: Some("Test Album".to_string()),
        title: Some("Test Track".to_string()),
        year: Some(2001),
        track: Some(1),
        duration_secs: 180,
    }
}

/// Creates a single-track record as the extractor would produce it.
pub fn mock_track_record() -> TrackRecord {
    TrackRecord {
        album_artist: None,
        artist: "test artist".to_string(),
        album: "test album".to_string(),
        title: "test track".to_string(),
        date: "2001".to_string(),
        track_num: Some(1),
        source_path: PathBuf::from("/test/incoming/01 test track.mp3"),
    }
}

/// Creates an album-track record.
pub fn mock_album_record() -> TrackRecord {
    TrackRecord {
        album_artist: Some("test band".to_string()),
        artist: "test band".to_string(),
        source_path: PathBuf::from("/test/incoming/Test Album/01 test track.mp3"),
        ..mock_track_record()
    }
}

/// Creates an image record.
pub fn mock_image_record() -> ImageRecord {
    ImageRecord {
        source_path: PathBuf::from("/test/incoming/Test Album/front.jpg"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    #[test]
    fn test_mock_records_have_expected_categories() {
        assert_eq!(mock_track_record().category(), Category::Single);
        assert_eq!(mock_album_record().category(), Category::Album);
    }

    #[test]
    fn test_mock_backend_reads_inserted_tags() {
        let backend = MockTagBackend::new();
        backend.insert("/in/a.mp3", mock_raw_tags());

        assert_eq!(backend.read(Path::new("/in/a.mp3")).unwrap(), mock_raw_tags());
        assert!(backend.read(Path::new("/in/b.mp3")).is_err());
    }

    #[test]
    fn test_mock_backend_records_writes() {
        let backend = MockTagBackend::new();
        let fields = TagFields {
            title: "x".to_string(),
            ..TagFields::default()
        };
        let options = TagWriteOptions {
            id3v1: true,
            id3v2: None,
        };

        backend.write(Path::new("/in/a.mp3"), &fields, &options).unwrap();

        assert_eq!(backend.writes(), vec![(PathBuf::from("/in/a.mp3"), fields)]);
    }
}
