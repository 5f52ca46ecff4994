//! Destination paths and file movement.
//!
//! Layout under the destination root:
//! - single: `{artist} - {title}.mp3`
//! - album track: `{album artist} - {date} - {album}/[CD<n>/]{NN} {title}.mp3`
//!
//! The `CD<n>` level appears when the source album directory carries a
//! `.CD<n>` suffix, which disc flattening adds during library preparation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ResultExt};
use crate::model::{Category, TrackRecord};

/// Longest title kept in a file name.
pub const MAX_TITLE_CHARS: usize = 80;

const TRUNCATION_SUFFIX: &str = "(...)";

static DISC_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.CD(\d+)").unwrap());

/// Make a tag value safe as a single path component.
///
/// `/` becomes ` # `, then doubled spaces are collapsed.
pub fn sanitize_component(name: &str) -> String {
    let mut out = name.replace('/', " # ");
    while out.contains("  ") {
        out = out.replace("  ", " ");
    }
    out
}

/// Cut a title to [`MAX_TITLE_CHARS`] characters, marking the cut.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() > MAX_TITLE_CHARS {
        let head: String = title.chars().take(MAX_TITLE_CHARS).collect();
        format!("{head}{TRUNCATION_SUFFIX}")
    } else {
        title.to_string()
    }
}

/// `CD<n>` when the file sits in a flattened disc directory.
pub fn disc_segment(source: &Path) -> Option<String> {
    let dir = source.parent()?.file_name()?.to_string_lossy();
    DISC_MARKER
        .captures(&dir)
        .map(|caps| format!("CD{}", &caps[1]))
}

/// Computes where corrected tracks end up.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    dest_root: PathBuf,
}

impl PathPlanner {
    pub fn new(dest_root: impl Into<PathBuf>) -> Self {
        Self {
            dest_root: dest_root.into(),
        }
    }

    /// The album folder (without any disc level) of an album track.
    pub fn album_root(&self, record: &TrackRecord) -> Option<PathBuf> {
        let album_artist = record.album_artist.as_deref()?;
        let folder = format!(
            "{} - {} - {}",
            sanitize_component(album_artist),
            sanitize_component(&record.date),
            sanitize_component(&record.album)
        );
        Some(self.dest_root.join(folder))
    }

    /// Destination of a corrected track.
    pub fn plan(&self, record: &TrackRecord) -> Result<PathBuf> {
        let title = truncate_title(&sanitize_component(&record.title));

        match (record.category(), self.album_root(record)) {
            (Category::Album, Some(mut dir)) => {
                let track_num = record.track_num.ok_or_else(|| Error::BlankField {
                    path: record.source_path.clone(),
                    field: "track no",
                })?;
                if let Some(disc) = disc_segment(&record.source_path) {
                    dir.push(disc);
                }
                Ok(dir.join(format!("{track_num:02} {title}.mp3")))
            }
            _ => Ok(self.dest_root.join(format!(
                "{} - {}.mp3",
                sanitize_component(&record.artist),
                title
            ))),
        }
    }
}

/// Move a file, creating the destination directory. Falls back to copy and
/// delete when a plain rename is impossible (e.g. across devices).
///
/// Never replaces an existing file: that is an [`Error::DestinationExists`]
/// and both files stay where they are.
pub fn move_file(source: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Err(Error::DestinationExists {
            path: dest.to_path_buf(),
        });
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(format!("Failed to create directory: {:?}", parent))?;
    }

    if let Err(_e) = fs::rename(source, dest) {
        fs::copy(source, dest).with_context(format!("Failed to copy file to: {:?}", dest))?;
        fs::remove_file(source)
            .with_context(format!("Failed to remove source file: {:?}", source))?;
    }

    tracing::debug!("Moved {:?} -> {:?}", source, dest);
    Ok(())
}

/// Recursively removes empty directories up the tree, stopping at `stop`.
pub fn remove_empty_dirs(path: &Path, stop: &Path) -> Result<()> {
    if path != stop && path.is_dir() && fs::read_dir(path)?.next().is_none() {
        fs::remove_dir(path)?;
        if let Some(parent) = path.parent() {
            if let Err(e) = remove_empty_dirs(parent, stop) {
                tracing::debug!("Leaving {:?} in place: {}", parent, e);
            }
        }
    }
    Ok(())
}
