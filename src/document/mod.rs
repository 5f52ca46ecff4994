//! The changes document: a line-oriented, human-editable listing of every
//! pending tag change.
//!
//! ```text
//! -
//!   album artist: "band"
//!   artist: "band,guest"
//!   album: "first album"
//!   title: "opening"
//!   date: "1999"
//!   track no: "1"
//!   path: "/music/incoming/First Album/01 opening.mp3"
//! -
//!   path: "/music/incoming/First Album/front.jpg"
//! ```
//!
//! Every block starts with a `-` marker line. The number of key lines after
//! the marker decides the entry type: 1 is an image, 6 a single track and 7
//! an album track. A value is whatever sits between the first and the last
//! double quote of its line.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ResultExt};
use crate::model::{Entry, ImageRecord, TrackRecord};

/// Block marker line.
pub const MARKER: &str = "-";

const INDENT: &str = "  ";

const ALBUM_ARTIST: &str = "album artist";
const ARTIST: &str = "artist";
const ALBUM: &str = "album";
const TITLE: &str = "title";
const DATE: &str = "date";
const TRACK_NO: &str = "track no";
const PATH: &str = "path";

const SINGLE_KEYS: [&str; 6] = [ARTIST, ALBUM, TITLE, DATE, TRACK_NO, PATH];
const ALBUM_KEYS: [&str; 7] = [ALBUM_ARTIST, ARTIST, ALBUM, TITLE, DATE, TRACK_NO, PATH];

fn push_line(out: &mut String, key: &str, value: &str) {
    out.push_str(INDENT);
    out.push_str(key);
    out.push_str(": \"");
    out.push_str(value);
    out.push_str("\"\n");
}

/// Render one entry as a block, marker line included.
pub fn serialize_entry(entry: &Entry) -> String {
    let mut out = String::from(MARKER);
    out.push('\n');

    match entry {
        Entry::Image(image) => {
            push_line(&mut out, PATH, &image.source_path.to_string_lossy());
        }
        Entry::Track(track) => {
            if let Some(album_artist) = &track.album_artist {
                push_line(&mut out, ALBUM_ARTIST, album_artist);
            }
            push_line(&mut out, ARTIST, &track.artist);
            push_line(&mut out, ALBUM, &track.album);
            push_line(&mut out, TITLE, &track.title);
            push_line(&mut out, DATE, &track.date);
            let track_num = track.track_num.map(|n| n.to_string()).unwrap_or_default();
            push_line(&mut out, TRACK_NO, &track_num);
            push_line(&mut out, PATH, &track.source_path.to_string_lossy());
        }
    }
    out
}

/// Render a whole document.
pub fn serialize(entries: &[Entry]) -> String {
    entries.iter().map(serialize_entry).collect()
}

/// A `key: "value"` line split into its parts.
struct KeyLine<'a> {
    key: &'a str,
    value: &'a str,
}

fn parse_key_line(block: usize, line: &str) -> Result<KeyLine<'_>> {
    let (key, rest) = line
        .trim()
        .split_once(": ")
        .ok_or_else(|| Error::document(block, format!("expected `key: \"value\"`, got {line:?}")))?;

    let first = rest.find('"');
    let last = rest.rfind('"');
    match (first, last) {
        (Some(first), Some(last)) if first < last => Ok(KeyLine {
            key,
            value: &rest[first + 1..last],
        }),
        _ => Err(Error::document(
            block,
            format!("value of `{key}` is not enclosed in double quotes"),
        )),
    }
}

/// Collect the non-blank lines of each block, checking that every block
/// opens with a marker.
fn split_blocks(text: &str) -> Result<Vec<Vec<&str>>> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            continue;
        }
        if line.trim() == MARKER {
            blocks.push(Vec::new());
            continue;
        }
        match blocks.last_mut() {
            Some(block) => block.push(line),
            None => {
                return Err(Error::document(1, "document must start with a `-` marker"));
            }
        }
    }
    Ok(blocks)
}

fn parse_track_num(path: &Path, value: &str) -> Result<Option<u32>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(Error::InvalidField {
            path: path.to_path_buf(),
            field: "track no",
            value: value.to_string(),
        }),
    }
}

fn parse_block(index: usize, lines: &[&str]) -> Result<Entry> {
    let block = index + 1;
    let expected: &[&str] = match lines.len() {
        1 => &[PATH],
        6 => &SINGLE_KEYS,
        7 => &ALBUM_KEYS,
        n => {
            return Err(Error::document(
                block,
                format!("expected 1, 6 or 7 key lines, found {n}"),
            ));
        }
    };

    let mut values = Vec::with_capacity(lines.len());
    for (line, want) in lines.iter().zip(expected) {
        let parsed = parse_key_line(block, line)?;
        if parsed.key != *want {
            return Err(Error::document(
                block,
                format!("expected key `{want}`, found `{}`", parsed.key),
            ));
        }
        values.push(parsed.value);
    }

    // The path is always the last key
    let source_path = PathBuf::from(values[values.len() - 1]);
    if lines.len() == 1 {
        return Ok(Entry::Image(ImageRecord { source_path }));
    }

    let (album_artist, rest) = if lines.len() == 7 {
        (Some(values[0].to_string()), &values[1..])
    } else {
        (None, &values[..])
    };

    Ok(Entry::Track(TrackRecord {
        album_artist,
        artist: rest[0].to_string(),
        album: rest[1].to_string(),
        title: rest[2].to_string(),
        date: rest[3].to_string(),
        track_num: parse_track_num(&source_path, rest[4])?,
        source_path,
    }))
}

/// Parse a document back into entries, rejecting any malformed block.
pub fn parse(text: &str) -> Result<Vec<Entry>> {
    split_blocks(text)?
        .iter()
        .enumerate()
        .map(|(i, lines)| parse_block(i, lines))
        .collect()
}

// ============================================================================
// Value stream
// ============================================================================

enum StreamLine {
    /// Marker and path lines, carried through untouched
    Fixed(String),
    /// `prefix` is everything up to and including `": "`
    Keyed { prefix: String, value: String },
}

/// The editable values of a document, separated from their keys.
///
/// [`ValueStream::values`] yields one value per line (quotes included) so
/// text rules can run over all of them at once; [`ValueStream::rejoin`]
/// puts corrected values back next to their keys.
pub struct ValueStream {
    lines: Vec<StreamLine>,
}

impl ValueStream {
    pub fn split(text: &str) -> Result<Self> {
        // Shape check first so rules never run over a broken document
        parse(text)?;

        let lines = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let trimmed = line.trim();
                if trimmed == MARKER || trimmed.starts_with("path: ") {
                    return StreamLine::Fixed(line.trim_end().to_string());
                }
                // parse() guarantees the separator is present
                let split = line.find(": ").map(|i| i + 2).unwrap_or(line.len());
                StreamLine::Keyed {
                    prefix: line[..split].to_string(),
                    value: line[split..].trim_end().to_string(),
                }
            })
            .collect();
        Ok(Self { lines })
    }

    /// All editable values, newline-joined.
    pub fn values(&self) -> String {
        self.lines
            .iter()
            .filter_map(|line| match line {
                StreamLine::Keyed { value, .. } => Some(value.as_str()),
                StreamLine::Fixed(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Rebuild the document with `corrected` values in place of the
    /// originals. The line count must be unchanged.
    pub fn rejoin(&self, corrected: &str) -> Result<String> {
        let has_values = self
            .lines
            .iter()
            .any(|line| matches!(line, StreamLine::Keyed { .. }));
        // "".split('\n') yields one empty item; a document of images has none
        let mut corrected = corrected.split('\n').filter(|_| has_values);
        let mut out = String::new();

        for line in &self.lines {
            match line {
                StreamLine::Fixed(text) => out.push_str(text),
                StreamLine::Keyed { prefix, .. } => {
                    let value = corrected.next().ok_or_else(|| {
                        Error::document(0, "corrected values are fewer than the originals")
                    })?;
                    out.push_str(prefix);
                    out.push_str(value);
                }
            }
            out.push('\n');
        }

        if corrected.next().is_some() {
            return Err(Error::document(
                0,
                "corrected values outnumber the originals",
            ));
        }
        Ok(out)
    }
}

// ============================================================================
// Document file
// ============================================================================

/// The changes document on disk.
///
/// Blocks are appended with a single write each, and whole-document
/// rewrites go through a temporary file, so an interrupted run never leaves
/// half a block behind.
#[derive(Debug, Clone)]
pub struct ChangesDocument {
    path: PathBuf,
}

impl ChangesDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empty the document, creating it (and its directory) if needed.
    pub fn truncate(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::File::create(&self.path)
            .with_context(format!("truncating {}", self.path.display()))?;
        Ok(())
    }

    /// Append one block.
    pub fn append(&self, entry: &Entry) -> Result<()> {
        let block = serialize_entry(entry);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(format!("opening {}", self.path.display()))?;
        file.write_all(block.as_bytes())
            .with_context(format!("appending to {}", self.path.display()))?;
        Ok(())
    }

    pub fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).with_context(format!("reading {}", self.path.display()))
    }

    /// Replace the whole document atomically.
    pub fn rewrite(&self, text: &str) -> Result<()> {
        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, text).with_context(format!("writing {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .with_context(format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    /// Read and parse every entry.
    pub fn load(&self) -> Result<Vec<Entry>> {
        parse(&self.read()?)
    }
}
