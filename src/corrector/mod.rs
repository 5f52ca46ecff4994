//! The three phases of a cleaning run, working on the changes document:
//!
//! - **extract**: read every file and append one block per track or image
//! - **correct**: run the text rules over the document's values
//! - **commit**: write tags, move files into the destination tree
//!
//! Each phase takes its run state ([`Progress`], [`RunSummary`]) explicitly
//! and can be run on its own.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::config::Config;
use crate::cover::{self, ImageTools};
use crate::document::{ChangesDocument, ValueStream};
use crate::error::{Error, Result};
use crate::extractor::{Batch, TagExtractor};
use crate::metadata::{TagBackend, TagFields, TagWriteOptions};
use crate::model::{AlbumContext, Category, Entry, ImageRecord, TrackRecord};
use crate::organizer::{PathPlanner, move_file, remove_empty_dirs};
use crate::rules::TextRules;
use crate::scanner::{BaseDirScanner, is_mp3, mp3s_in};

/// Numbered per-file progress lines on stdout.
#[derive(Debug, Clone)]
pub struct Progress {
    current: usize,
    total: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Format the line for the next file without advancing.
    pub fn line(&self, name: &str) -> String {
        let width = self.total.to_string().len();
        format!(" [{:>width$}/{}]  {}", self.current + 1, self.total, name)
    }

    pub fn advance(&mut self, name: &str) {
        println!("{}", self.line(name));
        self.current += 1;
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub singles: usize,
    pub album_tracks: usize,
    pub images: usize,
    pub skipped_dirs: Vec<PathBuf>,
    pub broken: Vec<PathBuf>,
    /// Recovered per-file failures (tools, tag writes, moves)
    pub recovered: usize,
    pub committed: usize,
}

impl RunSummary {
    fn recover(&mut self, context: &str, err: &Error) {
        warn!("{}: {}", context, err);
        self.recovered += 1;
    }
}

/// Fail with [`Error::Aborted`] once the user asked to stop.
pub fn check_abort(abort: &AtomicBool) -> Result<()> {
    if abort.load(Ordering::SeqCst) {
        return Err(Error::Aborted);
    }
    Ok(())
}

/// Drives one run over the base directory.
pub struct BatchCorrector<'a> {
    config: &'a Config,
    backend: &'a dyn TagBackend,
    extractor: TagExtractor,
    document: ChangesDocument,
}

impl<'a> BatchCorrector<'a> {
    pub fn new(config: &'a Config, backend: &'a dyn TagBackend) -> Result<Self> {
        Ok(Self {
            config,
            backend,
            extractor: TagExtractor::from_config(&config.text)?,
            document: ChangesDocument::new(&config.paths.changes_file),
        })
    }

    pub fn document(&self) -> &ChangesDocument {
        &self.document
    }

    fn scanner(&self) -> BaseDirScanner<'a> {
        BaseDirScanner::new(&self.config.paths)
    }

    /// Move a file that became unreadable into the broken quarantine.
    fn set_aside(&self, path: &Path, err: &Error, summary: &mut RunSummary) -> Result<()> {
        warn!("Skipping {:?}: {}", path, err);
        let target = self.scanner().quarantine_broken(path)?;
        summary.broken.push(target);
        Ok(())
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    /// Extract every loose mp3, then every album directory.
    pub fn extract_all(
        &self,
        images: &dyn ImageTools,
        progress: &mut Progress,
        summary: &mut RunSummary,
        abort: &AtomicBool,
    ) -> Result<()> {
        let (files, dirs) = self.scanner().top_level()?;

        for file in files.iter().filter(|p| is_mp3(p)) {
            check_abort(abort)?;
            self.extract_single(file, progress, summary)?;
        }
        for dir in &dirs {
            check_abort(abort)?;
            self.extract_album(dir, images, progress, summary)?;
        }
        Ok(())
    }

    /// Append the block of one loose track.
    pub fn extract_single(
        &self,
        path: &Path,
        progress: &mut Progress,
        summary: &mut RunSummary,
    ) -> Result<()> {
        progress.advance(&file_name(path));
        match self.extractor.extract(self.backend, path, Batch::Single) {
            Ok(record) => {
                self.document.append(&Entry::Track(record))?;
                summary.singles += 1;
                Ok(())
            }
            Err(e) if e.is_recoverable() => self.set_aside(path, &e, summary),
            Err(e) => Err(e),
        }
    }

    /// First pass over an album: total play time and artist candidates.
    /// Returns the context and the tracks that could be read.
    pub fn album_context(
        &self,
        tracks: &[PathBuf],
        summary: &mut RunSummary,
    ) -> Result<(AlbumContext, Vec<PathBuf>)> {
        let mut readable = Vec::new();
        let mut facts = Vec::new();

        for path in tracks {
            match self.backend.read(path) {
                Ok(raw) => {
                    facts.push((raw.artist.unwrap_or_default(), raw.duration_secs));
                    readable.push(path.clone());
                }
                Err(e) if e.is_recoverable() => self.set_aside(path, &e, summary)?,
                Err(e) => return Err(e),
            }
        }
        Ok((AlbumContext::from_tracks(facts), readable))
    }

    /// Append the blocks of one album directory: its tracks, then its
    /// processed cover art.
    pub fn extract_album(
        &self,
        dir: &Path,
        images: &dyn ImageTools,
        progress: &mut Progress,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let tracks = mp3s_in(dir)?;
        if tracks.is_empty() {
            info!("Folder {:?} does not contain any mp3 files, skipping", dir);
            summary.skipped_dirs.push(dir.to_path_buf());
            return Ok(());
        }

        let (context, readable) = self.album_context(&tracks, summary)?;
        tracing::debug!(
            "Album {:?}: {}s, album artist {:?}",
            dir,
            context.total_secs,
            context.album_artist()
        );

        for path in &readable {
            progress.advance(&file_name(path));
            match self
                .extractor
                .extract(self.backend, path, Batch::Album(&context))
            {
                Ok(record) => {
                    self.document.append(&Entry::Track(record))?;
                    summary.album_tracks += 1;
                }
                Err(e) if e.is_recoverable() => self.set_aside(path, &e, summary)?,
                Err(e) => return Err(e),
            }
        }

        match cover::process_album_images(dir, &self.config.images, images, progress) {
            Ok(jpgs) => {
                for source_path in jpgs {
                    self.document
                        .append(&Entry::Image(ImageRecord { source_path }))?;
                    summary.images += 1;
                }
            }
            Err(e) => summary.recover(&format!("cover art in {:?}", dir), &e),
        }
        Ok(())
    }

    // ========================================================================
    // Correction
    // ========================================================================

    /// Apply the text rules to every editable value and rewrite the
    /// document. Returns the number of values processed.
    pub fn correct(&self) -> Result<usize> {
        let text = self.document.read()?;
        let stream = ValueStream::split(&text)?;
        let values = stream.values();
        let count = if values.is_empty() {
            0
        } else {
            values.split('\n').count()
        };

        let rules = TextRules::from_config(&self.config.text);
        tracing::debug!("Text rules: {}", rules.rule_names().join(", "));
        let corrected = rules.apply(&values);
        self.document.rewrite(&stream.rejoin(&corrected)?)?;

        info!("Corrected {} values with {} rules", count, rules.rules.len());
        Ok(count)
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Write tags and move every entry of the document into place.
    ///
    /// All entries are parsed and validated before the first file is
    /// touched; a blank required field stops the phase without changes.
    pub fn commit(&self, summary: &mut RunSummary, abort: &AtomicBool) -> Result<()> {
        let entries = self.document.load()?;
        for entry in &entries {
            if let Entry::Track(track) = entry {
                validate(track)?;
            }
        }
        check_abort(abort)?;

        let planner = PathPlanner::new(&self.config.paths.dest_dir);
        let options = TagWriteOptions::from_config(&self.config.tags);
        let mut progress = Progress::new(entries.len());
        let mut album_root: Option<PathBuf> = None;

        for entry in &entries {
            progress.advance(&file_name(entry.source_path()));
            match entry {
                Entry::Track(track) => {
                    if track.category() == Category::Album {
                        album_root = planner.album_root(track);
                    }
                    self.commit_track(track, &planner, &options, summary)?;
                }
                Entry::Image(image) => match &album_root {
                    Some(root) => {
                        let target = root.join(image.source_path.file_name().unwrap_or_default());
                        match move_file(&image.source_path, &target) {
                            Ok(()) => self.prune(&image.source_path),
                            Err(e) => {
                                summary.recover(&format!("moving {:?}", image.source_path), &e)
                            }
                        }
                    }
                    None => warn!(
                        "No album precedes {:?} in the changes document, leaving it",
                        image.source_path
                    ),
                },
            }
        }
        Ok(())
    }

    fn commit_track(
        &self,
        track: &TrackRecord,
        planner: &PathPlanner,
        options: &TagWriteOptions,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let dest = planner.plan(track)?;
        if let Err(e) = self
            .backend
            .write(&track.source_path, &tag_fields(track), options)
        {
            if e.is_recoverable() {
                summary.recover(&format!("writing tags of {:?}", track.source_path), &e);
                return Ok(());
            }
            return Err(e);
        }
        if let Err(e) = move_file(&track.source_path, &dest) {
            if e.is_recoverable() {
                summary.recover(&format!("moving {:?}", track.source_path), &e);
                return Ok(());
            }
            return Err(e);
        }
        self.prune(&track.source_path);
        summary.committed += 1;
        Ok(())
    }

    /// Drop source directories left empty by a move.
    fn prune(&self, source: &Path) {
        if let Some(parent) = source.parent() {
            if let Err(e) = remove_empty_dirs(parent, &self.config.paths.base_dir) {
                tracing::debug!("Could not prune {:?}: {}", parent, e);
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn require(track: &TrackRecord, field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::BlankField {
            path: track.source_path.clone(),
            field,
        });
    }
    Ok(())
}

/// Required fields after correction: artist and title always; album
/// artist, album, date and track number for album tracks.
pub fn validate(track: &TrackRecord) -> Result<()> {
    require(track, "artist", &track.artist)?;
    require(track, "title", &track.title)?;

    if !track.date.is_empty() && (track.date.len() != 4 || track.date.parse::<u32>().is_err()) {
        return Err(Error::InvalidField {
            path: track.source_path.clone(),
            field: "date",
            value: track.date.clone(),
        });
    }

    if let Some(album_artist) = &track.album_artist {
        require(track, "album artist", album_artist)?;
        require(track, "album", &track.album)?;
        require(track, "date", &track.date)?;
        if track.track_num.is_none() {
            return Err(Error::BlankField {
                path: track.source_path.clone(),
                field: "track no",
            });
        }
    }
    Ok(())
}

/// Tag values to write for a corrected record.
pub fn tag_fields(track: &TrackRecord) -> TagFields {
    TagFields {
        album_artist: track.album_artist.clone(),
        artist: track.artist.clone(),
        album: track.album.clone(),
        title: track.title.clone(),
        year: track.date.parse().ok(),
        track: track.track_num,
    }
}
