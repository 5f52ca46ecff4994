//! Library preparation: everything that happens to the base directory
//! before tags are extracted, plus the final empty-directory sweep.
//!
//! The base directory is expected to hold loose mp3 files (singles) and one
//! directory per album. Two quarantine directories live inside it and are
//! skipped by every walk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::PathsConfig;
use crate::error::{Error, Result, ResultExt};
use crate::external::Validator;
use crate::metadata::TagBackend;
use crate::organizer::move_file;

/// Audio formats that are not handled; albums containing them are set aside.
pub const NOT_MP3_EXTENSIONS: &[&str] = &[
    "aac", "aiff", "alac", "ape", "flac", "mpc", "ogg", "opus", "wav", "wma",
];

/// Everything else is deleted.
const KEPT_EXTENSIONS: &[&str] = &["mp3", "jpg", "jpeg", "png"];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

fn extension_in(path: &Path, list: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| list.iter().any(|l| e.eq_ignore_ascii_case(l)))
}

pub fn is_mp3(path: &Path) -> bool {
    extension_in(path, &["mp3"])
}

/// Direct children of `dir` matching `keep`, sorted by name.
fn children(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(format!("listing {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| keep(p))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Sorted mp3 files directly inside `dir`.
pub fn mp3s_in(dir: &Path) -> Result<Vec<PathBuf>> {
    children(dir, |p| p.is_file() && is_mp3(p))
}

/// `base/name`, or `base/name (n)` for the first n that is free.
fn free_target(base: &Path, name: &str) -> PathBuf {
    let mut target = base.join(name);
    let mut n = 2;
    while target.exists() {
        target = base.join(format!("{name} ({n})"));
        n += 1;
    }
    target
}

/// `path`, or `stem (n).ext` beside it for the first n that is free.
fn free_file_target(path: &Path) -> PathBuf {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut target = path.to_path_buf();
    let mut n = 2;
    while target.exists() {
        target = path.with_file_name(format!("{stem} ({n}){ext}"));
        n += 1;
    }
    target
}

/// What library preparation did.
#[derive(Debug, Default)]
pub struct PrepareReport {
    /// Top-level entries moved to the non-mp3 quarantine
    pub not_mp3: Vec<String>,
    pub junk_removed: usize,
    /// Files the tag reader could not load, now in the broken quarantine
    pub broken: Vec<PathBuf>,
    pub validator_failures: usize,
    /// Files left to work on (progress total)
    pub total_files: usize,
}

/// Prepares the base directory for extraction.
pub struct BaseDirScanner<'a> {
    paths: &'a PathsConfig,
}

impl<'a> BaseDirScanner<'a> {
    pub fn new(paths: &'a PathsConfig) -> Self {
        Self { paths }
    }

    fn base(&self) -> &Path {
        &self.paths.base_dir
    }

    fn is_quarantine_entry(&self, entry: &DirEntry) -> bool {
        entry.depth() == 1
            && entry.file_type().is_dir()
            && self.paths.is_quarantine(&entry.file_name().to_string_lossy())
    }

    /// Every file under the base directory outside the quarantines.
    fn walk_files(&self) -> Vec<PathBuf> {
        WalkDir::new(self.base())
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_quarantine_entry(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }

    /// Top-level `(files, directories)`, quarantines excluded, sorted.
    pub fn top_level(&self) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let files = children(self.base(), |p| p.is_file())?;
        let dirs = children(self.base(), |p| {
            p.is_dir()
                && !p
                    .file_name()
                    .is_some_and(|n| self.paths.is_quarantine(&n.to_string_lossy()))
        })?;
        Ok((files, dirs))
    }

    /// Run every preparation step in order.
    pub fn prepare(
        &self,
        backend: &dyn TagBackend,
        validator: Option<&dyn Validator>,
    ) -> Result<PrepareReport> {
        let mut report = PrepareReport::default();

        fs::create_dir_all(self.paths.broken_path())
            .with_context("creating the broken quarantine")?;

        report.not_mp3 = self.quarantine_not_mp3()?;
        report.junk_removed = self.remove_junk()?;
        let (broken, failures) = self.check_mp3s(backend, validator)?;
        report.broken = broken;
        report.validator_failures = failures;
        self.flatten_discs()?;
        report.total_files = self.count_files()?;

        info!(
            "Prepared {:?}: {} files, {} broken, {} junk removed, {} set aside",
            self.base(),
            report.total_files,
            report.broken.len(),
            report.junk_removed,
            report.not_mp3.len()
        );
        Ok(report)
    }

    /// Move top-level entries holding other audio formats into the non-mp3
    /// quarantine.
    pub fn quarantine_not_mp3(&self) -> Result<Vec<String>> {
        let (files, dirs) = self.top_level()?;
        let mut moved = Vec::new();

        for path in dirs.into_iter().chain(files) {
            let contains_other_audio = WalkDir::new(&path)
                .into_iter()
                .filter_map(|e| e.ok())
                .any(|e| e.file_type().is_file() && extension_in(e.path(), NOT_MP3_EXTENSIONS));
            if !contains_other_audio {
                continue;
            }

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let quarantine = self.paths.not_mp3_path();
            fs::create_dir_all(&quarantine)?;
            let target = free_target(&quarantine, &name);
            info!("{:?} contains non-mp3 audio, moving it to {:?}", name, target);
            fs::rename(&path, &target).with_context(format!("moving {}", path.display()))?;
            moved.push(name);
        }
        Ok(moved)
    }

    /// Delete every file that is neither an mp3 nor an image.
    pub fn remove_junk(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.walk_files() {
            if extension_in(&path, KEPT_EXTENSIONS) {
                continue;
            }
            tracing::debug!("Removing {:?}", path);
            fs::remove_file(&path).with_context(format!("removing {}", path.display()))?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Repair every mp3 with the validator (if any) and quarantine those the
    /// tag reader cannot load. Returns the quarantined paths and the number
    /// of validator failures.
    pub fn check_mp3s(
        &self,
        backend: &dyn TagBackend,
        validator: Option<&dyn Validator>,
    ) -> Result<(Vec<PathBuf>, usize)> {
        let mut broken = Vec::new();
        let mut failures = 0;

        for path in self.walk_files().into_iter().filter(|p| is_mp3(p)) {
            if let Some(validator) = validator {
                if let Err(e) = validator.repair(&path) {
                    warn!("Validator failed on {:?}: {}", path, e);
                    failures += 1;
                }
            }

            if let Err(e) = backend.read(&path) {
                warn!("{:?} is broken ({}), moving it to {:?}", path, e, self.paths.broken_dir);
                broken.push(self.quarantine_broken(&path)?);
            }
        }
        Ok((broken, failures))
    }

    /// Move a file into the broken quarantine, keeping its album directory.
    pub fn quarantine_broken(&self, path: &Path) -> Result<PathBuf> {
        let relative = path.strip_prefix(self.base()).map_err(|_| {
            Error::config(format!("{} is outside {}", path.display(), self.base().display()))
        })?;
        let target = free_file_target(&self.paths.broken_path().join(relative));
        move_file(path, &target)?;
        Ok(target)
    }

    /// Turn disc subdirectories into sibling album directories and pull
    /// images out of artwork subdirectories.
    ///
    /// `Album/Disc 1` becomes `Album Disc 1.CD1`; discs are numbered in
    /// sorted order.
    pub fn flatten_discs(&self) -> Result<()> {
        let (_, dirs) = self.top_level()?;

        for dir in dirs {
            let album = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut disc = 0;

            for sub in children(&dir, |p| p.is_dir())? {
                let sub_name = sub
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                if !mp3s_in(&sub)?.is_empty() {
                    disc += 1;
                    let target = self.base().join(format!("{album} {sub_name}.CD{disc}"));
                    info!("Flattening {:?} into {:?}", sub, target);
                    fs::rename(&sub, &target)
                        .with_context(format!("moving {}", sub.display()))?;
                    continue;
                }

                for image in children(&sub, |p| p.is_file() && extension_in(p, IMAGE_EXTENSIONS))? {
                    let Some(name) = image.file_name() else {
                        continue;
                    };
                    let target = dir.join(name);
                    if target.exists() {
                        warn!("{:?} already exists, leaving {:?}", target, image);
                        continue;
                    }
                    move_file(&image, &target)?;
                }

                let has_files = WalkDir::new(&sub)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .any(|e| e.file_type().is_file());
                if has_files {
                    warn!("Leaving {:?}: it still holds files", sub);
                } else {
                    fs::remove_dir_all(&sub)
                        .with_context(format!("removing {}", sub.display()))?;
                }
            }

            if fs::read_dir(&dir)?.next().is_none() {
                fs::remove_dir(&dir)?;
            }
        }
        Ok(())
    }

    /// Number of files to work on; none at all is fatal.
    pub fn count_files(&self) -> Result<usize> {
        let total = self.walk_files().len();
        if total == 0 {
            return Err(Error::config(format!(
                "no files found in {}; add something (or change paths.base_dir) and run again",
                self.base().display()
            )));
        }
        Ok(total)
    }

    /// Remove empty top-level directories once everything has moved out.
    pub fn remove_empty_dirs(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in children(self.base(), |p| p.is_dir())? {
            if fs::read_dir(&dir)?.next().is_none() {
                fs::remove_dir(&dir)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockTagBackend, mock_raw_tags};
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathsConfig) {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathsConfig {
            base_dir: dir.path().to_path_buf(),
            ..PathsConfig::default()
        };
        (dir, paths)
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"data").unwrap();
    }

    struct FailingValidator {
        seen: RefCell<Vec<PathBuf>>,
    }

    impl Validator for FailingValidator {
        fn repair(&self, path: &Path) -> Result<()> {
            self.seen.borrow_mut().push(path.to_path_buf());
            Err(Error::tool("mp3val", "exit 1"))
        }
    }

    #[test]
    fn test_quarantine_not_mp3_moves_whole_directory() {
        let (dir, paths) = setup();
        touch(&dir.path().join("Lossless").join("01.flac"));
        touch(&dir.path().join("Lossless").join("cover.jpg"));
        touch(&dir.path().join("Album").join("01.mp3"));

        let moved = BaseDirScanner::new(&paths).quarantine_not_mp3().unwrap();

        assert_eq!(moved, vec!["Lossless"]);
        assert!(dir.path().join(".not-mp3").join("Lossless").join("01.flac").exists());
        assert!(dir.path().join("Album").join("01.mp3").exists());
    }

    #[test]
    fn test_remove_junk_skips_quarantines() {
        let (dir, paths) = setup();
        touch(&dir.path().join("Album").join("01.mp3"));
        touch(&dir.path().join("Album").join("info.nfo"));
        touch(&dir.path().join("Album").join("Cover.JPG"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join(".not-mp3").join("X").join("01.flac"));

        let removed = BaseDirScanner::new(&paths).remove_junk().unwrap();

        assert_eq!(removed, 2);
        assert!(!dir.path().join("Album").join("info.nfo").exists());
        assert!(dir.path().join("Album").join("Cover.JPG").exists());
        assert!(dir.path().join(".not-mp3").join("X").join("01.flac").exists());
    }

    #[test]
    fn test_broken_files_keep_album_directory() {
        let (dir, paths) = setup();
        let good = dir.path().join("Album").join("01.mp3");
        let bad = dir.path().join("Album").join("02.mp3");
        let bad_single = dir.path().join("single.mp3");
        for p in [&good, &bad, &bad_single] {
            touch(p);
        }
        let backend = MockTagBackend::new();
        backend.insert(&good, mock_raw_tags());

        let (broken, failures) = BaseDirScanner::new(&paths).check_mp3s(&backend, None).unwrap();

        assert_eq!(failures, 0);
        assert_eq!(broken.len(), 2);
        assert!(dir.path().join(".broken").join("Album").join("02.mp3").exists());
        assert!(dir.path().join(".broken").join("single.mp3").exists());
        assert!(good.exists());
    }

    #[test]
    fn test_broken_file_does_not_replace_earlier_one() {
        let (dir, paths) = setup();
        let earlier = dir.path().join(".broken").join("Album").join("02.mp3");
        fs::create_dir_all(earlier.parent().unwrap()).unwrap();
        fs::write(&earlier, b"earlier").unwrap();
        let bad = dir.path().join("Album").join("02.mp3");
        touch(&bad);

        let target = BaseDirScanner::new(&paths).quarantine_broken(&bad).unwrap();

        assert_eq!(target, dir.path().join(".broken").join("Album").join("02 (2).mp3"));
        assert_eq!(fs::read_to_string(&earlier).unwrap(), "earlier");
        assert_eq!(fs::read_to_string(&target).unwrap(), "data");
        assert!(!bad.exists());
    }

    #[test]
    fn test_validator_failures_are_counted_not_fatal() {
        let (dir, paths) = setup();
        let song = dir.path().join("song.mp3");
        touch(&song);
        let backend = MockTagBackend::new();
        backend.insert(&song, mock_raw_tags());
        let validator = FailingValidator {
            seen: RefCell::new(Vec::new()),
        };

        let (broken, failures) = BaseDirScanner::new(&paths)
            .check_mp3s(&backend, Some(&validator))
            .unwrap();

        assert!(broken.is_empty());
        assert_eq!(failures, 1);
        assert_eq!(validator.seen.borrow().as_slice(), &[song]);
    }

    #[test]
    fn test_flatten_discs() {
        let (dir, paths) = setup();
        let album = dir.path().join("Album");
        touch(&album.join("CD 1").join("01.mp3"));
        touch(&album.join("CD 2").join("01.mp3"));
        touch(&album.join("Artwork").join("back.jpg"));
        fs::create_dir_all(album.join("Empty")).unwrap();
        touch(&album.join("front.jpg"));

        BaseDirScanner::new(&paths).flatten_discs().unwrap();

        assert!(dir.path().join("Album CD 1.CD1").join("01.mp3").exists());
        assert!(dir.path().join("Album CD 2.CD2").join("01.mp3").exists());
        assert!(album.join("back.jpg").exists());
        assert!(!album.join("Artwork").exists());
        assert!(!album.join("Empty").exists());
    }

    #[test]
    fn test_flatten_removes_emptied_album() {
        let (dir, paths) = setup();
        touch(&dir.path().join("Box").join("Disc A").join("01.mp3"));

        BaseDirScanner::new(&paths).flatten_discs().unwrap();

        assert!(!dir.path().join("Box").exists());
        assert!(dir.path().join("Box Disc A.CD1").join("01.mp3").exists());
    }

    #[test]
    fn test_count_files_excludes_quarantines() {
        let (dir, paths) = setup();
        touch(&dir.path().join(".broken").join("x.mp3"));
        let scanner = BaseDirScanner::new(&paths);

        assert!(matches!(scanner.count_files(), Err(Error::Config(_))));

        touch(&dir.path().join("a.mp3"));
        touch(&dir.path().join("Album").join("front.jpg"));
        assert_eq!(scanner.count_files().unwrap(), 2);
    }

    #[test]
    fn test_prepare_runs_all_steps() {
        let (dir, paths) = setup();
        let song = dir.path().join("Album").join("01.mp3");
        touch(&song);
        touch(&dir.path().join("Album").join("log.txt"));
        let backend = MockTagBackend::new();
        backend.insert(&song, mock_raw_tags());

        let report = BaseDirScanner::new(&paths).prepare(&backend, None).unwrap();

        assert!(dir.path().join(".broken").is_dir());
        assert_eq!(report.junk_removed, 1);
        assert_eq!(report.total_files, 1);
    }

    #[test]
    fn test_remove_empty_dirs() {
        let (dir, paths) = setup();
        fs::create_dir_all(dir.path().join("Done")).unwrap();
        touch(&dir.path().join("Kept").join("front.png"));

        let removed = BaseDirScanner::new(&paths).remove_empty_dirs().unwrap();

        assert_eq!(removed, 1);
        assert!(dir.path().join("Kept").exists());
    }

    #[test]
    fn test_top_level_excludes_quarantines() {
        let (dir, paths) = setup();
        touch(&dir.path().join("single.mp3"));
        touch(&dir.path().join("Album").join("01.mp3"));
        fs::create_dir_all(dir.path().join(".broken")).unwrap();

        let (files, dirs) = BaseDirScanner::new(&paths).top_level().unwrap();

        assert_eq!(files, vec![dir.path().join("single.mp3")]);
        assert_eq!(dirs, vec![dir.path().join("Album")]);
    }
}
