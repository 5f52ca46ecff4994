//! Cover art handling for one album directory.
//!
//! Order of work, per directory:
//!
//! 1. `.jpeg` files are renamed to `.jpg`
//! 2. Images under the configured minimum size are deleted
//! 3. With re-encoding on, uncompressed JPEGs are optimised and PNGs are
//!    converted to JPEG
//! 4. Remaining images get their final names from [`classify`]
//!
//! The caller then queues every JPEG left in the directory for relocation.

mod tools;

pub use tools::{ExternalImageTools, ImageTools};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::ImagesConfig;
use crate::corrector::Progress;
use crate::error::{Result, ResultExt};

/// Final name stem of each image, in the order the images were given.
///
/// A lone image is always the front cover. Otherwise the first name
/// containing "front" or "folder" becomes `front`, the first containing
/// "back" becomes `back`, and everything else is numbered `album-art-NN`.
/// Matching ignores case.
pub fn classify<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    if names.len() == 1 {
        return vec!["front".to_string()];
    }

    let mut front_taken = false;
    let mut back_taken = false;
    let mut counter = 0;

    names
        .iter()
        .map(|name| {
            let lower = name.as_ref().to_lowercase();
            if !front_taken && (lower.contains("front") || lower.contains("folder")) {
                front_taken = true;
                "front".to_string()
            } else if !back_taken && lower.contains("back") {
                back_taken = true;
                "back".to_string()
            } else {
                counter += 1;
                format!("album-art-{counter:02}")
            }
        })
        .collect()
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn is_image(path: &Path) -> bool {
    has_extension(path, "jpg") || has_extension(path, "png")
}

/// Regular files directly inside `dir`, sorted by name.
fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(format!("listing {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn rename_jpeg_extensions(dir: &Path) -> Result<()> {
    for path in sorted_files(dir)?.into_iter().filter(|p| has_extension(p, "jpeg")) {
        let target = path.with_extension("jpg");
        if target.exists() {
            warn!("Not renaming {:?}: {:?} already exists", path, target);
            continue;
        }
        fs::rename(&path, &target).with_context(format!("renaming {}", path.display()))?;
    }
    Ok(())
}

/// Size filter and optional re-encoding. Returns the surviving image path,
/// or `None` when it was deleted.
fn prepare_image(
    path: PathBuf,
    config: &ImagesConfig,
    tools: &dyn ImageTools,
) -> Result<Option<PathBuf>> {
    let size = fs::metadata(&path)?.len();
    if size < config.min_size_bytes {
        info!("{} is too small ({} bytes), deleting", file_name(&path), size);
        fs::remove_file(&path)?;
        return Ok(None);
    }

    if !config.reencode {
        return Ok(Some(path));
    }

    if has_extension(&path, "jpg") {
        match tools.jpeg_quality(&path) {
            Ok(100) => {
                if let Err(e) = tools.optimize_jpeg(&path, config.jpeg_quality) {
                    warn!("Could not optimise {:?}: {}", path, e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Could not read JPEG quality of {:?}: {}", path, e),
        }
        return Ok(Some(path));
    }

    let jpg = path.with_extension("jpg");
    if jpg.exists() {
        warn!("Not converting {:?}: {:?} already exists", path, jpg);
        return Ok(Some(path));
    }
    match tools.png_to_jpeg(&path, &jpg) {
        Ok(()) => {
            fs::remove_file(&path)?;
            if let Err(e) = tools.optimize_jpeg(&jpg, config.jpeg_quality) {
                warn!("Could not optimise {:?}: {}", jpg, e);
            }
            Ok(Some(jpg))
        }
        Err(e) => {
            warn!("Could not convert {:?}: {}", path, e);
            let _ = fs::remove_file(&jpg);
            Ok(Some(path))
        }
    }
}

/// Give every image its final name without clobbering one another.
///
/// Images move to temporary names first, so a final name currently held by
/// another image in the set is free by the time it is claimed.
fn apply_names(images: &[PathBuf], stems: &[String]) -> Result<()> {
    let mut staged = Vec::new();
    for (i, (path, stem)) in images.iter().zip(stems).enumerate() {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let target = path.with_file_name(format!("{stem}.{ext}"));
        if &target == path {
            continue;
        }
        let temp = path.with_file_name(format!(".mp3-tidy-{i}.{ext}"));
        fs::rename(path, &temp).with_context(format!("renaming {}", path.display()))?;
        staged.push((temp, target));
    }

    for (temp, target) in staged {
        if target.exists() {
            warn!("{:?} already exists, keeping {:?}", target, temp);
            continue;
        }
        fs::rename(&temp, &target).with_context(format!("renaming {}", temp.display()))?;
    }
    Ok(())
}

/// Normalize, filter and rename the images of one album directory.
///
/// Returns every JPEG left in the directory, sorted by name.
pub fn process_album_images(
    dir: &Path,
    config: &ImagesConfig,
    tools: &dyn ImageTools,
    progress: &mut Progress,
) -> Result<Vec<PathBuf>> {
    rename_jpeg_extensions(dir)?;

    let mut kept = Vec::new();
    for path in sorted_files(dir)?.into_iter().filter(|p| is_image(p)) {
        progress.advance(&file_name(&path));
        if let Some(path) = prepare_image(path, config, tools)? {
            kept.push(path);
        }
    }

    let names: Vec<String> = kept.iter().map(|p| file_name(p)).collect();
    apply_names(&kept, &classify(&names))?;

    Ok(sorted_files(dir)?
        .into_iter()
        .filter(|p| has_extension(p, "jpg"))
        .collect())
}
