//! The cleaning run and its individual phases.

use std::sync::atomic::AtomicBool;

use tracing::info;

use super::{Session, print_summary};
use crate::corrector::{BatchCorrector, Progress, RunSummary, check_abort};
use crate::cover::ExternalImageTools;
use crate::external::{Mp3Val, Validator};
use crate::review;
use crate::scanner::BaseDirScanner;

/// Prepare the base directory, then extract every file into a fresh
/// changes document.
fn extract(
    session: &Session,
    corrector: &BatchCorrector<'_>,
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    let config = &session.config;
    let abort: &AtomicBool = &session.abort;

    corrector.document().truncate()?;

    let mp3val = Mp3Val::new(&session.runner, config.tools.validator_program.as_str());
    let validator = config
        .tools
        .enable_validator
        .then_some(&mp3val as &dyn Validator);

    let scanner = BaseDirScanner::new(&config.paths);
    let report = scanner.prepare(&session.backend, validator)?;
    for name in &report.not_mp3 {
        info!("Set aside {} (not mp3)", name);
    }
    summary.broken.extend(report.broken);
    summary.recovered += report.validator_failures;
    check_abort(abort)?;

    println!("Extracting tags of {} files", report.total_files);
    let images = ExternalImageTools::new(&session.runner);
    let mut progress = Progress::new(report.total_files);
    corrector.extract_all(&images, &mut progress, summary, abort)?;

    info!(
        "Wrote {} entries to {:?}",
        summary.singles + summary.album_tracks + summary.images,
        corrector.document().path()
    );
    Ok(())
}

/// Commit, then drop the folders emptied by it.
fn commit(
    session: &Session,
    corrector: &BatchCorrector<'_>,
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    println!("Moving files to {}", session.config.paths.dest_dir.display());
    corrector.commit(summary, &session.abort)?;

    let removed = BaseDirScanner::new(&session.config.paths).remove_empty_dirs()?;
    info!("Removed {} empty folders", removed);
    Ok(())
}

/// Every phase in sequence, with the review checkpoint before commit.
pub fn cmd_run(session: &Session, review: bool) -> anyhow::Result<()> {
    let corrector = BatchCorrector::new(&session.config, &session.backend)?;
    let mut summary = RunSummary::default();

    extract(session, &corrector, &mut summary)?;
    check_abort(&session.abort)?;

    let values = corrector.correct()?;
    println!("Corrected {} values", values);
    check_abort(&session.abort)?;

    if review {
        review::checkpoint(
            &session.runner,
            &session.config.paths,
            corrector.document().path(),
        )?;
        check_abort(&session.abort)?;
    }

    commit(session, &corrector, &mut summary)?;
    print_summary(&summary);
    Ok(())
}

pub fn cmd_extract(session: &Session) -> anyhow::Result<()> {
    let corrector = BatchCorrector::new(&session.config, &session.backend)?;
    let mut summary = RunSummary::default();

    extract(session, &corrector, &mut summary)?;

    print_summary(&summary);
    println!(
        "Changes document: {}",
        corrector.document().path().display()
    );
    Ok(())
}

pub fn cmd_correct(session: &Session) -> anyhow::Result<()> {
    let corrector = BatchCorrector::new(&session.config, &session.backend)?;
    let values = corrector.correct()?;
    println!(
        "Corrected {} values in {}",
        values,
        corrector.document().path().display()
    );
    Ok(())
}

pub fn cmd_commit(session: &Session) -> anyhow::Result<()> {
    let corrector = BatchCorrector::new(&session.config, &session.backend)?;
    let mut summary = RunSummary::default();

    commit(session, &corrector, &mut summary)?;

    println!("Committed {} tracks", summary.committed);
    if summary.recovered > 0 {
        println!("{} problems were skipped, see the log above", summary.recovered);
    }
    Ok(())
}
