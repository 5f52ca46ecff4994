//! Human review of the changes document between correction and commit.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::PathsConfig;
use crate::error::Result;
use crate::external::ToolRunner;

pub const PROMPT: &str = "Finished correcting the file? Press ENTER...";

/// Split the configured editor command into program and arguments.
/// `None` when no editor is configured.
pub fn editor_command(editor: &str) -> Option<(&str, Vec<&str>)> {
    let mut parts = editor.split_whitespace();
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Print [`PROMPT`] and block until a line (or end of input) arrives.
pub fn wait_for_enter(mut input: impl BufRead, mut output: impl Write) -> Result<()> {
    write!(output, "{PROMPT} ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(())
}

/// Open `document` in the configured editor, then wait for the user to
/// confirm. Does nothing when no editor is configured.
///
/// Returns whether a review took place.
pub fn checkpoint(runner: &ToolRunner, paths: &PathsConfig, document: &Path) -> Result<bool> {
    review_with(runner, paths, document, io::stdin().lock(), io::stdout())
}

/// [`checkpoint`] with the confirmation read from `input`.
///
/// An editor that fails or runs out of time is reported; the user can still
/// finish the review elsewhere before confirming.
pub fn review_with(
    runner: &ToolRunner,
    paths: &PathsConfig,
    document: &Path,
    input: impl BufRead,
    output: impl Write,
) -> Result<bool> {
    let Some((program, args)) = editor_command(&paths.editor) else {
        info!("No editor configured, committing without review");
        return Ok(false);
    };

    info!("Opening {:?} with {}", document, program);
    let timeout = Duration::from_secs(paths.editor_timeout_secs);
    let args = args
        .into_iter()
        .map(std::ffi::OsStr::new)
        .chain([document.as_os_str()]);
    match runner.interactive(program, args, timeout) {
        Ok(()) => {}
        Err(e) if e.is_recoverable() => {
            warn!("Editor did not finish cleanly: {}", e);
        }
        Err(e) => return Err(e.context("reviewing the changes document")),
    }

    wait_for_enter(input, output)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_command_split() {
        assert_eq!(editor_command(""), None);
        assert_eq!(editor_command("   "), None);
        assert_eq!(editor_command("vim"), Some(("vim", vec![])));
        assert_eq!(
            editor_command("code --wait -n"),
            Some(("code", vec!["--wait", "-n"]))
        );
    }

    #[test]
    fn test_wait_for_enter_prints_prompt() {
        let mut out = Vec::new();
        wait_for_enter(&b"\n"[..], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{PROMPT} "));
    }

    #[test]
    fn test_wait_for_enter_accepts_eof() {
        assert!(wait_for_enter(&b""[..], io::sink()).is_ok());
    }

    #[test]
    fn test_checkpoint_skipped_without_editor() {
        let runner = ToolRunner::new(Duration::from_secs(1)).unwrap();
        let paths = PathsConfig::default();
        assert!(!checkpoint(&runner, &paths, Path::new("changes.yaml")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_editor_still_prompts() {
        let runner = ToolRunner::new(Duration::from_secs(5)).unwrap();
        let paths = PathsConfig {
            editor: "false".to_string(),
            ..PathsConfig::default()
        };
        let mut out = Vec::new();

        let reviewed =
            review_with(&runner, &paths, Path::new("changes.yaml"), &b"\n"[..], &mut out).unwrap();

        assert!(reviewed);
        assert!(String::from_utf8(out).unwrap().starts_with(PROMPT));
    }

    #[cfg(unix)]
    #[test]
    fn test_editor_timeout_still_prompts() {
        let runner = ToolRunner::new(Duration::from_secs(5)).unwrap();
        let paths = PathsConfig {
            editor: "sleep 5".to_string(),
            editor_timeout_secs: 0,
            ..PathsConfig::default()
        };

        let reviewed =
            review_with(&runner, &paths, Path::new("1"), &b""[..], io::sink()).unwrap();

        assert!(reviewed);
    }

    #[cfg(unix)]
    #[test]
    fn test_working_editor_then_prompt() {
        let runner = ToolRunner::new(Duration::from_secs(5)).unwrap();
        let paths = PathsConfig {
            editor: "true".to_string(),
            ..PathsConfig::default()
        };
        let mut out = Vec::new();

        assert!(review_with(&runner, &paths, Path::new("x"), &b"\n"[..], &mut out).unwrap());
        assert_eq!(String::from_utf8(out).unwrap(), format!("{PROMPT} "));
    }
}
