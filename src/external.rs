//! Running external programs (validator, image tools, editor) with a time
//! budget.
//!
//! Every call blocks the caller, but runs on a current-thread tokio runtime
//! so it can be raced against a timer. A child that outlives its budget is
//! killed and reported as [`Error::ToolTimeout`].

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio::runtime::{Builder, Runtime};

use crate::error::{Error, Result};

/// Executes external programs one at a time.
#[derive(Debug)]
pub struct ToolRunner {
    rt: Runtime,
    timeout: Duration,
}

impl ToolRunner {
    pub fn new(timeout: Duration) -> Result<Self> {
        let rt = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { rt, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `program` with captured output. A non-zero exit status is an
    /// [`Error::Tool`].
    pub fn output<I, S>(&self, program: &str, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let output = self.wait(program, self.timeout, cmd.output())?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool(
                program,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(output)
    }

    /// Run `program` attached to the terminal, bounded by `timeout`.
    pub fn interactive<I, S>(&self, program: &str, args: I, timeout: Duration) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);

        let status = self.wait(program, timeout, cmd.status())?;
        if !status.success() {
            return Err(Error::tool(program, format!("exited with {status}")));
        }
        Ok(())
    }

    fn wait<T>(
        &self,
        program: &str,
        timeout: Duration,
        fut: impl Future<Output = std::io::Result<T>>,
    ) -> Result<T> {
        self.rt.block_on(async {
            match tokio::time::timeout(timeout, fut).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(Error::tool(program, format!("failed to start: {e}"))),
                // Dropping the future drops the child, which kills it
                Err(_) => Err(Error::ToolTimeout {
                    program: program.to_string(),
                    seconds: timeout.as_secs(),
                }),
            }
        })
    }
}

/// Structural repair of an audio file in place.
pub trait Validator {
    fn repair(&self, path: &Path) -> Result<()>;
}

/// `mp3val -f -nb <file>`: fix errors, keep no backup.
pub struct Mp3Val<'a> {
    runner: &'a ToolRunner,
    program: String,
}

impl<'a> Mp3Val<'a> {
    pub fn new(runner: &'a ToolRunner, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }
}

impl Validator for Mp3Val<'_> {
    fn repair(&self, path: &Path) -> Result<()> {
        self.runner
            .output(
                &self.program,
                [OsStr::new("-f"), OsStr::new("-nb"), path.as_os_str()],
            )
            .map(|_| ())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner(secs: u64) -> ToolRunner {
        ToolRunner::new(Duration::from_secs(secs)).unwrap()
    }

    #[test]
    fn test_output_captures_stdout() {
        let output = runner(5).output("echo", ["hello"]).unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn test_failing_program_is_tool_error() {
        let result = runner(5).output("false", Vec::<&str>::new());
        assert!(matches!(result, Err(Error::Tool { .. })));
    }

    #[test]
    fn test_missing_program_is_tool_error() {
        let result = runner(5).output("definitely-not-a-real-program-xyz", ["x"]);
        match result {
            Err(Error::Tool { message, .. }) => assert!(message.contains("failed to start")),
            other => panic!("expected tool error, got {other:?}"),
        }
    }

    #[test]
    fn test_slow_program_times_out() {
        let result = runner(1).output("sleep", ["5"]);
        assert!(matches!(
            result,
            Err(Error::ToolTimeout { seconds: 1, .. })
        ));
    }

    #[test]
    fn test_validator_failure_is_recoverable() {
        let runner = runner(5);
        let validator = Mp3Val::new(&runner, "false");
        let err = validator.repair(Path::new("/tmp/x.mp3")).unwrap_err();
        assert!(err.is_recoverable());
    }
}
