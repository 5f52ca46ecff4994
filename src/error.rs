//! Application-wide error types.
//!
//! Library modules use the [`Error`] enum via `thiserror`, while the CLI
//! and `main` use `anyhow` for convenient error propagation.
//!
//! # Taxonomy
//!
//! - Recoverable per file or directory: [`Error::Metadata`], [`Error::Tool`],
//!   [`Error::ToolTimeout`], [`Error::DestinationExists`]. Callers log these
//!   and keep going.
//! - Fatal before any mutation: [`Error::Config`].
//! - Fatal for the commit phase: [`Error::BlankField`], [`Error::InvalidField`],
//!   [`Error::Document`].

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tag reading/writing error
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Missing or contradictory configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed block in the changes document
    #[error("Changes document, block {block}: {message}")]
    Document { block: usize, message: String },

    /// Required tag field left blank after correction
    #[error("Field '{field}' is blank for {path}")]
    BlankField { path: PathBuf, field: &'static str },

    /// Tag field present but unusable (e.g. non-numeric track number)
    #[error("Field '{field}' has invalid value '{value}' for {path}")]
    InvalidField {
        path: PathBuf,
        field: &'static str,
        value: String,
    },

    /// External tool failed to start or exited unsuccessfully
    #[error("{program} failed: {message}")]
    Tool { program: String, message: String },

    /// External tool exceeded its time budget
    #[error("{program} timed out after {seconds}s")]
    ToolTimeout { program: String, seconds: u64 },

    /// A move would replace a file that is already there
    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// Run interrupted by the user between phases
    #[error("Run aborted by user")]
    Aborted,

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a document parse error for the given (1-based) block.
    pub fn document(block: usize, message: impl Into<String>) -> Self {
        Self::Document {
            block,
            message: message.into(),
        }
    }

    /// Create a tool failure.
    pub fn tool(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Whether the batch may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Metadata { .. }
            | Self::Tool { .. }
            | Self::ToolTimeout { .. }
            | Self::DestinationExists { .. } => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_field_display() {
        let err = Error::BlankField {
            path: PathBuf::from("/music/song.mp3"),
            field: "title",
        };
        let msg = err.to_string();
        assert!(msg.contains("song.mp3"));
        assert!(msg.contains("title"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::config("base_dir is empty").context("while loading settings");
        let msg = err.to_string();
        assert!(msg.contains("while loading settings"));
        assert!(msg.contains("base_dir is empty"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::metadata("/a.mp3", "bad frame").is_recoverable());
        assert!(
            Error::ToolTimeout {
                program: "mp3val".into(),
                seconds: 5
            }
            .is_recoverable()
        );
        assert!(Error::tool("jpegoptim", "exit 1").context("optimizing").is_recoverable());
        assert!(
            Error::DestinationExists {
                path: "/lib/a.mp3".into()
            }
            .is_recoverable()
        );
        assert!(!Error::config("x").is_recoverable());
        assert!(!Error::Aborted.is_recoverable());
    }

    #[test]
    fn test_result_ext() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("disk gone"));
        let with_ctx = result.with_context("writing changes document");
        assert!(
            with_ctx
                .unwrap_err()
                .to_string()
                .contains("writing changes document")
        );
    }
}
