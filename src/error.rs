//! Error taxonomy for the report pipeline.
//!
//! Every pipeline stage owns a small error enum describing how it can fail:
//!
//! | Stage     | Error                                    | Recoverable |
//! |-----------|------------------------------------------|-------------|
//! | load      | [`LoadError`] (parse / encoding)         | no, fatal to the run |
//! | chart     | [`SpecError`], [`RenderError`]           | yes, fix the selection |
//! | summary   | [`SummaryServiceError`]                  | yes, isolated to the summary |
//! | export    | [`ComposeError`]                         | yes, retry the export |
//!
//! [`ReportError`] wraps all of them so callers that drive the whole pipeline
//! can use `?` throughout and still tell which stage failed:
//!
//! ```
//! use report_builder::error::{LoadError, ReportError, Stage};
//!
//! let err: ReportError = LoadError::Parse { line: Some(3), message: "bad quote".into() }.into();
//! assert_eq!(err.stage(), Stage::Load);
//! assert!(err.to_string().starts_with("load failed:"));
//! ```

use std::fmt;

pub use crate::summary::SummaryServiceError;

/// Pipeline stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Load,
    Chart,
    Summary,
    Export,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Load => "load",
            Self::Chart => "chart",
            Self::Summary => "summary",
            Self::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input could not be turned into a [`crate::dataset::Table`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("malformed delimited text{}: {message}", line_suffix(.line))]
    Parse {
        line: Option<u64>,
        message: String,
    },

    #[error("cannot decode input as {encoding}: {message}")]
    Encoding { encoding: String, message: String },
}

fn line_suffix(line: &Option<u64>) -> String {
    line.map(|l| format!(" at line {l}")).unwrap_or_default()
}

impl LoadError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            line: None,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for LoadError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(csv::Position::line);
        let message = match err.kind() {
            csv::ErrorKind::UnequalLengths {
                expected_len, len, ..
            } => format!("expected {expected_len} fields but found {len}"),
            _ => err.to_string(),
        };
        Self::Parse { line, message }
    }
}

/// Columns handed to [`crate::dataset::Table::new`] or
/// [`crate::dataset::Column::new`] are inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableShapeError {
    #[error("duplicate column name '{0}'")]
    DuplicateName(String),

    #[error("column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("column '{column}' is declared {kind} but holds {storage} values")]
    KindMismatch {
        column: String,
        kind: &'static str,
        storage: &'static str,
    },
}

/// A chart request violates the table's column catalogue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("{kind} chart requires a {role} field")]
    MissingField { kind: &'static str, role: &'static str },

    #[error("{role} field '{field}' does not exist in the table")]
    UnknownField { role: &'static str, field: String },

    #[error("{role} field '{field}' is {actual}, expected {expected}")]
    KindMismatch {
        role: &'static str,
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid color '{0}' (use #rrggbb, #rgb or a color name)")]
    InvalidColor(String),

    #[error("unknown chart kind '{0}' (expected line, bar, scatter or pie)")]
    UnknownKind(String),
}

/// The rendering collaborator could not produce an image.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("nothing to plot: {0}")]
    NoData(String),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// The export document could not be produced or written.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("cannot allocate staging file in {dir}: {source}")]
    Staging {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write report: {0}")]
    Write(#[from] std::io::Error),

    #[error("cannot move report into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Top-level error for anything that drives the pipeline end to end.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("configuration failed: no summarization credential; set OPENAI_API_KEY or pass --api-key")]
    MissingCredential,

    #[error("configuration failed: {0}")]
    Config(String),

    #[error("load failed: {0}")]
    Load(#[from] LoadError),

    #[error("chart failed: {0}")]
    Spec(#[from] SpecError),

    #[error("chart failed: {0}")]
    Render(#[from] RenderError),

    #[error("summary failed: {0}")]
    Summary(#[from] SummaryServiceError),

    #[error("export failed: {0}")]
    Compose(#[from] ComposeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl ReportError {
    /// Stage that produced the failure, used to label user-facing messages.
    pub fn stage(&self) -> Stage {
        match self {
            Self::MissingCredential | Self::Config(_) => Stage::Configuration,
            Self::Load(_) | Self::Io(_) | Self::Other(_) => Stage::Load,
            Self::Spec(_) | Self::Render(_) => Stage::Chart,
            Self::Summary(_) => Stage::Summary,
            Self::Compose(_) => Stage::Export,
        }
    }

    /// Whether the session can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::MissingCredential | Self::Config(_) | Self::Load(_)
        )
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ReportError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: ReportError = e.into();
            ReportError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: ReportError = e.into();
            ReportError::Other(format!("{}: {}", f(), err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_stage() {
        let err: ReportError = SpecError::UnknownField {
            role: "x",
            field: "nope".to_owned(),
        }
        .into();
        assert_eq!(err.stage(), Stage::Chart);
        assert_eq!(
            err.to_string(),
            "chart failed: x field 'nope' does not exist in the table"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_parse_error_includes_line() {
        let err = LoadError::Parse {
            line: Some(4),
            message: "expected 3 fields but found 2".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "malformed delimited text at line 4: expected 3 fields but found 2"
        );
    }

    #[test]
    fn test_missing_credential_is_fatal() {
        let err = ReportError::MissingCredential;
        assert_eq!(err.stage(), Stage::Configuration);
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "data.csv",
        ));

        let result: Result<()> = result.context("Failed to read input");
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read input")
        );
    }
}
