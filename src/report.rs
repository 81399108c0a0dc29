//! Report composition and export.
//!
//! - [`document`]: [`compose`] merges statistics, chart and summary into a [`ReportDocument`]
//! - [`render`]: HTML and Markdown serialisation
//!
//! [`export`] writes the serialised document through a staging file in the
//! destination directory, so the target path only ever holds a complete report.

pub mod document;
pub mod render;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write as _;
use std::path::Path;
use std::str::FromStr;

use crate::error::ComposeError;

pub use document::{NO_NUMERIC_COLUMNS, ReportDocument, Section, compose};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Html,
    Markdown,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "md",
        }
    }

    /// Format implied by a file extension, if recognised.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "html" | "htm" => Some(Self::Html),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" | "htm" => Ok(Self::Html),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(format!("unknown export format '{other}' (expected html or markdown)")),
        }
    }
}

impl ReportDocument {
    pub fn to_bytes(&self, format: ExportFormat) -> Vec<u8> {
        match format {
            ExportFormat::Html => render::render_html(self).into_bytes(),
            ExportFormat::Markdown => render::render_markdown(self).into_bytes(),
        }
    }
}

/// Serialise `doc` and move it into place at `path`.
///
/// # Errors
///
/// Fails if the staging file cannot be created or written, or cannot replace
/// `path`. The staging file is removed on every failure.
pub fn export(doc: &ReportDocument, format: ExportFormat, path: &Path) -> Result<(), ComposeError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut staging = tempfile::Builder::new()
        .prefix(".report-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(|source| ComposeError::Staging {
            dir: dir.display().to_string(),
            source,
        })?;

    let bytes = doc.to_bytes(format);
    staging.write_all(&bytes)?;
    staging.as_file().sync_all()?;
    staging.persist(path)?;

    tracing::info!(
        format = %format,
        bytes = bytes.len(),
        "Exported report to {}",
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{LoadOptions, load_table};
    use crate::stats::StatisticsTable;

    fn doc() -> ReportDocument {
        let table = load_table(b"price\n10\n20\n30\n", &LoadOptions::default()).unwrap();
        compose("Prices", &StatisticsTable::compute(&table), None, None)
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("HTML".parse::<ExportFormat>(), Ok(ExportFormat::Html));
        assert_eq!("md".parse::<ExportFormat>(), Ok(ExportFormat::Markdown));
        assert!("pdf".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::from_path(Path::new("out/r.MD")), Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::from_path(Path::new("r.txt")), None);
    }

    #[test]
    fn test_export_writes_only_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");

        export(&doc(), ExportFormat::Html, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<!DOCTYPE html>"));
        assert_eq!(entries(dir.path()), vec!["report.html"]);
    }

    #[test]
    fn test_export_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        std::fs::write(&path, "old").unwrap();

        export(&doc(), ExportFormat::Markdown, &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("# Prices"));
    }

    #[test]
    fn test_missing_directory_is_staging_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.html");

        let err = export(&doc(), ExportFormat::Html, &path).unwrap_err();
        assert!(matches!(err, ComposeError::Staging { .. }), "{err}");
    }

    #[test]
    fn test_failed_persist_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("taken");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        let err = export(&doc(), ExportFormat::Html, &target).unwrap_err();
        assert!(matches!(err, ComposeError::Persist(_)), "{err}");
        assert_eq!(entries(dir.path()), vec!["taken"]);
    }
}
