//! # report-builder
//!
//! Turns a delimited text file into a report: descriptive statistics, a chart,
//! and a natural-language summary from a language-model service, composed into
//! one HTML or Markdown document.
//!
//! ```no_run
//! use report_builder::chart::{ChartKind, ChartRequest, PngChartRenderer};
//! use report_builder::dataset::LoadOptions;
//! use report_builder::report::ExportFormat;
//! use report_builder::session::ReportSession;
//! use std::path::Path;
//!
//! # fn example() -> report_builder::error::Result<()> {
//! let mut session = ReportSession::open(Path::new("sales.csv"), &LoadOptions::default())?;
//! println!("{}", session.statistics().render_text());
//!
//! let request = ChartRequest::new(ChartKind::Bar).x("category").y("price");
//! session.chart(&request, &PngChartRenderer::default())?;
//!
//! session.export(None, ExportFormat::Html, Path::new("report.html"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`dataset`]: loading bytes into a typed [`dataset::Table`]
//! - [`stats`]: per-column descriptive statistics
//! - [`chart`]: chart request validation and PNG rendering
//! - [`summary`]: prompt building and the summarization service
//! - [`report`]: document composition and export
//! - [`session`]: one pipeline run tying the stages together
//! - [`config`], [`logging`], [`error`], [`utils`]: the supporting cast

pub mod chart;
pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod report;
pub mod session;
pub mod stats;
pub mod summary;
pub mod utils;
