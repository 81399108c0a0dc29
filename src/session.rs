//! One pipeline run.
//!
//! A [`ReportSession`] owns the loaded [`Table`] and whatever each stage has
//! produced so far. Stages run in any order the caller likes; a failing stage
//! returns its error and leaves earlier results in place.

use std::path::Path;

use crate::chart::{ChartImage, ChartRenderer, ChartRequest, ChartSpec, Discarded, resolve};
use crate::dataset::{LoadOptions, Table, load_table};
use crate::error::{ReportError, Result, ResultExt as _};
use crate::report::{self, ExportFormat, ReportDocument};
use crate::stats::StatisticsTable;
use crate::summary::{SampleRows, SummaryOutcome, SummaryRequest, SummaryService, Summarizer};

/// A resolved chart and its image.
#[derive(Debug, Clone)]
pub struct RenderedChart {
    pub spec: ChartSpec,
    pub image: ChartImage,
    pub discarded: Vec<Discarded>,
}

#[derive(Debug)]
pub struct ReportSession {
    source: String,
    table: Table,
    statistics: Option<StatisticsTable>,
    chart: Option<RenderedChart>,
    summary: Option<SummaryOutcome>,
    warnings: Vec<String>,
}

impl ReportSession {
    /// Start a session over an already loaded table.
    pub fn new(source: impl Into<String>, table: Table) -> Self {
        let source = source.into();
        tracing::info!(
            source = %source,
            rows = table.row_count(),
            columns = table.column_count(),
            "Loaded dataset"
        );
        Self {
            source,
            table,
            statistics: None,
            chart: None,
            summary: None,
            warnings: Vec::new(),
        }
    }

    /// Parse `bytes` and start a session.
    ///
    /// # Errors
    ///
    /// [`ReportError::Load`] when the bytes are not a readable table.
    pub fn load(source: impl Into<String>, bytes: &[u8], options: &LoadOptions) -> Result<Self> {
        let table = load_table(bytes, options)?;
        Ok(Self::new(source, table))
    }

    /// Read and parse a file; `-` reads standard input.
    ///
    /// # Errors
    ///
    /// [`ReportError::Other`] when the file or stdin cannot be read,
    /// [`ReportError::Load`] when its contents are not a readable table.
    pub fn open(path: &Path, options: &LoadOptions) -> Result<Self> {
        let bytes = if path.as_os_str() == "-" {
            let mut buf = Vec::new();
            std::io::Read::read_to_end(&mut std::io::stdin(), &mut buf)
                .context("Failed to read standard input")?;
            buf
        } else {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
        };
        let source = path
            .file_name()
            .map_or_else(|| "stdin".to_owned(), |n| n.to_string_lossy().into_owned());
        Self::load(source, &bytes, options)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Notices collected so far: empty statistics, discarded chart fields.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn warn(&mut self, message: String) {
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }

    /// Statistics for the table, computed on first use.
    pub fn statistics(&mut self) -> &StatisticsTable {
        if self.statistics.is_none() {
            let stats = StatisticsTable::compute(&self.table);
            if stats.is_empty() {
                self.warn("No numeric columns found for statistics or charts.".to_owned());
            }
            self.statistics = Some(stats);
        }
        self.statistics.get_or_insert_default()
    }

    /// Validate and draw a chart. On failure the previous chart, if any, is kept.
    ///
    /// # Errors
    ///
    /// [`ReportError::Spec`] for an invalid request, [`ReportError::Render`]
    /// when nothing can be drawn.
    pub fn chart(
        &mut self,
        request: &ChartRequest,
        renderer: &impl ChartRenderer,
    ) -> Result<&RenderedChart> {
        let resolution = resolve(request, &self.table)?;
        let image = renderer.render(&resolution.spec, &self.table)?;

        for discarded in &resolution.discarded {
            self.warn(discarded.to_string());
        }

        Ok(&*self.chart.insert(RenderedChart {
            spec: resolution.spec,
            image,
            discarded: resolution.discarded,
        }))
    }

    pub fn rendered_chart(&self) -> Option<&RenderedChart> {
        self.chart.as_ref()
    }

    /// The request a summary would send: statistics, up to `sample_rows` rows
    /// and the optional question.
    pub fn summary_request(&mut self, question: Option<&str>, sample_rows: usize) -> SummaryRequest {
        let sample = (sample_rows > 0).then(|| SampleRows::from_table(&self.table, sample_rows));
        SummaryRequest::new(self.statistics(), sample, question)
    }

    /// Ask for a summary and keep the outcome. Failures are recorded, not
    /// returned: statistics and chart stay as they were.
    pub async fn summarize<S: SummaryService>(
        &mut self,
        summarizer: &Summarizer<S>,
        question: Option<&str>,
        sample_rows: usize,
    ) -> &SummaryOutcome {
        let request = self.summary_request(question, sample_rows);
        let outcome = SummaryOutcome::from(summarizer.summarize(&request).await);
        self.summary.insert(outcome)
    }

    pub fn summary(&self) -> Option<&SummaryOutcome> {
        self.summary.as_ref()
    }

    /// Build the export document from everything produced so far.
    pub fn compose(&mut self, title: Option<&str>) -> ReportDocument {
        let title = title.map_or_else(|| format!("Data Report: {}", self.source), str::to_owned);
        let empty = StatisticsTable::default();
        self.statistics();
        report::compose(
            &title,
            self.statistics.as_ref().unwrap_or(&empty),
            self.chart.as_ref().map(|c| &c.image),
            self.summary.as_ref(),
        )
    }

    /// Compose and write the report.
    ///
    /// # Errors
    ///
    /// [`ReportError::Compose`] when the file cannot be written.
    pub fn export(
        &mut self,
        title: Option<&str>,
        format: ExportFormat,
        path: &Path,
    ) -> Result<ReportDocument> {
        let doc = self.compose(title);
        report::export(&doc, format, path).map_err(ReportError::from)?;
        Ok(doc)
    }
}
