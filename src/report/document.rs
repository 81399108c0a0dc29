//! The export document: which sections a report has and in what order.

use chrono::{DateTime, Utc};

use crate::chart::ChartImage;
use crate::stats::StatisticsTable;
use crate::summary::SummaryOutcome;

/// Notice shown in place of the statistics grid when nothing was numeric.
pub const NO_NUMERIC_COLUMNS: &str = "No numeric columns found";

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// An empty table renders as [`NO_NUMERIC_COLUMNS`].
    Statistics(StatisticsTable),
    Chart(ChartImage),
    Summary(String),
    /// The summary was requested but did not complete.
    SummaryFailed(String),
}

impl Section {
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Statistics(_) => "Summary Statistics",
            Self::Chart(_) => "Chart",
            Self::Summary(_) | Self::SummaryFailed(_) => "AI Summary",
        }
    }
}

/// One export's worth of content, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<Section>,
}

impl ReportDocument {
    pub fn statistics(&self) -> Option<&StatisticsTable> {
        self.sections.iter().find_map(|s| match s {
            Section::Statistics(stats) => Some(stats),
            _ => None,
        })
    }

    pub fn chart(&self) -> Option<&ChartImage> {
        self.sections.iter().find_map(|s| match s {
            Section::Chart(image) => Some(image),
            _ => None,
        })
    }
}

/// Assemble a document. Sections always come out as statistics, then chart,
/// then summary, skipping whichever of the last two is absent.
pub fn compose(
    title: &str,
    statistics: &StatisticsTable,
    chart: Option<&ChartImage>,
    summary: Option<&SummaryOutcome>,
) -> ReportDocument {
    let mut sections = vec![Section::Statistics(statistics.clone())];

    if let Some(image) = chart {
        sections.push(Section::Chart(image.clone()));
    }

    match summary {
        Some(SummaryOutcome::Completed(text)) => sections.push(Section::Summary(text.clone())),
        Some(SummaryOutcome::Failed(err)) => sections.push(Section::SummaryFailed(err.to_string())),
        None => {}
    }

    tracing::debug!(sections = sections.len(), "Composed report");

    ReportDocument {
        title: title.to_owned(),
        generated_at: Utc::now(),
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{LoadOptions, load_table};
    use crate::summary::SummaryServiceError;

    fn stats() -> StatisticsTable {
        let table = load_table(b"price\n1\n2\n", &LoadOptions::default()).unwrap();
        StatisticsTable::compute(&table)
    }

    fn image() -> ChartImage {
        ChartImage::new(vec![0x89, b'P', b'N', b'G'], 1, 1, "Line Chart")
    }

    #[test]
    fn test_statistics_only() {
        let doc = compose("Report", &stats(), None, None);
        assert_eq!(doc.sections.len(), 1);
        assert!(matches!(doc.sections[0], Section::Statistics(_)));
    }

    #[test]
    fn test_section_order_is_fixed() {
        let summary = SummaryOutcome::Completed("Fine.".to_owned());
        let doc = compose("Report", &stats(), Some(&image()), Some(&summary));
        let headings: Vec<&str> = doc.sections.iter().map(Section::heading).collect();
        assert_eq!(headings, vec!["Summary Statistics", "Chart", "AI Summary"]);
        assert_eq!(doc.chart().map(|c| c.title.as_str()), Some("Line Chart"));
    }

    #[test]
    fn test_failed_summary_is_marked() {
        let summary = SummaryOutcome::Failed(SummaryServiceError::Network("offline".to_owned()));
        let doc = compose("Report", &stats(), None, Some(&summary));
        assert_eq!(doc.sections.len(), 2);
        match &doc.sections[1] {
            Section::SummaryFailed(msg) => assert!(msg.contains("offline")),
            other => panic!("expected a failed summary, got {other:?}"),
        }
        assert!(doc.statistics().is_some_and(|s| !s.is_empty()));
    }
}
