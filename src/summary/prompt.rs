//! Deterministic, size-bounded prompts.

use serde::Serialize;

use crate::dataset::Table;
use crate::stats::StatisticsTable;
use crate::utils::{render_grid, truncate_cell};

/// Upper bound on sample rows sent to the service.
pub const MAX_SAMPLE_ROWS: usize = 50;

/// Upper bound, in characters, on a single sample cell.
pub const MAX_CELL_CHARS: usize = 120;

const SYSTEM_PROMPT: &str = "You are a helpful data analyst.";

const INSTRUCTION: &str = "You are a data analyst. Write a clear, insightful summary of this \
dataset based on the following summary statistics.";

const GROUNDING: &str = "Answer strictly from the data supplied above. If the data does not \
support an answer, say so instead of guessing.";

/// The two chat messages sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn char_count(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// Leading rows of a table, as display strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRows {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    total_rows: usize,
}

impl SampleRows {
    /// The first `n` rows of `table`.
    pub fn from_table(table: &Table, n: usize) -> Self {
        Self {
            header: table.column_names().map(str::to_owned).collect(),
            rows: table.head(n),
            total_rows: table.row_count(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in the table the sample was taken from.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    fn bounded(mut self) -> Self {
        if self.rows.len() > MAX_SAMPLE_ROWS {
            tracing::debug!(
                rows = self.rows.len(),
                kept = MAX_SAMPLE_ROWS,
                "Capping sample rows"
            );
            self.rows.truncate(MAX_SAMPLE_ROWS);
        }
        for cell in self.rows.iter_mut().flatten() {
            if cell.chars().count() > MAX_CELL_CHARS {
                *cell = truncate_cell(cell, MAX_CELL_CHARS);
            }
        }
        self
    }
}

/// Everything the service is told about a dataset.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    statistics: StatisticsTable,
    sample: Option<SampleRows>,
    question: Option<String>,
}

impl SummaryRequest {
    /// Samples are capped at [`MAX_SAMPLE_ROWS`] rows of [`MAX_CELL_CHARS`]
    /// characters; a blank question counts as none.
    pub fn new(
        statistics: &StatisticsTable,
        sample: Option<SampleRows>,
        question: Option<&str>,
    ) -> Self {
        Self {
            statistics: statistics.clone(),
            sample: sample.filter(|s| !s.is_empty()).map(SampleRows::bounded),
            question: question
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_owned),
        }
    }

    pub fn sample(&self) -> Option<&SampleRows> {
        self.sample.as_ref()
    }

    pub fn question(&self) -> Option<&str> {
        self.question.as_deref()
    }

    /// Render the request. The same request always yields the same text.
    pub fn prompt(&self) -> Prompt {
        let mut user = String::new();
        user.push_str(INSTRUCTION);
        user.push_str("\n\nSummary statistics:\n");
        user.push_str(&self.statistics.render_text());
        user.push('\n');

        if let Some(sample) = &self.sample {
            user.push_str(&format!(
                "\nSample rows (first {} of {} rows):\n",
                sample.len(),
                sample.total_rows
            ));
            user.push_str(&render_grid(&sample.header, &sample.rows));
            user.push('\n');
        }

        if let Some(question) = &self.question {
            user.push_str(&format!("\nQuestion: {question}\n"));
        }

        user.push('\n');
        user.push_str(GROUNDING);

        Prompt {
            system: SYSTEM_PROMPT.to_owned(),
            user,
        }
    }
}
