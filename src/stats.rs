//! Descriptive statistics for numeric columns.
//!
//! Produces the same eight figures as a `describe()` call: count, mean, sample
//! standard deviation, minimum, the three quartiles and maximum. Every figure is
//! computed from the column's values sorted with [`f64::total_cmp`], so the
//! result depends only on the multiset of values and never on row order.

use serde::Serialize;
use std::fmt;

use crate::dataset::Table;
use crate::utils::{fmt_opt, render_grid};

/// Row labels of the rendered statistics grid, in output order.
pub const STAT_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

/// Sample standard deviation, which needs at least two observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "value")]
pub enum StdDev {
    Value(f64),
    NotComputable,
}

impl StdDev {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::NotComputable => None,
        }
    }
}

impl fmt::Display for StdDev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.write_str(&fmt_opt(Some(*v))),
            Self::NotComputable => f.write_str("n/a"),
        }
    }
}

/// Statistics of one numeric column. Everything except `count` is absent
/// when the column has no values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStatistics {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: StdDev,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnStatistics {
    /// Compute statistics over the non-missing values of a column.
    pub fn from_values(values: &[Option<f64>]) -> Self {
        let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = (count > 0).then(|| sorted.iter().sum::<f64>() / count as f64);

        let std = match mean {
            Some(m) if count >= 2 => {
                let ss: f64 = sorted.iter().map(|v| (v - m) * (v - m)).sum();
                let std = (ss / (count - 1) as f64).sqrt();
                if std.is_finite() {
                    StdDev::Value(std)
                } else {
                    StdDev::NotComputable
                }
            }
            _ => StdDev::NotComputable,
        };

        Self {
            count,
            mean,
            std,
            min: sorted.first().copied(),
            p25: percentile(&sorted, 0.25),
            p50: percentile(&sorted, 0.50),
            p75: percentile(&sorted, 0.75),
            max: sorted.last().copied(),
        }
    }

    /// Rendered cells in [`STAT_LABELS`] order.
    pub fn cells(&self) -> [String; 8] {
        [
            self.count.to_string(),
            fmt_opt(self.mean),
            if self.count == 0 {
                fmt_opt(None)
            } else {
                self.std.to_string()
            },
            fmt_opt(self.min),
            fmt_opt(self.p25),
            fmt_opt(self.p50),
            fmt_opt(self.p75),
            fmt_opt(self.max),
        ]
    }
}

/// Percentile by linear interpolation between the closest order statistics
/// (`pos = q * (n - 1)`). `sorted` must be in ascending order. The result
/// always lies between the two order statistics, even when their difference
/// overflows.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q.clamp(0.0, 1.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let (lo_v, hi_v) = (*sorted.get(lo)?, *sorted.get(hi)?);
    let frac = pos - lo as f64;
    Some((lo_v * (1.0 - frac) + hi_v * frac).max(lo_v).min(hi_v))
}

/// Statistics keyed by numeric column name, in table column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsTable {
    columns: Vec<(String, ColumnStatistics)>,
}

impl StatisticsTable {
    /// Describe every numeric column of the table.
    ///
    /// A table without numeric columns yields an empty result rather than an error.
    pub fn compute(table: &Table) -> Self {
        let columns: Vec<(String, ColumnStatistics)> = table
            .columns()
            .iter()
            .filter_map(|c| {
                c.numbers()
                    .map(|v| (c.name().to_owned(), ColumnStatistics::from_values(v)))
            })
            .collect();

        if columns.is_empty() {
            tracing::warn!("No numeric columns found; statistics are empty");
        } else {
            tracing::debug!(columns = columns.len(), "Computed statistics");
        }

        Self { columns }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, column: &str) -> Option<&ColumnStatistics> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnStatistics)> {
        self.columns.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Grid cells: header row (blank corner + column names) and one row per statistic.
    pub fn grid(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let mut header = vec![String::new()];
        header.extend(self.column_names().map(str::to_owned));

        let cells: Vec<[String; 8]> = self.columns.iter().map(|(_, s)| s.cells()).collect();
        let rows = STAT_LABELS
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let mut row = vec![(*label).to_owned()];
                row.extend(cells.iter().filter_map(|c| c.get(i).cloned()));
                row
            })
            .collect();

        (header, rows)
    }

    /// Fixed-width text rendering; empty tables render a notice instead.
    pub fn render_text(&self) -> String {
        if self.is_empty() {
            return "No numeric columns found.".to_owned();
        }
        let (header, rows) = self.grid();
        render_grid(&header, &rows)
    }
}
