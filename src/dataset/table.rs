//! Typed, column-oriented in-memory table.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::error::TableShapeError;
use crate::utils::{render_grid, truncate_cell};

/// Inferred kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Text,
    Datetime,
    Unknown,
}

impl ColumnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Text => "text",
            Self::Datetime => "datetime",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cell storage. Numeric columns keep parsed values, everything else keeps text.
/// `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Strings(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Strings(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    values: ColumnValues,
}

impl Column {
    /// Build a column. `Numeric` is the only kind backed by parsed numbers, so
    /// the kind and the storage must agree.
    ///
    /// # Errors
    ///
    /// [`TableShapeError::KindMismatch`] when they do not.
    pub fn new(
        name: impl Into<String>,
        kind: ColumnKind,
        values: ColumnValues,
    ) -> Result<Self, TableShapeError> {
        let name = name.into();
        let numeric_storage = matches!(values, ColumnValues::Numeric(_));
        if (kind == ColumnKind::Numeric) != numeric_storage {
            return Err(TableShapeError::KindMismatch {
                column: name,
                kind: kind.as_str(),
                storage: if numeric_storage { "numeric" } else { "string" },
            });
        }
        Ok(Self { name, kind, values })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Numeric cells, or `None` when the column is not numeric.
    pub fn numbers(&self) -> Option<&[Option<f64>]> {
        match &self.values {
            ColumnValues::Numeric(v) => Some(v),
            ColumnValues::Strings(_) => None,
        }
    }

    /// Number of non-missing cells.
    pub fn non_missing(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.iter().flatten().count(),
            ColumnValues::Strings(v) => v.iter().flatten().count(),
        }
    }

    /// Display text of one cell; missing cells render as an empty string.
    pub fn display_value(&self, row: usize) -> String {
        match &self.values {
            ColumnValues::Numeric(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(format_number)
                .unwrap_or_default(),
            ColumnValues::Strings(v) => v.get(row).cloned().flatten().unwrap_or_default(),
        }
    }

    /// Category label of one cell for grouping.
    pub(crate) fn label(&self, row: usize) -> Option<String> {
        match &self.values {
            ColumnValues::Numeric(v) => v.get(row).copied().flatten().map(format_number),
            ColumnValues::Strings(v) => v.get(row).cloned().flatten(),
        }
    }
}

/// Integers print without a fractional part, everything else uses the shortest
/// representation that round-trips.
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

/// Ordered set of equal-length, uniquely named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Build a table, enforcing unique names and equal column lengths.
    ///
    /// # Errors
    ///
    /// The first duplicate name or ragged column.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableShapeError> {
        let row_count = columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(TableShapeError::DuplicateName(col.name.clone()));
            }
            if col.len() != row_count {
                return Err(TableShapeError::LengthMismatch {
                    column: col.name.clone(),
                    expected: row_count,
                    actual: col.len(),
                });
            }
        }
        Ok(Self { columns, row_count })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Names of the columns of the given kind, in table order.
    pub fn columns_of_kind(&self, kind: ColumnKind) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Display values of one row.
    pub fn row(&self, index: usize) -> Option<Vec<String>> {
        (index < self.row_count)
            .then(|| self.columns.iter().map(|c| c.display_value(index)).collect())
    }

    /// The first `n` rows, as display strings.
    pub fn head(&self, n: usize) -> Vec<Vec<String>> {
        (0..n.min(self.row_count))
            .filter_map(|i| self.row(i))
            .collect()
    }

    /// Plain-text grid of the first `n` rows with a leading row index.
    pub fn preview(&self, n: usize) -> String {
        let mut header = vec![String::new()];
        header.extend(self.columns.iter().map(|c| c.name.clone()));

        let rows: Vec<Vec<String>> = self
            .head(n)
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let mut cells = vec![i.to_string()];
                cells.extend(row.iter().map(|v| truncate_cell(v, 40)));
                cells
            })
            .collect();

        render_grid(&header, &rows)
    }

    /// Columns grouped by what they can be used for in a chart.
    pub fn field_suggestions(&self) -> FieldSuggestions {
        FieldSuggestions {
            any: self.column_names().map(str::to_owned).collect(),
            numeric: self
                .columns_of_kind(ColumnKind::Numeric)
                .into_iter()
                .map(str::to_owned)
                .collect(),
            categorical: self
                .columns_of_kind(ColumnKind::Categorical)
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Candidate chart fields derived from column kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSuggestions {
    /// Usable as x-axis.
    pub any: Vec<String>,
    /// Usable as y-axis or pie value.
    pub numeric: Vec<String>,
    /// Usable as pie category.
    pub categorical: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(name: &str, values: &[Option<f64>]) -> Column {
        Column::new(name, ColumnKind::Numeric, ColumnValues::Numeric(values.to_vec())).unwrap()
    }

    fn strings(name: &str, kind: ColumnKind, values: &[Option<&str>]) -> Column {
        Column::new(
            name,
            kind,
            ColumnValues::Strings(values.iter().map(|v| v.map(str::to_owned)).collect()),
        )
        .unwrap()
    }

    #[test]
    fn test_column_kind_must_match_storage() {
        let err = Column::new(
            "price",
            ColumnKind::Numeric,
            ColumnValues::Strings(vec![Some("10".to_owned())]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TableShapeError::KindMismatch {
                column: "price".to_owned(),
                kind: "numeric",
                storage: "string",
            }
        );

        let err = Column::new(
            "label",
            ColumnKind::Categorical,
            ColumnValues::Numeric(vec![Some(1.0)]),
        )
        .unwrap_err();
        assert!(matches!(err, TableShapeError::KindMismatch { storage: "numeric", .. }));
        assert_eq!(
            err.to_string(),
            "column 'label' is declared categorical but holds numeric values"
        );
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = Table::new(vec![numeric("a", &[Some(1.0)]), numeric("a", &[Some(2.0)])])
            .unwrap_err();
        assert_eq!(err, TableShapeError::DuplicateName("a".to_owned()));
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let err = Table::new(vec![
            numeric("a", &[Some(1.0), Some(2.0)]),
            numeric("b", &[Some(2.0)]),
        ])
        .unwrap_err();
        assert!(matches!(err, TableShapeError::LengthMismatch { actual: 1, .. }));
    }

    #[test]
    fn test_head_and_preview() {
        let table = Table::new(vec![
            numeric("price", &[Some(10.0), None, Some(2.5)]),
            strings(
                "category",
                ColumnKind::Categorical,
                &[Some("A"), Some("B"), None],
            ),
        ])
        .unwrap();

        assert_eq!(table.row_count(), 3);
        assert_eq!(
            table.head(2),
            vec![
                vec!["10".to_owned(), "A".to_owned()],
                vec![String::new(), "B".to_owned()],
            ]
        );

        let preview = table.preview(5);
        assert!(preview.contains("price"));
        assert!(preview.contains("2.5"));
        assert_eq!(preview.lines().count(), 5, "header, rule and three rows");
    }

    #[test]
    fn test_field_suggestions() {
        let table = Table::new(vec![
            numeric("price", &[Some(1.0)]),
            strings("category", ColumnKind::Categorical, &[Some("A")]),
            strings("note", ColumnKind::Text, &[Some("free text")]),
        ])
        .unwrap();

        let s = table.field_suggestions();
        assert_eq!(s.any, vec!["price", "category", "note"]);
        assert_eq!(s.numeric, vec!["price"]);
        assert_eq!(s.categorical, vec!["category"]);
    }
}
