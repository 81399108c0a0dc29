//! Delimited-text ingestion.
//!
//! Turns raw bytes into a [`Table`]:
//!
//! 1. decode the bytes (declared encoding, BOM, UTF-8, then Windows-1252)
//! 2. pick the delimiter (declared, or sniffed from the first lines)
//! 3. read the header and records with the `csv` crate, rejecting ragged rows
//! 4. infer a [`ColumnKind`] per column
//!
//! Failure is all-or-nothing: either a complete table or a [`LoadError`].

use std::borrow::Cow;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use super::table::{Column, ColumnKind, ColumnValues, Table};
use crate::error::{LoadError, TableShapeError};

/// Tokens treated as a missing value (compared after trimming).
const MISSING_TOKENS: &[&str] = &[
    "", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A", "-nan",
];

/// A text column with at most this many distinct values is categorical.
const CATEGORICAL_MAX_DISTINCT: usize = 20;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// How to read the input bytes.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Encoding label such as `utf-8` or `latin1`; `None` infers it.
    pub encoding: Option<String>,
    /// Field delimiter; `None` sniffs it.
    pub delimiter: Option<u8>,
}

impl LoadOptions {
    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }
}

/// Parse delimited bytes into a typed table.
///
/// # Errors
///
/// [`LoadError::Encoding`] when the declared encoding is unknown or cannot decode
/// the bytes, [`LoadError::Parse`] when the text is not well-formed delimited data.
pub fn load_table(bytes: &[u8], options: &LoadOptions) -> Result<Table, LoadError> {
    let (text, encoding) = decode(bytes, options.encoding.as_deref())?;
    if text.trim().is_empty() {
        return Err(LoadError::parse("input is empty; expected a header row"));
    }

    let delimiter = options.delimiter.unwrap_or_else(|| sniff_delimiter(&text));
    tracing::debug!(
        encoding = encoding.name(),
        delimiter = %char::from(delimiter).escape_default(),
        "Decoded input"
    );

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(false)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header = records
        .next()
        .ok_or_else(|| LoadError::parse("input is empty; expected a header row"))??;
    let names = unique_names(header.iter());

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
    for record in records {
        let record = record?;
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            column.push(missing_to_none(field));
        }
    }

    let table = names
        .into_iter()
        .zip(cells)
        .map(|(name, values)| infer_column(name, values))
        .collect::<Result<Vec<Column>, _>>()
        .and_then(Table::new)
        .map_err(|e| LoadError::parse(e.to_string()))?;
    tracing::info!(
        rows = table.row_count(),
        columns = table.column_count(),
        "Loaded table"
    );
    Ok(table)
}

/// Decode bytes into text.
///
/// A declared encoding is strict: bytes it cannot map are an error, never replaced.
/// Without a declaration the BOM decides, then UTF-8, then Windows-1252.
pub fn decode<'a>(
    bytes: &'a [u8],
    label: Option<&str>,
) -> Result<(Cow<'a, str>, &'static Encoding), LoadError> {
    let bom = Encoding::for_bom(bytes);

    let (encoding, body) = match label {
        Some(label) => {
            let encoding =
                Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| LoadError::Encoding {
                    encoding: label.to_owned(),
                    message: "unknown encoding label".to_owned(),
                })?;
            let body = match bom {
                Some((bom_encoding, len)) if bom_encoding == encoding => {
                    bytes.get(len..).unwrap_or_default()
                }
                _ => bytes,
            };
            (encoding, body)
        }
        None => match bom {
            Some((encoding, len)) => (encoding, bytes.get(len..).unwrap_or_default()),
            None => match std::str::from_utf8(bytes) {
                Ok(text) => return Ok((Cow::Borrowed(text), UTF_8)),
                Err(_) => {
                    tracing::warn!("Input is not valid UTF-8; decoding as windows-1252");
                    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
                    return Ok((text, WINDOWS_1252));
                }
            },
        },
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| (text, encoding))
        .ok_or_else(|| LoadError::Encoding {
            encoding: encoding.name().to_owned(),
            message: invalid_sequence_message(encoding, body),
        })
}

fn invalid_sequence_message(encoding: &'static Encoding, body: &[u8]) -> String {
    if encoding == UTF_8
        && let Err(e) = std::str::from_utf8(body)
    {
        return format!("invalid byte sequence at offset {}", e.valid_up_to());
    }
    "invalid byte sequence".to_owned()
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = b"\t;,|";
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(Result::ok)
                    .map_or(1, |r| r.len())
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        let Some(&target) = counts.first().filter(|&&c| c > 1) else {
            continue;
        };

        // Ties go to the wider split: more columns is more likely the real delimiter.
        let consistent = counts.iter().filter(|&&c| c == target).count();
        let score = consistent * target;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Fill blank header cells and suffix repeated names so every column is addressable.
fn unique_names<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let raw: Vec<String> = raw
        .enumerate()
        .map(|(i, name)| {
            if name.trim().is_empty() {
                format!("Unnamed: {i}")
            } else {
                name.to_owned()
            }
        })
        .collect();

    let mut taken: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(raw.len());
    for name in &raw {
        let mut candidate = name.clone();
        let mut n = 0;
        while taken.contains(&candidate) {
            n += 1;
            candidate = format!("{name}.{n}");
        }
        if candidate != *name {
            tracing::warn!(column = %name, renamed = %candidate, "Duplicate column name");
        }
        taken.insert(candidate.clone());
        names.push(candidate);
    }
    names
}

/// Missing tokens and non-finite numbers (`nan`, `inf`, overflowing literals)
/// become `None`.
fn missing_to_none(field: &str) -> Option<String> {
    let trimmed = field.trim();
    let non_finite = trimmed.parse::<f64>().is_ok_and(|v| !v.is_finite());
    if MISSING_TOKENS.contains(&trimmed) || non_finite {
        None
    } else {
        Some(field.to_owned())
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

fn parses_as_datetime(value: &str) -> bool {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .any(|f| NaiveDate::parse_from_str(value, f).is_ok())
        || DATETIME_FORMATS
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(value, f).is_ok())
        || DateTime::parse_from_rfc3339(value).is_ok()
}

fn infer_column(name: String, cells: Vec<Option<String>>) -> Result<Column, TableShapeError> {
    let present: Vec<&str> = cells.iter().flatten().map(String::as_str).collect();

    if present.is_empty() {
        return Column::new(name, ColumnKind::Unknown, ColumnValues::Strings(cells));
    }

    if present.iter().all(|v| parse_number(v).is_some()) {
        let numbers = cells
            .iter()
            .map(|c| c.as_deref().and_then(parse_number))
            .collect();
        return Column::new(name, ColumnKind::Numeric, ColumnValues::Numeric(numbers));
    }

    let kind = if present.iter().all(|v| parses_as_datetime(v)) {
        ColumnKind::Datetime
    } else {
        let distinct: HashSet<&str> = present.iter().copied().collect();
        if distinct.len() <= CATEGORICAL_MAX_DISTINCT || distinct.len() * 2 <= present.len() {
            ColumnKind::Categorical
        } else {
            ColumnKind::Text
        }
    };

    Column::new(name, kind, ColumnValues::Strings(cells))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> Table {
        load_table(text.as_bytes(), &LoadOptions::default()).expect("table loads")
    }

    #[test]
    fn test_infers_kinds() {
        let table = load(
            "id,price,category,when,empty\n\
             1,10.0,A,2024-01-02,\n\
             2,20.0,B,2024-01-03,\n\
             3,30.0,A,2024-01-04 10:00:00,\n",
        );

        let kinds: Vec<ColumnKind> = table.columns().iter().map(Column::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Numeric,
                ColumnKind::Numeric,
                ColumnKind::Categorical,
                ColumnKind::Datetime,
                ColumnKind::Unknown,
            ]
        );
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_missing_tokens_do_not_break_numeric() {
        let table = load("x\n1\nNA\n\n3\n");
        let col = table.column("x").unwrap();
        assert_eq!(col.kind(), ColumnKind::Numeric);
        assert_eq!(col.numbers().unwrap(), &[Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_non_finite_numbers_are_missing() {
        let table = load("x\n1\ninf\n-Infinity\n1e400\n3\n");
        let col = table.column("x").unwrap();
        assert_eq!(col.kind(), ColumnKind::Numeric);
        assert_eq!(col.numbers().unwrap(), &[Some(1.0), None, None, None, Some(3.0)]);

        let stats = crate::stats::StatisticsTable::compute(&table);
        let x = stats.get("x").unwrap();
        assert_eq!(x.mean, Some(2.0));
        assert!(x.std.value().is_some_and(f64::is_finite));
    }

    #[test]
    fn test_high_cardinality_strings_are_text() {
        let mut text = String::from("name\n");
        for i in 0..30 {
            text.push_str(&format!("person-{i}\n"));
        }
        let table = load(&text);
        assert_eq!(table.column("name").unwrap().kind(), ColumnKind::Text);
    }

    #[test]
    fn test_sniffs_semicolon_and_tab() {
        let table = load("a;b;c\n1;2;3\n4;5;6\n");
        assert_eq!(table.column_count(), 3);

        let table = load("a\tb\n1\t2\n");
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_ragged_row_is_parse_error() {
        let err = load_table(b"a,b\n1,2\n3\n", &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::Parse { line, message } => {
                assert_eq!(line, Some(3));
                assert!(message.contains("expected 2 fields"), "{message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_input_is_parse_error() {
        let err = load_table(b"  \n", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn test_declared_utf8_rejects_latin1_bytes() {
        let bytes = b"name\ncaf\xe9\n";
        let err = load_table(bytes, &LoadOptions::default().with_encoding("utf-8")).unwrap_err();
        match err {
            LoadError::Encoding { encoding, message } => {
                assert_eq!(encoding, "UTF-8");
                assert!(message.contains("offset 8"), "{message}");
            }
            other => panic!("expected encoding error, got {other:?}"),
        }
    }

    #[test]
    fn test_declared_latin1_and_inferred_fallback() {
        let bytes = b"name\ncaf\xe9\n";
        let declared = load_table(bytes, &LoadOptions::default().with_encoding("latin1")).unwrap();
        let inferred = load_table(bytes, &LoadOptions::default()).unwrap();
        assert_eq!(declared.row(0), Some(vec!["café".to_owned()]));
        assert_eq!(declared, inferred);
    }

    #[test]
    fn test_unknown_encoding_label() {
        let err = load_table(b"a\n1\n", &LoadOptions::default().with_encoding("klingon")).unwrap_err();
        assert!(matches!(err, LoadError::Encoding { .. }));
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let table = load("\u{feff}price\n1\n");
        assert!(table.column("price").is_some());
    }

    #[test]
    fn test_header_names_made_unique() {
        let table = load("a,a,,a.1\n1,2,3,4\n");
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["a", "a.1", "Unnamed: 2", "a.1.1"]
        );
    }

    #[test]
    fn test_header_only_input() {
        let table = load("a,b\n");
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column("a").unwrap().kind(), ColumnKind::Unknown);
    }
}
