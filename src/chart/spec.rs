//! Chart request validation.
//!
//! Checks a user's field selections against the table's column catalogue before
//! anything is drawn. The first violated constraint is returned as a
//! [`SpecError`]; nothing is substituted or coerced.
//!
//! Every named field must exist in the table, including fields that end up
//! discarded. Kinds that draw a single series keep the first field in user
//! order. Every field dropped that way, or supplied for a role the kind does not
//! use, is listed in [`Resolution::discarded`] so the caller can tell the user.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ChartKind, Rgb};
use crate::dataset::{ColumnKind, Table};
use crate::error::SpecError;

/// A chart as the user asked for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRequest {
    pub kind: ChartKind,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Vec<String>,
    /// Slice labels (pie only).
    #[serde(default)]
    pub category: Option<String>,
    /// Slice sizes (pie only).
    #[serde(default)]
    pub value: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ChartRequest {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            x: None,
            y: Vec::new(),
            category: None,
            value: Vec::new(),
            color: None,
            title: None,
        }
    }

    pub fn x(mut self, field: impl Into<String>) -> Self {
        self.x = Some(field.into());
        self
    }

    pub fn y(mut self, field: impl Into<String>) -> Self {
        self.y.push(field.into());
        self
    }

    pub fn category(mut self, field: impl Into<String>) -> Self {
        self.category = Some(field.into());
        self
    }

    pub fn value(mut self, field: impl Into<String>) -> Self {
        self.value.push(field.into());
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Validated field bindings, shaped by chart kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "layout", rename_all = "lowercase")]
pub enum ChartFields {
    /// Line, bar and scatter: one x-field against one or more numeric y-fields.
    Cartesian { x: String, y: Vec<String> },
    /// Pie: one categorical label field and one numeric size field.
    Pie { category: String, value: String },
}

/// A chart ready for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub fields: ChartFields,
    pub color: Rgb,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiscardReason {
    /// The kind draws a single series; only the first field is kept.
    ExtraSeries,
    /// The kind has no use for this role.
    UnusedRole,
    /// Same field listed twice.
    Duplicate,
}

/// A requested field the resolver did not keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discarded {
    pub role: &'static str,
    pub field: String,
    pub reason: DiscardReason,
}

impl fmt::Display for Discarded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let why = match self.reason {
            DiscardReason::ExtraSeries => "only the first field is used",
            DiscardReason::UnusedRole => "not used by this chart kind",
            DiscardReason::Duplicate => "listed more than once",
        };
        write!(f, "{} field '{}' ignored: {why}", self.role, self.field)
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub spec: ChartSpec,
    pub discarded: Vec<Discarded>,
}

/// Validate a chart request against the table.
///
/// # Errors
///
/// Returns the first violated constraint: a missing or unknown field, a field of
/// the wrong kind, or an unparseable color.
pub fn resolve(request: &ChartRequest, table: &Table) -> Result<Resolution, SpecError> {
    let kind = request.kind;
    check_known(request, table)?;
    let mut discarded = Vec::new();

    let fields = match kind {
        ChartKind::Line | ChartKind::Bar | ChartKind::Scatter => {
            let x = required(kind, "x", request.x.as_deref())?;
            lookup(table, "x", x)?;

            let y = select_series(kind, "y", &request.y, &mut discarded)?;
            for field in &y {
                expect_kind(table, "y", field, ColumnKind::Numeric)?;
            }

            if let Some(category) = &request.category {
                discarded.push(unused("category", category));
            }
            discarded.extend(request.value.iter().map(|v| unused("value", v)));

            ChartFields::Cartesian {
                x: x.to_owned(),
                y,
            }
        }
        ChartKind::Pie => {
            let category = required(kind, "category", request.category.as_deref())?;
            expect_kind(table, "category", category, ColumnKind::Categorical)?;

            let value = select_series(kind, "value", &request.value, &mut discarded)?
                .into_iter()
                .next()
                .ok_or(SpecError::MissingField {
                    kind: kind.as_str(),
                    role: "value",
                })?;
            expect_kind(table, "value", &value, ColumnKind::Numeric)?;

            if let Some(x) = &request.x {
                discarded.push(unused("x", x));
            }
            discarded.extend(request.y.iter().map(|y| unused("y", y)));

            ChartFields::Pie {
                category: category.to_owned(),
                value,
            }
        }
    };

    let color = match &request.color {
        Some(c) => c.parse::<Rgb>()?,
        None => Rgb::default(),
    };

    let title = request
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("{} Chart", kind.label()));

    for d in &discarded {
        tracing::warn!(chart = %kind, "{d}");
    }

    Ok(Resolution {
        spec: ChartSpec {
            kind,
            fields,
            color,
            title,
        },
        discarded,
    })
}

fn required<'a>(
    kind: ChartKind,
    role: &'static str,
    field: Option<&'a str>,
) -> Result<&'a str, SpecError> {
    field
        .filter(|f| !f.trim().is_empty())
        .ok_or(SpecError::MissingField {
            kind: kind.as_str(),
            role,
        })
}

/// Deduplicate the requested series and, for single-series kinds, keep the first.
/// Never returns an empty list.
fn select_series(
    kind: ChartKind,
    role: &'static str,
    requested: &[String],
    discarded: &mut Vec<Discarded>,
) -> Result<Vec<String>, SpecError> {
    let mut kept: Vec<String> = Vec::new();
    for field in requested.iter().filter(|f| !f.trim().is_empty()) {
        if kept.contains(field) {
            discarded.push(Discarded {
                role,
                field: field.clone(),
                reason: DiscardReason::Duplicate,
            });
        } else if !kept.is_empty() && !kind.accepts_multiple_series() {
            discarded.push(Discarded {
                role,
                field: field.clone(),
                reason: DiscardReason::ExtraSeries,
            });
        } else {
            kept.push(field.clone());
        }
    }

    if kept.is_empty() {
        return Err(SpecError::MissingField {
            kind: kind.as_str(),
            role,
        });
    }
    Ok(kept)
}

/// Every non-blank field in the request, in role order, must name a column.
fn check_known(request: &ChartRequest, table: &Table) -> Result<(), SpecError> {
    let named = request
        .x
        .iter()
        .map(|f| ("x", f))
        .chain(request.y.iter().map(|f| ("y", f)))
        .chain(request.category.iter().map(|f| ("category", f)))
        .chain(request.value.iter().map(|f| ("value", f)));

    for (role, field) in named.filter(|(_, f)| !f.trim().is_empty()) {
        lookup(table, role, field)?;
    }
    Ok(())
}

fn lookup<'t>(
    table: &'t Table,
    role: &'static str,
    field: &str,
) -> Result<&'t crate::dataset::Column, SpecError> {
    table.column(field).ok_or_else(|| SpecError::UnknownField {
        role,
        field: field.to_owned(),
    })
}

fn expect_kind(
    table: &Table,
    role: &'static str,
    field: &str,
    expected: ColumnKind,
) -> Result<(), SpecError> {
    let column = lookup(table, role, field)?;
    if column.kind() == expected {
        Ok(())
    } else {
        Err(SpecError::KindMismatch {
            role,
            field: field.to_owned(),
            expected: expected.as_str(),
            actual: column.kind().as_str(),
        })
    }
}

fn unused(role: &'static str, field: &str) -> Discarded {
    Discarded {
        role,
        field: field.to_owned(),
        reason: DiscardReason::UnusedRole,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{LoadOptions, load_table};

    fn sales() -> Table {
        load_table(
            b"id,price,category,qty\n1,10.0,A,4\n2,20.0,B,5\n3,30.0,A,6\n",
            &LoadOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_line_with_several_series() {
        let req = ChartRequest::new(ChartKind::Line).x("id").y("price").y("qty");
        let res = resolve(&req, &sales()).unwrap();
        assert_eq!(
            res.spec.fields,
            ChartFields::Cartesian {
                x: "id".to_owned(),
                y: vec!["price".to_owned(), "qty".to_owned()],
            }
        );
        assert_eq!(res.spec.title, "Line Chart");
        assert_eq!(res.spec.color, Rgb::default());
        assert!(res.discarded.is_empty());
    }

    #[test]
    fn test_x_may_be_categorical() {
        let req = ChartRequest::new(ChartKind::Bar).x("category").y("price");
        assert!(resolve(&req, &sales()).is_ok());
    }

    #[test]
    fn test_scatter_keeps_first_series_and_reports_rest() {
        let req = ChartRequest::new(ChartKind::Scatter)
            .x("id")
            .y("qty")
            .y("price")
            .category("category");
        let res = resolve(&req, &sales()).unwrap();

        assert_eq!(
            res.spec.fields,
            ChartFields::Cartesian {
                x: "id".to_owned(),
                y: vec!["qty".to_owned()],
            }
        );
        assert_eq!(res.discarded.len(), 2);
        assert_eq!(res.discarded[0].field, "price");
        assert_eq!(res.discarded[0].reason, DiscardReason::ExtraSeries);
        assert_eq!(res.discarded[1].reason, DiscardReason::UnusedRole);
        assert_eq!(
            res.discarded[0].to_string(),
            "y field 'price' ignored: only the first field is used"
        );
    }

    #[test]
    fn test_discarded_fields_must_still_exist() {
        let req = ChartRequest::new(ChartKind::Scatter)
            .x("id")
            .y("price")
            .y("ghost");
        assert_eq!(
            resolve(&req, &sales()).unwrap_err(),
            SpecError::UnknownField {
                role: "y",
                field: "ghost".to_owned(),
            }
        );

        let req = ChartRequest::new(ChartKind::Pie)
            .category("category")
            .value("price")
            .x("ghost");
        assert!(matches!(
            resolve(&req, &sales()),
            Err(SpecError::UnknownField { role: "x", .. })
        ));

        let req = ChartRequest::new(ChartKind::Line)
            .x("id")
            .y("price")
            .category("ghost");
        assert!(matches!(
            resolve(&req, &sales()),
            Err(SpecError::UnknownField { role: "category", .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let req = ChartRequest::new(ChartKind::Line).x("id").y("revenue");
        assert_eq!(
            resolve(&req, &sales()).unwrap_err(),
            SpecError::UnknownField {
                role: "y",
                field: "revenue".to_owned(),
            }
        );

        let req = ChartRequest::new(ChartKind::Line).x("when").y("price");
        assert!(matches!(
            resolve(&req, &sales()),
            Err(SpecError::UnknownField { role: "x", .. })
        ));
    }

    #[test]
    fn test_rejects_non_numeric_y() {
        let req = ChartRequest::new(ChartKind::Bar).x("id").y("category");
        assert_eq!(
            resolve(&req, &sales()).unwrap_err(),
            SpecError::KindMismatch {
                role: "y",
                field: "category".to_owned(),
                expected: "numeric",
                actual: "categorical",
            }
        );
    }

    #[test]
    fn test_missing_fields() {
        let req = ChartRequest::new(ChartKind::Line).y("price");
        assert_eq!(
            resolve(&req, &sales()).unwrap_err(),
            SpecError::MissingField {
                kind: "line",
                role: "x"
            }
        );

        let req = ChartRequest::new(ChartKind::Line).x("id");
        assert_eq!(
            resolve(&req, &sales()).unwrap_err(),
            SpecError::MissingField {
                kind: "line",
                role: "y"
            }
        );

        let req = ChartRequest::new(ChartKind::Pie).category("category");
        assert_eq!(
            resolve(&req, &sales()).unwrap_err(),
            SpecError::MissingField {
                kind: "pie",
                role: "value"
            }
        );
    }

    #[test]
    fn test_pie_resolves() {
        let req = ChartRequest::new(ChartKind::Pie)
            .category("category")
            .value("price")
            .value("qty")
            .x("id");
        let res = resolve(&req, &sales()).unwrap();
        assert_eq!(
            res.spec.fields,
            ChartFields::Pie {
                category: "category".to_owned(),
                value: "price".to_owned(),
            }
        );
        let fields: Vec<&str> = res.discarded.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["qty", "id"]);
    }

    #[test]
    fn test_pie_with_swapped_fields_is_rejected() {
        let req = ChartRequest::new(ChartKind::Pie)
            .category("price")
            .value("category");
        assert_eq!(
            resolve(&req, &sales()).unwrap_err(),
            SpecError::KindMismatch {
                role: "category",
                field: "price".to_owned(),
                expected: "categorical",
                actual: "numeric",
            }
        );
    }

    #[test]
    fn test_invalid_color_rejected() {
        let req = ChartRequest::new(ChartKind::Line)
            .x("id")
            .y("price")
            .color("not-a-color");
        assert_eq!(
            resolve(&req, &sales()).unwrap_err(),
            SpecError::InvalidColor("not-a-color".to_owned())
        );
    }

    #[test]
    fn test_custom_color_and_title() {
        let req = ChartRequest::new(ChartKind::Bar)
            .x("category")
            .y("qty")
            .color("#00ff00")
            .title("Units by category");
        let res = resolve(&req, &sales()).unwrap();
        assert_eq!(res.spec.color, Rgb([0, 255, 0]));
        assert_eq!(res.spec.title, "Units by category");
    }
}
