//! Chart rasterisation.
//!
//! [`ChartRenderer`] is the seam between a validated [`ChartSpec`] and whatever
//! draws it. [`PngChartRenderer`] is the bundled implementation: it draws onto
//! an RGB canvas and encodes a PNG with the `image` crate, which is what the
//! report export embeds.
//!
//! The PNG carries no text. Everything a reader needs to decode it (axis
//! fields, category order along x, and which colour stands for which series or
//! slice) travels alongside in [`ChartImage`] and is printed by the report.

use std::io::Cursor;

use base64::Engine as _;
use image::{ImageFormat, Rgb as Pixel, RgbImage};

use super::spec::{ChartFields, ChartSpec};
use super::{ChartKind, Rgb};
use crate::dataset::{Column, Table};
use crate::error::RenderError;

const BACKGROUND: Pixel<u8> = Pixel([255, 255, 255]);
const AXIS: Pixel<u8> = Pixel([90, 90, 90]);
const GRID: Pixel<u8> = Pixel([225, 225, 225]);
const MARGIN: i64 = 40;

/// A colour in the chart and what it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub label: String,
    pub color: Rgb,
}

/// Encoded chart image and the key needed to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Field on the x-axis; `None` for pie charts.
    pub x_label: Option<String>,
    /// Fields on the y-axis, comma separated; `None` for pie charts.
    pub y_label: Option<String>,
    /// Labels along a non-numeric x-axis, left to right.
    pub x_categories: Vec<String>,
    /// One entry per series, or per slice for pie charts.
    pub legend: Vec<LegendEntry>,
}

impl ChartImage {
    /// An image with no axes or legend.
    pub fn new(png: Vec<u8>, width: u32, height: u32, title: impl Into<String>) -> Self {
        Self {
            png,
            width,
            height,
            title: title.into(),
            x_label: None,
            y_label: None,
            x_categories: Vec::new(),
            legend: Vec::new(),
        }
    }

    /// `x-axis: month; y-axis: price, qty`, when the chart has axes.
    pub fn axis_caption(&self) -> Option<String> {
        match (&self.x_label, &self.y_label) {
            (Some(x), Some(y)) => Some(format!("x-axis: {x}; y-axis: {y}")),
            (Some(x), None) => Some(format!("x-axis: {x}")),
            (None, Some(y)) => Some(format!("y-axis: {y}")),
            (None, None) => None,
        }
    }

    /// `data:` URI for embedding the PNG in HTML or Markdown.
    pub fn data_uri(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }
}

/// Produces an image from a resolved chart and its source table.
pub trait ChartRenderer {
    /// # Errors
    ///
    /// Fails when the table holds nothing plottable for the spec or the image
    /// cannot be encoded.
    fn render(&self, spec: &ChartSpec, table: &Table) -> Result<ChartImage, RenderError>;
}

/// Draws charts into a fixed-size PNG.
#[derive(Debug, Clone, Copy)]
pub struct PngChartRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for PngChartRenderer {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
        }
    }
}

impl ChartRenderer for PngChartRenderer {
    fn render(&self, spec: &ChartSpec, table: &Table) -> Result<ChartImage, RenderError> {
        let mut canvas = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        let mut chart = ChartImage::new(Vec::new(), self.width, self.height, spec.title.clone());

        match &spec.fields {
            ChartFields::Cartesian { x, y } => {
                let mut plot = cartesian_series(table, x, y)?;
                if spec.kind == ChartKind::Bar {
                    for (_, points) in &mut plot.series {
                        *points = sum_by_x(points);
                    }
                }
                draw_cartesian(&mut canvas, spec, &plot);

                chart.x_label = Some(x.clone());
                chart.y_label = Some(y.join(", "));
                chart.legend = plot
                    .series
                    .iter()
                    .enumerate()
                    .map(|(i, (name, _))| LegendEntry {
                        label: name.clone(),
                        color: color_at(spec.color, i),
                    })
                    .collect();
                chart.x_categories = plot.categories;
            }
            ChartFields::Pie { category, value } => {
                let slices = pie_slices(table, category, value)?;
                draw_pie(&mut canvas, spec.color, &slices);

                let total: f64 = slices.iter().map(|(_, v)| v).sum();
                chart.legend = slices
                    .iter()
                    .enumerate()
                    .map(|(i, (label, v))| LegendEntry {
                        label: format!("{label} ({:.1}%)", v / total * 100.0),
                        color: color_at(spec.color, i),
                    })
                    .collect();
            }
        }

        image::DynamicImage::ImageRgb8(canvas)
            .write_to(&mut Cursor::new(&mut chart.png), ImageFormat::Png)?;
        tracing::debug!(kind = %spec.kind, bytes = chart.png.len(), "Rendered chart");

        Ok(chart)
    }
}

/// The first series takes the requested colour, the rest the palette.
fn color_at(first: Rgb, i: usize) -> Rgb {
    if i == 0 { first } else { Rgb::series(i) }
}

struct Series {
    color: Rgb,
    /// (x, y) in row order; rows with a missing value are skipped.
    points: Vec<(f64, f64)>,
}

/// Named point lists plus the category labels of a non-numeric x-axis.
#[derive(Debug)]
struct CartesianData {
    series: Vec<(String, Vec<(f64, f64)>)>,
    categories: Vec<String>,
}

/// X position of each row: the value itself for numeric x, otherwise the index
/// of the row's label among the distinct labels in order of first appearance.
fn x_positions(column: &Column) -> (Vec<Option<f64>>, Vec<String>) {
    if let Some(values) = column.numbers() {
        return (values.to_vec(), Vec::new());
    }

    let mut categories: Vec<String> = Vec::new();
    let positions = (0..column.len())
        .map(|row| {
            column.label(row).map(|label| {
                let slot = match categories.iter().position(|c| *c == label) {
                    Some(slot) => slot,
                    None => {
                        categories.push(label);
                        categories.len() - 1
                    }
                };
                slot as f64
            })
        })
        .collect();
    (positions, categories)
}

/// One bar per x position: values sharing an x are added up, first appearance first.
fn sum_by_x(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::new();
    for &(x, y) in points {
        match out.iter_mut().find(|(seen, _)| *seen == x) {
            Some((_, total)) => *total += y,
            None => out.push((x, y)),
        }
    }
    out
}

fn column<'t>(table: &'t Table, name: &str) -> Result<&'t Column, RenderError> {
    table
        .column(name)
        .ok_or_else(|| RenderError::NoData(format!("column '{name}' is not in the table")))
}

fn cartesian_series(table: &Table, x: &str, ys: &[String]) -> Result<CartesianData, RenderError> {
    let (xs, categories) = x_positions(column(table, x)?);

    let mut out = Vec::with_capacity(ys.len());
    for y in ys {
        let values = column(table, y)?
            .numbers()
            .ok_or_else(|| RenderError::NoData(format!("column '{y}' is not numeric")))?;
        let points: Vec<(f64, f64)> = xs
            .iter()
            .zip(values)
            .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        out.push((y.clone(), points));
    }

    if out.iter().all(|(_, p)| p.is_empty()) {
        return Err(RenderError::NoData(
            "no row has both an x value and a y value".to_owned(),
        ));
    }
    Ok(CartesianData {
        series: out,
        categories,
    })
}

/// Sum of non-negative values per category, in order of first appearance.
fn pie_slices(
    table: &Table,
    category: &str,
    value: &str,
) -> Result<Vec<(String, f64)>, RenderError> {
    let labels = column(table, category)?;
    let values = column(table, value)?
        .numbers()
        .ok_or_else(|| RenderError::NoData(format!("column '{value}' is not numeric")))?;

    let mut slices: Vec<(String, f64)> = Vec::new();
    for (row, v) in values.iter().enumerate() {
        let (Some(label), Some(v)) = (labels.label(row), *v) else {
            continue;
        };
        if !v.is_finite() || v < 0.0 {
            continue;
        }
        match slices.iter_mut().find(|(l, _)| *l == label) {
            Some((_, total)) => *total += v,
            None => slices.push((label, v)),
        }
    }

    if slices.iter().map(|(_, v)| v).sum::<f64>() <= 0.0 {
        return Err(RenderError::NoData(format!(
            "'{value}' has no positive values to divide into slices"
        )));
    }
    Ok(slices)
}

/// Data-space to pixel-space mapping for the plot area.
struct Frame {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    fn new(width: u32, height: u32, xs: (f64, f64), ys: (f64, f64)) -> Self {
        let widen = |(lo, hi): (f64, f64)| {
            if (hi - lo).abs() < f64::EPSILON {
                (lo - 1.0, hi + 1.0)
            } else {
                (lo, hi)
            }
        };
        let (x_min, x_max) = widen(xs);
        let (y_min, y_max) = widen(ys);
        Self {
            left: MARGIN,
            top: MARGIN,
            right: i64::from(width) - MARGIN,
            bottom: i64::from(height) - MARGIN,
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    fn px(&self, x: f64, y: f64) -> (i64, i64) {
        let fx = (x - self.x_min) / (self.x_max - self.x_min);
        let fy = (y - self.y_min) / (self.y_max - self.y_min);
        (
            self.left + (fx * (self.right - self.left) as f64).round() as i64,
            self.bottom - (fy * (self.bottom - self.top) as f64).round() as i64,
        )
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn draw_cartesian(canvas: &mut RgbImage, spec: &ChartSpec, plot: &CartesianData) {
    let series: Vec<Series> = plot
        .series
        .iter()
        .enumerate()
        .map(|(i, (_, points))| Series {
            color: color_at(spec.color, i),
            points: points.clone(),
        })
        .collect();

    let all = || series.iter().flat_map(|s| s.points.iter());
    let xs = bounds(all().map(|p| p.0)).unwrap_or((0.0, 1.0));
    let mut ys = bounds(all().map(|p| p.1)).unwrap_or((0.0, 1.0));
    if spec.kind == ChartKind::Bar {
        ys = (ys.0.min(0.0), ys.1.max(0.0));
    }

    let (width, height) = canvas.dimensions();
    let frame = if spec.kind == ChartKind::Bar {
        // Half a slot of padding on each side so edge bars are not clipped.
        let slot = bar_slot(xs, &series);
        Frame::new(width, height, (xs.0 - slot / 2.0, xs.1 + slot / 2.0), ys)
    } else {
        Frame::new(width, height, xs, ys)
    };

    draw_axes(canvas, &frame);
    for slot in 0..plot.categories.len() {
        let (x, y) = frame.px(slot as f64, frame.y_min);
        draw_line(canvas, (x, y), (x, y + 6), AXIS_RGB, 1);
    }

    match spec.kind {
        ChartKind::Line => {
            for s in &series {
                for pair in s.points.windows(2) {
                    if let [a, b] = pair {
                        let (x0, y0) = frame.px(a.0, a.1);
                        let (x1, y1) = frame.px(b.0, b.1);
                        draw_line(canvas, (x0, y0), (x1, y1), s.color, 2);
                    }
                }
                if let [only] = s.points.as_slice() {
                    let (x, y) = frame.px(only.0, only.1);
                    fill_circle(canvas, x, y, 3, s.color);
                }
            }
        }
        ChartKind::Scatter => {
            for s in &series {
                for &(x, y) in &s.points {
                    let (px, py) = frame.px(x, y);
                    fill_circle(canvas, px, py, 4, s.color);
                }
            }
        }
        ChartKind::Bar => {
            let slot = bar_slot(xs, &series);
            let group = slot * 0.8;
            let n = series.len().max(1) as f64;
            let (_, zero) = frame.px(frame.x_min, 0.0);
            for (i, s) in series.iter().enumerate() {
                for &(x, y) in &s.points {
                    let start = x - group / 2.0 + group * i as f64 / n;
                    let (x0, top) = frame.px(start, y);
                    let (x1, _) = frame.px(start + group / n, y);
                    fill_rect(canvas, x0, top.min(zero), x1.max(x0 + 1), top.max(zero), s.color);
                }
            }
        }
        ChartKind::Pie => {}
    }
}

/// Smallest gap between distinct x positions, the width available to one bar group.
fn bar_slot(xs: (f64, f64), series: &[Series]) -> f64 {
    let mut positions: Vec<f64> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.0))
        .collect();
    positions.sort_by(f64::total_cmp);
    positions.dedup();
    positions
        .windows(2)
        .filter_map(|w| match w {
            [a, b] => Some(b - a),
            _ => None,
        })
        .fold(None, |acc: Option<f64>, gap| Some(acc.map_or(gap, |a| a.min(gap))))
        .unwrap_or_else(|| (xs.1 - xs.0).max(1.0))
}

fn draw_axes(canvas: &mut RgbImage, frame: &Frame) {
    for i in 1..5 {
        let y = frame.top + (frame.bottom - frame.top) * i / 5;
        draw_line(canvas, (frame.left, y), (frame.right, y), GRID_RGB, 1);
    }
    draw_line(
        canvas,
        (frame.left, frame.bottom),
        (frame.right, frame.bottom),
        AXIS_RGB,
        1,
    );
    draw_line(canvas, (frame.left, frame.top), (frame.left, frame.bottom), AXIS_RGB, 1);
}

const GRID_RGB: Rgb = Rgb(GRID.0);
const AXIS_RGB: Rgb = Rgb(AXIS.0);

fn draw_pie(canvas: &mut RgbImage, first: Rgb, slices: &[(String, f64)]) {
    let (width, height) = canvas.dimensions();
    let cx = f64::from(width) / 2.0;
    let cy = f64::from(height) / 2.0;
    let radius = (f64::from(width.min(height)) / 2.0) - MARGIN as f64;
    let total: f64 = slices.iter().map(|(_, v)| v).sum();

    // Cumulative end angle of each slice, clockwise from twelve o'clock.
    let mut ends = Vec::with_capacity(slices.len());
    let mut acc = 0.0;
    for (_, v) in slices {
        acc += v / total * std::f64::consts::TAU;
        ends.push(acc);
    }

    for (px, py, pixel) in canvas.enumerate_pixels_mut() {
        let dx = f64::from(px) + 0.5 - cx;
        let dy = f64::from(py) + 0.5 - cy;
        if dx.hypot(dy) > radius {
            continue;
        }
        let angle = dx.atan2(-dy).rem_euclid(std::f64::consts::TAU);
        let slice = ends.iter().position(|&end| angle < end).unwrap_or(0);
        *pixel = Pixel(color_at(first, slice).0);
    }
}

fn set(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb) {
    if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y))
        && x < canvas.width()
        && y < canvas.height()
    {
        canvas.put_pixel(x, y, Pixel(color.0));
    }
}

fn draw_line(canvas: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb, thickness: i64) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        for t in 0..thickness {
            set(canvas, x0, y0 + t, color);
            set(canvas, x0 + t, y0, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_circle(canvas: &mut RgbImage, cx: i64, cy: i64, r: i64, color: Rgb) {
    for y in -r..=r {
        for x in -r..=r {
            if x * x + y * y <= r * r {
                set(canvas, cx + x, cy + y, color);
            }
        }
    }
}

fn fill_rect(canvas: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb) {
    for y in y0..=y1 {
        for x in x0..x1 {
            set(canvas, x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::spec::{ChartRequest, resolve};
    use crate::dataset::{LoadOptions, load_table};

    fn sales() -> Table {
        load_table(
            b"month,price,qty,category\n1,10,4,A\n2,20,,B\n3,30,6,A\n",
            &LoadOptions::default(),
        )
        .unwrap()
    }

    fn render(req: ChartRequest) -> Result<ChartImage, RenderError> {
        let table = sales();
        let spec = resolve(&req, &table).unwrap().spec;
        PngChartRenderer::default().render(&spec, &table)
    }

    fn decode(img: &ChartImage) -> RgbImage {
        image::load_from_memory_with_format(&img.png, ImageFormat::Png)
            .unwrap()
            .to_rgb8()
    }

    #[test]
    fn test_every_kind_renders_png() {
        let requests = [
            ChartRequest::new(ChartKind::Line).x("month").y("price").y("qty"),
            ChartRequest::new(ChartKind::Bar).x("category").y("price"),
            ChartRequest::new(ChartKind::Scatter).x("price").y("qty"),
            ChartRequest::new(ChartKind::Pie).category("category").value("price"),
        ];
        for req in requests {
            let kind = req.kind;
            let img = render(req).unwrap_or_else(|e| panic!("{kind} failed: {e}"));
            assert!(img.png.starts_with(b"\x89PNG"), "{kind} is not a PNG");
            assert_eq!(decode(&img).dimensions(), (800, 480));
        }
    }

    #[test]
    fn test_chart_uses_requested_color() {
        let img = render(
            ChartRequest::new(ChartKind::Pie)
                .category("category")
                .value("price")
                .color("#00ff00"),
        )
        .unwrap();
        let pixels = decode(&img);
        assert!(pixels.pixels().any(|p| *p == Pixel([0, 255, 0])));
    }

    #[test]
    fn test_pie_aggregates_by_category() {
        let slices = pie_slices(&sales(), "category", "price").unwrap();
        assert_eq!(slices, vec![("A".to_owned(), 40.0), ("B".to_owned(), 20.0)]);
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let plot = cartesian_series(&sales(), "month", &["qty".to_owned()]).unwrap();
        assert_eq!(plot.series[0].1, vec![(1.0, 4.0), (3.0, 6.0)]);
        assert!(plot.categories.is_empty());
    }

    #[test]
    fn test_nothing_to_plot() {
        let table = load_table(b"a,b\n1,\n2,\n", &LoadOptions::default()).unwrap();
        let err = cartesian_series(&table, "a", &["b".to_owned()]).unwrap_err();
        assert!(matches!(err, RenderError::NoData(_)));
    }

    #[test]
    fn test_data_uri_prefix() {
        let img = ChartImage::new(vec![1, 2, 3], 1, 1, "");
        assert_eq!(img.data_uri(), "data:image/png;base64,AQID");
        assert_eq!(img.axis_caption(), None);
    }

    #[test]
    fn test_categorical_x_groups_repeated_labels() {
        let plot = cartesian_series(&sales(), "category", &["price".to_owned()]).unwrap();
        assert_eq!(plot.categories, vec!["A", "B"]);
        assert_eq!(plot.series[0].1, vec![(0.0, 10.0), (1.0, 20.0), (0.0, 30.0)]);
        assert_eq!(sum_by_x(&plot.series[0].1), vec![(0.0, 40.0), (1.0, 20.0)]);
    }

    #[test]
    fn test_cartesian_image_carries_axes_and_legend() {
        let img = render(
            ChartRequest::new(ChartKind::Bar)
                .x("category")
                .y("price")
                .y("qty")
                .color("orange"),
        )
        .unwrap();
        assert_eq!(img.axis_caption().as_deref(), Some("x-axis: category; y-axis: price, qty"));
        assert_eq!(img.x_categories, vec!["A", "B"]);
        assert_eq!(
            img.legend,
            vec![
                LegendEntry {
                    label: "price".to_owned(),
                    color: "orange".parse().unwrap(),
                },
                LegendEntry {
                    label: "qty".to_owned(),
                    color: Rgb::series(1),
                },
            ]
        );
    }

    #[test]
    fn test_pie_legend_lists_slices() {
        let img = render(ChartRequest::new(ChartKind::Pie).category("category").value("price")).unwrap();
        let labels: Vec<&str> = img.legend.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["A (66.7%)", "B (33.3%)"]);
        assert_eq!(img.legend[0].color, Rgb::default());
        assert_eq!(img.axis_caption(), None);
    }
}
