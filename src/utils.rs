/// Formats an optional f64 to 6 decimal places, or returns "NaN" if None or non-finite.
pub fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.6}"),
        _ => "NaN".to_owned(),
    }
}

/// Cuts a cell to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate_cell(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_owned();
    }
    let mut out: String = value.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Renders a right-aligned text grid: header line, rule, then one line per row.
///
/// Rows shorter than the header are padded with empty cells.
pub fn render_grid(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }

    let line = |cells: &[String]| -> String {
        widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cell = cells.get(i).map_or("", String::as_str);
                format!("{cell:>w$}")
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };

    let mut out = String::new();
    out.push_str(&line(header));
    out.push('\n');
    let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&"-".repeat(total));
    for row in rows {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_opt() {
        assert_eq!(fmt_opt(Some(20.0)), "20.000000");
        assert_eq!(fmt_opt(None), "NaN");
        assert_eq!(fmt_opt(Some(f64::INFINITY)), "NaN");
    }

    #[test]
    fn test_truncate_cell() {
        assert_eq!(truncate_cell("short", 10), "short");
        assert_eq!(truncate_cell("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_render_grid_alignment() {
        let header = vec!["".to_owned(), "price".to_owned()];
        let rows = vec![
            vec!["count".to_owned(), "3".to_owned()],
            vec!["mean".to_owned(), "20.000000".to_owned()],
        ];
        let grid = render_grid(&header, &rows);
        let lines: Vec<&str> = grid.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "           price");
        assert_eq!(lines[2], "count          3");
        assert_eq!(lines[3], " mean  20.000000");
    }
}
