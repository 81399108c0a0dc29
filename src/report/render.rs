//! Serialisation of a [`ReportDocument`] into HTML or Markdown.
//!
//! Both formats are self-contained: the chart travels as a base64 PNG data URI,
//! followed by its axis fields and colour legend. Every piece of text that comes
//! from the data or the summary service is escaped for the target format.

use super::document::{NO_NUMERIC_COLUMNS, ReportDocument, Section};
use crate::chart::ChartImage;
use crate::stats::StatisticsTable;

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:2em auto;color:#222}\
table{border-collapse:collapse}th,td{border:1px solid #ccc;padding:4px 8px;text-align:right}\
th:first-child,td:first-child{text-align:left}.failed{color:#b00020}.notice{color:#666}\
img{max-width:100%}.legend{list-style:none;padding:0}\
.swatch{display:inline-block;width:12px;height:12px;margin-right:6px;vertical-align:middle}";

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render as a standalone HTML page.
pub fn render_html(doc: &ReportDocument) -> String {
    let mut html = String::new();
    let title = escape_html(&doc.title);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n"));
    html.push_str(&format!("<h1>{title}</h1>\n"));
    html.push_str(&format!(
        "<p class=\"notice\">Generated {}</p>\n",
        doc.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    for section in &doc.sections {
        html.push_str(&format!("<section>\n<h2>{}</h2>\n", section.heading()));
        match section {
            Section::Statistics(stats) => html_statistics(&mut html, stats),
            Section::Chart(image) => html_chart(&mut html, image),
            Section::Summary(text) => {
                for paragraph in text.split("\n\n").filter(|p| !p.trim().is_empty()) {
                    html.push_str(&format!("<p>{}</p>\n", escape_html(paragraph.trim())));
                }
            }
            Section::SummaryFailed(msg) => {
                html.push_str(&format!(
                    "<p class=\"failed\">Summary failed: {}</p>\n",
                    escape_html(msg)
                ));
            }
        }
        html.push_str("</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn html_chart(html: &mut String, image: &ChartImage) {
    html.push_str(&format!(
        "<figure>\n<img src=\"{}\" alt=\"{}\" width=\"{}\" height=\"{}\">\n<figcaption>{}</figcaption>\n</figure>\n",
        image.data_uri(),
        escape_html(&image.title),
        image.width,
        image.height,
        escape_html(&image.title),
    ));
    if let Some(axes) = image.axis_caption() {
        html.push_str(&format!("<p class=\"notice\">{}</p>\n", escape_html(&axes)));
    }
    if !image.x_categories.is_empty() {
        html.push_str(&format!(
            "<p class=\"notice\">Along x, left to right: {}</p>\n",
            escape_html(&image.x_categories.join(", "))
        ));
    }
    if !image.legend.is_empty() {
        html.push_str("<ul class=\"legend\">\n");
        for entry in &image.legend {
            html.push_str(&format!(
                "<li><span class=\"swatch\" style=\"background:{}\"></span>{}</li>\n",
                entry.color.hex(),
                escape_html(&entry.label)
            ));
        }
        html.push_str("</ul>\n");
    }
}

fn html_statistics(html: &mut String, stats: &StatisticsTable) {
    if stats.is_empty() {
        html.push_str(&format!("<p class=\"notice\">{NO_NUMERIC_COLUMNS}.</p>\n"));
        return;
    }

    let (header, rows) = stats.grid();
    html.push_str("<table>\n<thead><tr>");
    for cell in &header {
        html.push_str(&format!("<th>{}</th>", escape_html(cell)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in &rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", escape_html(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");
}

/// Markdown table cells cannot hold a raw pipe.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Backslash-escape inline markup so untrusted text renders literally.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '#' | '|' | '!' | '~'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render as Markdown.
pub fn render_markdown(doc: &ReportDocument) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", escape_markdown(&doc.title)));
    md.push_str(&format!(
        "_Generated {}_\n\n",
        doc.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    for section in &doc.sections {
        md.push_str(&format!("## {}\n\n", section.heading()));
        match section {
            Section::Statistics(stats) => markdown_statistics(&mut md, stats),
            Section::Chart(image) => markdown_chart(&mut md, image),
            Section::Summary(text) => {
                let paragraphs: Vec<String> = text
                    .split("\n\n")
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| escape_markdown(p.trim()))
                    .collect();
                md.push_str(&paragraphs.join("\n\n"));
                md.push_str("\n\n");
            }
            Section::SummaryFailed(msg) => {
                md.push_str(&format!("> **Summary failed:** {}\n\n", escape_markdown(msg)));
            }
        }
    }

    md
}

fn markdown_chart(md: &mut String, image: &ChartImage) {
    md.push_str(&format!(
        "![{}]({})\n\n",
        escape_markdown(&image.title),
        image.data_uri()
    ));
    if let Some(axes) = image.axis_caption() {
        md.push_str(&format!("_{}_\n\n", escape_markdown(&axes)));
    }
    if !image.x_categories.is_empty() {
        md.push_str(&format!(
            "Along x, left to right: {}\n\n",
            escape_markdown(&image.x_categories.join(", "))
        ));
    }
    for entry in &image.legend {
        md.push_str(&format!(
            "- `{}` {}\n",
            entry.color.hex(),
            escape_markdown(&entry.label)
        ));
    }
    if !image.legend.is_empty() {
        md.push('\n');
    }
}

fn markdown_statistics(md: &mut String, stats: &StatisticsTable) {
    if stats.is_empty() {
        md.push_str(&format!("_{NO_NUMERIC_COLUMNS}._\n\n"));
        return;
    }

    let (header, rows) = stats.grid();
    let line = |cells: &[String]| {
        let joined: Vec<String> = cells.iter().map(|c| escape_cell(c)).collect();
        format!("| {} |\n", joined.join(" | "))
    };

    md.push_str(&line(&header));
    let rule: Vec<&str> = header
        .iter()
        .enumerate()
        .map(|(i, _)| if i == 0 { ":---" } else { "---:" })
        .collect();
    md.push_str(&format!("| {} |\n", rule.join(" | ")));
    for row in &rows {
        md.push_str(&line(row));
    }
    md.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{LegendEntry, Rgb};
    use crate::dataset::{LoadOptions, load_table};
    use crate::report::document::compose;
    use crate::summary::{SummaryOutcome, SummaryServiceError};

    fn stats(csv: &str) -> StatisticsTable {
        StatisticsTable::compute(&load_table(csv.as_bytes(), &LoadOptions::default()).unwrap())
    }

    fn image() -> ChartImage {
        let mut image = ChartImage::new(vec![1, 2, 3], 800, 480, "Bar Chart");
        image.x_label = Some("region".to_owned());
        image.y_label = Some("sales".to_owned());
        image.x_categories = vec!["North".to_owned(), "South <2>".to_owned()];
        image.legend = vec![LegendEntry {
            label: "sales".to_owned(),
            color: Rgb([0, 128, 255]),
        }];
        image
    }

    #[test]
    fn test_html_embeds_chart_and_escapes_text() {
        let summary = SummaryOutcome::Completed("Sales <rose> & fell.\n\nSecond paragraph.".to_owned());
        let doc = compose("Q1 <draft>", &stats("price\n10\n20\n"), Some(&image()), Some(&summary));
        let html = render_html(&doc);

        assert!(html.contains("<title>Q1 &lt;draft&gt;</title>"));
        assert!(html.contains("src=\"data:image/png;base64,AQID\""));
        assert!(html.contains("<p>Sales &lt;rose&gt; &amp; fell.</p>"));
        assert!(html.contains("<p>Second paragraph.</p>"));
        assert!(html.contains("<th>price</th>"));

        let stats_at = html.find("Summary Statistics").unwrap();
        let chart_at = html.find("<h2>Chart</h2>").unwrap();
        let summary_at = html.find("AI Summary").unwrap();
        assert!(stats_at < chart_at && chart_at < summary_at);
    }

    #[test]
    fn test_empty_statistics_notice() {
        let doc = compose("R", &stats("name\nann\nbob\n"), None, None);
        assert!(render_html(&doc).contains("No numeric columns found."));
        assert!(render_markdown(&doc).contains("_No numeric columns found._"));
    }

    #[test]
    fn test_markdown_layout() {
        let summary = SummaryOutcome::Failed(SummaryServiceError::Timeout(std::time::Duration::from_secs(60)));
        let doc = compose("Sales", &stats("price\n10\n20\n"), Some(&image()), Some(&summary));
        let md = render_markdown(&doc);

        assert!(md.starts_with("# Sales\n"));
        assert!(md.contains("|  | price |\n| :--- | ---: |\n| count | 2 |\n"));
        assert!(md.contains("![Bar Chart](data:image/png;base64,AQID)"));
        assert!(md.contains("> **Summary failed:** no response within 60s"));
    }

    #[test]
    fn test_chart_key_follows_image() {
        let doc = compose("Sales", &stats("price\n10\n20\n"), Some(&image()), None);

        let html = render_html(&doc);
        let img_at = html.find("<img").unwrap();
        assert!(html.find("x-axis: region; y-axis: sales").unwrap() > img_at);
        assert!(html.contains("Along x, left to right: North, South &lt;2&gt;"));
        assert!(html.contains("<span class=\"swatch\" style=\"background:#0080ff\"></span>sales</li>"));

        let md = render_markdown(&doc);
        assert!(md.contains("_x-axis: region; y-axis: sales_"), "{md}");
        assert!(md.contains("Along x, left to right: North, South \\<2\\>"));
        assert!(md.contains("- `#0080ff` sales\n"));
    }

    #[test]
    fn test_markdown_escapes_untrusted_text() {
        let summary = SummaryOutcome::Completed(
            "Revenue *doubled* <script>x</script>\n\nSee [link](http://evil)".to_owned(),
        );
        let doc = compose("Q1 # draft", &stats("price\n10\n20\n"), None, Some(&summary));
        let md = render_markdown(&doc);

        assert!(md.starts_with("# Q1 \\# draft\n"));
        assert!(md.contains("Revenue \\*doubled\\* \\<script\\>x\\</script\\>\n\n"));
        assert!(md.contains("See \\[link\\](http://evil)"));
        assert!(!md.contains("<script>"));
    }
}
