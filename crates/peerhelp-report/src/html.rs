//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::Result;
use std::path::Path;

use peerhelp_core::analytics::CategoryStats;

use crate::report::ForumReport;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn hours(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |h| format!("{h:.1}h"))
}

/// Generate the instructor dashboard page.
pub fn generate_html(report: &ForumReport) -> String {
    let dashboard = &report.dashboard;
    let quality = &dashboard.response_quality;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>peerhelp dashboard</title>\n");
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str("<h1>peerhelp dashboard</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Generated {} | {} responses | {} categories</p>\n",
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        quality.total_responses,
        dashboard.category_stats.len(),
    ));
    html.push_str("</header>\n");

    // Headline numbers
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Response quality</h2>\n");
    html.push_str("<div class=\"cards\">\n");
    for (label, value) in [
        ("Helpful", quality.helpful_count.to_string()),
        ("Unhelpful", quality.unhelpful_count.to_string()),
        ("Helpful %", format!("{:.1}%", quality.helpful_percentage)),
        ("Avg resolution", hours(dashboard.avg_resolution_time_hours)),
    ] {
        html.push_str(&format!(
            "<div class=\"card\"><span class=\"label\">{label}</span><span class=\"value\">{value}</span></div>\n"
        ));
    }
    html.push_str("</div>\n");
    html.push_str("</section>\n");

    // Categories
    html.push_str("<section class=\"categories\">\n");
    html.push_str("<h2>Categories</h2>\n");
    if dashboard.category_stats.iter().any(|c| c.question_count > 0) {
        html.push_str(&generate_bar_chart(&dashboard.category_stats));
    }
    html.push_str("<table id=\"categories\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable('categories', 0)\">Category</th><th onclick=\"sortTable('categories', 1)\">Questions</th><th onclick=\"sortTable('categories', 2)\">Avg responses</th><th onclick=\"sortTable('categories', 3)\">Avg resolution</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for c in &dashboard.category_stats {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{:.1}</td><td>{}</td></tr>\n",
            html_escape(&c.category_name),
            c.question_count,
            c.avg_responses_per_question,
            hours(c.avg_resolution_time_hours),
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Misconceptions
    html.push_str("<section class=\"misconceptions\">\n");
    html.push_str("<h2>Common misconceptions</h2>\n");
    if dashboard.common_misconceptions.is_empty() {
        html.push_str("<p class=\"meta\">No unhelpful responses yet.</p>\n");
    } else {
        html.push_str("<table>\n");
        html.push_str(
            "<thead><tr><th>Category</th><th>Reason</th><th>Occurrences</th></tr></thead>\n",
        );
        html.push_str("<tbody>\n");
        for m in &dashboard.common_misconceptions {
            html.push_str(&format!(
                "<tr class=\"fail\"><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(&m.category_name),
                html_escape(&m.misconception),
                m.occurrence_count,
            ));
        }
        html.push_str("</tbody></table>\n");
    }
    html.push_str("</section>\n");

    // Leaderboard
    html.push_str("<section class=\"leaderboard\">\n");
    html.push_str("<h2>Karma leaderboard</h2>\n");
    html.push_str("<table id=\"leaderboard\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable('leaderboard', 0)\">#</th><th onclick=\"sortTable('leaderboard', 1)\">Student</th><th onclick=\"sortTable('leaderboard', 2)\">Karma</th><th onclick=\"sortTable('leaderboard', 3)\">Helpful</th><th onclick=\"sortTable('leaderboard', 4)\">Unhelpful</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for (rank, entry) in report.leaderboard.iter().enumerate() {
        let class = if entry.karma > 0 { "pass" } else { "fail" };
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td></tr>\n",
            rank + 1,
            html_escape(&entry.name),
            class,
            entry.karma,
            entry.helpful_responses,
            entry.unhelpful_responses,
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write the dashboard page to a file.
pub fn write_html_report(report: &ForumReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

/// Horizontal bars of question count per category.
fn generate_bar_chart(categories: &[CategoryStats]) -> String {
    let bar_height = 24;
    let max_width = 400;
    let padding = 8;
    let label_width = 220;

    let max_count = categories
        .iter()
        .map(|c| c.question_count)
        .max()
        .unwrap_or(0)
        .max(1);
    let total_height = categories.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, c) in categories.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let width = c.question_count * max_width / max_count;

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&c.category_name)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"#3b82f6\" rx=\"4\"/>\n",
            label_width, y, width, bar_height
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            c.question_count
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.cards { display: flex; gap: 1rem; flex-wrap: wrap; }
.card { border: 1px solid var(--border); border-radius: 8px; padding: 1rem 1.5rem; min-width: 8rem; }
.card .label { display: block; color: #6b7280; font-size: 0.85rem; }
.card .value { display: block; font-size: 1.6rem; font-weight: bold; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(id, col) {
  const table = document.getElementById(id);
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = isNaN(na) || isNaN(nb) ? va.localeCompare(vb) : na - nb;
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
