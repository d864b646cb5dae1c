//! HTML rendering of coverage reports
//!
//! Produces the badge and the collapsible, folder-grouped coverage table that
//! make up the comment body. Rendering is a pure function of the parsed
//! report and the options.

use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::config::RenderOptions;
use crate::coverage::{parse_coverage, CoverageColor, CoverageReport, CoverageRow, MissingRange};

const FOLDER_INDENT: &str = "&nbsp; &nbsp;";
const EMPTY_CELL: &str = "&nbsp;";
const NO_CHANGED_FILES: &str =
    "<i>report-only-changed-files is enabled. No files were changed in this commit :)</i>";

/// Rendered coverage section plus its machine-readable values
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageComment {
    pub html: String,
    /// Total cover string, e.g. `81%`
    pub coverage: String,
    pub color: CoverageColor,
    pub warnings: u32,
}

impl CoverageComment {
    /// Result used whenever no coverage could be produced
    pub fn empty() -> Self {
        Self {
            html: String::new(),
            coverage: "0".to_string(),
            color: CoverageColor::Red,
            warnings: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

/// Parse and render one coverage source.
///
/// Never fails: absent content and malformed reports are logged and turn
/// into [`CoverageComment::empty`].
pub fn build_coverage_comment(
    source: &str,
    content: Option<&str>,
    options: &RenderOptions,
) -> CoverageComment {
    match load_report(source, content, options) {
        Some(report) => render_report(&report, options),
        None => CoverageComment::empty(),
    }
}

/// Parse a coverage source, logging instead of failing
pub fn load_report(
    source: &str,
    content: Option<&str>,
    options: &RenderOptions,
) -> Option<CoverageReport> {
    let Some(content) = content else {
        warn!("Coverage file '{}' is missing or empty", source);
        return None;
    };

    match parse_coverage(source, content, options.xml_skip_covered) {
        Ok(report) => Some(report),
        Err(e) if e.is_malformed() => {
            error!("Coverage file \"{}\" has bad format or wrong data: {}", source, e);
            None
        }
        Err(e) => {
            warn!("Skipping coverage file \"{}\": {}", source, e);
            None
        }
    }
}

pub fn render_report(report: &CoverageReport, options: &RenderOptions) -> CoverageComment {
    let color = CoverageColor::from_cover(&report.total.cover);

    CoverageComment {
        html: render_html(report, options),
        coverage: report.total.cover.clone(),
        color,
        warnings: report.warnings,
    }
}

/// Badge followed by the collapsible report table
pub fn render_html(report: &CoverageReport, options: &RenderOptions) -> String {
    let color = CoverageColor::from_cover(&report.total.cover);
    let badge = if options.hide_badge {
        String::new()
    } else {
        badge_html(&report.total.cover, color, options)
    };

    let details = if options.hide_report {
        String::new()
    } else {
        format!(
            "<details><summary>{}</summary>{}</details>",
            options.title,
            render_table(report, options)
        )
    };

    format!("{}{}", badge, details)
}

/// shields.io badge, linked to the README unless disabled
pub fn badge_html(cover: &str, color: CoverageColor, options: &RenderOptions) -> String {
    let percent = cover.trim_end_matches('%');
    let image = format!(
        "<img alt=\"{}\" src=\"https://img.shields.io/badge/{}-{}%25-{}.svg\" />",
        options.badge_title,
        escape_badge_text(&options.badge_title),
        percent,
        color
    );

    if options.remove_link_from_badge {
        format!("{}<br/>", image)
    } else {
        format!("<a href=\"{}\">{}</a><br/>", options.blob_url("README.md"), image)
    }
}

/// shields.io uses `-` and `_` as separators; doubled they render literally.
fn escape_badge_text(text: &str) -> String {
    text.replace('-', "--").replace('_', "__").replace(' ', "%20")
}

/// Columns present in this report's table
#[derive(Debug, Clone, Copy)]
struct Columns {
    branches: bool,
    missing: bool,
}

impl Columns {
    fn of(report: &CoverageReport) -> Self {
        Self {
            branches: report.has_branches(),
            missing: report.has_missing(),
        }
    }

    fn count(&self) -> usize {
        4 + if self.branches { 2 } else { 0 } + usize::from(self.missing)
    }

    fn head(&self) -> String {
        let mut head = String::from("<tr><th>File</th><th>Stmts</th><th>Miss</th>");
        if self.branches {
            head.push_str("<th>Branch</th><th>BrPart</th>");
        }
        head.push_str("<th>Cover</th>");
        if self.missing {
            head.push_str("<th>Missing</th>");
        }
        head.push_str("</tr>");
        head
    }
}

/// Rows grouped by folder, folders in lexicographic order.
///
/// Folder keys are the prefix-stripped path minus the file name; top-level
/// files live under `""`. With the changed-files filter enabled, only folders
/// holding at least one changed file survive, and only their changed rows.
pub fn group_by_folder<'a>(
    rows: &'a [CoverageRow],
    options: &RenderOptions,
) -> BTreeMap<String, Vec<&'a CoverageRow>> {
    let mut folders: BTreeMap<String, Vec<&CoverageRow>> = BTreeMap::new();

    for row in rows {
        let relative = options.relative_path(&row.name);
        if options.report_only_changed_files && !options.is_changed(relative) {
            continue;
        }

        let folder = match relative.rfind('/') {
            Some(i) => &relative[..i],
            None => "",
        };
        folders.entry(folder.to_string()).or_default().push(row);
    }

    folders
}

fn render_table(report: &CoverageReport, options: &RenderOptions) -> String {
    info!("Generating coverage report");

    let columns = Columns::of(report);
    let folders = group_by_folder(&report.rows, options);

    let mut body = String::new();
    if folders.is_empty() && options.report_only_changed_files {
        body.push_str(&format!(
            "<tr><td colspan=\"{}\">{}</td></tr>",
            columns.count(),
            NO_CHANGED_FILES
        ));
    }

    for (folder, rows) in &folders {
        if !folder.is_empty() {
            body.push_str(&format!(
                "<tr><td colspan=\"{}\"><b>{}</b></td></tr>",
                columns.count(),
                folder
            ));
        }
        for row in rows {
            body.push_str(&file_row(row, !folder.is_empty(), columns, options));
        }
    }

    body.push_str(&total_row(&report.total, columns));

    format!("<table>{}<tbody>{}</tbody></table>", columns.head(), body)
}

fn file_row(row: &CoverageRow, indent: bool, columns: Columns, options: &RenderOptions) -> String {
    let relative = options.relative_path(&row.name);
    let display = relative.rsplit('/').next().unwrap_or(relative);
    let space = if indent { FOLDER_INDENT } else { "" };

    let name = if options.remove_links_to_files {
        format!("{}{}", space, display)
    } else {
        format!("{}<a href=\"{}\">{}</a>", space, options.file_url(relative), display)
    };

    let mut tr = format!("<tr><td>{}</td><td>{}</td><td>{}</td>", name, row.stmts, row.miss);
    if columns.branches {
        tr.push_str(&format!(
            "<td>{}</td><td>{}</td>",
            row.branches.unwrap_or(0),
            row.part_branches.unwrap_or(0)
        ));
    }
    tr.push_str(&format!("<td>{}</td>", row.cover));
    if columns.missing {
        tr.push_str(&format!("<td>{}</td>", missing_cell(row, relative, options)));
    }
    tr.push_str("</tr>");
    tr
}

fn missing_cell(row: &CoverageRow, relative: &str, options: &RenderOptions) -> String {
    if !row.has_missing() {
        return EMPTY_CELL.to_string();
    }

    let file_url = options.file_url(relative);
    row.missing
        .iter()
        .map(|token| match MissingRange::parse(token) {
            Some(range) if options.remove_links_to_lines => range.display_html(),
            Some(range) => format!(
                "<a href=\"{}#{}\">{}</a>",
                file_url,
                range.fragment(),
                range.display_html()
            ),
            // Unknown tokens are shown as the tool printed them
            None => token.replace('<', "&lt;").replace('>', "&gt;"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn total_row(total: &CoverageRow, columns: Columns) -> String {
    let mut tr = format!(
        "<tr><td><b>{}</b></td><td><b>{}</b></td><td><b>{}</b></td>",
        total.name, total.stmts, total.miss
    );
    if columns.branches {
        tr.push_str(&format!(
            "<td><b>{}</b></td><td><b>{}</b></td>",
            total.branches.unwrap_or(0),
            total.part_branches.unwrap_or(0)
        ));
    }
    tr.push_str(&format!("<td><b>{}</b></td>", total.cover));
    if columns.missing {
        tr.push_str(&format!("<td>{}</td>", EMPTY_CELL));
    }
    tr.push_str("</tr>");
    tr
}
