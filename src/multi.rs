//! Multi-report comparison table
//!
//! Each `title, coverage-path[, junit-path]` line runs the coverage and JUnit
//! pipelines and becomes one row of a combined markdown table.

use tracing::{info, warn};

use crate::config::RenderOptions;
use crate::junit::{parse_junit_documents, summary_row, JUnitSummary};
use crate::report::{load_report, render_report, CoverageComment};
use crate::source::ReportSource;

const NARROW_HEADER: &str = "| Title | Coverage |\n| ----- | ----- |\n";
const WIDE_HEADER: &str = "| Title | Coverage | Tests | Skipped | Failures | Errors | Time |\n\
| ----- | ----- | ----- | ------- | -------- | -------- | ------------------ |\n";
const BLANK_TEST_CELLS: &str = "|  |  |  |  |  |";

/// One configured report line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiReportLine {
    pub title: String,
    pub coverage_source: String,
    pub junit_source: Option<String>,
}

impl MultiReportLine {
    /// Parse `title, coverage-path[, junit-path]`; `None` without a comma
    pub fn parse(line: &str) -> Option<Self> {
        if !line.contains(',') {
            return None;
        }

        let mut parts = line.split(',').map(str::trim);
        let title = parts.next().unwrap_or_default().to_string();
        let coverage_source = parts.next().unwrap_or_default().to_string();
        let junit_source = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

        Some(Self {
            title,
            coverage_source,
            junit_source,
        })
    }

    /// Options for this line: its own title, summary-only rendering
    fn options(&self, shared: &RenderOptions) -> RenderOptions {
        RenderOptions {
            title: self.title.clone(),
            hide_report: true,
            xml_title: String::new(),
            ..shared.clone()
        }
    }
}

/// Values exported for the first line only
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryOutputs {
    pub coverage: CoverageComment,
    /// Same coverage section linked to the default branch
    pub coverage_html: String,
    pub junit: Option<JUnitSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiReport {
    pub table: String,
    pub primary: Option<PrimaryOutputs>,
}

/// Build the combined table. Rows keep the order of `lines`.
///
/// The wide header is used for every row as soon as one line names a JUnit
/// source.
pub fn build_multi_report<S: AsRef<str>>(
    lines: &[S],
    options: &RenderOptions,
    source: &dyn ReportSource,
) -> MultiReport {
    let lines: Vec<MultiReportLine> = lines
        .iter()
        .filter_map(|l| {
            let parsed = MultiReportLine::parse(l.as_ref());
            if parsed.is_none() {
                warn!("Ignoring multiple-files line without a comma: '{}'", l.as_ref());
            }
            parsed
        })
        .collect();

    let wide = lines.iter().any(|l| l.junit_source.is_some());
    let mut table = String::from(if wide { WIDE_HEADER } else { NARROW_HEADER });
    let mut primary = None;

    for (i, line) in lines.iter().enumerate() {
        let line_options = line.options(options);
        let report = load_report(
            &line.coverage_source,
            source.read(&line.coverage_source).as_deref(),
            &line_options,
        );
        let coverage = report
            .as_ref()
            .map(|r| render_report(r, &line_options))
            .unwrap_or_else(CoverageComment::empty);
        let junit = line.junit_source.as_ref().and_then(|path| {
            let content = source.read(path)?;
            parse_junit_documents(&[(path.as_str(), content.as_str())]).map(|r| r.summary)
        });

        if coverage.is_empty() && junit.is_none() {
            warn!("No coverage or test data for '{}', row skipped", line.title);
            continue;
        }

        table.push_str(&format!("| {} | {} ", line.title, coverage.html));
        match (&junit, wide) {
            (Some(summary), true) => table.push_str(&summary_row(summary, None)),
            (None, true) => table.push_str(BLANK_TEST_CELLS),
            (_, false) => table.push('|'),
        }
        table.push('\n');

        if i == 0 && !coverage.is_empty() {
            info!(
                coverage = %coverage.coverage,
                color = %coverage.color,
                warnings = coverage.warnings,
                "Primary report {}",
                line.coverage_source
            );
            let coverage_html = report
                .as_ref()
                .map(|r| render_report(r, &line_options.with_commit(&options.default_branch)).html)
                .unwrap_or_default();
            primary = Some(PrimaryOutputs {
                coverage,
                coverage_html,
                junit,
            });
        }
    }

    MultiReport { table, primary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const TEXT_REPORT: &str = "\
---------- coverage: platform linux, python 3.11.4-final-0 -----------
Name     Stmts   Miss  Cover   Missing
--------------------------------------
a.py        10      2    80%   5-6
--------------------------------------
TOTAL       10      2    80%
";

    const XML_REPORT: &str = r#"<?xml version="1.0" ?>
<coverage lines-valid="4" lines-covered="1" branches-valid="0" branches-covered="0">
  <packages><package name="pkg"><classes>
    <class name="b.py" filename="b.py" line-rate="0.25">
      <lines>
        <line number="1" hits="1"/>
        <line number="2" hits="0"/>
        <line number="3" hits="0"/>
        <line number="4" hits="0"/>
      </lines>
    </class>
  </classes></package></packages>
</coverage>"#;

    const JUNIT: &str = r#"<testsuites><testsuite tests="3" failures="1" errors="0" skipped="0" time="0.5">
<testcase classname="t" name="a"/><testcase classname="t" name="b"/>
<testcase classname="t" name="c"><failure message="boom"/></testcase>
</testsuite></testsuites>"#;

    fn sources() -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        files.insert("unit.txt".to_string(), TEXT_REPORT.to_string());
        files.insert("integration.XML".to_string(), XML_REPORT.to_string());
        files.insert("unit.xml".to_string(), JUNIT.to_string());
        files
    }

    fn options() -> RenderOptions {
        RenderOptions {
            repo_url: "https://github.com/owner/repo".to_string(),
            commit: "abc123".to_string(),
            default_branch: "main".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_line() {
        let line = MultiReportLine::parse("Unit, unit.txt, unit.xml").unwrap();
        assert_eq!(line.title, "Unit");
        assert_eq!(line.coverage_source, "unit.txt");
        assert_eq!(line.junit_source.as_deref(), Some("unit.xml"));

        let line = MultiReportLine::parse("Integration ,cov.xml").unwrap();
        assert_eq!(line.title, "Integration");
        assert!(line.junit_source.is_none());

        assert!(MultiReportLine::parse("no comma").is_none());
    }

    #[test]
    fn test_narrow_table() {
        let lines = ["Unit, unit.txt", "Integration, integration.XML"];
        let report = build_multi_report(&lines, &options(), &sources());

        assert!(report.table.starts_with(NARROW_HEADER));
        let rows: Vec<&str> = report.table.lines().skip(2).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("| Unit | <a href="));
        assert!(rows[0].contains("badge/Coverage-80%25-green.svg"));
        assert!(rows[0].ends_with("<br/> |"));
        assert!(rows[1].contains("badge/Coverage-25%25-red.svg"));
        assert!(!report.table.contains("<table>"));
    }

    #[test]
    fn test_wide_table_blank_cells() {
        let lines = ["Unit, unit.txt, unit.xml", "Integration, integration.XML"];
        let report = build_multi_report(&lines, &options(), &sources());

        assert!(report.table.starts_with(WIDE_HEADER));
        let rows: Vec<&str> = report.table.lines().skip(2).collect();
        assert!(rows[0].ends_with("| 3 | 0 :zzz: | 1 :x: | 0 :fire: | 0.500s :stopwatch: |"));
        assert!(rows[1].ends_with(BLANK_TEST_CELLS));
    }

    #[test]
    fn test_first_line_is_primary() {
        let lines = ["Unit, unit.txt, unit.xml", "Integration, integration.XML"];
        let report = build_multi_report(&lines, &options(), &sources());

        let primary = report.primary.unwrap();
        assert_eq!(primary.coverage.coverage, "80%");
        assert_eq!(primary.junit.unwrap().tests, 3);
        assert!(primary.coverage.html.contains("/blob/abc123/README.md"));
        assert!(primary.coverage_html.contains("/blob/main/README.md"));
    }

    #[test]
    fn test_missing_first_coverage_has_no_primary() {
        let lines = ["Broken, absent.txt, unit.xml", "Unit, unit.txt"];
        let report = build_multi_report(&lines, &options(), &sources());

        assert!(report.primary.is_none());
        let rows: Vec<&str> = report.table.lines().skip(2).collect();
        assert!(rows[0].starts_with("| Broken |  | 3 |"));
        assert!(rows[1].starts_with("| Unit | <a href="));
    }

    #[test]
    fn test_rows_without_data_are_skipped() {
        let lines = ["Ghost, absent.txt", "Unit, unit.txt"];
        let report = build_multi_report(&lines, &options(), &sources());

        assert_eq!(report.table.lines().count(), 3);
        assert!(!report.table.contains("Ghost"));
        assert!(report.primary.is_none());
    }
}
