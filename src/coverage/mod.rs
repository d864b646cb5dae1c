//! Coverage module
//!
//! Provides:
//! - Plain-text coverage table parsing
//! - Cobertura XML parsing
//! - Missing-line range compaction
//! - Badge color classification

mod cobertura;
mod color;
mod ranges;
mod text;

pub use cobertura::*;
pub use color::*;
pub use ranges::*;
pub use text::*;

use serde::Serialize;
use tracing::debug;

use crate::error::{ReportError, ReportResult};

/// Name used for the summary row of every report
pub const TOTAL_NAME: &str = "TOTAL";

/// Coverage statistics for one file (or the TOTAL row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageRow {
    pub name: String,
    pub stmts: u32,
    pub miss: u32,
    pub cover: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branches: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_branches: Option<u32>,
    /// Compacted range tokens; empty when the file is fully covered
    pub missing: Vec<String>,
}

impl CoverageRow {
    pub fn has_missing(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// A parsed coverage report
///
/// `total` comes from the tool's own totals, never from summing `rows`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub rows: Vec<CoverageRow>,
    pub total: CoverageRow,
    pub warnings: u32,
}

impl CoverageReport {
    pub fn has_missing(&self) -> bool {
        self.rows.iter().any(CoverageRow::has_missing)
    }

    pub fn has_branches(&self) -> bool {
        self.rows.iter().any(|row| row.branches.is_some()) || self.total.branches.is_some()
    }
}

/// Supported coverage source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageFormat {
    Text,
    Cobertura,
}

impl CoverageFormat {
    /// `.xml` sources (any case) are Cobertura, everything else is the text table.
    pub fn from_source(source: &str) -> Self {
        if source.to_lowercase().ends_with(".xml") {
            CoverageFormat::Cobertura
        } else {
            CoverageFormat::Text
        }
    }
}

/// Parse coverage content, picking the parser from the source name
pub fn parse_coverage(
    source: &str,
    content: &str,
    skip_covered: bool,
) -> ReportResult<CoverageReport> {
    if content.trim().is_empty() {
        return Err(ReportError::NoContent(source.to_string()));
    }

    let format = CoverageFormat::from_source(source);
    debug!(source, ?format, "Parsing coverage report");

    match format {
        CoverageFormat::Cobertura => parse_cobertura_string(content, skip_covered),
        CoverageFormat::Text => parse_text_report(content),
    }
}

/// Number of warnings reported in the test session footer
/// (`=== 3 passed, 2 warnings in 0.12s ===`), or 0.
pub fn count_warnings(content: &str) -> u32 {
    let Some(line) = content
        .lines()
        .find(|l| l.contains(" warnings in ") || l.contains(" warning in "))
    else {
        return 0;
    };

    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens
        .iter()
        .position(|t| *t == "warnings" || *t == "warning")
        .filter(|&i| i > 0)
        .and_then(|i| tokens[i - 1].parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(CoverageFormat::from_source("coverage.xml"), CoverageFormat::Cobertura);
        assert_eq!(CoverageFormat::from_source("COVERAGE.XML"), CoverageFormat::Cobertura);
        assert_eq!(CoverageFormat::from_source("pytest-coverage.txt"), CoverageFormat::Text);
        assert_eq!(CoverageFormat::from_source("xml"), CoverageFormat::Text);
    }

    #[test]
    fn test_empty_content_is_no_content() {
        let err = parse_coverage("a.txt", "  \n", false).unwrap_err();
        assert_eq!(err, ReportError::NoContent("a.txt".into()));
    }

    #[test]
    fn test_count_warnings() {
        assert_eq!(count_warnings("==== 10 passed, 3 warnings in 1.20s ===="), 3);
        assert_eq!(count_warnings("==== 1 passed, 1 warning in 0.01s ===="), 1);
        assert_eq!(count_warnings("==== 10 passed in 1.20s ===="), 0);
        assert_eq!(count_warnings(""), 0);
    }

    #[test]
    fn test_dispatch_by_extension() {
        let xml = r#"<coverage lines-valid="1" lines-covered="1"><packages><package><classes>
            <class filename="a.py" line-rate="1"><lines><line number="1" hits="1"/></lines></class>
            </classes></package></packages></coverage>"#;
        let report = parse_coverage("coverage.xml", xml, false).unwrap();
        assert_eq!(report.total.cover, "100%");

        assert!(parse_coverage("coverage.txt", xml, false).is_err());
    }
}
