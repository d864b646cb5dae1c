//! Plain-text coverage table parser
//!
//! Understands the terminal table printed by the coverage plugin:
//!
//! ```text
//! ---------- coverage: platform linux, python 3.11.4-final-0 ----------
//! Name              Stmts   Miss  Cover   Missing
//! -----------------------------------------------
//! src/app.py           10      2    80%   5-6
//! src/util.py           4      0   100%
//! -----------------------------------------------
//! TOTAL                14      2    86%
//! ```
//!
//! File rows are tokenized on runs of at least [`ROW_COLUMN_GAP`] spaces and
//! must yield at least [`MIN_ROW_FIELDS`] fields. Field 0 is the path, field 1
//! the statement count, field 2 the miss count. With branch coverage the
//! table gains `Branch` and `BrPart` columns at fields 3 and 4. The cover
//! percentage is the last field when it reads `100%` (or when the table has
//! no `Missing` column), otherwise the second-to-last field, and the last
//! field holds the `", "`-separated missing ranges.

use tracing::debug;

use super::{count_warnings, CoverageReport, CoverageRow, TOTAL_NAME};
use crate::error::{ReportError, ReportResult};

const HEADER_MARKER: &str = "coverage: platform";
const REQUIRED_MARKERS: [&str; 5] = [HEADER_MARKER, "Stmts", "Miss", "Cover", TOTAL_NAME];

/// Lines from the header marker to the first file row (marker, column names, rule)
pub const HEADER_OFFSET: usize = 3;
/// Minimum run of spaces separating two columns of a file row
pub const ROW_COLUMN_GAP: usize = 3;
/// The TOTAL row is padded differently and splits on shorter gaps
pub const TOTAL_COLUMN_GAP: usize = 2;
/// Path, statements, misses and cover at minimum
pub const MIN_ROW_FIELDS: usize = 4;

const FULL_COVERAGE: &str = "100%";

/// Column layout detected from the table header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TableLayout {
    branches: bool,
}

/// True when all structural markers of the text table are present
pub fn is_valid_text_report(content: &str) -> bool {
    REQUIRED_MARKERS.iter().all(|marker| content.contains(marker))
}

/// Parse a plain-text coverage table into rows plus its TOTAL line.
///
/// Rows that do not tokenize are skipped; a missing marker or an unreadable
/// TOTAL line fails the whole report.
pub fn parse_text_report(content: &str) -> ReportResult<CoverageReport> {
    if !is_valid_text_report(content) {
        let missing: Vec<&str> = REQUIRED_MARKERS
            .iter()
            .copied()
            .filter(|m| !content.contains(*m))
            .collect();
        return Err(ReportError::malformed(format!(
            "missing markers '{}'",
            missing.join("', '")
        )));
    }

    let lines: Vec<&str> = content.lines().collect();

    let header_index = lines
        .iter()
        .position(|l| l.contains(HEADER_MARKER))
        .ok_or_else(|| ReportError::malformed(format!("missing marker '{}'", HEADER_MARKER)))?;

    let total_index = lines
        .iter()
        .skip(header_index + 1)
        .position(|l| is_total_line(l))
        .map(|i| i + header_index + 1)
        .ok_or_else(|| ReportError::malformed("no TOTAL row after the table header"))?;

    let layout = detect_layout(&lines[header_index + 1..total_index]);
    let total = parse_total_row(lines[total_index], layout)?;

    // The line right before TOTAL is the closing table rule.
    let first_row = header_index + HEADER_OFFSET;
    let last_row = total_index.saturating_sub(1);

    let mut rows = Vec::new();
    if first_row < last_row {
        for (offset, line) in lines[first_row..last_row].iter().enumerate() {
            if is_rule_line(line) {
                continue;
            }

            match parse_file_row(line, first_row + offset + 1, layout) {
                Ok(row) => rows.push(row),
                Err(e) => debug!("Skipping coverage row: {}", e),
            }
        }
    }

    Ok(CoverageReport {
        rows,
        total,
        warnings: count_warnings(content),
    })
}

/// Split a table row on runs of at least `min_gap` spaces.
///
/// Leading and trailing whitespace never produces empty fields.
pub fn split_columns(line: &str, min_gap: usize) -> Vec<&str> {
    let line = line.trim();
    let mut fields = Vec::new();
    let mut field_start = 0;
    let mut gap_start: Option<usize> = None;

    for (i, ch) in line.char_indices() {
        if ch == ' ' {
            gap_start.get_or_insert(i);
        } else if let Some(gap) = gap_start.take() {
            if i - gap >= min_gap {
                fields.push(&line[field_start..gap]);
                field_start = i;
            }
        }
    }

    if field_start < line.len() {
        fields.push(&line[field_start..]);
    }

    fields
}

fn is_total_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix(TOTAL_NAME)
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Table rules (`-----`) between the header and rows or before TOTAL
fn is_rule_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c == '-')
}

fn detect_layout(header_lines: &[&str]) -> TableLayout {
    let branches = header_lines
        .iter()
        .take(HEADER_OFFSET)
        .any(|l| l.contains("Stmts") && l.contains("Branch") && l.contains("BrPart"));
    TableLayout { branches }
}

fn parse_count(field: &str, what: &str, line_no: usize) -> ReportResult<u32> {
    field.trim().parse().map_err(|_| ReportError::UnparseableRow {
        line: line_no,
        reason: format!("{} '{}' is not a number", what, field),
    })
}

fn parse_branch_fields(
    fields: &[&str],
    layout: TableLayout,
    line_no: usize,
) -> ReportResult<(Option<u32>, Option<u32>)> {
    if !layout.branches || fields.len() < 6 {
        return Ok((None, None));
    }
    let branches = parse_count(fields[3], "branch count", line_no)?;
    let partial = parse_count(fields[4], "partial branch count", line_no)?;
    Ok((Some(branches), Some(partial)))
}

fn parse_file_row(line: &str, line_no: usize, layout: TableLayout) -> ReportResult<CoverageRow> {
    let fields = split_columns(line, ROW_COLUMN_GAP);

    if fields.len() < MIN_ROW_FIELDS {
        return Err(ReportError::UnparseableRow {
            line: line_no,
            reason: format!("expected at least {} fields, found {}", MIN_ROW_FIELDS, fields.len()),
        });
    }

    let stmts = parse_count(fields[1], "statement count", line_no)?;
    let miss = parse_count(fields[2], "miss count", line_no)?;
    if miss > stmts {
        return Err(ReportError::UnparseableRow {
            line: line_no,
            reason: format!("miss count {} exceeds statement count {}", miss, stmts),
        });
    }

    let (branches, part_branches) = parse_branch_fields(&fields, layout, line_no)?;

    let last = fields[fields.len() - 1];
    let (cover, missing) = if last == FULL_COVERAGE {
        (FULL_COVERAGE.to_string(), Vec::new())
    } else if last.ends_with('%') {
        (last.to_string(), Vec::new())
    } else {
        let cover = fields[fields.len() - 2];
        if !cover.ends_with('%') {
            return Err(ReportError::UnparseableRow {
                line: line_no,
                reason: format!("cover '{}' is not a percentage", cover),
            });
        }
        let missing = last.split(", ").map(|r| r.trim().to_string()).collect();
        (cover.to_string(), missing)
    };

    Ok(CoverageRow {
        name: fields[0].to_string(),
        stmts,
        miss,
        cover,
        branches,
        part_branches,
        missing,
    })
}

fn parse_total_row(line: &str, layout: TableLayout) -> ReportResult<CoverageRow> {
    let fields = split_columns(line, TOTAL_COLUMN_GAP);

    if fields.len() < MIN_ROW_FIELDS {
        return Err(ReportError::malformed(format!(
            "TOTAL row has {} fields, expected at least {}",
            fields.len(),
            MIN_ROW_FIELDS
        )));
    }

    let malformed = |e: ReportError| ReportError::malformed(format!("TOTAL row: {}", e));
    let stmts = parse_count(fields[1], "statement count", 0).map_err(malformed)?;
    let miss = parse_count(fields[2], "miss count", 0).map_err(malformed)?;
    let (branches, part_branches) = parse_branch_fields(&fields, layout, 0).map_err(malformed)?;

    Ok(CoverageRow {
        name: TOTAL_NAME.to_string(),
        stmts,
        miss,
        cover: fields[fields.len() - 1].to_string(),
        branches,
        part_branches,
        missing: Vec::new(),
    })
}
