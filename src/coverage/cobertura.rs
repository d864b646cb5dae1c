//! Cobertura XML format parser
//!
//! Rows are built per `<class>` from its direct `<lines>` children; the
//! `<methods>` section repeats those lines and is ignored. The TOTAL row is
//! taken from the root `<coverage>` attributes.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use super::{compact, CoverageReport, CoverageRow, TOTAL_NAME};
use crate::error::{ReportError, ReportResult};

/// Branch targets assumed when `condition-coverage` is absent
const DEFAULT_BRANCH_TARGETS: u32 = 2;

/// Coverage percentage using the coverage tool's display rounding.
///
/// Exactly `100%` only when everything is covered and `0%` only when nothing
/// is; everything in between is clamped to `1%..=99%`. Halves round to even,
/// so 12.5% reads `12%`.
pub fn coverage_percent(covered: u64, valid: u64) -> String {
    if covered == valid {
        return "100%".to_string();
    }
    if covered == 0 || valid == 0 {
        return "0%".to_string();
    }

    let pct = (100.0 * covered as f64 / valid as f64).round_ties_even();
    format!("{}%", pct.clamp(1.0, 99.0) as u32)
}

/// Root `<coverage>` totals
#[derive(Debug, Default)]
struct Totals {
    lines_valid: u32,
    lines_covered: u32,
    branches_valid: u32,
    branches_covered: u32,
}

/// Counters for the `<class>` currently being read
#[derive(Debug, Default)]
struct ClassState {
    filename: String,
    line_rate: Option<f64>,
    stmts: u32,
    missed_lines: Vec<u32>,
    branch_targets: u32,
    branches_covered: u32,
    part_branches: u32,
    missing_branches: Vec<String>,
    has_branch_lines: bool,
}

impl ClassState {
    fn fully_covered(&self) -> bool {
        self.line_rate == Some(1.0)
    }

    fn into_row(self) -> CoverageRow {
        let miss = self.missed_lines.len() as u32;
        let covered =
            u64::from(self.stmts.saturating_sub(miss)) + u64::from(self.branches_covered);
        let valid = u64::from(self.stmts) + u64::from(self.branch_targets);

        let mut missing: Vec<String> = compact(&self.missed_lines)
            .iter()
            .map(|range| range.to_string())
            .collect();
        missing.extend(self.missing_branches);

        CoverageRow {
            name: self.filename,
            stmts: self.stmts,
            miss,
            cover: coverage_percent(covered, valid),
            branches: Some(self.branch_targets),
            part_branches: Some(self.part_branches),
            missing,
        }
    }
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == name)
        .map(|a| match a.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
        })
}

fn attr_number<T: std::str::FromStr>(e: &BytesStart, name: &[u8]) -> Option<T> {
    attr(e, name).and_then(|v| v.trim().parse().ok())
}

/// Parse `"50% (1/2)"` into `(covered, total)` branch targets
fn parse_condition_coverage(value: &str) -> Option<(u32, u32)> {
    let open = value.find('(')?;
    let slash = open + value[open..].find('/')?;
    let close = slash + value[slash..].find(')')?;

    let covered = value[open + 1..slash].trim().parse().ok()?;
    let total = value[slash + 1..close].trim().parse().ok()?;
    Some((covered, total))
}

fn read_line(e: &BytesStart, class: &mut ClassState) {
    let number: u32 = attr_number(e, b"number").unwrap_or(0);
    let hits: u64 = attr_number(e, b"hits").unwrap_or(0);

    class.stmts = class.stmts.saturating_add(1);
    if hits == 0 {
        class.missed_lines.push(number);
    }

    if attr(e, b"branch").as_deref() != Some("true") {
        return;
    }
    class.has_branch_lines = true;

    let missing: Vec<String> = attr(e, b"missing-branches")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let (covered, total) = attr(e, b"condition-coverage")
        .and_then(|v| parse_condition_coverage(&v))
        .unwrap_or_else(|| {
            let total = DEFAULT_BRANCH_TARGETS;
            (total.saturating_sub(missing.len() as u32), total)
        });

    class.branch_targets = class.branch_targets.saturating_add(total);
    class.branches_covered = class.branches_covered.saturating_add(covered.min(total));
    if covered < total {
        class.part_branches = class.part_branches.saturating_add(1);
    }

    class
        .missing_branches
        .extend(missing.into_iter().map(|target| format!("{}->{}", number, target)));
}

fn read_totals(e: &BytesStart) -> Totals {
    Totals {
        lines_valid: attr_number(e, b"lines-valid").unwrap_or(0),
        lines_covered: attr_number(e, b"lines-covered").unwrap_or(0),
        branches_valid: attr_number(e, b"branches-valid").unwrap_or(0),
        branches_covered: attr_number(e, b"branches-covered").unwrap_or(0),
    }
}

/// Event-driven reader state for one Cobertura document
#[derive(Debug, Default)]
struct CoberturaState {
    skip_covered: bool,
    totals: Option<Totals>,
    rows: Vec<CoverageRow>,
    current_class: Option<ClassState>,
    classes_in_package: usize,
    packages_with_classes: usize,
    total_part_branches: u32,
    has_branch_lines: bool,
    methods_depth: usize,
    depth: usize,
}

impl CoberturaState {
    fn open(&mut self, e: &BytesStart, is_empty: bool) {
        match e.name().as_ref() {
            b"coverage" => {
                if self.totals.is_none() {
                    self.totals = Some(read_totals(e));
                }
            }
            b"package" => self.classes_in_package = 0,
            b"class" => {
                self.classes_in_package += 1;
                self.current_class = Some(ClassState {
                    filename: attr(e, b"filename").unwrap_or_default(),
                    line_rate: attr_number(e, b"line-rate"),
                    ..Default::default()
                });
            }
            b"methods" if !is_empty => self.methods_depth += 1,
            b"line" if self.methods_depth == 0 => {
                if let Some(ref mut class) = self.current_class {
                    read_line(e, class);
                }
            }
            _ => {}
        }

        if is_empty {
            self.close(e.name().as_ref());
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"methods" => self.methods_depth = self.methods_depth.saturating_sub(1),
            b"package" => {
                if self.classes_in_package > 0 {
                    self.packages_with_classes += 1;
                }
                self.classes_in_package = 0;
            }
            b"class" => {
                if let Some(class) = self.current_class.take() {
                    self.finish_class(class);
                }
            }
            _ => {}
        }
    }

    fn finish_class(&mut self, class: ClassState) {
        self.total_part_branches = self.total_part_branches.saturating_add(class.part_branches);
        self.has_branch_lines |= class.has_branch_lines;

        if self.skip_covered && class.fully_covered() {
            debug!(file = %class.filename, "Skipping fully covered class");
            return;
        }
        self.rows.push(class.into_row());
    }

    fn finish(mut self) -> ReportResult<CoverageReport> {
        if self.depth != 0 {
            warn!("Coverage file is not XML or not well formed: unexpected end of document");
            return Err(ReportError::XmlParse("unexpected end of document".to_string()));
        }

        let totals = self
            .totals
            .take()
            .ok_or_else(|| ReportError::malformed("missing <coverage> root element"))?;

        if self.packages_with_classes == 0 {
            return Err(ReportError::malformed("no <package> with <class> entries"));
        }

        let branch_mode = self.has_branch_lines || totals.branches_valid > 0;
        if !branch_mode {
            for row in self.rows.iter_mut() {
                row.branches = None;
                row.part_branches = None;
            }
        }

        let covered = u64::from(totals.lines_covered) + u64::from(totals.branches_covered);
        let valid = u64::from(totals.lines_valid) + u64::from(totals.branches_valid);
        debug!(rows = self.rows.len(), covered, valid, "Parsed Cobertura report");

        let total = CoverageRow {
            name: TOTAL_NAME.to_string(),
            stmts: totals.lines_valid,
            miss: totals.lines_valid.saturating_sub(totals.lines_covered),
            cover: coverage_percent(covered, valid),
            branches: branch_mode.then_some(totals.branches_valid),
            part_branches: branch_mode.then_some(self.total_part_branches),
            missing: Vec::new(),
        };

        Ok(CoverageReport {
            rows: self.rows,
            total,
            warnings: 0,
        })
    }
}

/// Parse Cobertura XML content from a string.
///
/// With `skip_covered`, classes whose `line-rate` is exactly 1 are left out
/// of the rows. The TOTAL row is unaffected.
pub fn parse_cobertura_string(content: &str, skip_covered: bool) -> ReportResult<CoverageReport> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut state = CoberturaState {
        skip_covered,
        ..Default::default()
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                state.depth += 1;
                state.open(e, false);
            }
            Ok(Event::Empty(ref e)) => state.open(e, true),
            Ok(Event::End(ref e)) => {
                state.depth = state.depth.saturating_sub(1);
                state.close(e.name().as_ref());
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("Coverage file is not XML or not well formed: {}", e);
                return Err(ReportError::XmlParse(e.to_string()));
            }
            _ => {}
        }
        buf.clear();
    }

    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0" ?>
<coverage version="7.2.7" timestamp="1690000000000" lines-valid="9" lines-covered="6" line-rate="0.6667" branches-covered="0" branches-valid="0" branch-rate="0" complexity="0">
    <sources>
        <source>/home/runner/work/project/project</source>
    </sources>
    <packages>
        <package name="src" line-rate="0.6667" branch-rate="0" complexity="0">
            <classes>
                <class name="app.py" filename="src/app.py" complexity="0" line-rate="0.5" branch-rate="0">
                    <methods/>
                    <lines>
                        <line number="1" hits="1"/>
                        <line number="2" hits="0"/>
                        <line number="3" hits="0"/>
                        <line number="4" hits="1"/>
                        <line number="7" hits="0"/>
                        <line number="8" hits="1"/>
                    </lines>
                </class>
                <class name="util.py" filename="src/util.py" complexity="0" line-rate="1" branch-rate="0">
                    <methods/>
                    <lines>
                        <line number="1" hits="1"/>
                        <line number="2" hits="3"/>
                        <line number="3" hits="1"/>
                    </lines>
                </class>
            </classes>
        </package>
    </packages>
</coverage>"#;

    #[test]
    fn test_coverage_percent_rounding() {
        assert_eq!(coverage_percent(10, 10), "100%");
        assert_eq!(coverage_percent(0, 0), "100%");
        assert_eq!(coverage_percent(0, 10), "0%");
        assert_eq!(coverage_percent(99, 100), "99%");
        assert_eq!(coverage_percent(999, 1000), "99%");
        assert_eq!(coverage_percent(1, 1000), "1%");
        assert_eq!(coverage_percent(1, 3), "33%");
        assert_eq!(coverage_percent(2, 3), "67%");
    }

    #[test]
    fn test_coverage_percent_ties_round_to_even() {
        assert_eq!(coverage_percent(1, 8), "12%");
        assert_eq!(coverage_percent(3, 8), "38%");
        assert_eq!(coverage_percent(5, 8), "62%");
        assert_eq!(coverage_percent(7, 8), "88%");
        assert_eq!(coverage_percent(1, 40), "2%");
    }

    #[test]
    fn test_counts_near_u32_max() {
        let max = u32::MAX;
        let xml = format!(
            r#"<coverage lines-valid="{max}" lines-covered="{max}" branches-valid="10" branches-covered="5">
            <packages><package name="p"><classes>
            <class filename="a.py" line-rate="0.5"><lines>
                <line number="1" hits="1" branch="true" condition-coverage="50% (1/{max})"/>
                <line number="2" hits="0" branch="true" condition-coverage="50% (1/{max})"/>
            </lines></class>
            </classes></package></packages></coverage>"#
        );

        let report = parse_cobertura_string(&xml, false).unwrap();
        assert_eq!(report.total.cover, "99%");
        assert_eq!(report.total.stmts, max);
        assert_eq!(report.rows[0].branches, Some(max));
        assert_eq!(report.rows[0].cover, "1%");
    }

    #[test]
    fn test_coverage_percent_stays_strictly_inside() {
        for valid in 1..=300u64 {
            for covered in 1..valid {
                let pct: u32 = coverage_percent(covered, valid)
                    .trim_end_matches('%')
                    .parse()
                    .unwrap();
                assert!((1..=99).contains(&pct), "{}/{} gave {}", covered, valid, pct);
            }
        }
    }

    #[test]
    fn test_parse_cobertura() {
        let report = parse_cobertura_string(XML, false).unwrap();

        assert_eq!(report.rows.len(), 2);
        let app = &report.rows[0];
        assert_eq!(app.name, "src/app.py");
        assert_eq!(app.stmts, 6);
        assert_eq!(app.miss, 3);
        assert_eq!(app.cover, "50%");
        assert_eq!(app.missing, vec!["2-3", "7"]);
        assert_eq!(app.branches, None);

        let util = &report.rows[1];
        assert_eq!(util.cover, "100%");
        assert!(util.missing.is_empty());

        assert_eq!(report.total.name, "TOTAL");
        assert_eq!(report.total.stmts, 9);
        assert_eq!(report.total.miss, 3);
        assert_eq!(report.total.cover, "67%");
        assert_eq!(report.warnings, 0);
    }

    #[test]
    fn test_skip_covered_keeps_total() {
        let report = parse_cobertura_string(XML, true).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].name, "src/app.py");
        assert_eq!(report.total.cover, "67%");
        assert_eq!(report.total.stmts, 9);
    }

    #[test]
    fn test_total_clamped_below_full() {
        let xml = r#"<coverage lines-valid="100" lines-covered="99" branches-valid="0" branches-covered="0">
            <packages><package name="p"><classes>
                <class filename="a.py" line-rate="0.99"><lines><line number="1" hits="0"/></lines></class>
            </classes></package></packages></coverage>"#;
        let report = parse_cobertura_string(xml, false).unwrap();
        assert_eq!(report.total.cover, "99%");
    }

    #[test]
    fn test_branch_lines() {
        let xml = r#"<coverage lines-valid="4" lines-covered="4" branches-valid="6" branches-covered="3">
            <packages><package name="p"><classes>
                <class filename="b.py" line-rate="1">
                    <methods><method name="f"><lines><line number="1" hits="1"/></lines></method></methods>
                    <lines>
                        <line number="1" hits="1"/>
                        <line number="2" hits="1" branch="true" condition-coverage="50% (1/2)" missing-branches="4"/>
                        <line number="3" hits="1" branch="true" condition-coverage="100% (2/2)"/>
                        <line number="5" hits="1" branch="true" missing-branches="exit,7"/>
                    </lines>
                </class>
            </classes></package></packages></coverage>"#;
        let report = parse_cobertura_string(xml, false).unwrap();
        let row = &report.rows[0];

        assert_eq!(row.stmts, 4);
        assert_eq!(row.miss, 0);
        assert_eq!(row.branches, Some(6));
        assert_eq!(row.part_branches, Some(2));
        assert_eq!(row.missing, vec!["2->4", "5->exit", "5->7"]);
        // 4 lines + 3 of 6 branch targets
        assert_eq!(row.cover, "70%");

        assert_eq!(report.total.branches, Some(6));
        assert_eq!(report.total.part_branches, Some(2));
        assert_eq!(report.total.cover, "70%");
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse_cobertura_string("<coverage><packages>", false).unwrap_err();
        assert!(err.is_malformed());

        let err = parse_cobertura_string("<coverage></packages>", false).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_missing_classes_is_bad_format() {
        let xml = r#"<coverage lines-valid="0" lines-covered="0"><packages><package name="p"><classes/></package></packages></coverage>"#;
        let err = parse_cobertura_string(xml, false).unwrap_err();
        assert!(matches!(err, ReportError::MalformedReport(_)));

        let err = parse_cobertura_string("<report/>", false).unwrap_err();
        assert!(matches!(err, ReportError::MalformedReport(_)));
    }

    #[test]
    fn test_condition_coverage() {
        assert_eq!(parse_condition_coverage("50% (1/2)"), Some((1, 2)));
        assert_eq!(parse_condition_coverage("100% (4/4)"), Some((4, 4)));
        assert_eq!(parse_condition_coverage("50%"), None);
    }
}
