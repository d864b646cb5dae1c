//! JUnit XML parsing and test summary rendering

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ReportError, ReportResult};

/// Aggregate counts over every top-level `<testsuite>`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JUnitSummary {
    pub tests: u32,
    pub failures: u32,
    pub errors: u32,
    pub skipped: u32,
    /// Seconds
    pub time: f64,
}

impl JUnitSummary {
    fn add(&mut self, other: &JUnitSummary) {
        self.tests = self.tests.saturating_add(other.tests);
        self.failures = self.failures.saturating_add(other.failures);
        self.errors = self.errors.saturating_add(other.errors);
        self.skipped = self.skipped.saturating_add(other.skipped);
        self.time += other.time;
    }
}

/// A failed, errored or skipped test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestInfo {
    pub classname: String,
    pub name: String,
    pub message: String,
}

/// Non-passing test cases grouped by outcome
///
/// A test case lands in every list it has a marker for, at most once per list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotSuccessTests {
    pub count: usize,
    pub failures: Vec<TestInfo>,
    pub errors: Vec<TestInfo>,
    pub skipped: Vec<TestInfo>,
}

impl NotSuccessTests {
    fn extend(&mut self, other: NotSuccessTests) {
        self.failures.extend(other.failures);
        self.errors.extend(other.errors);
        self.skipped.extend(other.skipped);
        self.count = self.failures.len() + self.errors.len() + self.skipped.len();
    }
}

/// Everything extracted from one or more JUnit documents
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JUnitReport {
    pub summary: JUnitSummary,
    pub not_success: NotSuccessTests,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Failure,
    Error,
    Skipped,
}

impl Outcome {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"failure" => Some(Outcome::Failure),
            b"error" => Some(Outcome::Error),
            b"skipped" => Some(Outcome::Skipped),
            _ => None,
        }
    }
}

/// Marker element currently being read inside a test case
#[derive(Debug)]
struct OpenMarker {
    outcome: Outcome,
    message_attr: String,
    text: String,
}

impl OpenMarker {
    fn message(&self) -> String {
        if self.text.trim().is_empty() {
            table_safe(&self.message_attr)
        } else {
            table_safe(&self.text)
        }
    }
}

#[derive(Debug, Default)]
struct CaseState {
    classname: String,
    name: String,
    markers: Vec<(Outcome, String)>,
    open_marker: Option<OpenMarker>,
}

impl CaseState {
    fn info_for(&self, outcome: Outcome) -> Option<TestInfo> {
        self.markers
            .iter()
            .find(|(o, _)| *o == outcome)
            .map(|(_, message)| TestInfo {
                classname: self.classname.clone(),
                name: self.name.clone(),
                message: message.clone(),
            })
    }
}

#[derive(Debug, Default)]
struct SuiteState {
    declared_tests: Option<u32>,
    counted_cases: u32,
    summary: JUnitSummary,
}

#[derive(Debug, Default)]
struct JUnitState {
    report: JUnitReport,
    suites_seen: usize,
    suite_depth: usize,
    current_suite: Option<SuiteState>,
    current_case: Option<CaseState>,
    depth: usize,
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

fn attr_count(e: &BytesStart, name: &[u8]) -> Option<u32> {
    attr(e, name).and_then(|v| {
        let v = v.trim();
        v.parse::<u32>()
            .ok()
            .or_else(|| v.parse::<f64>().ok().map(|f| f.max(0.0) as u32))
    })
}

impl JUnitState {
    fn open(&mut self, e: &BytesStart, is_empty: bool) {
        let name = e.name();
        match name.as_ref() {
            b"testsuite" => {
                if self.suite_depth == 0 {
                    self.suites_seen += 1;
                    self.current_suite = Some(SuiteState {
                        declared_tests: attr_count(e, b"tests"),
                        counted_cases: 0,
                        summary: JUnitSummary {
                            tests: 0,
                            failures: attr_count(e, b"failures").unwrap_or(0),
                            errors: attr_count(e, b"errors").unwrap_or(0),
                            skipped: attr_count(e, b"skipped").unwrap_or(0),
                            time: attr(e, b"time")
                                .and_then(|t| t.trim().parse().ok())
                                .unwrap_or(0.0),
                        },
                    });
                }
                self.suite_depth += 1;
            }
            b"testcase" => {
                if let Some(ref mut suite) = self.current_suite {
                    suite.counted_cases = suite.counted_cases.saturating_add(1);
                }
                self.current_case = Some(CaseState {
                    classname: attr(e, b"classname").unwrap_or_default(),
                    name: attr(e, b"name").unwrap_or_default(),
                    ..Default::default()
                });
            }
            tag => {
                if let (Some(outcome), Some(case)) =
                    (Outcome::from_tag(tag), self.current_case.as_mut())
                {
                    case.open_marker = Some(OpenMarker {
                        outcome,
                        message_attr: attr(e, b"message").unwrap_or_default(),
                        text: String::new(),
                    });
                }
            }
        }

        if is_empty {
            self.close(name.as_ref());
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(marker) = self.current_case.as_mut().and_then(|c| c.open_marker.as_mut()) {
            marker.text.push_str(text);
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"testsuite" => {
                self.suite_depth = self.suite_depth.saturating_sub(1);
                if self.suite_depth == 0 {
                    if let Some(suite) = self.current_suite.take() {
                        let mut summary = suite.summary;
                        summary.tests = suite.declared_tests.unwrap_or(suite.counted_cases);
                        self.report.summary.add(&summary);
                    }
                }
            }
            b"testcase" => {
                if let Some(case) = self.current_case.take() {
                    self.finish_case(case);
                }
            }
            tag => {
                if Outcome::from_tag(tag).is_some() {
                    if let Some(case) = self.current_case.as_mut() {
                        if let Some(marker) = case.open_marker.take() {
                            let message = marker.message();
                            case.markers.push((marker.outcome, message));
                        }
                    }
                }
            }
        }
    }

    fn finish_case(&mut self, case: CaseState) {
        let not_success = &mut self.report.not_success;
        if let Some(info) = case.info_for(Outcome::Failure) {
            not_success.failures.push(info);
        }
        if let Some(info) = case.info_for(Outcome::Error) {
            not_success.errors.push(info);
        }
        if let Some(info) = case.info_for(Outcome::Skipped) {
            not_success.skipped.push(info);
        }
        not_success.count =
            not_success.failures.len() + not_success.errors.len() + not_success.skipped.len();
    }
}

/// Make free text safe for a single markdown table cell
fn table_safe(message: &str) -> String {
    message
        .trim()
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('|', "\\|")
}

/// Parse a single JUnit XML document
pub fn parse_junit_string(xml: &str) -> ReportResult<JUnitReport> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut state = JUnitState::default();
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
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default();
                state.text(&text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e);
                state.text(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ReportError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if state.depth != 0 {
        return Err(ReportError::XmlParse("unexpected end of document".to_string()));
    }
    if state.suites_seen == 0 {
        return Err(ReportError::malformed("no <testsuite> element"));
    }

    Ok(state.report)
}

/// Parse and aggregate several JUnit documents.
///
/// Malformed documents are logged and left out; `None` when nothing parsed.
pub fn parse_junit_documents<S: AsRef<str>>(documents: &[(S, S)]) -> Option<JUnitReport> {
    let mut merged: Option<JUnitReport> = None;

    for (source, content) in documents {
        match parse_junit_string(content.as_ref()) {
            Ok(report) => {
                debug!(
                    source = source.as_ref(),
                    tests = report.summary.tests,
                    "Parsed JUnit report"
                );
                let target = merged.get_or_insert_with(JUnitReport::default);
                target.summary.add(&report.summary);
                target.not_success.extend(report.not_success);
            }
            Err(e) => warn!("JUnit file '{}' skipped: {}", source.as_ref(), e),
        }
    }

    merged
}

/// Human readable duration: `2m 5s` above one minute, `1.234s` otherwise
pub fn display_time(seconds: f64) -> String {
    if seconds > 60.0 {
        format!(
            "{}m {}s",
            (seconds / 60.0).floor() as u64,
            (seconds % 60.0).floor() as u64
        )
    } else {
        format!("{:.3}s", seconds)
    }
}

/// Render `value`, or `~~old~~ **new**` when it differs from the baseline
fn diff_cell(value: String, baseline: Option<String>) -> String {
    match baseline {
        Some(old) if old != value => format!("~~{}~~ **{}**", old, value),
        _ => value,
    }
}

/// Cells of the summary row, in header order
fn summary_cells(summary: &JUnitSummary, baseline: Option<&JUnitSummary>) -> [String; 5] {
    let pick = |f: fn(&JUnitSummary) -> String| diff_cell(f(summary), baseline.map(f));
    [
        pick(|s| s.tests.to_string()),
        pick(|s| s.skipped.to_string()),
        pick(|s| s.failures.to_string()),
        pick(|s| s.errors.to_string()),
        pick(|s| display_time(s.time)),
    ]
}

/// Markdown row fragment used by the multi-report table:
/// `| tests | skipped :zzz: | failures :x: | errors :fire: | time :stopwatch: |`
pub fn summary_row(summary: &JUnitSummary, baseline: Option<&JUnitSummary>) -> String {
    let [tests, skipped, failures, errors, time] = summary_cells(summary, baseline);
    format!(
        "| {} | {} :zzz: | {} :x: | {} :fire: | {} :stopwatch: |",
        tests, skipped, failures, errors, time
    )
}

/// Render the JUnit summary as a markdown table, optionally titled and
/// diffed against a baseline (e.g. the default branch) summary.
pub fn summary_markdown(
    summary: &JUnitSummary,
    title: &str,
    baseline: Option<&JUnitSummary>,
) -> String {
    let mut out = String::new();

    if !title.is_empty() {
        out.push_str(&format!("## {}\n\n", title));
    }

    out.push_str("| Tests | Skipped | Failures | Errors | Time |\n");
    out.push_str("| ----- | ------- | -------- | -------- | ------------------ |\n");
    out.push_str(&summary_row(summary, baseline));
    out.push('\n');

    out
}
