//! Comment body composition
//!
//! Combines the coverage section, the JUnit summary and the size guard into
//! the final comment body plus the values exported for other CI steps.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::RenderOptions;
use crate::coverage::CoverageColor;
use crate::junit::{
    parse_junit_documents, summary_markdown, JUnitReport, JUnitSummary, NotSuccessTests,
};
use crate::limits::{
    comment_length, exceeds_comment_limit, Trigger, COMMENT_ADVICE, MAX_COMMENT_LENGTH,
};
use crate::multi::build_multi_report;
use crate::report::{load_report, render_report, CoverageComment};
use crate::source::ReportSource;

/// Which reports to combine into one comment
#[derive(Debug, Clone)]
pub struct CommentRequest {
    pub coverage: Option<String>,
    pub junit: Vec<String>,
    /// JUnit reports of the default branch, shown as inline diffs
    pub baseline_junit: Vec<String>,
    /// When non-empty, replaces the single-report mode
    pub multiple_files: Vec<String>,
    pub trigger: Trigger,
}

impl Default for CommentRequest {
    fn default() -> Self {
        Self {
            coverage: None,
            junit: Vec::new(),
            baseline_junit: Vec::new(),
            multiple_files: Vec::new(),
            trigger: Trigger::PullRequest,
        }
    }
}

/// Final body plus machine-readable outputs, serialized with camelCase keys
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentOutputs {
    pub body: String,
    pub coverage: String,
    pub color: CoverageColor,
    pub warnings: u32,
    /// Coverage section with links to the default branch
    pub coverage_html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub junit: Option<JUnitSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_success_test_info: Option<NotSuccessTests>,
    pub summary_report: String,
    /// Set when the body had to be shrunk to fit a comment
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub advice: Vec<String>,
}

impl CommentOutputs {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

pub fn build_comment(
    request: &CommentRequest,
    options: &RenderOptions,
    source: &dyn ReportSource,
) -> CommentOutputs {
    if request.multiple_files.is_empty() {
        build_single(request, options, source)
    } else {
        build_multiple(request, options, source)
    }
}

fn read_junit(paths: &[String], source: &dyn ReportSource) -> Option<JUnitReport> {
    let documents: Vec<(String, String)> = paths
        .iter()
        .filter_map(|path| source.read(path).map(|content| (path.clone(), content)))
        .collect();

    if documents.is_empty() {
        return None;
    }
    parse_junit_documents(&documents)
}

fn join_sections(coverage_html: &str, summary: &str) -> String {
    if coverage_html.is_empty() {
        summary.to_string()
    } else if summary.is_empty() {
        coverage_html.to_string()
    } else {
        format!("{}\n\n{}", coverage_html, summary)
    }
}

fn build_single(
    request: &CommentRequest,
    options: &RenderOptions,
    source: &dyn ReportSource,
) -> CommentOutputs {
    let report = request.coverage.as_ref().and_then(|path| {
        let content = source.read(path);
        load_report(path, content.as_deref(), options)
    });

    let mut coverage = report
        .as_ref()
        .map(|r| render_report(r, options))
        .unwrap_or_else(CoverageComment::empty);
    let coverage_html = report
        .as_ref()
        .map(|r| render_report(r, &options.with_commit(&options.default_branch)).html)
        .unwrap_or_default();

    let junit = read_junit(&request.junit, source);
    let baseline = read_junit(&request.baseline_junit, source);
    let baseline_summary = baseline.as_ref().map(|b| &b.summary);
    let summary_report = junit
        .as_ref()
        .map(|j| summary_markdown(&j.summary, &options.xml_title, baseline_summary))
        .unwrap_or_default();

    let mut advice = Vec::new();
    let body = join_sections(&coverage.html, &summary_report);
    if exceeds_comment_limit(&body, request.trigger) {
        warn!(
            "Your comment is too long (maximum is {} characters, got {}), \
             coverage report will not be added.",
            MAX_COMMENT_LENGTH,
            comment_length(&body)
        );
        advice = COMMENT_ADVICE.iter().map(|a| a.to_string()).collect();

        if let Some(report) = &report {
            let summary_only = RenderOptions {
                hide_report: true,
                ..options.clone()
            };
            coverage = render_report(report, &summary_only);
        }
    }

    if !coverage.is_empty() {
        info!(
            "Publishing {}. Total coverage: {}. Color: {}. Warnings: {}",
            options.title, coverage.coverage, coverage.color, coverage.warnings
        );
    }

    let (junit, not_success_test_info) = match junit {
        Some(report) => (Some(report.summary), Some(report.not_success)),
        None => (None, None),
    };

    CommentOutputs {
        body: join_sections(&coverage.html, &summary_report),
        coverage: coverage.coverage,
        color: coverage.color,
        warnings: coverage.warnings,
        coverage_html,
        junit,
        not_success_test_info,
        summary_report,
        advice,
    }
}

fn build_multiple(
    request: &CommentRequest,
    options: &RenderOptions,
    source: &dyn ReportSource,
) -> CommentOutputs {
    let multi = build_multi_report(&request.multiple_files, options, source);

    let (coverage, coverage_html, junit) = match multi.primary {
        Some(primary) => (primary.coverage, primary.coverage_html, primary.junit),
        None => (CoverageComment::empty(), String::new(), None),
    };

    CommentOutputs {
        body: multi.table.clone(),
        coverage: coverage.coverage,
        color: coverage.color,
        warnings: coverage.warnings,
        coverage_html,
        junit,
        not_success_test_info: None,
        summary_report: multi.table,
        advice: Vec::new(),
    }
}
