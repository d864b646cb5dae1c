//! coverage-comment - coverage and test reports as PR comments
//!
//! A library for turning test tool output into comment bodies with:
//! - Plain-text and Cobertura XML coverage parsing
//! - JUnit XML parsing with optional baseline diffs
//! - Badge and folder-grouped HTML coverage tables
//! - Multi-report comparison tables
//! - Size limits for comments and run summaries

pub mod comment;
pub mod config;
pub mod coverage;
pub mod error;
pub mod junit;
pub mod limits;
pub mod multi;
pub mod report;
pub mod source;

pub use comment::{build_comment, CommentOutputs, CommentRequest};
pub use config::{Config, RenderOptions};
pub use coverage::{parse_coverage, CoverageColor, CoverageReport, CoverageRow};
pub use error::{ReportError, ReportResult};
pub use junit::{parse_junit_documents, parse_junit_string, JUnitReport, JUnitSummary};
pub use limits::Trigger;
pub use report::{build_coverage_comment, CoverageComment};
pub use source::{FsSource, ReportSource};
