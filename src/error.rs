//! Error taxonomy for report parsing
//!
//! None of these are fatal to a run: callers log them and fall back to an
//! empty or partial result.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// Required structural markers or tags are absent
    #[error("report has bad format or wrong data: {0}")]
    MalformedReport(String),

    /// A single row does not tokenize into the expected fields
    #[error("row {line} could not be parsed: {reason}")]
    UnparseableRow { line: usize, reason: String },

    /// The document is not well-formed XML
    #[error("file is not XML or not well formed: {0}")]
    XmlParse(String),

    /// The source is missing or empty
    #[error("no content found in '{0}'")]
    NoContent(String),
}

impl ReportError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        ReportError::MalformedReport(reason.into())
    }

    /// XML failures are handled exactly like missing markers.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ReportError::MalformedReport(_) | ReportError::XmlParse(_)
        )
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_parse_counts_as_malformed() {
        assert!(ReportError::XmlParse("eof".into()).is_malformed());
        assert!(ReportError::malformed("no TOTAL").is_malformed());
        assert!(!ReportError::NoContent("a.txt".into()).is_malformed());
    }

    #[test]
    fn test_error_messages() {
        let err = ReportError::UnparseableRow {
            line: 7,
            reason: "expected at least 4 fields".into(),
        };
        assert_eq!(
            err.to_string(),
            "row 7 could not be parsed: expected at least 4 fields"
        );
    }
}
