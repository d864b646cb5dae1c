//! Missing-line ranges
//!
//! Uncovered lines are stored as compact range tokens: `12` for a single
//! line, `20-25` for a consecutive run and `12->14` for an uncovered branch
//! target. The renderer turns each token back into a hyperlink fragment.

use std::fmt;

/// One entry of a row's missing list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingRange {
    Line(u32),
    Span(u32, u32),
    /// Uncovered branch from `line` to `target` (a line number or `exit`)
    Branch { line: u32, target: String },
}

impl MissingRange {
    /// Parse a range token as written by the coverage tools.
    ///
    /// Returns `None` for tokens that are neither line numbers, line spans
    /// nor branch arcs.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();

        if let Some((line, target)) = token.split_once("->") {
            let line = line.trim().parse().ok()?;
            let target = target.trim();
            if target.is_empty() {
                return None;
            }
            return Some(MissingRange::Branch {
                line,
                target: target.to_string(),
            });
        }

        match token.split_once('-') {
            Some((start, end)) => {
                let start = start.trim().parse().ok()?;
                let end = end.trim().parse().ok()?;
                if start == end {
                    Some(MissingRange::Line(start))
                } else {
                    Some(MissingRange::Span(start, end))
                }
            }
            None => token.parse().ok().map(MissingRange::Line),
        }
    }

    /// First line this entry points at
    pub fn start(&self) -> u32 {
        match self {
            MissingRange::Line(line) => *line,
            MissingRange::Span(start, _) => *start,
            MissingRange::Branch { line, .. } => *line,
        }
    }

    /// URL fragment (without `#`) selecting the range in a source viewer
    pub fn fragment(&self) -> String {
        match self {
            MissingRange::Span(start, end) => format!("L{}-L{}", start, end),
            other => format!("L{}", other.start()),
        }
    }

    /// HTML display text: plain number, en dash for spans, escaped arrow for branches
    pub fn display_html(&self) -> String {
        match self {
            MissingRange::Line(line) => line.to_string(),
            MissingRange::Span(start, end) => format!("{}&ndash;{}", start, end),
            MissingRange::Branch { line, target } => format!("{}-&gt;{}", line, target),
        }
    }

    /// Line numbers covered by this entry
    pub fn expand(&self) -> Vec<u32> {
        match self {
            MissingRange::Line(line) => vec![*line],
            MissingRange::Span(start, end) => (*start..=*end).collect(),
            MissingRange::Branch { line, .. } => vec![*line],
        }
    }
}

impl fmt::Display for MissingRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingRange::Line(line) => write!(f, "{}", line),
            MissingRange::Span(start, end) => write!(f, "{}-{}", start, end),
            MissingRange::Branch { line, target } => write!(f, "{}->{}", line, target),
        }
    }
}

/// Group strictly consecutive line numbers into ranges, keeping input order.
///
/// A run only continues while each number is exactly one more than the
/// previous one, so unsorted input produces one range per break.
pub fn compact(lines: &[u32]) -> Vec<MissingRange> {
    let mut ranges = Vec::new();
    let mut current: Option<(u32, u32)> = None;

    for &line in lines {
        current = match current {
            Some((start, end)) if end.checked_add(1) == Some(line) => Some((start, line)),
            Some(run) => {
                ranges.push(run_to_range(run));
                Some((line, line))
            }
            None => Some((line, line)),
        };
    }

    if let Some(run) = current {
        ranges.push(run_to_range(run));
    }

    ranges
}

fn run_to_range((start, end): (u32, u32)) -> MissingRange {
    if start == end {
        MissingRange::Line(start)
    } else {
        MissingRange::Span(start, end)
    }
}

/// Expand a textual range token into its line numbers.
pub fn expand(token: &str) -> Vec<u32> {
    MissingRange::parse(token)
        .map(|range| range.expand())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tokens() {
        assert_eq!(expand("12"), vec![12]);
        assert_eq!(expand("20-25"), vec![20, 21, 22, 23, 24, 25]);
        assert_eq!(expand("12->14"), vec![12]);
        assert!(expand("n/a").is_empty());
    }

    #[test]
    fn test_compact_sorted_lines() {
        let ranges = compact(&[3, 4, 5, 9, 11, 12]);
        let text: Vec<String> = ranges.iter().map(|r| r.to_string()).collect();
        assert_eq!(text, vec!["3-5", "9", "11-12"]);
    }

    #[test]
    fn test_compact_is_inverse_of_expand() {
        let samples: [&[u32]; 4] = [&[1], &[1, 2, 3], &[2, 4, 6], &[7, 8, 10, 11, 12, 40]];

        for lines in samples {
            let expanded: Vec<u32> = compact(lines).iter().flat_map(|r| r.expand()).collect();
            assert_eq!(expanded, lines);
        }
    }

    #[test]
    fn test_compact_keeps_document_order() {
        let text: Vec<String> = compact(&[10, 11, 2, 3]).iter().map(|r| r.to_string()).collect();
        assert_eq!(text, vec!["10-11", "2-3"]);
    }

    #[test]
    fn test_compact_empty() {
        assert!(compact(&[]).is_empty());
    }

    #[test]
    fn test_parse_and_fragments() {
        let single = MissingRange::parse("12").unwrap();
        assert_eq!(single.fragment(), "L12");
        assert_eq!(single.display_html(), "12");

        let span = MissingRange::parse("20-25").unwrap();
        assert_eq!(span.fragment(), "L20-L25");
        assert_eq!(span.display_html(), "20&ndash;25");

        let branch = MissingRange::parse("12->exit").unwrap();
        assert_eq!(branch.fragment(), "L12");
        assert_eq!(branch.display_html(), "12-&gt;exit");
        assert_eq!(branch.to_string(), "12->exit");
    }

    #[test]
    fn test_parse_degenerate_span_is_single_line() {
        assert_eq!(MissingRange::parse("7-7"), Some(MissingRange::Line(7)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(MissingRange::parse(""), None);
        assert_eq!(MissingRange::parse("a-b"), None);
        assert_eq!(MissingRange::parse("12->"), None);
    }
}
