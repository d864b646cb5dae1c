//! Coverage badge colors

use serde::Serialize;
use std::fmt;

/// Severity bucket used by the shields.io coverage badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageColor {
    Red,
    Orange,
    Yellow,
    Green,
    BrightGreen,
}

/// Half-open `[min, max)` percentage buckets, checked in order
const BUCKETS: [(f64, f64, CoverageColor); 5] = [
    (0.0, 40.0, CoverageColor::Red),
    (40.0, 60.0, CoverageColor::Orange),
    (60.0, 80.0, CoverageColor::Yellow),
    (80.0, 90.0, CoverageColor::Green),
    (90.0, 101.0, CoverageColor::BrightGreen),
];

impl CoverageColor {
    /// Out-of-range and non-numeric values fall back to red.
    pub fn from_percentage(percentage: f64) -> Self {
        BUCKETS
            .iter()
            .find(|(min, max, _)| percentage >= *min && percentage < *max)
            .map(|(_, _, color)| *color)
            .unwrap_or(CoverageColor::Red)
    }

    /// Classify a displayed cover string such as `80%` or `0`.
    pub fn from_cover(cover: &str) -> Self {
        Self::from_percentage(leading_number(cover).unwrap_or(f64::NAN))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageColor::Red => "red",
            CoverageColor::Orange => "orange",
            CoverageColor::Yellow => "yellow",
            CoverageColor::Green => "green",
            CoverageColor::BrightGreen => "brightgreen",
        }
    }
}

impl fmt::Display for CoverageColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse the numeric prefix of a string, ignoring a trailing `%` or other text.
fn leading_number(value: &str) -> Option<f64> {
    let value = value.trim();
    let end = value
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(CoverageColor::from_percentage(0.0), CoverageColor::Red);
        assert_eq!(CoverageColor::from_percentage(39.9), CoverageColor::Red);
        assert_eq!(CoverageColor::from_percentage(40.0), CoverageColor::Orange);
        assert_eq!(CoverageColor::from_percentage(60.0), CoverageColor::Yellow);
        assert_eq!(CoverageColor::from_percentage(80.0), CoverageColor::Green);
        assert_eq!(CoverageColor::from_percentage(90.0), CoverageColor::BrightGreen);
        assert_eq!(CoverageColor::from_percentage(100.0), CoverageColor::BrightGreen);
    }

    #[test]
    fn test_out_of_range_is_red() {
        assert_eq!(CoverageColor::from_percentage(-1.0), CoverageColor::Red);
        assert_eq!(CoverageColor::from_percentage(101.0), CoverageColor::Red);
        assert_eq!(CoverageColor::from_percentage(f64::NAN), CoverageColor::Red);
    }

    #[test]
    fn test_from_cover_string() {
        assert_eq!(CoverageColor::from_cover("80%"), CoverageColor::Green);
        assert_eq!(CoverageColor::from_cover("95.5%"), CoverageColor::BrightGreen);
        assert_eq!(CoverageColor::from_cover("0"), CoverageColor::Red);
        assert_eq!(CoverageColor::from_cover("n/a"), CoverageColor::Red);
        assert_eq!(CoverageColor::from_cover("100%").as_str(), "brightgreen");
    }
}
