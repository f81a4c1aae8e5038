//! Target height (HT) extraction from free-text observation notes.
//!
//! Field crews write heights into the notes column in several loose forms
//! (`Ht. T0 = 6m`, `Ht=6,5 m`, `Ht 6m`, `ht6m`). The extractor tries an
//! ordered list of patterns; the first pattern that yields an accepted,
//! parsable value wins.

use std::sync::OnceLock;

use regex::Regex;

/// When a pattern match may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// The match names a point; accept only when it is the station or target.
    PointMatches,
    /// The match names no point and applies to the current record.
    Unconditional,
}

/// One step of the extraction cascade.
#[derive(Debug, Clone)]
pub struct HeightPattern {
    regex: Regex,
    acceptance: Acceptance,
}

impl HeightPattern {
    /// Compile a pattern. For [`Acceptance::PointMatches`] the regex must
    /// capture the point id in group 1 and the value in group 2; otherwise
    /// the value is group 1.
    pub fn new(pattern: &str, acceptance: Acceptance) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            acceptance,
        })
    }

    /// Scan all matches in `notes` and return the first accepted value.
    fn find(&self, notes: &str, station: &str, target: &str) -> Option<f64> {
        self.regex.captures_iter(notes).find_map(|caps| {
            let value = match self.acceptance {
                Acceptance::PointMatches => {
                    let point = caps.get(1)?.as_str();
                    if point != station && point != target {
                        return None;
                    }
                    caps.get(2)?
                }
                Acceptance::Unconditional => caps.get(1)?,
            };
            parse_height(value.as_str())
        })
    }
}

/// Parse a height value, accepting a decimal comma.
fn parse_height(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

/// Ordered cascade of height patterns.
#[derive(Debug, Clone)]
pub struct HeightExtractor {
    patterns: Vec<HeightPattern>,
}

impl HeightExtractor {
    /// Build an extractor from an explicit priority list.
    pub fn from_patterns(patterns: Vec<HeightPattern>) -> Self {
        Self { patterns }
    }

    /// The patterns, highest priority first.
    pub fn patterns(&self) -> &[HeightPattern] {
        &self.patterns
    }

    /// Return the object height found in `notes`, or `0.0` when none is.
    ///
    /// # Arguments
    ///
    /// * `notes` - Free-text observation field
    /// * `station` - Station id of the record the notes belong to
    /// * `target` - Target id of the record the notes belong to
    pub fn extract(&self, notes: &str, station: &str, target: &str) -> f64 {
        if notes.is_empty() {
            return 0.0;
        }

        self.patterns
            .iter()
            .find_map(|pattern| pattern.find(notes, station, target))
            .unwrap_or(0.0)
    }
}

impl Default for HeightExtractor {
    /// The four field-sheet conventions, tightest first.
    fn default() -> Self {
        let cascade = [
            (
                r"(?i)Ht\.?\s*([A-Za-z0-9]+)\s*=\s*([0-9.,]+)\s*m",
                Acceptance::PointMatches,
            ),
            (r"(?i)Ht\.?\s*=\s*([0-9.,]+)\s*m", Acceptance::Unconditional),
            (r"(?i)Ht\s+([0-9.,]+)\s*m", Acceptance::Unconditional),
            (r"(?i)Ht\s*([0-9.,]+)m", Acceptance::Unconditional),
        ];

        let patterns = cascade
            .iter()
            .map(|&(pattern, acceptance)| {
                HeightPattern::new(pattern, acceptance).expect("built-in height pattern is valid")
            })
            .collect();

        Self::from_patterns(patterns)
    }
}

/// Extract a height with the default cascade.
///
/// # Example
///
/// ```
/// use survey_traverse::processors::height::extract_height;
///
/// assert_eq!(extract_height("Ht. T0 = 6,5m", "T0", "T1"), 6.5);
/// assert_eq!(extract_height("no height here", "T0", "T1"), 0.0);
/// ```
pub fn extract_height(notes: &str, station: &str, target: &str) -> f64 {
    static DEFAULT: OnceLock<HeightExtractor> = OnceLock::new();
    DEFAULT
        .get_or_init(HeightExtractor::default)
        .extract(notes, station, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_point_matching_station() {
        assert_eq!(extract_height("Ht. T0 = 6m", "T0", "T1"), 6.0);
    }

    #[test]
    fn test_explicit_point_matching_target() {
        assert_eq!(extract_height("Ht T1=4.2 m", "T0", "T1"), 4.2);
    }

    #[test]
    fn test_explicit_point_picks_matching_id_among_many() {
        let notes = "Ht. P9 = 9m; Ht. T1 = 3m";
        assert_eq!(extract_height(notes, "T0", "T1"), 3.0);
    }

    #[test]
    fn test_explicit_point_other_id_falls_through() {
        // P9 is neither station nor target and no later pattern matches
        assert_eq!(extract_height("Ht. P9 = 9m", "T0", "T1"), 0.0);
    }

    #[test]
    fn test_point_id_comparison_is_case_sensitive() {
        assert_eq!(extract_height("Ht t0 = 6m", "T0", "T1"), 0.0);
    }

    #[test]
    fn test_marker_without_point() {
        assert_eq!(extract_height("Ht.= 7,25 m", "T0", "T1"), 7.25);
    }

    #[test]
    fn test_marker_with_space_before_value() {
        assert_eq!(extract_height("poste Ht 8 m", "T0", "T1"), 8.0);
    }

    #[test]
    fn test_marker_glued_to_value() {
        assert_eq!(extract_height("HT12m", "T0", "T1"), 12.0);
    }

    #[test]
    fn test_case_insensitive_marker() {
        assert_eq!(extract_height("hT = 2m", "T0", "T1"), 2.0);
    }

    #[test]
    fn test_decimal_comma_equals_decimal_point() {
        assert_eq!(
            extract_height("Ht 6,5m", "A", "B"),
            extract_height("Ht 6.5m", "A", "B")
        );
        assert_eq!(extract_height("Ht 6,5m", "A", "B"), 6.5);
    }

    #[test]
    fn test_no_marker_returns_zero() {
        assert_eq!(extract_height("árvore ao lado do poste", "A", "B"), 0.0);
        assert_eq!(extract_height("", "A", "B"), 0.0);
    }

    #[test]
    fn test_unparsable_value_keeps_scanning() {
        // "1.2.3" fails to parse; the second match is used
        assert_eq!(extract_height("Ht 1.2.3m, Ht 4m", "A", "B"), 4.0);
    }

    #[test]
    fn test_higher_priority_pattern_wins() {
        let notes = "Ht 9m / Ht. B = 5m";
        assert_eq!(extract_height(notes, "A", "B"), 5.0);
    }

    #[test]
    fn test_custom_cascade() {
        let extractor = HeightExtractor::from_patterns(vec![HeightPattern::new(
            r"(?i)altura\s*([0-9.,]+)",
            Acceptance::Unconditional,
        )
        .unwrap()]);

        assert_eq!(extractor.patterns().len(), 1);
        assert_eq!(extractor.extract("altura 3,5", "A", "B"), 3.5);
        assert_eq!(extractor.extract("Ht 3m", "A", "B"), 0.0);
    }
}
