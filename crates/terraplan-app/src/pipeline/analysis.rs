//! Deterministic parsing of the structured summary completion into the
//! fixed-size analysis result.

use serde::{Deserialize, Serialize};

/// Number of problem and trend slots in the warehouse schema.
pub const ANALYSIS_SLOTS: usize = 5;

const PROBLEMS_MARKER: &str = "problémy";
const TRENDS_MARKER: &str = "trendy";

/// Exactly five problems and five trends, padded with empty strings when the
/// model produced fewer and truncated when it produced more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    problems: [String; ANALYSIS_SLOTS],
    trends: [String; ANALYSIS_SLOTS],
}

impl AnalysisResult {
    /// Shape arbitrary parser output into the fixed 5+5 result.
    pub fn from_lists(problems: Vec<String>, trends: Vec<String>) -> Self {
        Self {
            problems: into_slots(problems),
            trends: into_slots(trends),
        }
    }

    pub fn problems(&self) -> &[String; ANALYSIS_SLOTS] {
        &self.problems
    }

    pub fn trends(&self) -> &[String; ANALYSIS_SLOTS] {
        &self.trends
    }
}

fn into_slots(mut items: Vec<String>) -> [String; ANALYSIS_SLOTS] {
    items.truncate(ANALYSIS_SLOTS);
    items.resize(ANALYSIS_SLOTS, String::new());
    items.try_into().expect("resized to slot count")
}

/// Scan the summary completion line by line. A line containing the problems
/// heading switches the active bucket to problems, one containing the trends
/// heading switches to trends (last heading wins when they repeat), and any
/// bulleted line is stripped of its bullet prefix and appended to the active
/// bucket. Everything else is ignored.
pub fn parse_structured_summary(summary: &str) -> (Vec<String>, Vec<String>) {
    let mut problems = Vec::new();
    let mut trends = Vec::new();
    let mut active: Option<Bucket> = None;

    for raw in summary.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let lowered = line.to_lowercase();
        if lowered.contains(PROBLEMS_MARKER) {
            active = Some(Bucket::Problems);
        } else if lowered.contains(TRENDS_MARKER) {
            active = Some(Bucket::Trends);
        } else if line.starts_with('-') {
            let item = line.trim_start_matches(['-', ' ']).trim();
            if item.is_empty() {
                continue;
            }
            match active {
                Some(Bucket::Problems) => problems.push(item.to_owned()),
                Some(Bucket::Trends) => trends.push(item.to_owned()),
                None => {}
            }
        }
    }

    (problems, trends)
}

#[derive(Debug, Clone, Copy)]
enum Bucket {
    Problems,
    Trends,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_buckets() {
        let summary = "\
Hlavní problémy:
- chybějící kanalizace
- zastaralá dopravní síť

Hlavní trendy:
- rozvoj bydlení
- posílení zeleně";

        let (problems, trends) = parse_structured_summary(summary);
        assert_eq!(problems, vec!["chybějící kanalizace", "zastaralá dopravní síť"]);
        assert_eq!(trends, vec!["rozvoj bydlení", "posílení zeleně"]);
    }

    #[test]
    fn result_always_has_five_slots() {
        let result = AnalysisResult::from_lists(
            vec!["jeden".into(), "dva".into()],
            (1..=8).map(|i| format!("trend {i}")).collect(),
        );

        assert_eq!(result.problems().len(), ANALYSIS_SLOTS);
        assert_eq!(result.trends().len(), ANALYSIS_SLOTS);
        assert_eq!(result.problems()[0], "jeden");
        assert_eq!(result.problems()[2], "");
        assert_eq!(result.problems()[4], "");
        assert_eq!(result.trends()[4], "trend 5");
    }

    #[test]
    fn empty_input_gives_all_blank_slots() {
        let (problems, trends) = parse_structured_summary("");
        let result = AnalysisResult::from_lists(problems, trends);
        assert!(result.problems().iter().all(String::is_empty));
        assert!(result.trends().iter().all(String::is_empty));
    }

    #[test]
    fn bullets_before_any_heading_are_ignored() {
        let (problems, trends) = parse_structured_summary("- osiřelá odrážka\nHlavní trendy:\n- suburbanizace");
        assert!(problems.is_empty());
        assert_eq!(trends, vec!["suburbanizace"]);
    }

    #[test]
    fn repeated_heading_wins_last() {
        let summary = "\
Trendy:
- první trend
Problémy:
- potíž
Trendy:
- druhý trend";
        let (problems, trends) = parse_structured_summary(summary);
        assert_eq!(problems, vec!["potíž"]);
        assert_eq!(trends, vec!["první trend", "druhý trend"]);
    }

    #[test]
    fn heading_match_is_case_insensitive_substring() {
        let summary = "SEZNAM HLAVNÍCH PROBLÉMŮ NENÍ TOHLE\nhlavní PROBLÉMY obce\n- eroze půdy";
        let (problems, _) = parse_structured_summary(summary);
        assert_eq!(problems, vec!["eroze půdy"]);
    }

    #[test]
    fn unrecognised_lines_are_ignored() {
        let summary = "Komentář bez odrážky\nHlavní problémy:\npoznámka\n- skutečný problém";
        let (problems, trends) = parse_structured_summary(summary);
        assert_eq!(problems, vec!["skutečný problém"]);
        assert!(trends.is_empty());
    }
}
