//! Explanation narrative parser
//!
//! The explanation agent emits a loosely structured, markdown-flavoured
//! narrative. This module segments it into sections for display:
//!
//! ```text
//! **Alert Explanation:**
//! Overview paragraph(s)...
//! **Key Observations:**
//! 1. **Title** content...
//! **Conclusion:**
//! Recommendation...
//! ```
//!
//! # Error Handling
//!
//! Parsing never fails. The upstream format is not enforced by any schema, so
//! lines that do not fit the structure are dropped and the result may simply
//! have some sections empty. Callers decide how to render an incomplete
//! result (see [`ParsedExplanation::is_empty`]).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const TITLE_MARKER: &str = "**Alert Explanation:**";
const OBSERVATIONS_MARKER: &str = "**Key Observations:**";
const CONCLUSION_MARKER: &str = "**Conclusion:**";

/// Title assigned when the explanation header marker is present.
pub const EXPLANATION_TITLE: &str = "Alert Explanation";

fn numbered_observation_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+\.\s\*\*").expect("valid observation start regex"))
}

fn numbered_observation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9]+\.\s\*\*(.*?)\*\*(.*)").expect("valid numbered observation regex")
    })
}

/// One titled finding from the "Key Observations" section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub title: String,
    pub content: String,
}

/// Sections extracted from an explanation narrative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedExplanation {
    /// [`EXPLANATION_TITLE`] if the header marker was seen, empty otherwise
    pub title: String,
    /// Overview lines that appear before any section marker
    pub description: String,
    /// Observations in order of appearance
    pub key_observations: Vec<Observation>,
    /// Recommendation text
    pub conclusion: String,
}

impl ParsedExplanation {
    /// True when nothing recognisable was extracted.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.description.is_empty()
            && self.key_observations.is_empty()
            && self.conclusion.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Observations,
    Conclusion,
}

/// Parse an explanation narrative into sections.
///
/// Returns `None` for missing or empty input. Any other input yields a
/// (possibly mostly empty) [`ParsedExplanation`].
pub fn parse(explanation: Option<&str>) -> Option<ParsedExplanation> {
    let text = explanation.filter(|s| !s.is_empty())?;

    let mut parsed = ParsedExplanation::default();
    let mut section = Section::None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with(TITLE_MARKER) {
            parsed.title = EXPLANATION_TITLE.to_string();
            continue;
        }
        if line.starts_with(OBSERVATIONS_MARKER) {
            section = Section::Observations;
            continue;
        }
        if line.starts_with(CONCLUSION_MARKER) {
            section = Section::Conclusion;
            continue;
        }

        match section {
            Section::Observations => parse_observation_line(line, &mut parsed.key_observations),
            Section::Conclusion => append_line(&mut parsed.conclusion, line, '\n'),
            Section::None => {
                // Unrecognised bold headers never leak into the overview.
                if !line.starts_with("**") {
                    append_line(&mut parsed.description, line, '\n');
                }
            }
        }
    }

    Some(parsed)
}

fn parse_observation_line(line: &str, observations: &mut Vec<Observation>) {
    if numbered_observation_start_re().is_match(line) {
        // An unterminated title is dropped rather than treated as content.
        if let Some(caps) = numbered_observation_re().captures(line) {
            observations.push(Observation {
                title: caps[1].trim().to_string(),
                content: caps[2].trim().to_string(),
            });
        }
    } else if line.starts_with("**") && line.ends_with("**") {
        observations.push(Observation {
            title: line.replace("**", ""),
            content: String::new(),
        });
    } else if let Some(last) = observations.last_mut() {
        append_line(&mut last.content, line, ' ');
    }
}

fn append_line(target: &mut String, line: &str, separator: char) {
    if !target.is_empty() {
        target.push(separator);
    }
    target.push_str(line);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
**Alert Explanation:**
This is the overview.
**Key Observations:**
1. **Unusual Amount** The transaction exceeded typical spend by 400%.
2. **New Payee** Funds sent to a payee never used before.
**Conclusion:**
Escalate for manual review.
";

    #[test]
    fn test_parse_none_and_empty() {
        assert_eq!(parse(None), None);
        assert_eq!(parse(Some("")), None);
    }

    #[test]
    fn test_parse_full_sample() {
        let parsed = parse(Some(SAMPLE)).unwrap();

        assert_eq!(parsed.title, "Alert Explanation");
        assert_eq!(parsed.description, "This is the overview.");
        assert_eq!(
            parsed.key_observations,
            vec![
                Observation {
                    title: "Unusual Amount".to_string(),
                    content: "The transaction exceeded typical spend by 400%.".to_string(),
                },
                Observation {
                    title: "New Payee".to_string(),
                    content: "Funds sent to a payee never used before.".to_string(),
                },
            ]
        );
        assert_eq!(parsed.conclusion, "Escalate for manual review.");
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(parse(Some(SAMPLE)), parse(Some(SAMPLE)));
    }

    #[test]
    fn test_no_markers_is_all_description() {
        let input = "first line\n**stray bold**\n  second line  \n\nthird";
        let parsed = parse(Some(input)).unwrap();

        assert!(parsed.key_observations.is_empty());
        assert_eq!(parsed.title, "");
        assert_eq!(parsed.description, "first line\nsecond line\nthird");
        assert_eq!(parsed.conclusion, "");
    }

    #[test]
    fn test_whitespace_only_input_is_empty_result() {
        let parsed = parse(Some("   \n\t\n")).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_blank_lines_do_not_split_observations() {
        let input = "\
**Key Observations:**
1. **Velocity** Five transfers

in ten minutes.

2. **Geo**
Login from a new country.";
        let parsed = parse(Some(input)).unwrap();

        assert_eq!(parsed.key_observations.len(), 2);
        assert_eq!(
            parsed.key_observations[0].content,
            "Five transfers in ten minutes."
        );
        assert_eq!(parsed.key_observations[1].title, "Geo");
        assert_eq!(
            parsed.key_observations[1].content,
            "Login from a new country."
        );
    }

    #[test]
    fn test_bold_line_starts_untitled_observation() {
        let input = "\
**Key Observations:**
**Structuring Pattern**
Several deposits just under the reporting threshold.";
        let parsed = parse(Some(input)).unwrap();

        assert_eq!(
            parsed.key_observations,
            vec![Observation {
                title: "Structuring Pattern".to_string(),
                content: "Several deposits just under the reporting threshold.".to_string(),
            }]
        );
    }

    #[test]
    fn test_content_before_first_observation_is_dropped() {
        let input = "\
**Key Observations:**
orphan line
1. **Amount** High.";
        let parsed = parse(Some(input)).unwrap();

        assert_eq!(parsed.key_observations.len(), 1);
        assert_eq!(parsed.key_observations[0].content, "High.");
    }

    #[test]
    fn test_unterminated_numbered_title_is_dropped() {
        let input = "\
**Key Observations:**
1. **Amount High.
continuation";
        let parsed = parse(Some(input)).unwrap();
        assert!(parsed.key_observations.is_empty());
    }

    #[test]
    fn test_only_ascii_digits_number_an_observation() {
        let input = "\
**Key Observations:**
1. **Amount** High.
\u{0662}. **Payee** New.";
        let parsed = parse(Some(input)).unwrap();

        assert_eq!(parsed.key_observations.len(), 1);
        assert_eq!(
            parsed.key_observations[0].content,
            "High. \u{0662}. **Payee** New."
        );
    }

    #[test]
    fn test_numbered_title_without_trailing_text() {
        let input = "**Key Observations:**\n3. **Dormant Account**";
        let parsed = parse(Some(input)).unwrap();

        assert_eq!(parsed.key_observations[0].title, "Dormant Account");
        assert_eq!(parsed.key_observations[0].content, "");
    }

    #[test]
    fn test_conclusion_keeps_every_line() {
        let input = "**Conclusion:**\nEscalate.\n**Priority: high**\nNotify the team.";
        let parsed = parse(Some(input)).unwrap();
        assert_eq!(parsed.conclusion, "Escalate.\n**Priority: high**\nNotify the team.");
    }

    #[test]
    fn test_marker_with_trailing_text_is_discarded() {
        let input = "**Alert Explanation:** for alert 42\nOverview.";
        let parsed = parse(Some(input)).unwrap();

        assert_eq!(parsed.title, "Alert Explanation");
        assert_eq!(parsed.description, "Overview.");
    }

    #[test]
    fn test_description_stops_after_section_marker() {
        let input = "Intro.\n**Conclusion:**\nDone.\nStill conclusion.";
        let parsed = parse(Some(input)).unwrap();

        assert_eq!(parsed.description, "Intro.");
        assert_eq!(parsed.conclusion, "Done.\nStill conclusion.");
    }

    #[test]
    fn test_crlf_line_endings() {
        let input = "**Alert Explanation:**\r\nOverview.\r\n**Conclusion:**\r\nClose.\r\n";
        let parsed = parse(Some(input)).unwrap();

        assert_eq!(parsed.description, "Overview.");
        assert_eq!(parsed.conclusion, "Close.");
    }
}
