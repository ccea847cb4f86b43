//! Oracle response parsing.
//!
//! Extraction replies are free text, cleaned line by line. Matching replies
//! must be one JSON object with exactly the three bucket arrays; anything
//! else is rejected whole.

use rollcall_core::error::OracleError;
use rollcall_core::{Attendee, Classification, Name};
use serde::Deserialize;
use serde_json::Value;

const TOP_LEVEL_FIELDS: [&str; 3] = ["present", "absent", "unexpected"];
const PAIR_FIELDS: [&str; 2] = ["name", "originalName"];

/// Split an extraction reply into names.
///
/// Each line is trimmed, stripped of a list marker (`-`, `*`, `•`, `1.`,
/// `2)`), whitespace-normalized, and kept only if strictly longer than
/// `min_chars` characters. Order is preserved; duplicates are left for the
/// caller.
pub fn parse_name_lines(text: &str, min_chars: usize) -> Vec<Name> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("```"))
        .map(strip_list_marker)
        .map(Name::new)
        .filter(|name| name.char_len() > min_chars)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    for marker in ['-', '*', '•', '·'] {
        if let Some(rest) = line.strip_prefix(marker) {
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }

    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(after) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if after.starts_with(char::is_whitespace) {
                return after.trim_start();
            }
        }
    }

    line
}

#[derive(Debug, Deserialize)]
struct RawMatching {
    present: Vec<RawPair>,
    absent: Vec<String>,
    unexpected: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPair {
    name: String,
    #[serde(rename = "originalName")]
    original_name: String,
}

/// Parse and validate a matching reply into a raw classification.
///
/// Accepts the object bare or wrapped in a markdown code fence and prose:
/// the outermost `{ ... }` span is what gets parsed. Missing arrays, wrong
/// element types, empty names and non-JSON are all
/// [`OracleError::MalformedResponse`]. With `strict`, fields beyond the
/// documented ones are rejected as well.
///
/// The result is in reply order and is not de-duplicated; the engine does
/// that on ingest.
pub fn parse_matching_response(text: &str, strict: bool) -> Result<Classification, OracleError> {
    let body = outermost_object(text)
        .ok_or_else(|| OracleError::MalformedResponse("no JSON object in response".into()))?;

    let value: Value = serde_json::from_str(body)
        .map_err(|e| OracleError::MalformedResponse(format!("invalid JSON: {e}")))?;

    if strict {
        check_fields(&value)?;
    }

    let raw: RawMatching = serde_json::from_value(value)
        .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

    let present = raw
        .present
        .into_iter()
        .map(|pair| {
            Ok(Attendee::present(
                non_empty(pair.name, "present[].name")?,
                non_empty(pair.original_name, "present[].originalName")?,
            ))
        })
        .collect::<Result<Vec<_>, OracleError>>()?;

    let absent = raw
        .absent
        .into_iter()
        .map(|n| non_empty(n, "absent[]").map(Attendee::absent))
        .collect::<Result<Vec<_>, _>>()?;

    let unexpected = raw
        .unexpected
        .into_iter()
        .map(|n| non_empty(n, "unexpected[]").map(Attendee::unexpected))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Classification {
        present,
        absent,
        unexpected,
    })
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn non_empty(raw: String, field: &str) -> Result<Name, OracleError> {
    let name = Name::new(raw);
    if name.is_empty() {
        return Err(OracleError::MalformedResponse(format!(
            "empty name in {field}"
        )));
    }
    Ok(name)
}

fn check_fields(value: &Value) -> Result<(), OracleError> {
    let obj = value
        .as_object()
        .ok_or_else(|| OracleError::MalformedResponse("response is not an object".into()))?;

    if let Some(extra) = obj.keys().find(|k| !TOP_LEVEL_FIELDS.contains(&k.as_str())) {
        return Err(OracleError::MalformedResponse(format!(
            "unknown field '{extra}'"
        )));
    }

    if let Some(Value::Array(pairs)) = obj.get("present") {
        for pair in pairs.iter().filter_map(Value::as_object) {
            if let Some(extra) = pair.keys().find(|k| !PAIR_FIELDS.contains(&k.as_str())) {
                return Err(OracleError::MalformedResponse(format!(
                    "unknown field '{extra}' in present[]"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::Status;

    fn names(list: &[Name]) -> Vec<&str> {
        list.iter().map(Name::as_str).collect()
    }

    #[test]
    fn lines_are_trimmed_and_filtered() {
        let text = "  Ali Hassan \n\nMo\n   \nمنى زكي\nAb\n";
        assert_eq!(names(&parse_name_lines(text, 2)), vec!["Ali Hassan", "منى زكي"]);
    }

    #[test]
    fn list_markers_are_stripped() {
        let text = "- Ali Hassan\n* Mona Zaki\n• Omar Khan\n1. Sara Adel\n12) Yusuf Ali\n-Dash-name";
        assert_eq!(
            names(&parse_name_lines(text, 2)),
            vec![
                "Ali Hassan",
                "Mona Zaki",
                "Omar Khan",
                "Sara Adel",
                "Yusuf Ali",
                "-Dash-name"
            ]
        );
    }

    #[test]
    fn marker_alone_is_dropped() {
        assert!(parse_name_lines("1. \n- \n", 2).is_empty());
    }

    #[test]
    fn code_fences_are_ignored_in_lines() {
        let text = "```\nAli Hassan\n```";
        assert_eq!(names(&parse_name_lines(text, 2)), vec!["Ali Hassan"]);
    }

    #[test]
    fn empty_reply_is_no_names() {
        assert!(parse_name_lines("", 2).is_empty());
    }

    #[test]
    fn parses_well_formed_response() {
        let text = r#"{
            "present": [{"name": "Ali Hassan", "originalName": "علي حسن"}],
            "absent": ["Mona Zaki"],
            "unexpected": ["Guest 42"]
        }"#;
        let c = parse_matching_response(text, true).unwrap();
        assert_eq!(c.present.len(), 1);
        assert_eq!(c.present[0].status, Status::Present);
        assert_eq!(c.present[0].original_name, Some(Name::from("علي حسن")));
        assert_eq!(c.absent[0], Attendee::absent("Mona Zaki"));
        assert_eq!(c.unexpected[0], Attendee::unexpected("Guest 42"));
    }

    #[test]
    fn accepts_fenced_response_with_prose() {
        let text = "Here is the result:\n```json\n{\"present\": [], \"absent\": [\"Mona Zaki\"], \"unexpected\": []}\n```";
        let c = parse_matching_response(text, true).unwrap();
        assert_eq!(c.absent.len(), 1);
    }

    #[test]
    fn missing_array_is_malformed() {
        let text = r#"{"present": [], "absent": []}"#;
        let err = parse_matching_response(text, true).unwrap_err();
        assert!(matches!(err, OracleError::MalformedResponse(_)));
        assert!(err.to_string().contains("unexpected"));
    }

    #[test]
    fn wrong_types_are_malformed() {
        assert!(parse_matching_response(r#"{"present": {}, "absent": [], "unexpected": []}"#, true).is_err());
        assert!(parse_matching_response(r#"{"present": [], "absent": [1], "unexpected": []}"#, true).is_err());
        assert!(
            parse_matching_response(
                r#"{"present": [{"name": "Ali Hassan"}], "absent": [], "unexpected": []}"#,
                true
            )
            .is_err()
        );
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(parse_matching_response("I could not read the lists.", true).is_err());
        assert!(parse_matching_response("{not json}", true).is_err());
    }

    #[test]
    fn empty_name_is_malformed() {
        let text = r#"{"present": [], "absent": ["  "], "unexpected": []}"#;
        assert!(parse_matching_response(text, true).is_err());
    }

    #[test]
    fn unknown_fields_depend_on_strictness() {
        let text = r#"{"present": [], "absent": [], "unexpected": [], "confidence": 0.9}"#;
        assert!(parse_matching_response(text, true).is_err());
        assert!(parse_matching_response(text, false).is_ok());

        let nested = r#"{"present": [{"name": "Ali Hassan", "originalName": "Ali", "score": 1}], "absent": [], "unexpected": []}"#;
        assert!(parse_matching_response(nested, true).is_err());
        assert!(parse_matching_response(nested, false).is_ok());
    }
}
