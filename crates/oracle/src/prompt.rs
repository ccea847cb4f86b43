//! Prompt text and request encoding.

use rollcall_core::Name;
use rollcall_core::collation;
use serde::Serialize;

pub const ROSTER_EXTRACTION_PROMPT: &str = "\
The attached image is an official roster: a printed or handwritten list of the people \
expected to attend. Transcribe every person's full name exactly as written, in the \
original script. Output one name per line and nothing else. Skip headers, column \
titles, numbers, dates, signatures and any text that is not a person's name. If no \
names are visible, output nothing.";

pub const OBSERVATION_EXTRACTION_PROMPT: &str = "\
The attached image is a screenshot of a live session (a video meeting participant \
panel, gallery view or chat). Transcribe every participant display name that is \
visible, exactly as shown. Output one name per line and nothing else. Skip status \
labels such as \"(Host)\", \"(Me)\", \"Muted\", meeting titles, timestamps and \
buttons. If no names are visible, output nothing.";

pub const MATCHING_SYSTEM_PROMPT: &str = "\
You reconcile attendance. You receive a JSON object with two arrays: \"roster\" (the \
people expected) and \"observed\" (display names seen in the session). Match each \
observed name to at most one roster name and each roster name to at most one observed \
name. Names may be transliterated between scripts (Arabic, Latin, Cyrillic and \
others), abbreviated, reordered, carry titles or status markers, differ in case or \
spacing, or contain OCR errors. Match only when you are confident it is the same \
person.

Reply with a single JSON object and nothing else, exactly of this shape:
{\"present\": [{\"name\": \"<roster name>\", \"originalName\": \"<observed name>\"}], \
\"absent\": [\"<roster name>\"], \"unexpected\": [\"<observed name>\"]}

Rules: copy names verbatim from the input arrays. Every roster name appears exactly \
once, either in \"present\" (as \"name\") or in \"absent\". Every observed name appears \
exactly once, either in \"present\" (as \"originalName\") or in \"unexpected\".";

#[derive(Serialize)]
struct MatchingPayload<'a> {
    roster: Vec<&'a str>,
    observed: Vec<&'a str>,
}

/// Render the matching request body.
///
/// Both lists are put in collation order first, so the same two sets always
/// produce the same bytes no matter how they were collected.
pub fn matching_payload(roster: &[Name], observed: &[Name]) -> String {
    let mut roster: Vec<&str> = roster.iter().map(Name::as_str).collect();
    let mut observed: Vec<&str> = observed.iter().map(Name::as_str).collect();
    collation::sort_by_name(&mut roster, |n| n);
    collation::sort_by_name(&mut observed, |n| n);
    roster.dedup();
    observed.dedup();

    let payload = MatchingPayload { roster, observed };
    serde_json::to_string_pretty(&payload).unwrap_or_default()
}
