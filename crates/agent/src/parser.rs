//! Decision parser
//!
//! Oracle output is nominally JSON but often arrives wrapped in a code fence,
//! surrounded by prose, or half-broken. [`parse_decision`] always returns a
//! decision: strict schema decoding first, then per-field pattern extraction.
//! The two paths are separate functions so each can be tested on its own.

use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::decision::{ActionKind, Decision};

/// Parse raw oracle text into a decision; never fails
pub fn parse_decision(raw: &str) -> Decision {
    let content = strip_code_fence(raw);

    for candidate in json_candidates(content) {
        match decode_strict(candidate) {
            Ok(decision) => return decision,
            Err(e) => debug!("strict decode rejected candidate: {}", e),
        }
    }

    warn!("oracle output is not valid decision JSON, using field extraction");
    extract_fallback(content)
}

/// Strict schema decode
pub fn decode_strict(json: &str) -> Result<Decision, serde_json::Error> {
    // metadata is normalised to an empty map by the deserializer
    serde_json::from_str(json)
}

/// Permissive per-field extraction
///
/// Every field is searched independently across the whole text; the first
/// match wins. Missing `action` becomes `wait`, missing booleans `false`.
pub fn extract_fallback(content: &str) -> Decision {
    let action = extract_string(content, "action")
        .map(|a| ActionKind::from(a.as_str()))
        .unwrap_or_default();

    Decision {
        action,
        reasoning: extract_string(content, "reasoning").unwrap_or_default(),
        selector: extract_string(content, "selector"),
        text: extract_string(content, "text"),
        value: extract_string(content, "value"),
        url: extract_string(content, "url"),
        wait_for: extract_string(content, "wait_for"),
        key: extract_string(content, "key"),
        tab_index: extract_int(content, "tab_index"),
        needs_input: extract_bool(content, "needs_input").unwrap_or(false),
        input_prompt: extract_string(content, "input_prompt"),
        is_complete: extract_bool(content, "is_complete").unwrap_or(false),
        summary: extract_string(content, "summary"),
        metadata: Default::default(),
    }
}

/// Remove a surrounding ``` fence, with or without a language tag
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // drop the language tag (everything up to the first newline)
    let body = match rest.find('\n') {
        Some(pos) if !rest[..pos].contains('{') => &rest[pos + 1..],
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Candidate JSON snippets, most specific first
///
/// A flat `"action"` object nested inside the first balanced block (for
/// example a `metadata` map with an `action` key) is tried after the block.
fn json_candidates(content: &str) -> Vec<&str> {
    let mut candidates = Vec::with_capacity(3);
    let block = balanced_object_span(content);
    let narrow = narrow_object_pattern().find(content);

    let nested = match (&block, &narrow) {
        (Some(span), Some(m)) => m.start() > span.start && m.end() <= span.end,
        _ => false,
    };

    if let Some(m) = narrow.filter(|_| !nested) {
        candidates.push(m.as_str());
    }
    if let Some(span) = block {
        let block = &content[span];
        if !candidates.contains(&block) {
            candidates.push(block);
        }
    }
    if let Some(m) = narrow.filter(|_| nested) {
        candidates.push(m.as_str());
    }
    if !candidates.contains(&content) {
        candidates.push(content);
    }

    candidates
}

/// A flat object that mentions "action"; nested braces stop the match so
/// surrounding prose is never swallowed
fn narrow_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"\{[^{}]*"action"[^{}]*\}"#).expect("valid regex"))
}

/// First `{...}` block with balanced braces, ignoring braces inside strings
pub fn first_balanced_object(content: &str) -> Option<&str> {
    balanced_object_span(content).map(|span| &content[span])
}

fn balanced_object_span(content: &str) -> Option<Range<usize>> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start..start + offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}

const STRING_FIELDS: &[&str] = &[
    "action",
    "reasoning",
    "selector",
    "text",
    "value",
    "url",
    "wait_for",
    "key",
    "input_prompt",
    "summary",
    "description",
    "confirmation_question",
];
const BOOL_FIELDS: &[&str] = &["needs_input", "is_complete"];
const INT_FIELDS: &[&str] = &["tab_index"];

type PatternTable = HashMap<&'static str, Regex>;

fn build_table(fields: &[&'static str], template: fn(&str) -> String) -> PatternTable {
    fields
        .iter()
        .map(|field| {
            let pattern = template(&regex::escape(field));
            (*field, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
}

fn string_pattern(field: &str) -> String {
    format!(r#""{}"\s*:\s*"([^"]*)""#, field)
}

fn bool_pattern(field: &str) -> String {
    format!(r#""{}"\s*:\s*(true|false)"#, field)
}

fn int_pattern(field: &str) -> String {
    format!(r#""{}"\s*:\s*"?(-?\d+)"#, field)
}

/// Capture group 1 of the cached pattern for `field`
fn capture<'a>(
    table: &'static OnceLock<PatternTable>,
    fields: &[&'static str],
    template: fn(&str) -> String,
    content: &'a str,
    field: &str,
) -> Option<&'a str> {
    let table = table.get_or_init(|| build_table(fields, template));
    let caps = match table.get(field) {
        Some(pattern) => pattern.captures(content),
        None => Regex::new(&template(&regex::escape(field))).ok()?.captures(content),
    };
    caps.and_then(|c| c.get(1)).map(|m| m.as_str())
}

pub(crate) fn extract_string(content: &str, field: &str) -> Option<String> {
    static TABLE: OnceLock<PatternTable> = OnceLock::new();
    capture(&TABLE, STRING_FIELDS, string_pattern, content, field).map(str::to_string)
}

fn extract_bool(content: &str, field: &str) -> Option<bool> {
    static TABLE: OnceLock<PatternTable> = OnceLock::new();
    capture(&TABLE, BOOL_FIELDS, bool_pattern, content, field).map(|v| v == "true")
}

fn extract_int(content: &str, field: &str) -> Option<i64> {
    static TABLE: OnceLock<PatternTable> = OnceLock::new();
    capture(&TABLE, INT_FIELDS, int_pattern, content, field).and_then(|v| v.parse().ok())
}
