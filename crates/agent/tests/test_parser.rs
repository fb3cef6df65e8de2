//! Tests for decision parsing: strict decoding and field extraction

use std::collections::HashMap;
use webpilot_agent::parser::{decode_strict, extract_fallback};
use webpilot_agent::{parse_decision, ActionKind, Decision};

#[test]
fn test_fenced_json_click() {
    let raw = "```json\n{\"action\":\"click\",\"text\":\"Submit\"}\n```";
    let decision = parse_decision(raw);
    assert_eq!(decision.action, ActionKind::Click);
    assert_eq!(decision.text.as_deref(), Some("Submit"));
}

#[test]
fn test_prose_around_json() {
    let raw = r#"Sure, here is my decision:
{"action": "navigate", "reasoning": "open the site", "url": "https://example.com"}
Let me know if you need anything else."#;
    let decision = parse_decision(raw);
    assert_eq!(decision.action, ActionKind::Navigate);
    assert_eq!(decision.url.as_deref(), Some("https://example.com"));
    assert_eq!(decision.reasoning, "open the site");
}

#[test]
fn test_nested_metadata_uses_balanced_block() {
    let raw = r#"{"action": "extract", "reasoning": "read prices", "metadata": {"source": "table"}}"#;
    let decision = parse_decision(raw);
    assert_eq!(decision.action, ActionKind::Extract);
    assert_eq!(decision.metadata.get("source").map(String::as_str), Some("table"));
}

#[test]
fn test_round_trip() {
    let mut metadata = HashMap::new();
    metadata.insert("step".to_string(), "login".to_string());

    let original = Decision {
        action: ActionKind::Fill,
        reasoning: "enter the query".to_string(),
        selector: Some("input[name=q]".to_string()),
        text: Some("Search".to_string()),
        value: Some("rust \"async\" book".to_string()),
        tab_index: Some(2),
        needs_input: true,
        input_prompt: Some("Which edition?".to_string()),
        summary: Some("searching".to_string()),
        metadata,
        ..Default::default()
    };

    let json = serde_json::to_string(&original).unwrap();
    assert_eq!(parse_decision(&json), original);
}

#[test]
fn test_round_trip_metadata_with_action_key() {
    let mut metadata = HashMap::new();
    metadata.insert("action".to_string(), "checkout".to_string());

    let original = Decision {
        action: ActionKind::Click,
        reasoning: "buy".to_string(),
        text: Some("Pay".to_string()),
        metadata,
        ..Default::default()
    };

    let json = serde_json::to_string(&original).unwrap();
    assert_eq!(parse_decision(&json), original);

    let fenced = format!("```json\n{}\n```", json);
    assert_eq!(parse_decision(&fenced), original);
}

#[test]
fn test_round_trip_null_metadata() {
    let raw = r#"{"action":"wait","reasoning":"","metadata":null}"#;
    let decision = parse_decision(raw);
    assert_eq!(decision, Decision::new(ActionKind::Wait));
}

#[test]
fn test_fallback_finds_action_in_prose() {
    let raw = r#"I would say "action": "click" and then "text": "Log in", because {broken"#;
    let decision = parse_decision(raw);
    assert_eq!(decision.action, ActionKind::Click);
    assert_eq!(decision.text.as_deref(), Some("Log in"));
    assert!(decision.metadata.is_empty());
}

#[test]
fn test_fallback_defaults_to_wait() {
    for raw in ["", "no json here", "{", "}}}{{{", "\"action\": 42", "```"] {
        let decision = parse_decision(raw);
        assert_eq!(decision.action, ActionKind::Wait, "input: {:?}", raw);
        assert!(!decision.is_complete);
        assert!(!decision.needs_input);
    }
}

#[test]
fn test_fallback_reads_booleans() {
    let raw = r#"{"action": "complete", "is_complete": true, "summary": "done", trailing garbage"#;
    let decision = parse_decision(raw);
    assert_eq!(decision.action, ActionKind::Complete);
    assert!(decision.is_complete);
    assert_eq!(decision.summary.as_deref(), Some("done"));
}

#[test]
fn test_fallback_first_match_wins() {
    let raw = r#""action": "navigate", "url": "https://a.example" ... "url": "https://b.example""#;
    let decision = extract_fallback(raw);
    assert_eq!(decision.action, ActionKind::Navigate);
    assert_eq!(decision.url.as_deref(), Some("https://a.example"));
}

#[test]
fn test_strict_rejects_what_fallback_accepts() {
    let raw = r#"{"action": "click", "text": "OK",}"#;
    assert!(decode_strict(raw).is_err());

    let decision = extract_fallback(raw);
    assert_eq!(decision.action, ActionKind::Click);
    assert_eq!(decision.text.as_deref(), Some("OK"));
}

#[test]
fn test_unknown_action_is_kept() {
    let decision = parse_decision(r#"{"action": "scroll", "reasoning": "see more"}"#);
    assert_eq!(decision.action, ActionKind::Unknown("scroll".to_string()));
}

#[test]
fn test_arbitrary_text_never_panics() {
    let samples = [
        "\u{0}\u{1}",
        "{\"action\":\"\\",
        "{\"action\":\"click\",\"tab_index\":99999999999999999999}",
        "```json\n```",
        "привет {\"action\": \"fill\", \"value\": \"да\"}",
    ];
    for raw in samples {
        let _ = parse_decision(raw);
    }
}
