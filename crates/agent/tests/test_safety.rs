//! Tests for the safety gate review flow

mod common;

use common::{MockOracle, ScriptedConfirmer};
use webpilot_agent::{ActionKind, AgentError, Decision, GateVerdict, SafetyGate};

const DESTRUCTIVE: &str = r#"{"is_destructive": true, "description": "The account will be deleted", "confirmation_question": "Delete the account?"}"#;
const HARMLESS: &str = r#"{"is_destructive": false, "description": "Opens a menu", "confirmation_question": ""}"#;

fn delete_account() -> Decision {
    let mut decision = Decision::new(ActionKind::Click).with_reasoning("remove the profile");
    decision.text = Some("удалить аккаунт".to_string());
    decision
}

fn oracle_assessing(reply: &'static str) -> MockOracle {
    let mut oracle = MockOracle::new();
    oracle
        .expect_assess_destructiveness()
        .times(1)
        .returning(move |_, _| Ok(reply.to_string()));
    oracle
}

#[tokio::test]
async fn test_destructive_action_asks_and_refusal_cancels() {
    let gate = SafetyGate::new();
    let oracle = oracle_assessing(DESTRUCTIVE);
    let confirmer = ScriptedConfirmer::answering("no");

    let decision = delete_account();
    assert!(gate.is_potentially_destructive(&decision));

    let verdict = gate
        .review(&oracle, confirmer.as_ref(), &decision, "URL: x, Title: y", false)
        .await;
    assert_eq!(verdict, GateVerdict::Canceled);

    let requests = confirmer.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].description, "The account will be deleted");
    assert_eq!(requests[0].question, "Delete the account?");
    assert_eq!(requests[0].element.as_deref(), Some("удалить аккаунт"));
}

#[tokio::test]
async fn test_localized_yes_proceeds() {
    let gate = SafetyGate::new();
    let oracle = oracle_assessing(DESTRUCTIVE);
    let confirmer = ScriptedConfirmer::answering("да");

    let verdict = gate
        .review(&oracle, confirmer.as_ref(), &delete_account(), "", false)
        .await;
    assert_eq!(verdict, GateVerdict::Proceed);
}

#[tokio::test]
async fn test_harmless_assessment_skips_prompt() {
    let gate = SafetyGate::new();
    let oracle = oracle_assessing(HARMLESS);
    let confirmer = ScriptedConfirmer::answering("no");

    let verdict = gate
        .review(&oracle, confirmer.as_ref(), &delete_account(), "", false)
        .await;
    assert_eq!(verdict, GateVerdict::Proceed);
    assert_eq!(confirmer.asked(), 0);
}

#[tokio::test]
async fn test_forced_confirmation_ignores_harmless_assessment() {
    let gate = SafetyGate::new();
    let oracle = oracle_assessing(HARMLESS);
    let confirmer = ScriptedConfirmer::answering("n");

    let verdict = gate
        .review(&oracle, confirmer.as_ref(), &delete_account(), "", true)
        .await;
    assert_eq!(verdict, GateVerdict::Canceled);
    assert_eq!(confirmer.asked(), 1);
}

#[tokio::test]
async fn test_assessment_failure_requires_confirmation() {
    let gate = SafetyGate::new();
    let mut oracle = MockOracle::new();
    oracle
        .expect_assess_destructiveness()
        .returning(|_, _| Err(AgentError::Oracle("RATE LIMITED".to_string())));
    let confirmer = ScriptedConfirmer::answering("yes");

    let verdict = gate
        .review(&oracle, confirmer.as_ref(), &delete_account(), "", false)
        .await;
    assert_eq!(verdict, GateVerdict::Proceed);

    let requests = confirmer.requests.lock().unwrap();
    assert_eq!(requests[0].description, "Action may cause irreversible changes");
    assert_eq!(requests[0].question, "Confirm action 'click'?");
}

#[tokio::test]
async fn test_unreadable_answer_is_refusal() {
    let gate = SafetyGate::new();
    let oracle = oracle_assessing(DESTRUCTIVE);
    let confirmer = ScriptedConfirmer::silent();

    let verdict = gate
        .review(&oracle, confirmer.as_ref(), &delete_account(), "", false)
        .await;
    assert_eq!(verdict, GateVerdict::Canceled);
}

#[test]
fn test_harmless_decisions_pass_screen() {
    let gate = SafetyGate::new();
    let mut decision = Decision::new(ActionKind::Navigate).with_reasoning("open the news site");
    decision.url = Some("https://news.example".to_string());
    assert!(!gate.is_potentially_destructive(&decision));
}
