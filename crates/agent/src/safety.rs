//! Safety gate for potentially irreversible actions
//!
//! A cheap keyword screen decides whether to consult the oracle at all; the
//! oracle's assessment then decides whether a human must confirm. Any failure
//! along the way resolves to asking the human.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::decision::Decision;
use crate::oracle::DecisionOracle;
use crate::parser::{extract_string, first_balanced_object, strip_code_fence};

const DEFAULT_DESCRIPTION: &str = "Action may cause irreversible changes";

const DESTRUCTIVE_KEYWORDS: &[&str] = &[
    "удалить",
    "delete",
    "remove",
    "удаление",
    "оплатить",
    "pay",
    "payment",
    "купить",
    "buy",
    "purchase",
    "подтвердить",
    "confirm",
    "submit",
    "отправить",
    "отменить",
    "cancel",
    "отмена",
    "изменить",
    "change",
    "modify",
    "редактировать",
    "edit",
    "сохранить",
    "save",
    "сохранение",
];

const CART_WORDS: &[&str] = &["cart", "корзин"];
const CHECKOUT_WORDS: &[&str] = &["checkout", "place order", "оформить", "заказать"];

/// Oracle's view of an action
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Assessment {
    #[serde(default)]
    pub is_destructive: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub confirmation_question: String,
}

impl Assessment {
    /// Used when the oracle cannot be consulted
    pub fn fail_safe() -> Self {
        Self {
            is_destructive: true,
            description: DEFAULT_DESCRIPTION.to_string(),
            confirmation_question: String::new(),
        }
    }
}

/// Parse the oracle's assessment text; never fails
pub fn parse_assessment(raw: &str) -> Assessment {
    let content = strip_code_fence(raw);
    let block = first_balanced_object(content).unwrap_or(content);

    if let Ok(mut assessment) = serde_json::from_str::<Assessment>(block) {
        if assessment.description.trim().is_empty() {
            assessment.description = DEFAULT_DESCRIPTION.to_string();
        }
        return assessment;
    }

    debug!("assessment is not valid JSON, using keyword detection");
    let compact: String = content
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let is_destructive =
        compact.contains("\"is_destructive\":true") || compact.contains("is_destructive:true");

    Assessment {
        is_destructive,
        description: extract_string(content, "description")
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        confirmation_question: extract_string(content, "confirmation_question").unwrap_or_default(),
    }
}

/// What the human is asked to approve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub action: String,
    pub element: Option<String>,
    pub description: String,
    pub question: String,
}

/// Source of human confirmations
///
/// `None` means no answer could be read and is treated as a refusal.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> Option<String>;
}

/// Affirmative answers: yes, y, да, д
pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "yes" | "y" | "да" | "д"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Proceed,
    Canceled,
}

/// Keyword screen plus oracle-assisted confirmation
#[derive(Debug, Clone, Default)]
pub struct SafetyGate;

impl SafetyGate {
    pub fn new() -> Self {
        Self
    }

    /// Case-insensitive keyword match over action, text and reasoning
    pub fn is_potentially_destructive(&self, decision: &Decision) -> bool {
        let action = decision.action.as_str().to_lowercase();
        let text = decision.text.as_deref().unwrap_or("").to_lowercase();
        let reasoning = decision.reasoning.to_lowercase();

        let keyword_hit = DESTRUCTIVE_KEYWORDS.iter().any(|keyword| {
            action.contains(keyword) || text.contains(keyword) || reasoning.contains(keyword)
        });

        keyword_hit || Self::is_checkout(&text)
    }

    fn is_checkout(text: &str) -> bool {
        CART_WORDS.iter().any(|w| text.contains(w))
            && CHECKOUT_WORDS.iter().any(|w| text.contains(w))
    }

    /// Consult the oracle and, if needed, the human
    ///
    /// `force` asks the human even when the oracle calls the action harmless.
    pub async fn review<O>(
        &self,
        oracle: &O,
        confirmer: &dyn Confirmer,
        decision: &Decision,
        context_summary: &str,
        force: bool,
    ) -> GateVerdict
    where
        O: DecisionOracle + ?Sized,
    {
        let action = decision.action.as_str();
        let assessment = match oracle.assess_destructiveness(action, context_summary).await {
            Ok(raw) => parse_assessment(&raw),
            Err(e) => {
                warn!("◆ Assessment failed, asking for confirmation: {}", e);
                Assessment::fail_safe()
            }
        };

        if !assessment.is_destructive && !force {
            debug!("Oracle considers '{}' harmless", action);
            return GateVerdict::Proceed;
        }

        let question = if assessment.confirmation_question.trim().is_empty() {
            format!("Confirm action '{}'?", action)
        } else {
            assessment.confirmation_question
        };
        let request = ConfirmationRequest {
            action: action.to_string(),
            element: decision.text.clone().filter(|t| !t.trim().is_empty()),
            description: assessment.description,
            question,
        };

        match confirmer.confirm(&request).await {
            Some(answer) if is_affirmative(&answer) => {
                info!("◆ Destructive action '{}' confirmed", action);
                GateVerdict::Proceed
            }
            Some(_) => GateVerdict::Canceled,
            None => {
                warn!("No confirmation could be read, treating as refusal");
                GateVerdict::Canceled
            }
        }
    }
}
