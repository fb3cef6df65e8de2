//! Category-tailored strategies
//!
//! A strategy may extend the system prompt, reject decisions before they reach
//! the executor, and demand confirmation. Parsing, the safety gate and retry
//! accounting are shared by all strategies.

use crate::classifier::TaskCategory;
use crate::decision::{ActionKind, Decision};
use crate::{AgentError, Result};

pub trait TaskStrategy: Send + Sync {
    fn category(&self) -> TaskCategory;

    /// System prompt for this category, built on the shared one
    fn system_prompt(&self, base: &str) -> String {
        base.to_string()
    }

    /// Reject a decision before execution
    fn validate(&self, _decision: &Decision) -> Result<()> {
        Ok(())
    }

    /// Ask the human regardless of the oracle's assessment
    fn requires_confirmation(&self, _decision: &Decision) -> bool {
        false
    }
}

/// Strategy object for a category
pub fn dispatch(category: TaskCategory) -> Box<dyn TaskStrategy> {
    match category {
        TaskCategory::Generic => Box::new(GenericStrategy),
        TaskCategory::Email => Box::new(EmailStrategy),
        TaskCategory::Shopping => Box::new(ShoppingStrategy),
        TaskCategory::JobSearch => Box::new(JobSearchStrategy),
    }
}

fn with_guidance(base: &str, title: &str, guidance: &str) -> String {
    format!("{}\n\n## {}\n{}", base, title, guidance)
}

pub struct GenericStrategy;

impl TaskStrategy for GenericStrategy {
    fn category(&self) -> TaskCategory {
        TaskCategory::Generic
    }
}

pub struct EmailStrategy;

impl TaskStrategy for EmailStrategy {
    fn category(&self) -> TaskCategory {
        TaskCategory::Email
    }

    fn system_prompt(&self, base: &str) -> String {
        with_guidance(
            base,
            "Email tasks",
            "- Open the mailbox by its direct URL if no link is visible.\n\
             - Read message subjects and senders from the page before acting on them.\n\
             - Deleting or moving messages needs the user's confirmation; never send mail unless the task says so.",
        )
    }

    fn validate(&self, decision: &Decision) -> Result<()> {
        let url_missing = decision.url.as_deref().map_or(true, |u| u.trim().is_empty());
        if decision.action == ActionKind::Navigate && url_missing {
            return Err(AgentError::InvalidField {
                field: "url",
                reason: "mailbox navigation needs an explicit address".to_string(),
            });
        }
        Ok(())
    }
}

pub struct ShoppingStrategy;

impl ShoppingStrategy {
    const CHECKOUT_WORDS: &'static [&'static str] =
        &["checkout", "place order", "оформить", "заказать"];
}

impl TaskStrategy for ShoppingStrategy {
    fn category(&self) -> TaskCategory {
        TaskCategory::Shopping
    }

    fn system_prompt(&self, base: &str) -> String {
        with_guidance(
            base,
            "Shopping tasks",
            "- Collect the items into the cart first and verify quantities and prices.\n\
             - Stop before payment: placing the order always needs the user's confirmation.\n\
             - Ask for input when a delivery address or payment detail is missing.",
        )
    }

    fn requires_confirmation(&self, decision: &Decision) -> bool {
        let text = decision.text.as_deref().unwrap_or("").to_lowercase();
        decision.action == ActionKind::Click
            && Self::CHECKOUT_WORDS.iter().any(|w| text.contains(w))
    }
}

pub struct JobSearchStrategy;

impl TaskStrategy for JobSearchStrategy {
    fn category(&self) -> TaskCategory {
        TaskCategory::JobSearch
    }

    fn system_prompt(&self, base: &str) -> String {
        with_guidance(
            base,
            "Job search tasks",
            "- Use the site's search and filters instead of scrolling through listings.\n\
             - Open each promising vacancy and compare it with the request before choosing.\n\
             - Summarise the chosen vacancies with title, company and link when done.",
        )
    }
}
