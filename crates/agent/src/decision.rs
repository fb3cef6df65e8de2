//! Decision model exchanged between the parser, the safety gate and the executor

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::{AgentError, Result};

/// Kind of step the oracle proposes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Navigate,
    Click,
    Fill,
    #[default]
    Wait,
    Extract,
    PressKey,
    SwitchTab,
    CloseTab,
    Complete,
    /// Anything the oracle invented; rejected by the executor
    Unknown(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Click => "click",
            ActionKind::Fill => "fill",
            ActionKind::Wait => "wait",
            ActionKind::Extract => "extract",
            ActionKind::PressKey => "press_key",
            ActionKind::SwitchTab => "switch_tab",
            ActionKind::CloseTab => "close_tab",
            ActionKind::Complete => "complete",
            ActionKind::Unknown(name) => name,
        }
    }
}

impl From<&str> for ActionKind {
    fn from(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "navigate" => ActionKind::Navigate,
            "click" => ActionKind::Click,
            "fill" => ActionKind::Fill,
            "wait" => ActionKind::Wait,
            "extract" => ActionKind::Extract,
            "press_key" => ActionKind::PressKey,
            "switch_tab" => ActionKind::SwitchTab,
            "close_tab" => ActionKind::CloseTab,
            "complete" => ActionKind::Complete,
            _ => ActionKind::Unknown(raw.to_string()),
        }
    }
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        ActionKind::from(raw.as_str())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The oracle's proposed next step, as it appears on the wire
///
/// `action` has no serde default: a JSON object without it is not a
/// decision, and the parser falls back to field extraction instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Decision {
    pub action: ActionKind,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_index: Option<i64>,
    #[serde(default)]
    pub needs_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_prompt: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub metadata: HashMap<String, String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Element addressed by visible text or by CSS selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Text(String),
    Selector(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Text(text) => write!(f, "text '{}'", text),
            Target::Selector(selector) => write!(f, "selector '{}'", selector),
        }
    }
}

/// A decision whose payload has been validated for its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Navigate { url: String },
    Click(Target),
    Fill { target: Target, value: String },
    Wait { selector: Option<String> },
    Extract,
    PressKey { key: String },
    SwitchTab { index: usize },
    CloseTab { index: usize },
    Complete,
}

impl Decision {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            ..Default::default()
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// History line for a successfully executed step
    pub fn summary_line(&self) -> String {
        format!("{}: {}", self.action, self.reasoning)
    }

    /// Validate the payload fields required by `action`
    ///
    /// Blank strings count as missing.
    pub fn to_action(&self) -> Result<Action> {
        let action = match &self.action {
            ActionKind::Navigate => Action::Navigate {
                url: required(&self.url, "navigate", "url")?,
            },
            ActionKind::Click => Action::Click(
                target(&self.text, &self.selector).ok_or(AgentError::MissingField {
                    action: "click",
                    field: "text or selector",
                })?,
            ),
            ActionKind::Fill => {
                let value = required(&self.value, "fill", "value")?;
                // a selector is more precise than a placeholder match, prefer it here
                let target =
                    target_prefer_selector(&self.text, &self.selector).ok_or(
                        AgentError::MissingField {
                            action: "fill",
                            field: "text or selector",
                        },
                    )?;
                Action::Fill { target, value }
            }
            ActionKind::Wait => Action::Wait {
                selector: present(&self.wait_for),
            },
            ActionKind::Extract => Action::Extract,
            ActionKind::PressKey => Action::PressKey {
                key: required(&self.key, "press_key", "key")?,
            },
            ActionKind::SwitchTab => Action::SwitchTab {
                index: tab_index(self.tab_index, "switch_tab")?,
            },
            ActionKind::CloseTab => Action::CloseTab {
                index: tab_index(self.tab_index, "close_tab")?,
            },
            ActionKind::Complete => Action::Complete,
            ActionKind::Unknown(name) => return Err(AgentError::UnknownAction(name.clone())),
        };
        Ok(action)
    }
}

fn present(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(field: &Option<String>, action: &'static str, name: &'static str) -> Result<String> {
    present(field).ok_or(AgentError::MissingField {
        action,
        field: name,
    })
}

fn target(text: &Option<String>, selector: &Option<String>) -> Option<Target> {
    present(text)
        .map(Target::Text)
        .or_else(|| present(selector).map(Target::Selector))
}

fn target_prefer_selector(text: &Option<String>, selector: &Option<String>) -> Option<Target> {
    present(selector)
        .map(Target::Selector)
        .or_else(|| present(text).map(Target::Text))
}

fn tab_index(index: Option<i64>, action: &'static str) -> Result<usize> {
    match index {
        None => Err(AgentError::MissingField {
            action,
            field: "tab_index",
        }),
        Some(i) if i < 1 => Err(AgentError::InvalidField {
            field: "tab_index",
            reason: format!("{} is not a valid tab number (tabs start at 1)", i),
        }),
        Some(i) => Ok(i as usize),
    }
}
