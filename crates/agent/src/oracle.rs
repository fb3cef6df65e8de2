//! Decision oracle: the model that proposes the next step

use async_trait::async_trait;
use tracing::debug;

use webpilot_config::OracleConfig;
use webpilot_provider::{ChatParams, Message, Provider};

use crate::context::DecisionPrompt;
use crate::Result;

const ASSESSMENT_SYSTEM_PROMPT: &str =
    "You check browser actions for destructiveness. Reply with JSON only.";

/// External source of decisions and destructiveness assessments
///
/// Both calls return raw text; parsing is the caller's job.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(&self, prompt: &DecisionPrompt) -> Result<String>;
    async fn assess_destructiveness(&self, action: &str, context_summary: &str) -> Result<String>;
}

/// Oracle backed by a chat-completion provider
pub struct LlmOracle<P: Provider> {
    provider: P,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl<P: Provider> LlmOracle<P> {
    pub fn new(provider: P) -> Self {
        let model = provider.default_model();
        Self {
            provider,
            model,
            temperature: 0.7,
            max_tokens: 500,
        }
    }

    pub fn from_config(provider: P, config: &OracleConfig) -> Self {
        let model = if config.model.is_empty() {
            provider.default_model()
        } else {
            config.model.clone()
        };
        Self {
            provider,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn assessment_prompt(action: &str, context_summary: &str) -> String {
        format!(
            r#"Is this action destructive (deletion, payment, sending important data, changing settings)?

Action: {}
Context: {}

Reply in JSON:
{{
  "is_destructive": true/false,
  "description": "what will happen",
  "confirmation_question": "question for the user"
}}"#,
            action, context_summary
        )
    }
}

#[async_trait]
impl<P: Provider> DecisionOracle for LlmOracle<P> {
    async fn decide(&self, prompt: &DecisionPrompt) -> Result<String> {
        let params = ChatParams {
            model: self.model.clone(),
            messages: vec![
                Message::system(prompt.system.as_str()),
                Message::user(prompt.user.as_str()),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self.provider.chat(params).await?;
        debug!("Oracle replied ({} tokens)", response.usage.total_tokens);
        Ok(response.content_or_empty().to_string())
    }

    async fn assess_destructiveness(&self, action: &str, context_summary: &str) -> Result<String> {
        let params = ChatParams {
            model: self.model.clone(),
            messages: vec![
                Message::system(ASSESSMENT_SYSTEM_PROMPT),
                Message::user(Self::assessment_prompt(action, context_summary)),
            ],
            max_tokens: 200,
            temperature: 0.3,
        };

        let response = self.provider.chat(params).await?;
        Ok(response.content_or_empty().to_string())
    }
}
