//! OpenAI-compatible chat-completions endpoint

use crate::*;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, trace};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";

/// Chat-completions provider for OpenAI and compatible servers
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_base = api_base
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base,
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| json!({ "role": &m.role, "content": &m.content }))
            .collect();

        json!({
            "model": model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        })
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let content = choice["message"]["content"].as_str().map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let usage = match json["usage"].as_object() {
            Some(usage) => Usage {
                prompt_tokens: usage
                    .get("prompt_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                completion_tokens: usage
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                total_tokens: usage
                    .get("total_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
            },
            None => Usage::default(),
        };

        Ok(ChatResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        trace!("◆ POST {}/chat/completions", self.api_base);

        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let json: serde_json::Value = response.json().await?;

        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }
            let error = json["error"]["message"]
                .as_str()
                .unwrap_or("UNKNOWN ERROR")
                .to_string();
            return Err(ProviderError::Api(error));
        }

        let response = self.parse_response(json)?;
        debug!(
            "◆ model replied: {} chars, {} tokens",
            response.content_or_empty().len(),
            response.usage.total_tokens
        );
        Ok(response)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_defaults() {
        let provider = OpenAiProvider::new("sk-test", None, None);
        assert_eq!(provider.api_base, "https://api.openai.com/v1");
        assert_eq!(provider.default_model, "gpt-4-turbo-preview");
        assert!(provider.is_configured());
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let provider =
            OpenAiProvider::new("sk-test", Some("http://localhost:8000/v1/".to_string()), None);
        assert_eq!(provider.api_base, "http://localhost:8000/v1");
    }

    #[test]
    fn test_is_configured_false_without_key() {
        let provider = OpenAiProvider::new("", None, None);
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_build_request_uses_default_model_when_empty() {
        let provider = OpenAiProvider::new("sk", None, Some("gpt-4o".to_string()));
        let params = ChatParams {
            messages: vec![Message::system("sys"), Message::user("Hello")],
            ..Default::default()
        };

        let request = provider.build_request(&params);

        assert_eq!(request["model"], "gpt-4o");
        assert_eq!(request["max_tokens"], 500);
        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "Hello");
    }

    #[test]
    fn test_build_request_explicit_model() {
        let provider = OpenAiProvider::new("sk", None, None);
        let params = ChatParams {
            model: "custom".to_string(),
            temperature: 0.3,
            max_tokens: 200,
            ..Default::default()
        };

        let request = provider.build_request(&params);
        assert_eq!(request["model"], "custom");
        assert_eq!(request["max_tokens"], 200);
    }

    #[test]
    fn test_parse_response_simple() {
        let provider = OpenAiProvider::new("sk", None, None);
        let json = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "{\"action\":\"wait\"}" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });

        let response = provider.parse_response(json).unwrap();
        assert_eq!(response.content_or_empty(), "{\"action\":\"wait\"}");
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_response_missing_usage_and_reason() {
        let provider = OpenAiProvider::new("sk", None, None);
        let json = json!({ "choices": [{ "message": { "content": "hi" } }] });

        let response = provider.parse_response(json).unwrap();
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.prompt_tokens, 0);
    }

    #[test]
    fn test_parse_response_empty_choices() {
        let provider = OpenAiProvider::new("sk", None, None);
        let result = provider.parse_response(json!({ "choices": [] }));
        assert!(matches!(result, Err(ProviderError::InvalidResponse)));
    }

    #[tokio::test]
    async fn test_chat_without_key_fails_fast() {
        let provider = OpenAiProvider::new("", None, None);
        let result = provider.chat(ChatParams::default()).await;
        assert!(matches!(result, Err(ProviderError::NoApiKey)));
    }
}
