use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;

/// Narrow seam to the language-model collaborator. Both pipeline calls go
/// through `chat_json`, which must return a single JSON object; tests
/// substitute a deterministic stub so the pipeline never needs a real model.
pub trait ChatModel {
    fn chat_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        max_retries: u32,
    ) -> anyhow::Result<String>;

    fn model_name(&self) -> &str;
}

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat-completions client. Retry/backoff lives here, at
/// the collaborator-call layer; nothing above it retries.
pub struct OpenAiChatModel {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OpenAiChatModel {
    pub fn new(api_key: String, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn from_env(base_url: &str, model: &str, api_key_env: &str) -> anyhow::Result<Self> {
        let api_key = std::env::var(api_key_env)
            .map_err(|_| anyhow!("{api_key_env} environment variable not set"))?;
        Ok(Self::new(api_key, base_url, model))
    }

    fn call_once(&self, system_prompt: &str, user_prompt: &str, max_tokens: u32) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "model": &self.model,
            "response_format": {"type": "json_object"},
            "max_tokens": max_tokens,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.1
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .context("send chat completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("chat API error {status}: {body}"));
        }

        #[derive(Deserialize)]
        struct Message {
            content: String,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response.json().context("parse chat completion response")?;
        api_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("chat API returned no choices"))
    }
}

impl ChatModel for OpenAiChatModel {
    fn chat_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        max_retries: u32,
    ) -> anyhow::Result<String> {
        let attempts = max_retries.max(1);
        let mut last_err = anyhow!("no attempts made");
        for attempt in 0..attempts {
            match self.call_once(system_prompt, user_prompt, max_tokens) {
                Ok(text) => return Ok(text),
                Err(err) => {
                    last_err = err;
                    if attempt + 1 < attempts {
                        thread::sleep(Duration::from_millis(500 * (attempt as u64 + 1)));
                    }
                }
            }
        }
        Err(last_err.context(format!("chat call failed after {attempts} attempts")))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_name_round_trips() {
        let client = OpenAiChatModel::new("test-key".to_string(), DEFAULT_BASE_URL, "gpt-4o-mini");
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }
}
