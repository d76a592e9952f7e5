use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatRequest, ChatResponse};
use genai::Client;
use serde_json::Value;

use crate::agent::AbortSignal;

/// The LLM client seam named by spec §1/§6: "model invocation, retries,
/// token accounting" live outside this crate's core. `AgentLoop` depends
/// only on this trait — "the model must accept a system prompt and a user
/// prompt and return JSON conforming to the schema in §4.5.1."
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the decoded top-level JSON object
    /// `{evaluation_previous_goal?, memory?, next_goal?, action}`
    /// (spec §4.5.1), or an error if the call itself failed (network,
    /// auth, rate limit — `AgentError::Llm`, not `AgentError::Schema`).
    /// Malformed JSON/shape is still returned as `Ok` here; `AgentLoop`
    /// is responsible for classifying it as a schema violation.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        abort: &AbortSignal,
    ) -> anyhow::Result<Value>;
}

/// Which provider a model name belongs to, purely to pick the right API
/// key environment variable `genai` reads (spec §6's `apiKey` is set into
/// that variable at client construction, matching the teacher's
/// `LLMProvider::api_key_env_var`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
    Gemini,
}

impl LlmProvider {
    pub fn from_model_name(model: &str) -> Self {
        let m = model.to_lowercase();
        if m.starts_with("claude") {
            LlmProvider::Anthropic
        } else if m.starts_with("gemini") {
            LlmProvider::Gemini
        } else {
            LlmProvider::OpenAi
        }
    }

    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
        }
    }
}

/// Model connection options (spec §6 `new Agent(config)`: "LLM options
/// (model, apiKey, baseURL)").
#[derive(Debug, Clone)]
pub struct LlmOptions {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// `genai`-backed adapter. `genai` unifies Anthropic/OpenAI/Gemini behind
/// one chat API; this adapter asks the model for raw JSON matching the
/// structured output contract and decodes it itself, rather than using
/// `genai`'s native multi-tool-call interface — the single-action-per-step
/// discipline (spec §9) requires exactly one decision point per turn.
pub struct GenaiClient {
    client: Client,
    model: String,
}

impl GenaiClient {
    pub fn new(options: LlmOptions) -> Self {
        if let Some(key) = &options.api_key {
            let provider = LlmProvider::from_model_name(&options.model);
            std::env::set_var(provider.api_key_env_var(), key);
        }
        if let Some(base_url) = &options.base_url {
            std::env::set_var("OPENAI_BASE_URL", base_url);
        }
        Self { client: Client::default(), model: options.model }
    }
}

#[async_trait]
impl LlmClient for GenaiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        abort: &AbortSignal,
    ) -> anyhow::Result<Value> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt),
        ]);

        let call = self.client.exec_chat(&self.model, request, None);
        let response: ChatResponse = match abort.race(call).await {
            Some(result) => result.map_err(|e| anyhow::anyhow!("LLM request failed: {}", e))?,
            None => anyhow::bail!("aborted while awaiting LLM response"),
        };

        let text = response
            .first_text()
            .ok_or_else(|| anyhow::anyhow!("LLM response had no text content"))?;

        let json_slice = extract_json_object(text)
            .ok_or_else(|| anyhow::anyhow!("LLM response did not contain a JSON object"))?;
        let value: Value = serde_json::from_str(json_slice)?;
        Ok(value)
    }
}

/// Models occasionally wrap JSON in prose or a fenced code block; find the
/// outermost `{...}` so a well-formed object embedded in extra text still
/// parses.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let text = "Sure, here you go:\n```json\n{\"action\": {\"done\": {}}}\n```\nThanks!";
        let extracted = extract_json_object(text).unwrap();
        let v: Value = serde_json::from_str(extracted).unwrap();
        assert_eq!(v["action"]["done"], serde_json::json!({}));
    }

    #[test]
    fn returns_none_without_braces() {
        assert!(extract_json_object("no json here").is_none());
    }

    #[test]
    fn detects_provider_from_model_name() {
        assert_eq!(LlmProvider::from_model_name("claude-3-5-sonnet"), LlmProvider::Anthropic);
        assert_eq!(LlmProvider::from_model_name("gpt-4o"), LlmProvider::OpenAi);
        assert_eq!(LlmProvider::from_model_name("gemini-2.5-flash"), LlmProvider::Gemini);
    }
}
