//! LLM-backed extraction over an OpenAI-compatible chat completions API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::CrawlError;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Page content beyond this is not sent to the model.
const MAX_CONTENT_BYTES: usize = 24_000;

/// Settings for LLM extraction and schema generation.
#[derive(Debug, Clone)]
pub struct LlmConfig {
	/// Provider string in `vendor/model` form, e.g. `openai/gpt-4o-mini`.
	pub provider: String,
	pub api_base: Option<String>,
	/// Falls back to `OPENAI_API_KEY` when unset.
	pub api_key: Option<String>,
	pub instruction: String,
	/// Target shape for the extracted JSON, if the caller has one.
	pub schema: Option<Value>,
}

impl Default for LlmConfig {
	fn default() -> Self {
		Self {
			provider: "openai/gpt-4o-mini".to_string(),
			api_base: None,
			api_key: None,
			instruction: String::new(),
			schema: None,
		}
	}
}

impl LlmConfig {
	fn model(&self) -> &str {
		self.provider.rsplit('/').next().unwrap_or(&self.provider)
	}

	fn resolved_key(&self) -> Result<String, CrawlError> {
		if let Some(key) = &self.api_key {
			return Ok(key.clone());
		}
		std::env::var(API_KEY_ENV)
			.map_err(|_| CrawlError::Llm(format!("no API key: set {API_KEY_ENV}")))
	}
}

#[derive(Serialize)]
struct ChatRequest {
	model: String,
	messages: Vec<ChatMessage>,
	temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
	role: &'static str,
	content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
	choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
	message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
	content: Option<String>,
}

/// Extract structured content from page markdown per the config's instruction.
/// Returns the model's JSON text; callers decide whether to parse it.
pub async fn extract(config: &LlmConfig, markdown: &str) -> Result<String, CrawlError> {
	let mut system = String::from(
		"You extract structured data from web page content. \
		 Respond with JSON only, no prose and no code fences.",
	);
	if let Some(schema) = &config.schema {
		system.push_str("\nThe JSON must match this shape:\n");
		system.push_str(&serde_json::to_string_pretty(schema)?);
	}
	let user = format!(
		"{}\n\nPage content:\n{}",
		config.instruction,
		clip(markdown, MAX_CONTENT_BYTES)
	);
	complete(config, system, user).await
}

/// Ask the model to produce a CSS extraction schema for the given HTML.
/// Returns the parsed schema JSON.
pub async fn generate_schema(
	config: &LlmConfig,
	html: &str,
	instruction: &str,
) -> Result<Value, CrawlError> {
	let system = "You write CSS extraction schemas for web scraping. \
		Respond with JSON only, no prose and no code fences."
		.to_string();
	let user = format!(
		"Analyze this HTML and produce an extraction schema as JSON with keys \
		 \"name\", \"baseSelector\" and \"fields\" (each field has \"name\", \
		 \"selector\", \"type\" of \"text\" or \"attribute\", and \"attribute\" \
		 when type is attribute). Goal: {instruction}\n\nHTML:\n{}",
		clip(html, MAX_CONTENT_BYTES)
	);
	let raw = complete(config, system, user).await?;
	serde_json::from_str(&raw)
		.map_err(|e| CrawlError::Llm(format!("model returned invalid schema JSON: {e}")))
}

async fn complete(config: &LlmConfig, system: String, user: String) -> Result<String, CrawlError> {
	let api_key = config.resolved_key()?;
	let api_base = config
		.api_base
		.as_deref()
		.unwrap_or(DEFAULT_API_BASE)
		.trim_end_matches('/');
	let url = format!("{api_base}/chat/completions");
	let request = ChatRequest {
		model: config.model().to_string(),
		messages: vec![
			ChatMessage { role: "system", content: system },
			ChatMessage { role: "user", content: user },
		],
		temperature: 0.0,
	};
	info!(target: "ws.crawl", model = config.model(), "calling extraction model");

	let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
	let response = client
		.post(&url)
		.bearer_auth(api_key)
		.json(&request)
		.send()
		.await?;
	let status = response.status();
	if !status.is_success() {
		let body = response.text().await.unwrap_or_default();
		return Err(CrawlError::Llm(format!("API returned {status}: {body}")));
	}
	let parsed: ChatResponse = response.json().await?;
	let content = parsed
		.choices
		.into_iter()
		.next()
		.and_then(|c| c.message.content)
		.ok_or_else(|| CrawlError::Llm("empty completion".to_string()))?;
	debug!(target: "ws.crawl", bytes = content.len(), "extraction model responded");
	Ok(strip_code_fences(&content).to_string())
}

/// Models often wrap JSON in a fenced block despite instructions.
pub fn strip_code_fences(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);
	let inner = inner.strip_suffix("```").unwrap_or(inner);
	inner.trim()
}

fn clip(s: &str, max_bytes: usize) -> &str {
	if s.len() <= max_bytes {
		return s;
	}
	let mut end = max_bytes;
	while end > 0 && !s.is_char_boundary(end) {
		end -= 1;
	}
	&s[..end]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_json_fences() {
		assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
		assert_eq!(strip_code_fences("```\n[]\n```"), "[]");
		assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
	}

	#[test]
	fn clip_respects_char_boundaries() {
		let s = "aé漢字";
		let clipped = clip(s, 3);
		assert!(s.starts_with(clipped));
		assert!(clipped.len() <= 3);
	}

	#[test]
	fn model_name_drops_vendor_prefix() {
		let config = LlmConfig { provider: "openai/gpt-4o-mini".into(), ..Default::default() };
		assert_eq!(config.model(), "gpt-4o-mini");
		let bare = LlmConfig { provider: "gpt-4o-mini".into(), ..Default::default() };
		assert_eq!(bare.model(), "gpt-4o-mini");
	}
}
