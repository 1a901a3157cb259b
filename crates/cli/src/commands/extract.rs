//! `webscout extract`: the three-approach extraction pipeline.
//!
//! 1. Generate a reusable CSS schema with an LLM (one-time cost), then apply
//!    it with no further LLM calls.
//! 2. Apply a hand-written schema directly.
//! 3. Extract with the LLM on every request (most expensive; for irregular
//!    content).

use std::path::Path;

use serde_json::{Value, json};

use webscout_crawl::{
	BrowserSettings, CrawlConfig, CrawlResult, Crawler, ExtractionStrategy, LlmConfig, Schema,
	SchemaField, SchemaFieldKind, llm,
};

use crate::cli::ExtractAction;
use crate::error::{CliError, Result};

pub async fn run(action: ExtractAction) -> Result<()> {
	match action {
		ExtractAction::GenerateSchema { url, instruction, output } => {
			generate_schema(&url, &instruction, &output).await
		}
		ExtractAction::UseSchema { url, schema } => use_schema(&url, &schema).await,
		ExtractAction::Manual { url } => manual(&url).await,
		ExtractAction::Llm { url, instruction } => llm_extract(&url, &instruction).await,
	}
}

async fn generate_schema(url: &str, instruction: &str, output: &Path) -> Result<()> {
	println!("Generating extraction schema using LLM...");
	let result = crawl_one(url, CrawlConfig {
		wait_for: Some("body".to_string()),
		remove_overlays: true,
		..Default::default()
	})
	.await?;

	let llm_config = LlmConfig::default();
	let mut schema = llm::generate_schema(&llm_config, &result.html, instruction).await?;

	if let Some(obj) = schema.as_object_mut() {
		obj.entry("name").or_insert_with(|| json!("items"));
	}
	if !schema.get("fields").is_some_and(Value::is_array) {
		println!("Generated schema missing fields, using fallback");
		schema = serde_json::to_value(fallback_schema())?;
	}
	// Round-trip through the typed schema so a bad generation fails here,
	// not on first use.
	let parsed: Schema = serde_json::from_value(schema.clone())
		.map_err(|e| CliError::InvalidInput(format!("generated schema is unusable: {e}")))?;

	std::fs::write(output, serde_json::to_string_pretty(&parsed)?)?;
	println!("Schema generated and saved to: {}", output.display());
	println!("{}", serde_json::to_string_pretty(&parsed)?);
	Ok(())
}

async fn use_schema(url: &str, schema_file: &Path) -> Result<()> {
	println!("Loading schema from: {}", schema_file.display());
	let schema: Schema = match std::fs::read_to_string(schema_file) {
		Ok(contents) => serde_json::from_str(&contents)?,
		Err(_) => {
			return Err(CliError::InvalidInput(format!(
				"schema file not found: {} (generate one with `webscout extract generate-schema`)",
				schema_file.display()
			)));
		}
	};

	println!("Extracting data using generated schema (no LLM calls)...");
	let data = extract_with_schema(url, schema).await?;
	let count = data.as_array().map(Vec::len).unwrap_or(0);
	println!("Extracted {count} items using schema");

	std::fs::write("extracted_data.json", serde_json::to_string_pretty(&data)?)?;
	println!("Saved to extracted_data.json");
	print_sample(&data);
	Ok(())
}

async fn manual(url: &str) -> Result<()> {
	println!("Using manual CSS schema for extraction...");
	let data = extract_with_schema(url, manual_schema()).await?;
	let count = data.as_array().map(Vec::len).unwrap_or(0);
	println!("Extracted {count} items using manual schema");

	std::fs::write("manual_extracted.json", serde_json::to_string_pretty(&data)?)?;
	println!("Saved to manual_extracted.json");
	Ok(())
}

async fn llm_extract(url: &str, instruction: &str) -> Result<()> {
	println!("Using direct LLM extraction...");
	let llm_config = LlmConfig {
		instruction: instruction.to_string(),
		schema: Some(json!({
			"type": "object",
			"properties": {
				"items": {"type": "array", "items": {"type": "object"}},
				"summary": {"type": "string"}
			}
		})),
		..Default::default()
	};
	let result = crawl_one(url, CrawlConfig {
		wait_for: Some("body".to_string()),
		remove_overlays: true,
		extraction: Some(ExtractionStrategy::Llm(llm_config)),
		..Default::default()
	})
	.await?;

	let Some(content) = result.extracted_content else {
		return Err(CliError::InvalidInput("LLM extraction produced no content".to_string()));
	};
	let data: Value = serde_json::from_str(&content).map_err(|_| {
		let preview: String = content.chars().take(500).collect();
		CliError::InvalidInput(format!("could not parse LLM output as JSON: {preview}"))
	})?;

	let items = data.get("items").and_then(Value::as_array).map(Vec::len).unwrap_or(0);
	println!("LLM extracted {items} items");
	println!("Summary: {}", data.get("summary").and_then(Value::as_str).unwrap_or("N/A"));

	std::fs::write("llm_extracted.json", serde_json::to_string_pretty(&data)?)?;
	println!("Saved to llm_extracted.json");
	Ok(())
}

async fn extract_with_schema(url: &str, schema: Schema) -> Result<Value> {
	let result = crawl_one(url, CrawlConfig {
		wait_for: Some("body".to_string()),
		extraction: Some(ExtractionStrategy::CssSchema(schema)),
		..Default::default()
	})
	.await?;
	let raw = result.extracted_content.unwrap_or_else(|| "[]".to_string());
	Ok(serde_json::from_str(&raw)?)
}

async fn crawl_one(url: &str, config: CrawlConfig) -> Result<CrawlResult> {
	let crawler = Crawler::launch(BrowserSettings::default()).await?;
	let result = crawler.crawl(url, &config).await;
	crawler.close().await?;
	if !result.success {
		return Err(CliError::InvalidInput(format!(
			"crawl failed: {}",
			result.error_message.unwrap_or_default()
		)));
	}
	Ok(result)
}

fn print_sample(data: &Value) {
	if let Some(first) = data.as_array().and_then(|items| items.first()) {
		println!("\nSample (first item):");
		if let Ok(pretty) = serde_json::to_string_pretty(first) {
			println!("{pretty}");
		}
	}
}

/// Used when the LLM returns a schema without usable fields.
fn fallback_schema() -> Schema {
	Schema {
		name: "items".to_string(),
		base_selector: "div.item, article, .product".to_string(),
		fields: vec![
			SchemaField {
				name: "title".to_string(),
				selector: "h1, h2, h3".to_string(),
				kind: SchemaFieldKind::Text,
				attribute: None,
				all: false,
			},
			SchemaField {
				name: "description".to_string(),
				selector: "p".to_string(),
				kind: SchemaFieldKind::Text,
				attribute: None,
				all: false,
			},
			SchemaField {
				name: "link".to_string(),
				selector: "a".to_string(),
				kind: SchemaFieldKind::Attribute,
				attribute: Some("href".to_string()),
				all: false,
			},
		],
	}
}

fn manual_schema() -> Schema {
	Schema {
		name: "content".to_string(),
		base_selector: "body".to_string(),
		fields: vec![
			SchemaField {
				name: "title".to_string(),
				selector: "h1".to_string(),
				kind: SchemaFieldKind::Text,
				attribute: None,
				all: false,
			},
			SchemaField {
				name: "paragraphs".to_string(),
				selector: "p".to_string(),
				kind: SchemaFieldKind::Text,
				attribute: None,
				all: true,
			},
			SchemaField {
				name: "links".to_string(),
				selector: "a".to_string(),
				kind: SchemaFieldKind::Attribute,
				attribute: Some("href".to_string()),
				all: true,
			},
		],
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fallback_schema_is_valid() {
		let value = serde_json::to_value(fallback_schema()).unwrap();
		let parsed: Schema = serde_json::from_value(value).unwrap();
		assert_eq!(parsed.base_selector, "div.item, article, .product");
		assert_eq!(parsed.fields.len(), 3);
	}

	#[test]
	fn manual_schema_extracts_body_content() {
		let html = r#"<body><h1>Top</h1><p>one</p><p>two</p><a href="/x">x</a></body>"#;
		let items = manual_schema().apply(html).unwrap();
		assert_eq!(items.len(), 1);
		assert_eq!(items[0]["title"], "Top");
		assert_eq!(items[0]["paragraphs"], json!(["one", "two"]));
	}
}
