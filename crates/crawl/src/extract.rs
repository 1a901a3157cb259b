//! Structured extraction from rendered HTML.
//!
//! Two strategies: a CSS selector schema applied locally with `scraper`, and
//! LLM extraction over the page markdown (see [`crate::llm`]).

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CrawlError;
use crate::llm::LlmConfig;

/// How `extracted_content` is produced for a crawl.
#[derive(Debug, Clone)]
pub enum ExtractionStrategy {
	CssSchema(Schema),
	Llm(LlmConfig),
}

/// A CSS extraction schema: a repeating base selector and the fields pulled
/// from each match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
	#[serde(default)]
	pub name: String,
	#[serde(rename = "baseSelector")]
	pub base_selector: String,
	pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
	pub name: String,
	pub selector: String,
	#[serde(rename = "type", default)]
	pub kind: SchemaFieldKind,
	/// Attribute name, required when `kind` is `attribute`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub attribute: Option<String>,
	/// Collect every match instead of the first.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaFieldKind {
	#[default]
	Text,
	Attribute,
	Html,
}

impl Schema {
	/// Apply the schema to an HTML document, one JSON object per base-selector
	/// match. Fields with no match are omitted from their object.
	pub fn apply(&self, html: &str) -> Result<Vec<Value>, CrawlError> {
		let doc = Html::parse_document(html);
		let base = parse_selector(&self.base_selector)?;
		let fields = self
			.fields
			.iter()
			.map(|f| Ok((f, parse_selector(&f.selector)?)))
			.collect::<Result<Vec<_>, CrawlError>>()?;

		let mut items = Vec::new();
		for root in doc.select(&base) {
			let mut obj = Map::new();
			for (field, selector) in &fields {
				if field.all {
					let values: Vec<Value> = root
						.select(selector)
						.filter_map(|el| field.read(el))
						.collect();
					if !values.is_empty() {
						obj.insert(field.name.clone(), Value::Array(values));
					}
				} else if let Some(value) = root.select(selector).find_map(|el| field.read(el)) {
					obj.insert(field.name.clone(), value);
				}
			}
			if !obj.is_empty() {
				items.push(Value::Object(obj));
			}
		}
		Ok(items)
	}
}

impl SchemaField {
	fn read(&self, el: ElementRef<'_>) -> Option<Value> {
		match self.kind {
			SchemaFieldKind::Text => {
				let text = el.text().collect::<String>().trim().to_string();
				(!text.is_empty()).then_some(Value::String(text))
			}
			SchemaFieldKind::Attribute => {
				let attr = self.attribute.as_deref()?;
				el.value().attr(attr).map(|v| Value::String(v.to_string()))
			}
			SchemaFieldKind::Html => Some(Value::String(el.html())),
		}
	}
}

fn parse_selector(selector: &str) -> Result<Selector, CrawlError> {
	Selector::parse(selector)
		.map_err(|e| CrawlError::Schema(format!("bad selector {selector:?}: {e}")))
}

/// The schema used when the caller supplies none: headings, paragraphs and
/// links of the document body.
pub fn default_body_schema() -> Schema {
	Schema {
		name: "Page Content".to_string(),
		base_selector: "body".to_string(),
		fields: vec![
			SchemaField {
				name: "headings".to_string(),
				selector: "h1, h2, h3".to_string(),
				kind: SchemaFieldKind::Text,
				attribute: None,
				all: true,
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

	const DOC: &str = r#"
		<html><body>
			<div class="item"><h2>First</h2><a href="/a">go</a><p>one</p><p>two</p></div>
			<div class="item"><h2>Second</h2><p>three</p></div>
			<div class="other"><h2>Ignored</h2></div>
		</body></html>
	"#;

	fn item_schema() -> Schema {
		Schema {
			name: "items".into(),
			base_selector: "div.item".into(),
			fields: vec![
				SchemaField {
					name: "title".into(),
					selector: "h2".into(),
					kind: SchemaFieldKind::Text,
					attribute: None,
					all: false,
				},
				SchemaField {
					name: "link".into(),
					selector: "a".into(),
					kind: SchemaFieldKind::Attribute,
					attribute: Some("href".into()),
					all: false,
				},
				SchemaField {
					name: "body".into(),
					selector: "p".into(),
					kind: SchemaFieldKind::Text,
					attribute: None,
					all: true,
				},
			],
		}
	}

	#[test]
	fn extracts_one_object_per_base_match() {
		let items = item_schema().apply(DOC).unwrap();
		assert_eq!(items.len(), 2);
		assert_eq!(items[0]["title"], "First");
		assert_eq!(items[0]["link"], "/a");
		assert_eq!(items[0]["body"], serde_json::json!(["one", "two"]));
		assert_eq!(items[1]["title"], "Second");
		assert!(items[1].get("link").is_none());
	}

	#[test]
	fn bad_selector_is_a_schema_error() {
		let mut schema = item_schema();
		schema.base_selector = ":::".into();
		let err = schema.apply(DOC).unwrap_err();
		assert!(matches!(err, CrawlError::Schema(_)));
	}

	#[test]
	fn schema_json_uses_base_selector_camel_case() {
		let json = serde_json::to_value(item_schema()).unwrap();
		assert!(json.get("baseSelector").is_some());
		let parsed: Schema = serde_json::from_value(json).unwrap();
		assert_eq!(parsed.base_selector, "div.item");
	}

	#[test]
	fn default_schema_reads_body_content() {
		let items = default_body_schema().apply(DOC).unwrap();
		assert_eq!(items.len(), 1);
		let headings = items[0]["headings"].as_array().unwrap();
		assert_eq!(headings.len(), 3);
	}
}
