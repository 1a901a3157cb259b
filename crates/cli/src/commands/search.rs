//! `webscout search`: Google results scraping.
//!
//! The default path drives the command server so the page stays open for
//! follow-up commands. `--one-shot` crawls the results page directly with a
//! CSS schema instead.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use webscout_crawl::{
	BrowserSettings, CrawlConfig, Crawler, ExtractionStrategy, Schema, SchemaField,
	SchemaFieldKind,
};

use crate::daemon;
use crate::daemon::protocol::{Response, Status};
use crate::error::{CliError, Result};

const ONE_SHOT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
	AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Walks `h3` headings and their result containers. Google's markup shifts
/// often; the container and description selectors are a best-effort list.
const EXTRACT_RESULTS_JS: &str = r#"(function() {
  const results = [];
  const h3Elements = document.querySelectorAll("h3");
  const seen = new Set();

  h3Elements.forEach((h3, index) => {
    if (index >= 20) return;

    let parent = h3.closest("div[data-hveid]") || h3.closest("div.g") || h3.closest(".MjjYud") || h3.parentElement;

    if (parent) {
      const a = parent.querySelector("a");
      const link = a ? a.href : "";

      let description = "";
      const descSelectors = [".VwiC3b", ".st", ".ITZIwc", ".HGLXqc"];
      for (const sel of descSelectors) {
        const descEl = parent.querySelector(sel);
        if (descEl) {
          description = descEl.textContent.trim().substring(0, 200);
          break;
        }
      }

      const key = link || h3.textContent.trim();
      if (!seen.has(key) && h3.textContent.trim() && link) {
        seen.add(key);
        results.push({
          rank: results.length + 1,
          title: h3.textContent.trim(),
          link: link,
          description: description
        });
      }
    }
  });

  return results;
})();"#;

const NEXT_PAGE_JS: &str = r##"(function() {
  const nextButton = document.querySelector("#pnnext");
  if (nextButton) {
    nextButton.click();
    return true;
  }
  return false;
})();"##;

const PAGE_STRUCTURE_JS: &str = r#"(function() {
  return {
    allDivs: document.querySelectorAll("div.g").length,
    searchResults: document.querySelectorAll("div[data-hveid]").length,
    h3Count: document.querySelectorAll("h3").length
  };
})();"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
	pub rank: usize,
	pub title: String,
	pub link: String,
	#[serde(default)]
	pub description: String,
}

pub async fn run(
	query: &str,
	max_results: usize,
	headless: bool,
	one_shot: bool,
	current_page: bool,
	debug: bool,
) -> Result<()> {
	if debug {
		return debug_page().await;
	}
	if current_page {
		let results = extract_via_server().await?;
		println!("{}", serde_json::to_string_pretty(&results)?);
		return Ok(());
	}
	if one_shot {
		return one_shot_search(query, max_results, headless).await;
	}
	server_search(query, max_results, headless).await
}

async fn server_search(query: &str, max_results: usize, headless: bool) -> Result<()> {
	let search_url = format!(
		"https://www.google.com/search?q={}",
		urlencoding::encode(query)
	);
	println!("Searching for: {query}");
	println!("URL: {search_url}");

	println!("Launching browser...");
	check_launch(
		daemon::send_command(&json!({"tool": "launch", "args": {"headless": headless}})).await,
	)?;

	println!("Navigating to search results...");
	let nav = check(
		daemon::send_command(&json!({"tool": "navigate", "args": {"url": search_url}})).await,
	)?;
	let title = nav.fields.get("title").and_then(Value::as_str).unwrap_or("N/A");
	println!("Page title: {title}");

	tokio::time::sleep(std::time::Duration::from_secs(2)).await;
	let mut results = extract_via_server().await?;

	if results.len() < max_results {
		println!("Got {} results from page 1, navigating to page 2...", results.len());
		let _ = daemon::send_command(&json!({"tool": "evaluate", "args": {"script": NEXT_PAGE_JS}}))
			.await;
		tokio::time::sleep(std::time::Duration::from_secs(3)).await;
		results.extend(extract_via_server().await?);
	}

	let results = dedupe_and_rank(results, max_results);
	println!("\n=== Found {} results ===\n", results.len());
	println!("{}", serde_json::to_string_pretty(&results)?);

	let ts = std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs();
	let output = std::env::temp_dir().join(format!("google_search_{ts}.json"));
	std::fs::write(&output, serde_json::to_string_pretty(&results)?)?;
	println!("Results saved to: {}", output.display());
	Ok(())
}

async fn one_shot_search(query: &str, max_results: usize, headless: bool) -> Result<()> {
	let search_url = format!(
		"https://www.google.com/search?q={}&num={max_results}",
		urlencoding::encode(query)
	);
	println!("Searching: {query}");
	println!("URL: {search_url}");

	let settings = BrowserSettings {
		headless,
		viewport_width: 1920,
		viewport_height: 1080,
		user_agent: Some(ONE_SHOT_USER_AGENT.to_string()),
	};
	let crawler = Crawler::launch(settings).await?;
	let config = CrawlConfig {
		wait_for: Some("div.g, div#search, body".to_string()),
		extraction: Some(ExtractionStrategy::CssSchema(google_results_schema())),
		..Default::default()
	};
	let result = crawler.crawl(&search_url, &config).await;
	crawler.close().await?;

	if !result.success {
		return Err(CliError::InvalidInput(format!(
			"search crawl failed: {}",
			result.error_message.unwrap_or_default()
		)));
	}
	let raw = result.extracted_content.unwrap_or_else(|| "[]".to_string());
	let items: Vec<Value> = serde_json::from_str(&raw)
		.map_err(|e| CliError::InvalidInput(format!("extracted content is not JSON: {e}")))?;

	let results = dedupe_and_rank(
		items
			.into_iter()
			.filter_map(|item| {
				let title = item.get("title")?.as_str()?.trim().to_string();
				let link = clean_link(item.get("link")?.as_str()?);
				if title.is_empty() || link.is_empty() {
					return None;
				}
				let description = item
					.get("description")
					.and_then(Value::as_str)
					.unwrap_or_default()
					.to_string();
				Some(SearchResult { rank: 0, title, link, description })
			})
			.collect(),
		max_results,
	);

	println!("Extracted {} valid results", results.len());
	let report = json!({
		"query": query,
		"total_results": results.len(),
		"results": results,
	});
	println!("{}", serde_json::to_string_pretty(&report)?);
	std::fs::write("google_search_results.json", serde_json::to_string_pretty(&report)?)?;
	println!("Results saved to: google_search_results.json");
	Ok(())
}

async fn debug_page() -> Result<()> {
	let url = daemon::send_command(&json!({"tool": "get_url"})).await;
	let title = daemon::send_command(&json!({"tool": "get_title"})).await;
	println!("=== Page Info ===");
	println!("URL: {}", url.fields.get("url").and_then(Value::as_str).unwrap_or("N/A"));
	println!(
		"Title: {}",
		title.fields.get("title").and_then(Value::as_str).unwrap_or("N/A")
	);

	let structure = check(
		daemon::send_command(&json!({"tool": "evaluate", "args": {"script": PAGE_STRUCTURE_JS}}))
			.await,
	)?;
	let info = structure.fields.get("result").cloned().unwrap_or(Value::Null);
	println!("\n=== Page Structure ===");
	println!("div.g elements: {}", info.get("allDivs").and_then(Value::as_u64).unwrap_or(0));
	println!(
		"div[data-hveid] elements: {}",
		info.get("searchResults").and_then(Value::as_u64).unwrap_or(0)
	);
	println!("h3 elements: {}", info.get("h3Count").and_then(Value::as_u64).unwrap_or(0));

	println!("\n=== Taking Screenshot ===");
	let path = std::env::temp_dir().join("google_debug.png");
	let shot = check(
		daemon::send_command(
			&json!({"tool": "screenshot", "args": {"path": path.display().to_string()}}),
		)
		.await,
	)?;
	println!(
		"Screenshot saved to: {}",
		shot.fields.get("path").and_then(Value::as_str).unwrap_or("N/A")
	);
	Ok(())
}

async fn extract_via_server() -> Result<Vec<SearchResult>> {
	let response = check(
		daemon::send_command(&json!({"tool": "evaluate", "args": {"script": EXTRACT_RESULTS_JS}}))
			.await,
	)?;
	let raw = response.fields.get("result").cloned().unwrap_or(Value::Array(vec![]));
	Ok(serde_json::from_value(raw)?)
}

/// Turn error responses into CLI errors so callers can bail with `?`.
fn check(response: Response) -> Result<Response> {
	if response.is_success() {
		Ok(response)
	} else {
		Err(CliError::InvalidInput(
			response.message.unwrap_or_else(|| format!("server returned {:?}", response.status)),
		))
	}
}

/// Like [`check`], but a browser that is already up is fine: launch is
/// idempotent and a repeated search reuses it.
fn check_launch(response: Response) -> Result<Response> {
	if response.status == Status::AlreadyRunning {
		return Ok(response);
	}
	check(response)
}

fn google_results_schema() -> Schema {
	Schema {
		name: "search_results".to_string(),
		base_selector: "div.g, div[data-hveid], div.tF2Cxc, div.yuRUbf".to_string(),
		fields: vec![
			SchemaField {
				name: "title".to_string(),
				selector: "h3, h3.LC20lb, div[role='heading']".to_string(),
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
			SchemaField {
				name: "description".to_string(),
				selector: "div.VwiC3b, div.s, div.ITZIwc, span.aCOpRe".to_string(),
				kind: SchemaFieldKind::Text,
				attribute: None,
				all: false,
			},
			SchemaField {
				name: "site_name".to_string(),
				selector: "div.NJo7tc, span.VuuXrf, cite".to_string(),
				kind: SchemaFieldKind::Text,
				attribute: None,
				all: false,
			},
		],
	}
}

/// Google sometimes wraps result links as `/url?q=<target>&...`.
fn clean_link(link: &str) -> String {
	if link.starts_with("/url?") {
		if let Ok(parsed) = Url::parse(&format!("https://www.google.com{link}")) {
			if let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "q") {
				return target.into_owned();
			}
		}
	}
	link.to_string()
}

/// Drop duplicate links, renumber ranks sequentially, cap the list.
fn dedupe_and_rank(results: Vec<SearchResult>, max_results: usize) -> Vec<SearchResult> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();
	for mut result in results {
		if !seen.insert(result.link.clone()) {
			continue;
		}
		result.rank = out.len() + 1;
		out.push(result);
		if out.len() == max_results {
			break;
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn result(link: &str) -> SearchResult {
		SearchResult {
			rank: 99,
			title: format!("title for {link}"),
			link: link.to_string(),
			description: String::new(),
		}
	}

	#[test]
	fn dedupes_by_link_and_renumbers() {
		let results = dedupe_and_rank(
			vec![result("https://a.example"), result("https://b.example"), result("https://a.example")],
			20,
		);
		assert_eq!(results.len(), 2);
		assert_eq!(results[0].rank, 1);
		assert_eq!(results[1].rank, 2);
		assert_eq!(results[1].link, "https://b.example");
	}

	#[test]
	fn caps_at_max_results() {
		let results = dedupe_and_rank(
			(0..30).map(|i| result(&format!("https://example.com/{i}"))).collect(),
			20,
		);
		assert_eq!(results.len(), 20);
		assert_eq!(results.last().unwrap().rank, 20);
	}

	#[test]
	fn cleans_google_redirect_links() {
		assert_eq!(
			clean_link("/url?q=https://example.com/page&sa=U&ved=xyz"),
			"https://example.com/page"
		);
		assert_eq!(clean_link("https://example.com/direct"), "https://example.com/direct");
	}

	#[test]
	fn launch_reuses_an_already_running_browser() {
		assert!(check_launch(Response::already_running()).is_ok());
		assert!(check_launch(Response::success()).is_ok());
		assert!(check_launch(Response::error("launch failed")).is_err());
	}

	#[test]
	fn pagination_script_is_complete() {
		// The selector contains a hash; make sure the whole script survives
		// as one literal.
		assert!(NEXT_PAGE_JS.contains(r##"querySelector("#pnnext")"##));
		assert!(NEXT_PAGE_JS.trim_end().ends_with("})();"));
	}

	#[test]
	fn extraction_script_results_deserialize() {
		let raw = serde_json::json!([
			{"rank": 1, "title": "Example", "link": "https://example.com", "description": "d"},
			{"rank": 2, "title": "No description", "link": "https://example.org"}
		]);
		let results: Vec<SearchResult> = serde_json::from_value(raw).unwrap();
		assert_eq!(results.len(), 2);
		assert_eq!(results[1].description, "");
	}
}
