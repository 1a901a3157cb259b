//! `webscout batch`: crawl many URLs concurrently.
//!
//! A failed URL lands in the failed list; it never aborts the run.

use std::path::Path;

use serde::Serialize;
use serde_json::{Value, json};

use webscout_crawl::{
	BrowserSettings, CrawlConfig, CrawlResult, Crawler, ExtractionStrategy,
	extract::default_body_schema,
};

use crate::error::{CliError, Result};

#[derive(Debug, Serialize)]
struct BatchReport {
	success_count: usize,
	failed_count: usize,
	results: Vec<Value>,
	failed: Vec<Value>,
}

pub async fn run(source: &str, max_concurrent: usize, extract: Option<&str>) -> Result<()> {
	let urls = load_urls(source)?;
	if urls.is_empty() {
		return Err(CliError::InvalidInput("no URLs found".to_string()));
	}
	println!("Loaded {} URLs", urls.len());

	match extract {
		Some(schema_file) => extract_batch(&urls, max_concurrent, schema_file).await,
		None => crawl_batch(&urls, max_concurrent).await,
	}
}

async fn crawl_batch(urls: &[String], max_concurrent: usize) -> Result<()> {
	println!(
		"Starting batch crawl of {} URLs (max {max_concurrent} concurrent)",
		urls.len()
	);
	let crawler = Crawler::launch(BrowserSettings::default()).await?;
	let config = CrawlConfig {
		wait_for: Some("body".to_string()),
		remove_overlays: true,
		..Default::default()
	};
	let results = crawler.crawl_many(urls, &config, max_concurrent).await;
	crawler.close().await?;

	for result in &results {
		if result.success {
			println!("ok  {}", result.url);
		} else {
			println!(
				"err {}: {}",
				result.url,
				result.error_message.as_deref().unwrap_or("unknown error")
			);
		}
	}

	let report = build_report(&results);
	std::fs::write("batch_results.json", serde_json::to_string_pretty(&report)?)?;

	let markdown_dir = Path::new("batch_markdown");
	std::fs::create_dir_all(markdown_dir)?;
	for (i, result) in results.iter().enumerate() {
		if !result.success {
			continue;
		}
		let file = markdown_dir.join(format!("{i:03}_{}.md", safe_filename(&result.url)));
		let title = result.metadata.title.clone().unwrap_or_else(|| result.url.clone());
		let contents = format!("# {title}\n\nURL: {}\n\n{}", result.url, result.markdown);
		std::fs::write(file, contents)?;
	}

	println!("\nBatch crawl complete:");
	println!("  success: {}", report.success_count);
	println!("  failed: {}", report.failed_count);
	println!("  results saved to: batch_results.json");
	println!("  markdown files saved to: {}/", markdown_dir.display());
	Ok(())
}

async fn extract_batch(urls: &[String], max_concurrent: usize, schema_file: &str) -> Result<()> {
	let schema = if !schema_file.is_empty() && Path::new(schema_file).exists() {
		println!("Using extraction schema from: {schema_file}");
		serde_json::from_str(&std::fs::read_to_string(schema_file)?)?
	} else {
		default_body_schema()
	};

	let crawler = Crawler::launch(BrowserSettings::default()).await?;
	let config = CrawlConfig {
		extraction: Some(ExtractionStrategy::CssSchema(schema)),
		..Default::default()
	};
	let results = crawler.crawl_many(urls, &config, max_concurrent).await;
	crawler.close().await?;

	let mut extracted = Vec::new();
	for result in &results {
		let Some(content) = result.extracted_content.as_deref().filter(|_| result.success) else {
			println!("err {}", result.url);
			continue;
		};
		match serde_json::from_str::<Value>(content) {
			Ok(data) => {
				println!("ok  {}", result.url);
				extracted.push(json!({"url": result.url, "data": data}));
			}
			Err(_) => println!("warn {}: extracted content is not JSON", result.url),
		}
	}

	std::fs::write("batch_extracted.json", serde_json::to_string_pretty(&extracted)?)?;
	println!("\nExtracted data saved to: batch_extracted.json");
	Ok(())
}

fn build_report(results: &[CrawlResult]) -> BatchReport {
	let mut report = BatchReport {
		success_count: 0,
		failed_count: 0,
		results: Vec::new(),
		failed: Vec::new(),
	};
	for result in results {
		if result.success {
			report.success_count += 1;
			report.results.push(json!({
				"url": result.url,
				"title": result.metadata.title.clone().unwrap_or_default(),
				"description": result.metadata.description.clone().unwrap_or_default(),
				"content_length": result.markdown.len(),
				"links_count": result.links.internal.len() + result.links.external.len(),
				"images_count": result.media.images.len(),
			}));
		} else {
			report.failed_count += 1;
			report.failed.push(json!({
				"url": result.url,
				"error": result.error_message.clone().unwrap_or_default(),
			}));
		}
	}
	report
}

/// Load URLs from a file (one per line, `#` comments) or a comma-separated
/// list.
fn load_urls(source: &str) -> Result<Vec<String>> {
	if Path::new(source).exists() {
		let contents = std::fs::read_to_string(source)?;
		Ok(contents
			.lines()
			.map(str::trim)
			.filter(|line| !line.is_empty() && !line.starts_with('#'))
			.map(str::to_string)
			.collect())
	} else {
		Ok(source
			.split(',')
			.map(str::trim)
			.filter(|url| !url.is_empty())
			.map(str::to_string)
			.collect())
	}
}

/// Scheme stripped, everything outside `[A-Za-z0-9-_]` flattened to `_`,
/// capped at 100 chars.
fn safe_filename(url: &str) -> String {
	let stripped = url
		.strip_prefix("https://")
		.or_else(|| url.strip_prefix("http://"))
		.unwrap_or(url);
	stripped
		.chars()
		.map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
		.take(100)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use webscout_crawl::{Links, Media, PageMetadata};

	fn success(url: &str) -> CrawlResult {
		CrawlResult {
			url: url.to_string(),
			success: true,
			html: String::new(),
			markdown: "# hi\n\nbody".to_string(),
			extracted_content: None,
			metadata: PageMetadata {
				title: Some("Hi".to_string()),
				description: None,
			},
			links: Links {
				internal: vec!["https://a.example/x".to_string()],
				external: vec![],
			},
			media: Media::default(),
			screenshot: None,
			error_message: None,
		}
	}

	fn failure(url: &str) -> CrawlResult {
		CrawlResult {
			url: url.to_string(),
			success: false,
			html: String::new(),
			markdown: String::new(),
			extracted_content: None,
			metadata: PageMetadata::default(),
			links: Links::default(),
			media: Media::default(),
			screenshot: None,
			error_message: Some("connection refused".to_string()),
		}
	}

	#[test]
	fn report_partitions_successes_and_failures() {
		let results = vec![success("https://a.example"), failure("https://b.example"), success("https://c.example")];
		let report = build_report(&results);
		assert_eq!(report.success_count, 2);
		assert_eq!(report.failed_count, 1);
		assert_eq!(report.results.len(), 2);
		assert_eq!(report.failed.len(), 1);
		assert_eq!(report.failed[0]["error"], "connection refused");
	}

	#[test]
	fn loads_urls_from_file_skipping_comments() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "https://example.com").unwrap();
		writeln!(file, "# a comment").unwrap();
		writeln!(file).unwrap();
		writeln!(file, "  https://example.org  ").unwrap();
		let urls = load_urls(file.path().to_str().unwrap()).unwrap();
		assert_eq!(urls, vec!["https://example.com", "https://example.org"]);
	}

	#[test]
	fn loads_urls_from_comma_list() {
		let urls = load_urls("https://a.example, https://b.example,").unwrap();
		assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
	}

	#[test]
	fn safe_filenames_strip_scheme_and_flatten() {
		assert_eq!(safe_filename("https://example.com/a/b?x=1"), "example_com_a_b_x_1");
		assert_eq!(safe_filename("http://sub.example.org"), "sub_example_org");
		assert!(safe_filename(&format!("https://{}", "a".repeat(300))).len() <= 100);
	}
}
