//! `webscout crawl`: one page to markdown.

use std::path::Path;

use webscout_crawl::{BrowserSettings, CrawlConfig, Crawler};

use crate::error::{CliError, Result};

pub async fn run(url: &str, output: &Path, screenshot: bool) -> Result<()> {
	let settings = BrowserSettings {
		headless: true,
		viewport_width: 1920,
		viewport_height: 1080,
		user_agent: None,
	};
	let crawler = Crawler::launch(settings).await?;
	let config = CrawlConfig {
		remove_overlays: true,
		screenshot,
		..Default::default()
	};
	let result = crawler.crawl(url, &config).await;
	crawler.close().await?;

	if !result.success {
		return Err(CliError::InvalidInput(format!(
			"crawl failed: {}",
			result.error_message.unwrap_or_default()
		)));
	}

	println!("Crawled: {}", result.url);
	println!("  Title: {}", result.metadata.title.as_deref().unwrap_or("N/A"));
	println!(
		"  Links found: {} internal, {} external",
		result.links.internal.len(),
		result.links.external.len()
	);
	println!("  Media found: {} images", result.media.images.len());
	println!("  Content length: {} chars", result.markdown.len());

	std::fs::write(output, &result.markdown)?;
	println!("Saved to {}", output.display());

	if let Some(png) = &result.screenshot {
		std::fs::write("screenshot.png", png)?;
		println!("Saved screenshot.png");
	}
	Ok(())
}
