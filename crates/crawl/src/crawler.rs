//! The browser-owning crawler.

use std::collections::HashSet;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use scraper::{Html, Selector};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{BrowserSettings, CrawlConfig};
use crate::error::CrawlError;
use crate::extract::ExtractionStrategy;
use crate::{llm, markdown};

/// Polling interval for readiness checks.
const POLL_MS: u64 = 250;
/// Cap on the post-navigation network-idle wait.
const NETWORK_IDLE_MS: u64 = 4_000;
/// Cap on `wait_for` selector polling.
const WAIT_FOR_MS: u64 = 10_000;

const OVERLAY_JS: &str = r#"
(() => {
	const selectors = [
		'[id*="cookie"]', '[class*="cookie"]', '[id*="consent"]', '[class*="consent"]',
		'[class*="modal"]', '[class*="overlay"]', '[class*="popup"]',
	];
	for (const sel of selectors) {
		for (const el of document.querySelectorAll(sel)) {
			const style = getComputedStyle(el);
			if (style.position === 'fixed' || style.position === 'sticky') el.remove();
		}
	}
	document.body.style.overflow = 'auto';
	return true;
})()
"#;

/// The outcome of crawling one URL. Failures are carried here, not raised, so
/// a batch run always completes.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
	pub url: String,
	pub success: bool,
	/// Rendered document HTML, kept out of serialized output.
	#[serde(skip)]
	pub html: String,
	pub markdown: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub extracted_content: Option<String>,
	pub metadata: PageMetadata,
	pub links: Links,
	pub media: Media,
	#[serde(skip)]
	pub screenshot: Option<Vec<u8>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageMetadata {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Links {
	pub internal: Vec<String>,
	pub external: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Media {
	pub images: Vec<String>,
}

impl CrawlResult {
	fn failed(url: &str, message: String) -> Self {
		Self {
			url: url.to_string(),
			success: false,
			html: String::new(),
			markdown: String::new(),
			extracted_content: None,
			metadata: PageMetadata::default(),
			links: Links::default(),
			media: Media::default(),
			screenshot: None,
			error_message: Some(message),
		}
	}
}

/// Owns one browser process; pages are opened and closed per crawl.
pub struct Crawler {
	browser: Browser,
	handler: JoinHandle<()>,
	settings: BrowserSettings,
}

impl Crawler {
	pub async fn launch(settings: BrowserSettings) -> Result<Self, CrawlError> {
		let mut builder = BrowserConfig::builder()
			.window_size(settings.viewport_width, settings.viewport_height)
			.arg("--disable-blink-features=AutomationControlled")
			.arg("--disable-gpu")
			.arg("--no-first-run");
		builder = if settings.headless {
			builder.headless_mode(HeadlessMode::New)
		} else {
			builder.with_head()
		};
		let config = builder.build().map_err(CrawlError::Launch)?;
		let (browser, mut handler) = Browser::launch(config)
			.await
			.map_err(|e| CrawlError::Launch(e.to_string()))?;
		// The handler stream must be polled for the browser to make progress.
		let handle = tokio::spawn(async move {
			while let Some(event) = handler.next().await {
				if event.is_err() {
					break;
				}
			}
		});
		info!(target: "ws.crawl", headless = settings.headless, "browser launched");
		Ok(Self { browser, handler: handle, settings })
	}

	/// Crawl one URL. Errors become a failed [`CrawlResult`].
	pub async fn crawl(&self, url: &str, config: &CrawlConfig) -> CrawlResult {
		match self.crawl_page(url, config).await {
			Ok(result) => result,
			Err(e) => {
				warn!(target: "ws.crawl", url, error = %e, "crawl failed");
				CrawlResult::failed(url, e.to_string())
			}
		}
	}

	/// Crawl many URLs with at most `max_concurrent` pages in flight.
	/// Results come back in input order.
	pub async fn crawl_many(
		&self,
		urls: &[String],
		config: &CrawlConfig,
		max_concurrent: usize,
	) -> Vec<CrawlResult> {
		futures::stream::iter(urls.iter().map(|url| self.crawl(url, config)))
			.buffered(max_concurrent.max(1))
			.collect()
			.await
	}

	pub async fn close(mut self) -> Result<(), CrawlError> {
		self.browser.close().await?;
		let _ = self.handler.await;
		Ok(())
	}

	async fn crawl_page(&self, url: &str, config: &CrawlConfig) -> Result<CrawlResult, CrawlError> {
		let page = self.browser.new_page("about:blank").await?;
		if let Some(agent) = &self.settings.user_agent {
			page.set_user_agent(agent.as_str()).await?;
		}

		let budget = Duration::from_millis(config.page_timeout_ms());
		tokio::time::timeout(budget, navigate(&page, url))
			.await
			.map_err(|_| CrawlError::Timeout {
				ms: config.page_timeout_ms(),
				what: format!("navigation to {url}"),
			})??;
		wait_for_network_idle(&page, Duration::from_millis(NETWORK_IDLE_MS)).await;

		if let Some(selector) = &config.wait_for {
			wait_for_selector(&page, selector, Duration::from_millis(WAIT_FOR_MS)).await?;
		}
		if config.remove_overlays {
			let _ = page.evaluate(OVERLAY_JS).await;
		}

		let html = page.content().await?;
		let final_url = page.url().await?.unwrap_or_else(|| url.to_string());
		let base = Url::parse(&final_url).map_err(|source| CrawlError::InvalidUrl {
			url: final_url.clone(),
			source,
		})?;

		let md = markdown::to_markdown(&html);
		let metadata = read_metadata(&html);
		let links = collect_links(&html, &base);
		let media = collect_media(&html, &base);

		let extracted_content = match &config.extraction {
			Some(ExtractionStrategy::CssSchema(schema)) => {
				Some(serde_json::to_string(&schema.apply(&html)?)?)
			}
			Some(ExtractionStrategy::Llm(llm_config)) => {
				match llm::extract(llm_config, &md).await {
					Ok(content) => Some(content),
					Err(e) => {
						warn!(target: "ws.crawl", url, error = %e, "LLM extraction failed");
						None
					}
				}
			}
			None => None,
		};

		let screenshot = if config.screenshot {
			let params = ScreenshotParams::builder().full_page(true).build();
			Some(page.screenshot(params).await?)
		} else {
			None
		};

		let _ = page.close().await;
		debug!(target: "ws.crawl", url = %final_url, markdown_bytes = md.len(), "crawl complete");
		Ok(CrawlResult {
			url: final_url,
			success: true,
			html,
			markdown: md,
			extracted_content,
			metadata,
			links,
			media,
			screenshot,
			error_message: None,
		})
	}
}

async fn navigate(page: &Page, url: &str) -> Result<(), CrawlError> {
	page.goto(url).await.map_err(|source| CrawlError::Navigation {
		url: url.to_string(),
		source,
	})?;
	page.wait_for_navigation()
		.await
		.map_err(|source| CrawlError::Navigation { url: url.to_string(), source })?;
	Ok(())
}

/// Consider the page settled once the resource-entry count stops growing
/// across two consecutive polls. Best effort; gives up at the deadline.
async fn wait_for_network_idle(page: &Page, budget: Duration) {
	let deadline = tokio::time::Instant::now() + budget;
	let mut last = -1i64;
	let mut stable = 0u32;
	while tokio::time::Instant::now() < deadline {
		let count = match page
			.evaluate("performance.getEntriesByType('resource').length")
			.await
		{
			Ok(result) => result.into_value::<i64>().unwrap_or(-1),
			Err(_) => return,
		};
		if count == last {
			stable += 1;
			if stable >= 2 {
				return;
			}
		} else {
			stable = 0;
			last = count;
		}
		tokio::time::sleep(Duration::from_millis(POLL_MS)).await;
	}
}

async fn wait_for_selector(page: &Page, selector: &str, budget: Duration) -> Result<(), CrawlError> {
	let deadline = tokio::time::Instant::now() + budget;
	loop {
		if page.find_element(selector).await.is_ok() {
			return Ok(());
		}
		if tokio::time::Instant::now() >= deadline {
			return Err(CrawlError::Timeout {
				ms: budget.as_millis() as u64,
				what: format!("selector {selector:?}"),
			});
		}
		tokio::time::sleep(Duration::from_millis(POLL_MS)).await;
	}
}

fn read_metadata(html: &str) -> PageMetadata {
	let doc = Html::parse_document(html);
	let title = parse(&doc, "title", |el| {
		let text = el.text().collect::<String>().trim().to_string();
		(!text.is_empty()).then_some(text)
	});
	let description = parse(&doc, "meta[name=\"description\"]", |el| {
		el.value().attr("content").map(str::to_string)
	});
	PageMetadata { title, description }
}

fn parse<F>(doc: &Html, selector: &str, read: F) -> Option<String>
where
	F: Fn(scraper::ElementRef<'_>) -> Option<String>,
{
	let sel = Selector::parse(selector).ok()?;
	doc.select(&sel).find_map(read)
}

fn collect_links(html: &str, base: &Url) -> Links {
	let doc = Html::parse_document(html);
	let Ok(sel) = Selector::parse("a[href]") else {
		return Links::default();
	};
	let mut seen = HashSet::new();
	let mut links = Links::default();
	for el in doc.select(&sel) {
		let Some(href) = el.value().attr("href") else { continue };
		if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
			continue;
		}
		let Ok(resolved) = base.join(href) else { continue };
		let text = resolved.to_string();
		if !seen.insert(text.clone()) {
			continue;
		}
		if resolved.host_str() == base.host_str() {
			links.internal.push(text);
		} else {
			links.external.push(text);
		}
	}
	links
}

fn collect_media(html: &str, base: &Url) -> Media {
	let doc = Html::parse_document(html);
	let Ok(sel) = Selector::parse("img[src]") else {
		return Media::default();
	};
	let mut seen = HashSet::new();
	let mut media = Media::default();
	for el in doc.select(&sel) {
		let Some(src) = el.value().attr("src") else { continue };
		let Ok(resolved) = base.join(src) else { continue };
		let text = resolved.to_string();
		if seen.insert(text.clone()) {
			media.images.push(text);
		}
	}
	media
}

#[cfg(test)]
mod tests {
	use super::*;

	const DOC: &str = r##"
		<html><head>
			<title> Example Page </title>
			<meta name="description" content="A test document.">
		</head><body>
			<a href="/about">About</a>
			<a href="https://example.com/about">Absolute same host</a>
			<a href="https://other.org/page">Elsewhere</a>
			<a href="#frag">Skip</a>
			<a href="mailto:x@example.com">Skip too</a>
			<img src="/logo.png"><img src="/logo.png">
		</body></html>
	"##;

	fn base() -> Url {
		Url::parse("https://example.com/start").unwrap()
	}

	#[test]
	fn metadata_is_trimmed() {
		let meta = read_metadata(DOC);
		assert_eq!(meta.title.as_deref(), Some("Example Page"));
		assert_eq!(meta.description.as_deref(), Some("A test document."));
	}

	#[test]
	fn links_classified_by_host_and_deduped() {
		let links = collect_links(DOC, &base());
		assert_eq!(links.internal, vec!["https://example.com/about"]);
		assert_eq!(links.external, vec!["https://other.org/page"]);
	}

	#[test]
	fn media_resolved_against_base() {
		let media = collect_media(DOC, &base());
		assert_eq!(media.images, vec!["https://example.com/logo.png"]);
	}

	#[test]
	fn failed_result_carries_message_and_no_content() {
		let result = CrawlResult::failed("https://down.example", "refused".into());
		assert!(!result.success);
		assert_eq!(result.error_message.as_deref(), Some("refused"));
		assert!(result.markdown.is_empty());
		let json = serde_json::to_value(&result).unwrap();
		assert!(json.get("screenshot").is_none());
	}
}
