//! Exclusive owner of the server's browser and page.
//!
//! At most one browser and one page exist per server process. `start` is
//! idempotent, `close` never fails for being idle, and every page-scoped
//! operation reports `No page open` instead of panicking when nothing is
//! running.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CliError, Result};

/// Hard cap on navigation, matching the relayed `goto` timeout.
pub const NAV_TIMEOUT_MS: u64 = 30_000;
/// Default wait for element lookups.
pub const ELEMENT_TIMEOUT_MS: u64 = 10_000;

const POLL_MS: u64 = 250;
const NETWORK_IDLE_MS: u64 = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
	Launched,
	AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
	Closed,
	Idle,
}

struct Inner {
	browser: Browser,
	handler: JoinHandle<()>,
	page: Page,
}

#[derive(Default)]
pub struct Session {
	inner: Option<Inner>,
}

impl Session {
	pub fn new() -> Self {
		Self { inner: None }
	}

	pub fn has_browser(&self) -> bool {
		self.inner.is_some()
	}

	pub fn has_page(&self) -> bool {
		self.inner.is_some()
	}

	/// Launch the browser and open a blank page. Idempotent.
	pub async fn start(&mut self, headless: bool) -> Result<StartOutcome> {
		if self.inner.is_some() {
			return Ok(StartOutcome::AlreadyRunning);
		}

		let mut builder = BrowserConfig::builder()
			.arg("--disable-blink-features=AutomationControlled")
			.arg("--disable-gpu")
			.arg("--no-first-run");
		builder = if headless {
			builder.headless_mode(HeadlessMode::New)
		} else {
			builder.with_head()
		};
		let config = builder.build().map_err(CliError::BrowserLaunch)?;
		let (browser, mut handler) = Browser::launch(config)
			.await
			.map_err(|e| CliError::BrowserLaunch(e.to_string()))?;
		// The handler stream drives all CDP traffic; it must be polled.
		let handle = tokio::spawn(async move {
			while let Some(event) = handler.next().await {
				if event.is_err() {
					break;
				}
			}
		});
		let page = match browser.new_page("about:blank").await {
			Ok(page) => page,
			Err(err) => {
				handle.abort();
				return Err(err.into());
			}
		};

		info!(target: "ws.daemon", headless, "browser launched");
		self.inner = Some(Inner { browser, handler: handle, page });
		Ok(StartOutcome::Launched)
	}

	/// Tear down the browser if one is running.
	pub async fn close(&mut self) -> CloseOutcome {
		let Some(mut inner) = self.inner.take() else {
			return CloseOutcome::Idle;
		};
		if let Err(err) = inner.browser.close().await {
			warn!(target: "ws.daemon", error = %err, "browser close reported an error");
			inner.handler.abort();
		}
		let _ = inner.handler.await;
		info!(target: "ws.daemon", "browser closed");
		CloseOutcome::Closed
	}

	/// Navigate the page, launching the browser first if needed.
	/// Returns the settled URL and document title.
	pub async fn navigate(&mut self, url: &str) -> Result<(String, String)> {
		if self.inner.is_none() {
			self.start(false).await?;
		}
		let page = self.page()?;

		let settle = async {
			page.goto(url).await.map_err(|source| CliError::Navigation {
				url: url.to_string(),
				source,
			})?;
			page.wait_for_navigation()
				.await
				.map_err(|source| CliError::Navigation { url: url.to_string(), source })?;
			wait_for_network_idle(page, Duration::from_millis(NETWORK_IDLE_MS)).await;
			Ok::<_, CliError>(())
		};
		tokio::time::timeout(Duration::from_millis(NAV_TIMEOUT_MS), settle)
			.await
			.map_err(|_| CliError::Timeout {
				ms: NAV_TIMEOUT_MS,
				condition: format!("navigation to {url}"),
			})??;

		debug!(target: "ws.daemon", url, "navigation settled");
		Ok((self.current_url().await?, self.title().await?))
	}

	pub async fn screenshot(&self, path: &str, full_page: bool) -> Result<String> {
		let page = self.page()?;
		let absolute = std::path::absolute(path)?;
		let params = ScreenshotParams::builder().full_page(full_page).build();
		page.save_screenshot(params, &absolute).await?;
		Ok(absolute.display().to_string())
	}

	pub async fn screenshot_base64(&self, full_page: bool) -> Result<String> {
		let page = self.page()?;
		let params = ScreenshotParams::builder().full_page(full_page).build();
		let bytes = page.screenshot(params).await?;
		Ok(STANDARD.encode(bytes))
	}

	pub async fn click(&self, selector: &str) -> Result<()> {
		let element = self.find_element(selector, ELEMENT_TIMEOUT_MS).await?;
		element.click().await?;
		Ok(())
	}

	/// Clear the element and type into it.
	pub async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
		let element = self.find_element(selector, ELEMENT_TIMEOUT_MS).await?;
		element.focus().await?;
		element
			.call_js_fn("function() { this.value = ''; }", false)
			.await?;
		element.type_str(text).await?;
		Ok(())
	}

	pub async fn text_content(&self, selector: &str) -> Result<Option<String>> {
		let element = self.find_element(selector, ELEMENT_TIMEOUT_MS).await?;
		Ok(element.inner_text().await?)
	}

	pub async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<()> {
		self.find_element(selector, timeout_ms).await?;
		Ok(())
	}

	pub async fn current_url(&self) -> Result<String> {
		let page = self.page()?;
		Ok(page.url().await?.unwrap_or_default())
	}

	pub async fn title(&self) -> Result<String> {
		let page = self.page()?;
		Ok(page.get_title().await?.unwrap_or_default())
	}

	/// Evaluate JavaScript and return its JSON value verbatim.
	pub async fn evaluate(&self, script: &str) -> Result<Value> {
		let page = self.page()?;
		let result = page.evaluate(script).await?;
		Ok(result.value().cloned().unwrap_or(Value::Null))
	}

	fn page(&self) -> Result<&Page> {
		self.inner.as_ref().map(|inner| &inner.page).ok_or(CliError::NoPage)
	}

	async fn find_element(&self, selector: &str, timeout_ms: u64) -> Result<Element> {
		let page = self.page()?;
		let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
		loop {
			if let Ok(element) = page.find_element(selector).await {
				return Ok(element);
			}
			if tokio::time::Instant::now() >= deadline {
				return Err(CliError::ElementNotFound { selector: selector.to_string() });
			}
			tokio::time::sleep(Duration::from_millis(POLL_MS)).await;
		}
	}
}

/// Consider the page settled once the resource-entry count stops growing
/// across two consecutive polls. Best effort.
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
