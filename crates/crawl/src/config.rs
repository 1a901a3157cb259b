use crate::extract::ExtractionStrategy;

/// Browser-level settings, fixed for the lifetime of a [`crate::Crawler`].
#[derive(Debug, Clone)]
pub struct BrowserSettings {
	pub headless: bool,
	pub viewport_width: u32,
	pub viewport_height: u32,
	pub user_agent: Option<String>,
}

impl Default for BrowserSettings {
	fn default() -> Self {
		Self {
			headless: true,
			viewport_width: 1280,
			viewport_height: 800,
			user_agent: None,
		}
	}
}

/// Per-crawl settings.
#[derive(Debug, Clone, Default)]
pub struct CrawlConfig {
	/// CSS selector to wait for after navigation, if any.
	pub wait_for: Option<String>,
	/// Hard cap on navigation plus readiness, in milliseconds.
	pub page_timeout_ms: Option<u64>,
	/// Strip fixed-position overlays (cookie banners, modals) before capture.
	pub remove_overlays: bool,
	/// Capture a full-page PNG alongside the markdown.
	pub screenshot: bool,
	pub extraction: Option<ExtractionStrategy>,
}

impl CrawlConfig {
	pub const DEFAULT_PAGE_TIMEOUT_MS: u64 = 30_000;

	pub fn page_timeout_ms(&self) -> u64 {
		self.page_timeout_ms.unwrap_or(Self::DEFAULT_PAGE_TIMEOUT_MS)
	}
}
