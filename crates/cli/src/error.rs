use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("browser launch failed: {0}")]
	BrowserLaunch(String),

	#[error("Navigation to {url} failed: {source}")]
	Navigation {
		url: String,
		#[source]
		source: chromiumoxide::error::CdpError,
	},

	/// A page-scoped tool ran with no page open.
	#[error("No page open")]
	NoPage,

	#[error("element not found: {selector}")]
	ElementNotFound { selector: String },

	#[error("Timeout after {ms}ms waiting for: {condition}")]
	Timeout { ms: u64, condition: String },

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Crawl(#[from] webscout_crawl::CrawlError),

	#[error(transparent)]
	Cdp(#[from] chromiumoxide::error::CdpError),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}
