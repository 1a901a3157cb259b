use thiserror::Error;

/// Errors raised by the crawler and its extraction strategies.
#[derive(Debug, Error)]
pub enum CrawlError {
	#[error("failed to launch browser: {0}")]
	Launch(String),

	#[error("navigation to {url} failed: {source}")]
	Navigation {
		url: String,
		#[source]
		source: chromiumoxide::error::CdpError,
	},

	#[error("timed out after {ms}ms waiting for {what}")]
	Timeout { ms: u64, what: String },

	#[error("invalid URL {url}: {source}")]
	InvalidUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},

	#[error("invalid extraction schema: {0}")]
	Schema(String),

	#[error("LLM extraction failed: {0}")]
	Llm(String),

	#[error(transparent)]
	Cdp(#[from] chromiumoxide::error::CdpError),

	#[error(transparent)]
	Http(#[from] reqwest::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}
