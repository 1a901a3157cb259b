//! One-shot and batch page crawling on top of a headless Chromium session.
//!
//! A [`Crawler`] owns a single browser; each [`Crawler::crawl`] call renders a
//! page, converts it to markdown, collects links/media/metadata, and optionally
//! runs an [`ExtractionStrategy`] over the rendered HTML. Failures are carried
//! in the returned [`CrawlResult`] rather than aborting a run, so batch crawls
//! always complete.

pub mod config;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod llm;
pub mod markdown;

pub use config::{BrowserSettings, CrawlConfig};
pub use crawler::{CrawlResult, Crawler, Links, Media, PageMetadata};
pub use error::CrawlError;
pub use extract::{ExtractionStrategy, Schema, SchemaField, SchemaFieldKind};
pub use llm::LlmConfig;

pub type Result<T, E = CrawlError> = std::result::Result<T, E>;
