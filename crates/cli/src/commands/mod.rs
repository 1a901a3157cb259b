pub mod batch;
pub mod crawl;
pub mod exec;
pub mod extract;
pub mod search;
pub mod server;

use crate::cli::{Cli, Commands};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	match cli.command {
		Commands::Server { action } => server::run(action).await,
		Commands::Exec { list, call } => exec::run(list, call).await,
		Commands::Search {
			query,
			max_results,
			headless,
			one_shot,
			current_page,
			debug,
		} => search::run(&query, max_results, headless, one_shot, current_page, debug).await,
		Commands::Crawl { url, output, no_screenshot } => {
			crawl::run(&url, &output, !no_screenshot).await
		}
		Commands::Batch { urls, max_concurrent, extract } => {
			batch::run(&urls, max_concurrent, extract.as_deref()).await
		}
		Commands::Extract { action } => extract::run(action).await,
	}
}
