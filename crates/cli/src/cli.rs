use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "webscout")]
#[command(about = "Browser command server and crawling CLI")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Manage the persistent browser command server
	Server {
		#[command(subcommand)]
		action: ServerAction,
	},

	/// List tools or run one in-process (no server)
	Exec {
		/// Print the tool registry as JSON
		#[arg(long)]
		list: bool,

		/// Run one tool call, e.g. '{"tool": "navigate", "args": {"url": "..."}}'
		#[arg(long, value_name = "JSON")]
		call: Option<String>,
	},

	/// Scrape Google search results
	Search {
		/// Search query
		query: String,

		/// Cap on returned results
		#[arg(long, default_value_t = 20)]
		max_results: usize,

		/// Run the browser headless
		#[arg(long)]
		headless: bool,

		/// Crawl the results page directly instead of using the server
		#[arg(long)]
		one_shot: bool,

		/// Extract from whatever page the server currently has open
		#[arg(long)]
		current_page: bool,

		/// Dump page structure counts and a screenshot for troubleshooting
		#[arg(long)]
		debug: bool,
	},

	/// Crawl one page to markdown
	Crawl {
		url: String,

		/// Markdown output path
		#[arg(long, default_value = "output.md")]
		output: PathBuf,

		/// Skip the full-page screenshot
		#[arg(long)]
		no_screenshot: bool,
	},

	/// Crawl many URLs concurrently
	Batch {
		/// URL file (one per line, # comments) or comma-separated list
		urls: String,

		/// Concurrent page limit
		#[arg(long, default_value_t = 5)]
		max_concurrent: usize,

		/// Run CSS schema extraction; omit the value to use the built-in
		/// body schema
		#[arg(long, value_name = "SCHEMA", num_args = 0..=1, default_missing_value = "")]
		extract: Option<String>,
	},

	/// Structured extraction pipeline
	Extract {
		#[command(subcommand)]
		action: ExtractAction,
	},
}

#[derive(Subcommand, Debug)]
pub enum ServerAction {
	/// Start the server (backgrounds itself unless --foreground)
	Start {
		#[arg(long)]
		foreground: bool,
	},
	/// Stop the server
	Stop,
	/// Report server and browser state
	Status,
	/// Send one raw tool call to the server
	Call {
		/// Request JSON, e.g. '{"tool": "get_title", "args": {}}'
		request: String,
	},
}

#[derive(Subcommand, Debug)]
pub enum ExtractAction {
	/// Ask an LLM to write a reusable CSS schema for a page
	GenerateSchema {
		url: String,
		/// What the schema should capture
		instruction: String,
		/// Where to save the schema
		#[arg(default_value = "generated_schema.json")]
		output: PathBuf,
	},
	/// Apply a saved schema (no LLM calls)
	UseSchema { url: String, schema: PathBuf },
	/// Apply the built-in body schema (no LLM calls)
	Manual { url: String },
	/// Extract directly with an LLM
	Llm { url: String, instruction: String },
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn batch_extract_flag_accepts_optional_value() {
		let cli = Cli::parse_from(["webscout", "batch", "urls.txt", "--extract"]);
		match cli.command {
			Commands::Batch { extract, .. } => assert_eq!(extract.as_deref(), Some("")),
			other => panic!("unexpected command: {other:?}"),
		}

		let cli = Cli::parse_from(["webscout", "batch", "a.com,b.com", "--extract", "schema.json"]);
		match cli.command {
			Commands::Batch { urls, extract, .. } => {
				assert_eq!(urls, "a.com,b.com");
				assert_eq!(extract.as_deref(), Some("schema.json"));
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn server_call_takes_raw_json() {
		let cli = Cli::parse_from(["webscout", "server", "call", r#"{"cmd": "status"}"#]);
		match cli.command {
			Commands::Server { action: ServerAction::Call { request } } => {
				assert!(request.contains("status"));
			}
			other => panic!("unexpected command: {other:?}"),
		}
	}
}
