//! The tool registry and dispatcher.
//!
//! Tools are a closed set: a serde-tagged enum dispatched through a static
//! table. Unknown names never reach a handler, and argument problems surface
//! as error responses carrying the deserialization failure.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::daemon::protocol::Response;
use crate::session::{CloseOutcome, Session, StartOutcome};

pub struct ToolSpec {
	pub name: &'static str,
	pub description: &'static str,
	pub args: &'static str,
}

pub const TOOLS: &[ToolSpec] = &[
	ToolSpec {
		name: "launch",
		description: "Launch the stealth browser",
		args: "headless (bool, default false)",
	},
	ToolSpec {
		name: "close",
		description: "Close the browser",
		args: "",
	},
	ToolSpec {
		name: "navigate",
		description: "Navigate to a URL (launches the browser if needed)",
		args: "url (string, required)",
	},
	ToolSpec {
		name: "screenshot",
		description: "Save a screenshot to a file",
		args: "path (string, default screenshot.png), full_page (bool, default false)",
	},
	ToolSpec {
		name: "screenshot_base64",
		description: "Return a screenshot as base64 PNG",
		args: "full_page (bool, default false)",
	},
	ToolSpec {
		name: "click",
		description: "Click the first element matching a selector",
		args: "selector (string, required)",
	},
	ToolSpec {
		name: "type",
		description: "Clear a field and type text into it",
		args: "selector (string, required), text (string, required)",
	},
	ToolSpec {
		name: "get_text",
		description: "Read the text content of an element",
		args: "selector (string, required)",
	},
	ToolSpec {
		name: "wait_for",
		description: "Wait for an element to appear",
		args: "selector (string, required), timeout (ms, default 10000)",
	},
	ToolSpec {
		name: "get_url",
		description: "Current page URL",
		args: "",
	},
	ToolSpec {
		name: "get_title",
		description: "Current page title",
		args: "",
	},
	ToolSpec {
		name: "evaluate",
		description: "Evaluate JavaScript on the page and return the result",
		args: "script (string, required)",
	},
];

#[derive(Debug, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
enum ToolCall {
	Launch {
		#[serde(default)]
		headless: bool,
	},
	Close {},
	Navigate {
		url: String,
	},
	Screenshot {
		#[serde(default = "default_screenshot_path")]
		path: String,
		#[serde(default)]
		full_page: bool,
	},
	ScreenshotBase64 {
		#[serde(default)]
		full_page: bool,
	},
	Click {
		selector: String,
	},
	Type {
		selector: String,
		text: String,
	},
	GetText {
		selector: String,
	},
	WaitFor {
		selector: String,
		#[serde(default = "default_wait_timeout")]
		timeout: u64,
	},
	GetUrl {},
	GetTitle {},
	Evaluate {
		script: String,
	},
}

fn default_screenshot_path() -> String {
	"screenshot.png".to_string()
}

fn default_wait_timeout() -> u64 {
	crate::session::ELEMENT_TIMEOUT_MS
}

/// Registry listing for `exec --list`.
pub fn registry_json() -> Value {
	Value::Array(
		TOOLS
			.iter()
			.map(|tool| {
				json!({
					"name": tool.name,
					"description": tool.description,
					"args": tool.args,
				})
			})
			.collect(),
	)
}

/// Run one named tool against the session. Always returns a response; never
/// panics and never tears the session down on failure.
pub async fn dispatch(session: &mut Session, tool: &str, args: Value) -> Response {
	if !TOOLS.iter().any(|spec| spec.name == tool) {
		return Response::error(format!("Unknown tool: {tool}"));
	}
	let args = if args.is_null() { json!({}) } else { args };
	let call = match serde_json::from_value::<ToolCall>(json!({"tool": tool, "args": args})) {
		Ok(call) => call,
		Err(err) => return Response::error(format!("Invalid arguments for {tool}: {err}")),
	};
	execute(session, call).await
}

async fn execute(session: &mut Session, call: ToolCall) -> Response {
	match call {
		ToolCall::Launch { headless } => match session.start(headless).await {
			Ok(StartOutcome::Launched) => Response::success().with_message("Browser launched"),
			Ok(StartOutcome::AlreadyRunning) => Response::already_running(),
			Err(err) => Response::error(err.to_string()),
		},
		ToolCall::Close {} => match session.close().await {
			CloseOutcome::Closed => Response::success(),
			CloseOutcome::Idle => Response::not_running(),
		},
		ToolCall::Navigate { url } => match session.navigate(&url).await {
			Ok((url, title)) => Response::success().with("url", url).with("title", title),
			Err(err) => Response::error(err.to_string()),
		},
		ToolCall::Screenshot { path, full_page } => {
			match session.screenshot(&path, full_page).await {
				Ok(path) => Response::success().with("path", path),
				Err(err) => Response::error(err.to_string()),
			}
		}
		ToolCall::ScreenshotBase64 { full_page } => {
			match session.screenshot_base64(full_page).await {
				Ok(data) => Response::success().with("base64", data),
				Err(err) => Response::error(err.to_string()),
			}
		}
		ToolCall::Click { selector } => match session.click(&selector).await {
			Ok(()) => Response::success(),
			Err(err) => Response::error(err.to_string()),
		},
		ToolCall::Type { selector, text } => match session.type_text(&selector, &text).await {
			Ok(()) => Response::success(),
			Err(err) => Response::error(err.to_string()),
		},
		ToolCall::GetText { selector } => match session.text_content(&selector).await {
			Ok(text) => Response::success().with("text", text),
			Err(err) => Response::error(err.to_string()),
		},
		ToolCall::WaitFor { selector, timeout } => {
			match session.wait_for(&selector, timeout).await {
				Ok(()) => Response::success().with("selector", selector),
				Err(err) => Response::error(err.to_string()),
			}
		}
		ToolCall::GetUrl {} => match session.current_url().await {
			Ok(url) => Response::success().with("url", url),
			Err(err) => Response::error(err.to_string()),
		},
		ToolCall::GetTitle {} => match session.title().await {
			Ok(title) => Response::success().with("title", title),
			Err(err) => Response::error(err.to_string()),
		},
		ToolCall::Evaluate { script } => match session.evaluate(&script).await {
			Ok(result) => Response::success().with("result", result),
			Err(err) => Response::error(err.to_string()),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::daemon::protocol::Status;

	#[tokio::test]
	async fn unknown_tool_is_rejected_by_name() {
		let mut session = Session::new();
		let response = dispatch(&mut session, "teleport", json!({})).await;
		assert_eq!(response.status, Status::Error);
		assert_eq!(response.message.as_deref(), Some("Unknown tool: teleport"));
	}

	#[tokio::test]
	async fn missing_required_arg_is_an_error_response() {
		let mut session = Session::new();
		let response = dispatch(&mut session, "navigate", json!({})).await;
		assert_eq!(response.status, Status::Error);
		let message = response.message.unwrap();
		assert!(message.contains("Invalid arguments for navigate"), "got: {message}");
		assert!(message.contains("url"));
	}

	#[tokio::test]
	async fn null_args_are_treated_as_empty() {
		let mut session = Session::new();
		let response = dispatch(&mut session, "close", Value::Null).await;
		assert_eq!(response.status, Status::NotRunning);
	}

	#[tokio::test]
	async fn page_tools_before_launch_report_no_page() {
		let mut session = Session::new();
		for tool in ["get_url", "get_title", "screenshot_base64"] {
			let response = dispatch(&mut session, tool, json!({})).await;
			assert_eq!(response.status, Status::Error, "tool {tool}");
			assert_eq!(response.message.as_deref(), Some("No page open"), "tool {tool}");
		}
	}

	#[test]
	fn registry_names_match_dispatchable_set() {
		let names: Vec<&str> = TOOLS.iter().map(|t| t.name).collect();
		assert_eq!(names.len(), 12);
		for name in ["launch", "type", "screenshot_base64", "wait_for", "evaluate"] {
			assert!(names.contains(&name), "missing {name}");
		}
		let listing = registry_json();
		assert_eq!(listing.as_array().unwrap().len(), names.len());
	}

	#[test]
	fn extra_args_are_ignored() {
		let call = serde_json::from_value::<ToolCall>(
			json!({"tool": "click", "args": {"selector": "#go", "bogus": 1}}),
		);
		assert!(call.is_ok());
	}
}
