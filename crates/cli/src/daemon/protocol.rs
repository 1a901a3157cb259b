//! Wire types for the command server.
//!
//! One JSON document per connection in each direction. Requests are either a
//! tool call `{"tool": ..., "args": {...}}` or a control command
//! `{"cmd": "stop" | "status"}`; every request gets exactly one response
//! carrying a `status` tag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Requests larger than this are rejected.
pub const MAX_REQUEST_BYTES: u64 = 65_536;
/// Response cap; generous because `screenshot_base64` returns a full-page
/// PNG inline.
pub const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Request {
	Control {
		cmd: ControlCmd,
	},
	Call {
		tool: String,
		#[serde(default)]
		args: Value,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCmd {
	Stop,
	Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
	Success,
	Error,
	AlreadyRunning,
	NotRunning,
}

/// A single response document. Operation payloads (`url`, `title`, `text`,
/// `result`, ...) ride in `fields` and serialize at the top level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	pub status: Status,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}

impl Response {
	pub fn success() -> Self {
		Self { status: Status::Success, message: None, fields: Map::new() }
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self {
			status: Status::Error,
			message: Some(message.into()),
			fields: Map::new(),
		}
	}

	pub fn already_running() -> Self {
		Self { status: Status::AlreadyRunning, message: None, fields: Map::new() }
	}

	pub fn not_running() -> Self {
		Self { status: Status::NotRunning, message: None, fields: Map::new() }
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}

	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.fields.insert(key.into(), value.into());
		self
	}

	pub fn is_success(&self) -> bool {
		self.status == Status::Success
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn control_and_call_requests_parse() {
		let stop: Request = serde_json::from_value(json!({"cmd": "stop"})).unwrap();
		assert!(matches!(stop, Request::Control { cmd: ControlCmd::Stop }));

		let call: Request =
			serde_json::from_value(json!({"tool": "navigate", "args": {"url": "https://example.com"}}))
				.unwrap();
		match call {
			Request::Call { tool, args } => {
				assert_eq!(tool, "navigate");
				assert_eq!(args["url"], "https://example.com");
			}
			other => panic!("expected call, got {other:?}"),
		}
	}

	#[test]
	fn call_without_args_defaults_to_null() {
		let call: Request = serde_json::from_value(json!({"tool": "get_url"})).unwrap();
		match call {
			Request::Call { tool, args } => {
				assert_eq!(tool, "get_url");
				assert!(args.is_null());
			}
			other => panic!("expected call, got {other:?}"),
		}
	}

	#[test]
	fn unknown_cmd_is_a_parse_error() {
		assert!(serde_json::from_value::<Request>(json!({"cmd": "restart"})).is_err());
	}

	#[test]
	fn response_fields_flatten_to_top_level() {
		let response = Response::success()
			.with("url", "https://example.com/")
			.with("title", "Example Domain");
		let value = serde_json::to_value(&response).unwrap();
		assert_eq!(value["status"], "success");
		assert_eq!(value["title"], "Example Domain");
		assert!(value.get("message").is_none());
		assert!(value.get("fields").is_none());
	}

	#[test]
	fn status_tags_are_snake_case() {
		assert_eq!(
			serde_json::to_value(Status::AlreadyRunning).unwrap(),
			json!("already_running")
		);
		assert_eq!(serde_json::to_value(Status::NotRunning).unwrap(), json!("not_running"));
	}
}
