//! `webscout exec`: one-shot tool execution without the server.
//!
//! Useful for scripting against localhost targets where a persistent session
//! is overkill. The browser lives only as long as the process.

use serde_json::Value;

use crate::error::{CliError, Result};
use crate::session::Session;
use crate::tools;

pub async fn run(list: bool, call: Option<String>) -> Result<()> {
	if list {
		println!("{}", serde_json::to_string_pretty(&tools::registry_json())?);
		return Ok(());
	}

	let Some(call) = call else {
		return Err(CliError::InvalidInput(
			"pass --list or --call '{\"tool\": ..., \"args\": {...}}'".to_string(),
		));
	};

	let request: Value = serde_json::from_str(&call)
		.map_err(|e| CliError::InvalidInput(format!("Invalid JSON: {e}")))?;
	let tool = request
		.get("tool")
		.and_then(Value::as_str)
		.ok_or_else(|| CliError::InvalidInput("call JSON needs a \"tool\" field".to_string()))?
		.to_string();
	let args = request.get("args").cloned().unwrap_or(Value::Null);

	let mut session = Session::new();
	let response = tools::dispatch(&mut session, &tool, args).await;
	println!("{}", serde_json::to_string_pretty(&response)?);
	session.close().await;
	Ok(())
}
