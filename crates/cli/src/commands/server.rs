//! `webscout server` subcommands.

use anyhow::anyhow;
use serde_json::Value;
use tracing::debug;

use crate::cli::ServerAction;
use crate::daemon::{self, Daemon, SERVER_PORT};
use crate::error::{CliError, Result};

pub async fn run(action: ServerAction) -> Result<()> {
	match action {
		ServerAction::Start { foreground } => start(foreground).await,
		ServerAction::Stop => relay(&serde_json::json!({"cmd": "stop"})).await,
		ServerAction::Status => relay(&serde_json::json!({"cmd": "status"})).await,
		ServerAction::Call { request } => {
			let request: Value = serde_json::from_str(&request)
				.map_err(|e| CliError::InvalidInput(format!("request is not valid JSON: {e}")))?;
			relay(&request).await
		}
	}
}

async fn relay(request: &Value) -> Result<()> {
	let response = daemon::send_command(request).await;
	println!("{}", serde_json::to_string_pretty(&response)?);
	Ok(())
}

async fn start(foreground: bool) -> Result<()> {
	if let Some(pid) = running_pid() {
		println!("Server already running (PID {pid})");
		return Ok(());
	}

	if foreground {
		let daemon = Daemon::start().await?;
		println!("Server running on port {SERVER_PORT}");
		daemon.run().await?;
		println!("Server stopped");
		return Ok(());
	}

	// Spawn a fresh process rather than forking; the tokio runtime does not
	// survive a fork and stdio stays usable this way.
	let exe = std::env::current_exe()
		.map_err(|e| CliError::Anyhow(anyhow!("failed to resolve executable path: {e}")))?;
	let child = std::process::Command::new(&exe)
		.arg("server")
		.arg("start")
		.arg("--foreground")
		.stdin(std::process::Stdio::null())
		.stdout(std::process::Stdio::null())
		.stderr(std::process::Stdio::null())
		.spawn()
		.map_err(|e| CliError::Anyhow(anyhow!("failed to spawn server: {e}")))?;

	tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

	let response = daemon::send_command(&serde_json::json!({"cmd": "status"})).await;
	if !response.is_success() {
		return Err(CliError::Anyhow(anyhow!("Server failed to start")));
	}
	println!("Server started on port {SERVER_PORT} (PID {})", child.id());
	Ok(())
}

/// The recorded pid, if the file exists and the process is alive. Stale
/// records are discarded.
fn running_pid() -> Option<u32> {
	let path = daemon::pid_file_path();
	let pid = daemon::read_pid_file(&path)?;
	if daemon::pid_alive(pid) {
		return Some(pid);
	}
	debug!(target: "ws.daemon", pid, "discarding stale pid file");
	let _ = std::fs::remove_file(&path);
	None
}
