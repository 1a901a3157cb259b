pub mod protocol;
mod server;

use std::net::SocketAddr;
use std::path::PathBuf;

pub use server::Daemon;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use protocol::{MAX_RESPONSE_BYTES, Response};

pub const SERVER_PORT: u16 = 19333;

pub fn server_addr() -> SocketAddr {
	SocketAddr::from(([127, 0, 0, 1], SERVER_PORT))
}

/// Liveness record path for the server process.
///
/// Uses `$XDG_RUNTIME_DIR` when available (already user-permissioned),
/// otherwise falls back to the temp dir.
pub fn pid_file_path() -> PathBuf {
	if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
		return PathBuf::from(xdg_runtime).join("webscout-server.pid");
	}
	std::env::temp_dir().join("webscout-server.pid")
}

pub fn read_pid_file(path: &std::path::Path) -> Option<u32> {
	std::fs::read_to_string(path).ok()?.trim().parse::<u32>().ok()
}

/// Signal-0 liveness probe for a recorded pid.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
	unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
	// No cheap probe available; callers fall back to connecting.
	true
}

/// Send one request to the command server. One connection per call, no
/// retries; every failure comes back as an error [`Response`].
pub async fn send_command(request: &Value) -> Response {
	send_command_to(server_addr(), request).await
}

pub async fn send_command_to(addr: SocketAddr, request: &Value) -> Response {
	let stream = match TcpStream::connect(addr).await {
		Ok(stream) => stream,
		Err(err) if is_not_running(&err) => {
			return Response::error("Server not running. Start with: webscout server start");
		}
		Err(err) => return Response::error(format!("Connection to {addr} failed: {err}")),
	};
	match exchange(stream, request).await {
		Ok(response) => response,
		Err(err) => {
			debug!(target: "ws.daemon", error = %err, "request exchange failed");
			Response::error(err.to_string())
		}
	}
}

async fn exchange(mut stream: TcpStream, request: &Value) -> anyhow::Result<Response> {
	use anyhow::Context;

	let payload = serde_json::to_vec(request).context("failed to serialize request")?;
	stream.write_all(&payload).await.context("failed writing request")?;
	// Half-close so the server sees EOF; the frame is connection-delimited.
	stream.shutdown().await.context("failed closing write half")?;

	let mut buf = Vec::new();
	stream
		.take(MAX_RESPONSE_BYTES)
		.read_to_end(&mut buf)
		.await
		.context("failed reading response")?;
	let response = serde_json::from_slice(&buf).context("failed parsing response")?;
	Ok(response)
}

fn is_not_running(err: &std::io::Error) -> bool {
	matches!(
		err.kind(),
		std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[tokio::test]
	async fn refused_connection_becomes_not_running_error() {
		// Grab a free port, then close the listener so connects are refused.
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		let addr = listener.local_addr().unwrap();
		drop(listener);

		let response = send_command_to(addr, &json!({"cmd": "status"})).await;
		assert_eq!(response.status, protocol::Status::Error);
		let message = response.message.unwrap();
		assert!(message.contains("Server not running"), "got: {message}");
		assert!(message.contains("webscout server start"));
	}

	#[tokio::test]
	async fn large_responses_fit_in_the_response_cap() {
		// Base64 screenshots routinely exceed 64 KiB; the response cap must
		// not truncate them into parse errors.
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			let (mut stream, _) = listener.accept().await.unwrap();
			let mut buf = Vec::new();
			stream.read_to_end(&mut buf).await.unwrap();
			let response = Response::success().with("base64", "A".repeat(200_000));
			stream.write_all(&serde_json::to_vec(&response).unwrap()).await.unwrap();
			stream.shutdown().await.unwrap();
		});

		let response = send_command_to(addr, &json!({"tool": "screenshot_base64"})).await;
		assert_eq!(response.status, protocol::Status::Success);
		assert_eq!(response.fields["base64"].as_str().unwrap().len(), 200_000);
	}

	#[test]
	fn pid_file_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("webscout-server.pid");
		assert_eq!(read_pid_file(&path), None);

		std::fs::write(&path, "12345\n").unwrap();
		assert_eq!(read_pid_file(&path), Some(12345));

		std::fs::write(&path, "not a pid").unwrap();
		assert_eq!(read_pid_file(&path), None);
	}

	#[cfg(unix)]
	#[test]
	fn own_pid_is_alive() {
		assert!(pid_alive(std::process::id()));
	}
}
