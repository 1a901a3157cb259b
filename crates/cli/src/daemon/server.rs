use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use super::protocol::{ControlCmd, MAX_REQUEST_BYTES, Request, Response};
use super::{pid_file_path, server_addr};
use crate::session::Session;
use crate::tools;

/// The command server: one TCP listener, one browser session, one connection
/// at a time.
pub struct Daemon {
	listener: TcpListener,
	session: Session,
	pid_path: Option<PathBuf>,
}

impl Daemon {
	/// Bind the well-known loopback port and record this process's pid.
	pub async fn start() -> Result<Self> {
		let addr = server_addr();
		let listener = TcpListener::bind(addr)
			.await
			.with_context(|| format!("failed to bind command server: {addr}"))?;

		let pid_path = pid_file_path();
		if let Some(parent) = pid_path.parent() {
			std::fs::create_dir_all(parent)
				.with_context(|| format!("failed to create runtime dir: {}", parent.display()))?;
		}
		std::fs::write(&pid_path, std::process::id().to_string())
			.with_context(|| format!("failed to write pid file: {}", pid_path.display()))?;

		info!(target: "ws.daemon", %addr, pid = std::process::id(), "server listening");
		Ok(Self {
			listener,
			session: Session::new(),
			pid_path: Some(pid_path),
		})
	}

	/// Bind an arbitrary address without a pid file. Used by tests.
	pub async fn bind(addr: SocketAddr) -> Result<Self> {
		let listener = TcpListener::bind(addr)
			.await
			.with_context(|| format!("failed to bind command server: {addr}"))?;
		Ok(Self {
			listener,
			session: Session::new(),
			pid_path: None,
		})
	}

	pub fn local_addr(&self) -> Result<SocketAddr> {
		self.listener.local_addr().context("no local address")
	}

	pub async fn run(self) -> Result<()> {
		self.run_with_ready(None).await
	}

	/// Accept loop. Connections are served inline, one at a time; the single
	/// session admits no concurrent mutation. Exits on `stop` or a signal.
	pub async fn run_with_ready(
		mut self,
		ready: Option<tokio::sync::oneshot::Sender<()>>,
	) -> Result<()> {
		if let Some(tx) = ready {
			let _ = tx.send(());
		}

		loop {
			tokio::select! {
				_ = shutdown_signal() => {
					info!(target: "ws.daemon", "received shutdown signal");
					break;
				}
				accept = self.listener.accept() => {
					let stream = match accept {
						Ok((stream, _)) => stream,
						Err(err) => {
							// Exit through the teardown below so the session
							// closes and the pid file is removed.
							warn!(target: "ws.daemon", error = %err, "accept failed");
							break;
						}
					};
					match self.serve_connection(stream).await {
						Ok(ControlFlow::Continue(())) => {}
						Ok(ControlFlow::Break(())) => break,
						Err(err) => warn!(target: "ws.daemon", error = %err, "connection error"),
					}
				}
			}
		}

		self.session.close().await;
		if let Some(path) = &self.pid_path {
			let _ = std::fs::remove_file(path);
		}
		info!(target: "ws.daemon", "server stopped");
		Ok(())
	}

	async fn serve_connection(&mut self, mut stream: TcpStream) -> Result<ControlFlow<()>> {
		let mut buf = Vec::new();
		(&mut stream)
			.take(MAX_REQUEST_BYTES)
			.read_to_end(&mut buf)
			.await
			.context("failed reading request")?;

		let (response, flow) = match serde_json::from_slice::<Request>(&buf) {
			Ok(request) => self.handle_request(request).await,
			Err(err) => (
				Response::error(format!("Invalid request: {err}")),
				ControlFlow::Continue(()),
			),
		};

		let payload = serde_json::to_vec(&response).context("failed to serialize response")?;
		stream.write_all(&payload).await.context("failed writing response")?;
		stream.shutdown().await.context("failed closing connection")?;
		Ok(flow)
	}

	async fn handle_request(&mut self, request: Request) -> (Response, ControlFlow<()>) {
		match request {
			Request::Control { cmd: ControlCmd::Status } => {
				let response = Response::success()
					.with("running", true)
					.with("browser", self.session.has_browser())
					.with("page", self.session.has_page())
					.with("pid", std::process::id());
				(response, ControlFlow::Continue(()))
			}
			Request::Control { cmd: ControlCmd::Stop } => {
				// The response is written before the loop exits, so the
				// client always hears back.
				self.session.close().await;
				let response = Response::success().with_message("Server stopping");
				(response, ControlFlow::Break(()))
			}
			Request::Call { tool, args } => {
				let response = tools::dispatch(&mut self.session, &tool, args).await;
				(response, ControlFlow::Continue(()))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::daemon::send_command_to;
	use serde_json::json;

	#[tokio::test]
	async fn loop_exit_closes_session_and_removes_pid_file() {
		let dir = tempfile::tempdir().unwrap();
		let pid_path = dir.path().join("webscout-server.pid");
		std::fs::write(&pid_path, std::process::id().to_string()).unwrap();

		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let daemon = Daemon {
			listener,
			session: Session::new(),
			pid_path: Some(pid_path.clone()),
		};
		let server = tokio::spawn(daemon.run());

		let stop = send_command_to(addr, &json!({"cmd": "stop"})).await;
		assert!(stop.is_success());
		server.await.unwrap().unwrap();
		assert!(!pid_path.exists());
	}
}

async fn shutdown_signal() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};

		let sigterm = signal(SignalKind::terminate());
		let sigint = signal(SignalKind::interrupt());
		match (sigterm, sigint) {
			(Ok(mut sigterm), Ok(mut sigint)) => {
				tokio::select! {
					_ = sigterm.recv() => {}
					_ = sigint.recv() => {}
				}
			}
			_ => std::future::pending::<()>().await,
		}
	}

	#[cfg(not(unix))]
	{
		let _ = tokio::signal::ctrl_c().await;
	}
}
