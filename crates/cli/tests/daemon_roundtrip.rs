//! Protocol round trips against a real listener.
//!
//! Control commands and dispatch errors need no browser, so these run the
//! full client/server path over loopback.

use serde_json::json;
use webscout_cli::daemon::protocol::Status;
use webscout_cli::daemon::{Daemon, send_command_to};

#[tokio::test]
async fn status_call_and_stop_round_trip() {
	let daemon = Daemon::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
	let addr = daemon.local_addr().unwrap();
	let server = tokio::spawn(daemon.run());

	// status: no browser yet
	let status = send_command_to(addr, &json!({"cmd": "status"})).await;
	assert_eq!(status.status, Status::Success);
	assert_eq!(status.fields["running"], true);
	assert_eq!(status.fields["browser"], false);
	assert_eq!(status.fields["page"], false);

	// unknown tool never reaches a handler
	let unknown = send_command_to(addr, &json!({"tool": "teleport", "args": {}})).await;
	assert_eq!(unknown.status, Status::Error);
	assert_eq!(unknown.message.as_deref(), Some("Unknown tool: teleport"));

	// close with nothing running
	let close = send_command_to(addr, &json!({"tool": "close", "args": {}})).await;
	assert_eq!(close.status, Status::NotRunning);

	// page-scoped tool before any launch
	let title = send_command_to(addr, &json!({"tool": "get_title", "args": {}})).await;
	assert_eq!(title.status, Status::Error);
	assert_eq!(title.message.as_deref(), Some("No page open"));

	// malformed JSON becomes an error response, not a dropped connection
	let bad = send_command_to(addr, &json!({"cmd": "restart"})).await;
	assert_eq!(bad.status, Status::Error);
	assert!(bad.message.unwrap().contains("Invalid request"));

	// stop: the client hears back, then the accept loop exits
	let stop = send_command_to(addr, &json!({"cmd": "stop"})).await;
	assert_eq!(stop.status, Status::Success);
	assert_eq!(stop.message.as_deref(), Some("Server stopping"));
	server.await.unwrap().unwrap();

	// after stop the port refuses connections
	let after = send_command_to(addr, &json!({"cmd": "status"})).await;
	assert_eq!(after.status, Status::Error);
	assert!(after.message.unwrap().contains("Server not running"));
}

#[tokio::test]
async fn requests_are_served_sequentially_across_connections() {
	let daemon = Daemon::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
	let addr = daemon.local_addr().unwrap();
	let server = tokio::spawn(daemon.run());

	// Several one-shot clients in a row; each must get its own response.
	for _ in 0..5 {
		let status = send_command_to(addr, &json!({"cmd": "status"})).await;
		assert_eq!(status.status, Status::Success);
	}

	let stop = send_command_to(addr, &json!({"cmd": "stop"})).await;
	assert_eq!(stop.status, Status::Success);
	server.await.unwrap().unwrap();
}
