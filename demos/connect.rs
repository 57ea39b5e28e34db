//! Authorizes against an MCP server and sends one `initialize` request over the
//! authenticated transport.
//!
//! Reads `MCP_SERVER_URL`, `MCP_SERVER_PORT` (optional), and `MCP_SOFTWARE_STATEMENT`.

// std
use std::env;
// crates.io
use color_eyre::{Result, eyre::eyre};
use serde_json::json;
// self
use mcp_oauth_broker::{config::BaseConfig, connection::ConnectionSetup};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let mut config = BaseConfig::new(
		env::var("MCP_SERVER_URL").unwrap_or_else(|_| "https://localhost".into()),
		env::var("MCP_SOFTWARE_STATEMENT")?,
	);

	if let Ok(port) = env::var("MCP_SERVER_PORT") {
		config = config.with_port(port.parse()?);
	}

	let setup = ConnectionSetup::from_base_config(config)?;
	let reply = setup
		.with_connection(|mut streams| async move {
			streams
				.writer
				.send(json!({
					"jsonrpc": "2.0",
					"id": 1,
					"method": "initialize",
					"params": {
						"protocolVersion": "2025-06-18",
						"capabilities": {},
						"clientInfo": { "name": "mcp-oauth-broker-demo", "version": "0.1.0" },
					},
				}))
				.await?;

			let reply = streams.reader.recv().await.ok_or_else(|| eyre!("Session closed early."))??;

			println!("Session id: {:?}.", streams.session_id());

			Ok::<_, color_eyre::Report>(reply)
		})
		.await??;

	println!("{}", serde_json::to_string_pretty(&reply)?);

	Ok(())
}
