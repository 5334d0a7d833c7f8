// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Demo client binary: dials a server, sends one ask and one tell, and
//! prints the ask's response before exiting.

use anyhow::Result;
use clap::Parser;
use sync_relay::{
    cfg::logger,
    client::{Client, ClientConfig},
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Address of the server's TCP listener, host:port.
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    addr: String,

    /// Message body sent on both the ask and the tell route.
    #[arg(short, long, default_value = "hello")]
    message: String,

    /// Path to the logger's YAML config file.
    #[arg(short, long, default_value = "logger.yaml")]
    logger: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logger::init_logger(&cli.logger)?;

    let client = Client::connect(&cli.addr, ClientConfig::default(), None).await?;

    let body = serde_json::to_vec(&serde_json::json!({ "msg": cli.message }))?;
    let response = client.ask(0, 1, &body).await?;
    info!(response = %String::from_utf8_lossy(&response), "ask completed");

    client.tell(0, 2, &body).await?;
    info!("tell sent");

    client.close();
    Ok(())
}
