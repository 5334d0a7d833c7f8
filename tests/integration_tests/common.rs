// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::Result;
use sync_relay::{
    codec::c2s,
    net::{Connection, FrameReader, tcp},
    router::Registry,
    service::{PluginChain, Service, WriterPoolConfig, stop_handler},
    session::ManagerConfig,
};

pub const TEST_SERVICE_ID: u32 = 1;

/// Binds a `tcp::Listener` on an ephemeral port, wires it to `service`, and
/// spawns the accept loop. Returns the bound address clients should dial.
pub async fn spawn_server(service: Arc<Service>) -> Result<String> {
    let mut listener = tcp::Listener::new();
    listener.listen("127.0.0.1", 0).await?;
    let addr = listener.local_addr().expect("listener is bound").to_string();

    tokio::spawn(async move {
        loop {
            match listener.accept(stop_handler(&service)).await {
                Ok(accepted) => {
                    tokio::spawn(handle_connection(service.clone(), accepted.reader, accepted.conn));
                },
                Err(_) => break,
            }
        }
    });

    Ok(addr)
}

async fn handle_connection(service: Arc<Service>, mut reader: Box<dyn FrameReader>, conn: Arc<dyn Connection>) {
    service.on_conn_start(conn.clone());
    loop {
        let raw = match reader.read_frame().await {
            Ok(raw) => raw,
            Err(_) => break,
        };
        let frame = match c2s::decode(raw) {
            Ok(frame) => frame,
            Err(_) => break,
        };
        if service.on_frame(conn.id(), frame).await.is_err() {
            break;
        }
    }
    conn.close();
}

/// A `Service` with the given registry and session config, under
/// `TEST_SERVICE_ID`, a one-worker writer pool, and no plugins.
pub fn build_service(registry: Registry, session_config: ManagerConfig) -> Arc<Service> {
    Service::new(
        TEST_SERVICE_ID,
        registry,
        session_config,
        None,
        PluginChain::new(),
        WriterPoolConfig { worker_count: 1, queue_size: 16, ..Default::default() },
    )
}
