// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Demo server binary: registers a couple of routes, starts whichever
//! listeners the config names, and serves until interrupted.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sync_relay::{
    cfg::{cli::Cli, config::Config, logger},
    codec::c2s,
    net::{Connection, FrameReader, tcp, udp, ws},
    router::Registry,
    service::{PluginChain, Service, stop_handler},
};
use tracing::{debug, info, warn};

#[derive(serde::Serialize, serde::Deserialize)]
struct EchoRequest {
    msg: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct EchoResponse {
    msg: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct LogRequest {
    msg: String,
}

fn build_registry() -> Registry {
    let registry = Registry::new();
    registry
        .ask(1, |_ctx, req: EchoRequest| async move { EchoResponse { msg: req.msg } })
        .expect("route 1 registered once at startup");
    registry
        .tell(2, |_ctx, req: LogRequest| async move {
            info!(msg = %req.msg, "tell route 2 received");
        })
        .expect("route 2 registered once at startup");
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logger::init_logger(&cli.logger)?;

    let config = Config::load_from_file(&cli.config)?;
    info!(service_id = config.service.service_id, "starting service");

    let service = Service::new(
        config.service.service_id,
        build_registry(),
        (&config.service.session).into(),
        None,
        PluginChain::new(),
        (&config.service.writer_pool).into(),
    );

    if let Some(hp) = &config.service.listeners.tcp {
        let mut listener = tcp::Listener::new();
        listener.listen(&hp.host, hp.port).await?;
        spawn_tcp_like_accept_loop(service.clone(), listener, "tcp");
    }
    if let Some(hp) = &config.service.listeners.websocket {
        let mut listener = ws::Listener::new();
        listener.listen(&hp.host, hp.port).await?;
        spawn_ws_accept_loop(service.clone(), listener);
    }
    if let Some(hp) = &config.service.listeners.udp {
        let mut listener = udp::Listener::new();
        listener.listen(&hp.host, hp.port).await?;
        spawn_udp_accept_loop(service.clone(), listener);
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    service.stop().await;
    Ok(())
}

fn spawn_tcp_like_accept_loop(service: Arc<Service>, listener: tcp::Listener, label: &'static str) {
    tokio::spawn(async move {
        loop {
            match listener.accept(stop_handler(&service)).await {
                Ok(accepted) => {
                    tokio::spawn(handle_connection(service.clone(), accepted.reader, accepted.conn));
                },
                Err(err) => {
                    warn!(%err, label, "accept loop ended");
                    break;
                },
            }
        }
    });
}

fn spawn_ws_accept_loop(service: Arc<Service>, listener: ws::Listener) {
    tokio::spawn(async move {
        loop {
            match listener.accept(stop_handler(&service)).await {
                Ok(accepted) => {
                    tokio::spawn(handle_connection(service.clone(), accepted.reader, accepted.conn));
                },
                Err(err) => {
                    warn!(%err, "ws accept loop ended");
                    break;
                },
            }
        }
    });
}

fn spawn_udp_accept_loop(service: Arc<Service>, mut listener: udp::Listener) {
    tokio::spawn(async move {
        loop {
            match listener.accept(stop_handler(&service)).await {
                Ok(accepted) => {
                    tokio::spawn(handle_connection(service.clone(), accepted.reader, accepted.conn));
                },
                Err(err) => {
                    warn!(%err, "udp accept loop ended");
                    break;
                },
            }
        }
    });
}

async fn handle_connection(service: Arc<Service>, mut reader: Box<dyn FrameReader>, conn: Arc<dyn Connection>) {
    service.on_conn_start(conn.clone());
    loop {
        let raw = match reader.read_frame().await {
            Ok(raw) => raw,
            Err(err) => {
                debug!(conn_id = conn.id(), %err, "read loop ended");
                break;
            },
        };
        let frame = match c2s::decode(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(conn_id = conn.id(), %err, "malformed frame, closing connection");
                break;
            },
        };
        if let Err(err) = service.on_frame(conn.id(), frame).await {
            warn!(conn_id = conn.id(), %err, "frame dispatch failed, closing connection");
            break;
        }
    }
    conn.close();
}
