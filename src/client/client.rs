// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RPC client: dials a server over the stream-framed transport and
//! completes pending asks by `req_id` as responses arrive off a dedicated
//! read loop. The one-pending-map-keyed-by-req_id design is the design
//! note's prescribed strategy; cancellation and timeout both release the
//! entry so a lost response never leaks it.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, anyhow, bail};
use bytes::Bytes;
use dashmap::DashMap;
use tokio::{
    net::{TcpStream, tcp::OwnedReadHalf, tcp::OwnedWriteHalf},
    sync::{Mutex, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::common::io_with_timeout;
use crate::{
    codec::{c2s, s2c},
    transport::stream_framer,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub io_timeout: Duration,
    pub ask_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { io_timeout: Duration::from_secs(10), ask_timeout: Duration::from_secs(10), heartbeat_interval: Duration::from_secs(20) }
    }
}

/// Invoked for server-initiated pushes, outside any request/response cycle.
pub trait PushHandler: Send + Sync {
    fn on_push(&self, route_id: u32, body: Bytes);
}

pub struct Client {
    writer: Mutex<OwnedWriteHalf>,
    pending: DashMap<u32, oneshot::Sender<Bytes>>,
    next_req_id: AtomicU32,
    config: ClientConfig,
    cancel: CancellationToken,
    push_handler: Option<Arc<dyn PushHandler>>,
}

impl Client {
    pub async fn connect(addr: &str, config: ClientConfig, push_handler: Option<Arc<dyn PushHandler>>) -> Result<Arc<Self>> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();

        let client = Arc::new(Self {
            writer: Mutex::new(write),
            pending: DashMap::new(),
            next_req_id: AtomicU32::new(1),
            config,
            cancel: CancellationToken::new(),
            push_handler,
        });

        let reader = client.clone();
        tokio::spawn(async move {
            if let Err(err) = reader.read_loop(read).await {
                warn!(%err, "client read loop exited");
            }
        });

        let heartbeat = client.clone();
        tokio::spawn(async move {
            heartbeat.heartbeat_loop().await;
        });

        Ok(client)
    }

    fn next_id(&self) -> u32 {
        self.next_req_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn write_frame(&self, body: Bytes) -> Result<()> {
        let mut w = self.writer.lock().await;
        io_with_timeout("write frame", stream_framer::write_frame(&mut *w, &body), self.config.io_timeout, &self.cancel).await
    }

    /// Fire a one-way request; the server never replies.
    pub async fn tell(&self, service_id: u32, route_id: u32, body: &[u8]) -> Result<()> {
        let req_id = self.next_id();
        let frame = c2s::encode_request(service_id, route_id, req_id, true, body);
        self.write_frame(frame).await
    }

    /// Fire a request/response ask and await its reply, or time out. The
    /// pending entry is released on every exit path so a lost response or an
    /// expired deadline never leaks it.
    pub async fn ask(&self, service_id: u32, route_id: u32, body: &[u8]) -> Result<Bytes> {
        let req_id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(req_id, tx);

        let frame = c2s::encode_request(service_id, route_id, req_id, false, body);
        if let Err(err) = self.write_frame(frame).await {
            self.pending.remove(&req_id);
            return Err(err);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.pending.remove(&req_id);
                Err(anyhow!("client shutting down"))
            }
            _ = tokio::time::sleep(self.config.ask_timeout) => {
                self.pending.remove(&req_id);
                Err(anyhow!("ask req_id={req_id} timed out"))
            }
            reply = rx => reply.map_err(|_| anyhow!("ask req_id={req_id} cancelled before a response arrived")),
        }
    }

    pub async fn send_heartbeat(&self) -> Result<()> {
        self.write_frame(c2s::encode_heartbeat()).await
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(err) = self.send_heartbeat().await {
                        warn!(%err, "heartbeat send failed, stopping heartbeat loop");
                        return;
                    }
                }
            }
        }
    }

    async fn read_loop(self: Arc<Self>, mut read: OwnedReadHalf) -> Result<()> {
        loop {
            let raw = tokio::select! {
                _ = self.cancel.cancelled() => bail!("cancelled"),
                frame = stream_framer::read_frame(&mut read) => frame?,
            };

            match s2c::decode(raw) {
                Ok(s2c::S2CFrame::Response { req_id, body }) => {
                    if let Some((_, tx)) = self.pending.remove(&req_id) {
                        let _ = tx.send(body);
                    } else {
                        debug!(req_id, "response for unknown or already-timed-out ask, dropping");
                    }
                },
                Ok(s2c::S2CFrame::Push { route_id, body, .. }) => {
                    if let Some(handler) = &self.push_handler {
                        handler.on_push(route_id, body);
                    }
                },
                Err(err) => {
                    warn!(%err, "malformed server frame, closing connection");
                    bail!(err);
                },
            }
        }
    }

    /// Stops the heartbeat and read loops; dropping each pending sender
    /// wakes its `ask()` with a cancellation error instead of leaking it.
    pub fn close(&self) {
        self.cancel.cancel();
        self.pending.clear();
    }
}
