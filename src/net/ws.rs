// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! WebSocket transport bound to path `/ws`, matching the `/ws` HTTP mux
//! route of the source listener this crate replaces. Each binary message is
//! already delimited by the WebSocket framing, so only the
//! [`MAX_PACKET_LEN`] ceiling is enforced post-decode.

use std::sync::{
    Arc, Weak,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use tokio::{net::TcpListener as TokioTcpListener, net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
        http,
    },
};

use super::{
    conn::{Accepted, ConnStopHandler, Connection, FrameReader},
    conn_id,
    error::ListenerError,
};
use crate::transport::{TransportError, message_framer};

fn check_ws_path(req: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if req.uri().path() == "/ws" {
        Ok(response)
    } else {
        let body = Some("expected path /ws".to_string());
        Err(http::Response::builder()
            .status(http::StatusCode::NOT_FOUND)
            .body(body)
            .expect("valid error response"))
    }
}

pub struct Conn {
    id: u32,
    remote_addr: String,
    writer: Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>,
    closed: AtomicBool,
    stop_handler: Weak<dyn ConnStopHandler>,
}

#[async_trait]
impl Connection for Conn {
    fn id(&self) -> u32 {
        self.id
    }

    fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    async fn write(&self, buf: &[u8]) -> Result<(), TransportError> {
        message_framer::validate_len(buf.len())?;
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection closed",
            )));
        }
        let mut w = self.writer.lock().await;
        w.send(Message::Binary(buf.to_vec().into()))
            .await
            .map_err(|e| TransportError::Io(std::io::Error::other(e.to_string())))
    }

    fn close(&self) {
        if self.closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            if let Some(handler) = self.stop_handler.upgrade() {
                handler.on_conn_stop(self.id);
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

pub struct FrameReaderImpl {
    read: SplitStream<WebSocketStream<TcpStream>>,
}

#[async_trait]
impl FrameReader for FrameReaderImpl {
    async fn read_frame(&mut self) -> Result<Bytes, TransportError> {
        loop {
            let msg = self
                .read
                .next()
                .await
                .ok_or_else(|| TransportError::Io(std::io::Error::new(std::io::ErrorKind::NotConnected, "ws peer closed")))?
                .map_err(|e| TransportError::Io(std::io::Error::other(e.to_string())))?;

            match msg {
                Message::Binary(data) => {
                    message_framer::validate_len(data.len())?;
                    return Ok(Bytes::from(data.to_vec()));
                },
                Message::Close(_) => {
                    return Err(TransportError::Io(std::io::Error::new(std::io::ErrorKind::NotConnected, "ws closed")));
                },
                _ => continue,
            }
        }
    }
}

pub struct Listener {
    inner: Option<TokioTcpListener>,
}

impl Listener {
    pub fn new() -> Self {
        Self { inner: None }
    }

    pub async fn listen(&mut self, host: &str, port: u16) -> Result<(), ListenerError> {
        let addr = format!("{host}:{port}");
        let ln = TokioTcpListener::bind(&addr).await?;
        tracing::info!(%addr, "ws listener started");
        self.inner = Some(ln);
        Ok(())
    }

    pub async fn accept(&self, stop_handler: Weak<dyn ConnStopHandler>) -> Result<Accepted, ListenerError> {
        let ln = self.inner.as_ref().ok_or(ListenerError::Closed)?;
        let (stream, addr) = ln.accept().await?;
        stream.set_nodelay(true).ok();

        let ws = accept_hdr_async(stream, check_ws_path)
            .await
            .map_err(|e| ListenerError::Io(std::io::Error::other(e.to_string())))?;
        let (write, read) = ws.split();

        let conn = Arc::new(Conn {
            id: conn_id::next_id(),
            remote_addr: addr.to_string(),
            writer: Mutex::new(write),
            closed: AtomicBool::new(false),
            stop_handler,
        });
        let reader = Box::new(FrameReaderImpl { read });
        Ok(Accepted { conn, reader })
    }

    pub async fn close(&mut self) {
        self.inner.take();
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}
