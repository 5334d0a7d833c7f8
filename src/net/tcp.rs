// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Stream-framed TCP transport: one [`Conn`] per accepted socket, length
//! prefixed via [`crate::transport::stream_framer`].

use std::sync::{
    Arc, Weak,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{
    net::{
        TcpListener as TokioTcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
};

use super::{
    conn::{Accepted, ConnStopHandler, Connection, FrameReader},
    conn_id,
    error::ListenerError,
};
use crate::transport::{TransportError, stream_framer};

pub struct Conn {
    id: u32,
    remote_addr: String,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
    stop_handler: Weak<dyn ConnStopHandler>,
}

impl Conn {
    fn new(writer: OwnedWriteHalf, remote_addr: String, stop_handler: Weak<dyn ConnStopHandler>) -> Self {
        Self { id: conn_id::next_id(), remote_addr, writer: Mutex::new(writer), closed: AtomicBool::new(false), stop_handler }
    }
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
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection closed",
            )));
        }
        let mut w = self.writer.lock().await;
        stream_framer::write_frame(&mut *w, buf).await
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
    read: OwnedReadHalf,
}

#[async_trait]
impl FrameReader for FrameReaderImpl {
    async fn read_frame(&mut self) -> Result<Bytes, TransportError> {
        stream_framer::read_frame(&mut self.read).await
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
        tracing::info!(%addr, "tcp listener started");
        self.inner = Some(ln);
        Ok(())
    }

    /// The bound address, useful when `listen` was called with port 0.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.inner.as_ref().and_then(|ln| ln.local_addr().ok())
    }

    pub async fn accept(&self, stop_handler: Weak<dyn ConnStopHandler>) -> Result<Accepted, ListenerError> {
        let ln = self.inner.as_ref().ok_or(ListenerError::Closed)?;
        let (stream, addr) = ln.accept().await?;
        stream.set_nodelay(true).ok();
        let (read, write) = stream.into_split();
        let conn = Arc::new(Conn::new(write, addr.to_string(), stop_handler));
        let reader = Box::new(FrameReaderImpl { read });
        Ok(Accepted { conn, reader })
    }

    pub async fn close(&mut self) {
        if let Some(ln) = self.inner.take() {
            drop(ln);
        }
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering as O};

    use super::*;

    struct CountingStopHandler(AtomicU32);

    impl ConnStopHandler for CountingStopHandler {
        fn on_conn_stop(&self, _conn_id: u32) {
            self.0.fetch_add(1, O::SeqCst);
        }
    }

    #[tokio::test]
    async fn accept_roundtrips_a_frame() {
        let mut listener = Listener::new();
        listener.listen("127.0.0.1", 0).await.unwrap();
        let addr = listener.inner.as_ref().unwrap().local_addr().unwrap();

        let stop = Arc::new(CountingStopHandler(AtomicU32::new(0)));
        let server_task = {
            let stop = Arc::downgrade(&(stop.clone() as Arc<dyn ConnStopHandler>));
            tokio::spawn(async move {
                let accepted = listener.accept(stop).await.unwrap();
                let mut reader = accepted.reader;
                let frame = reader.read_frame().await.unwrap();
                assert_eq!(&frame[..], b"ping");
                accepted.conn.write(b"pong").await.unwrap();
            })
        };

        let mut client = TcpStream::connect(addr).await.unwrap();
        stream_framer::write_frame(&mut client, b"ping").await.unwrap();
        let reply = stream_framer::read_frame(&mut client).await.unwrap();
        assert_eq!(&reply[..], b"pong");

        server_task.await.unwrap();
    }

    #[test]
    fn close_is_idempotent() {
        let handler = Arc::new(CountingStopHandler(AtomicU32::new(0)));
        let weak: Weak<dyn ConnStopHandler> = Arc::downgrade(&(handler.clone() as Arc<dyn ConnStopHandler>));
        // Constructing a Conn requires a live writer half; exercised instead
        // via the AtomicBool CAS directly, mirroring tcp.Conn.Close's guard.
        let closed = AtomicBool::new(false);
        assert!(closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok());
        assert!(closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err());
        drop(weak);
        drop(handler);
    }
}
