// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Datagram-reliable UDP transport. Stands in for the source's `kcp`
//! listener slot (no raw KCP port is available in the crate ecosystem the
//! pack surfaces): sequence-numbered datagrams, ACKed by the peer, resent on
//! a timer until acknowledged. The framing contract (length-delimited,
//! [`crate::transport::stream_framer::MAX_PACKET_LEN`]-capped) matches the
//! TCP adapter so C7 never special-cases the transport.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::{net::UdpSocket, sync::mpsc, task::JoinHandle};

use super::{
    conn::{Accepted, ConnStopHandler, Connection, FrameReader},
    conn_id,
    error::ListenerError,
};
use crate::transport::{TransportError, stream_framer::MAX_PACKET_LEN};

const TAG_DATA: u8 = 0;
const TAG_ACK: u8 = 1;
const HEADER_LEN: usize = 9;
const RESEND_INTERVAL: Duration = Duration::from_millis(200);
const MAX_RETRIES: u32 = 10;
const PEER_CHANNEL_DEPTH: usize = 256;

struct Pending {
    datagram: Bytes,
    sent_at: Instant,
    tries: u32,
}

struct ConnShared {
    addr: SocketAddr,
    socket: Arc<UdpSocket>,
    next_seq: AtomicU32,
    /// Highest delivered sequence number, or `-1` if nothing has been
    /// delivered yet — `seq` is `u32` so `0` cannot double as "none".
    last_delivered: AtomicI64,
    pending: DashMap<u32, Pending>,
    incoming_tx: mpsc::Sender<Bytes>,
}

fn encode_data(seq: u32, body: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.push(TAG_DATA);
    out.extend_from_slice(&seq.to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    Bytes::from(out)
}

fn encode_ack(seq: u32) -> [u8; 5] {
    let mut out = [0u8; 5];
    out[0] = TAG_ACK;
    out[1..5].copy_from_slice(&seq.to_be_bytes());
    out
}

pub struct Conn {
    id: u32,
    remote_addr: String,
    shared: Arc<ConnShared>,
    peers: Arc<DashMap<SocketAddr, Arc<ConnShared>>>,
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
        if buf.is_empty() || buf.len() > MAX_PACKET_LEN {
            return Err(TransportError::BadLength(buf.len()));
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection closed",
            )));
        }

        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let datagram = encode_data(seq, buf);
        self.shared.pending.insert(seq, Pending { datagram: datagram.clone(), sent_at: Instant::now(), tries: 0 });
        self.shared.socket.send_to(&datagram, self.shared.addr).await?;
        Ok(())
    }

    fn close(&self) {
        if self.closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            self.peers.remove(&self.shared.addr);
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
    rx: mpsc::Receiver<Bytes>,
}

#[async_trait]
impl FrameReader for FrameReaderImpl {
    async fn read_frame(&mut self) -> Result<Bytes, TransportError> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| TransportError::Io(std::io::Error::new(std::io::ErrorKind::NotConnected, "udp peer closed")))
    }
}

type NewPeer = (SocketAddr, Arc<ConnShared>, mpsc::Receiver<Bytes>);

pub struct Listener {
    socket: Option<Arc<UdpSocket>>,
    peers: Arc<DashMap<SocketAddr, Arc<ConnShared>>>,
    new_peers_rx: Option<mpsc::Receiver<NewPeer>>,
    recv_task: Option<JoinHandle<()>>,
    resend_task: Option<JoinHandle<()>>,
}

impl Listener {
    pub fn new() -> Self {
        Self { socket: None, peers: Arc::new(DashMap::new()), new_peers_rx: None, recv_task: None, resend_task: None }
    }

    pub async fn listen(&mut self, host: &str, port: u16) -> Result<(), ListenerError> {
        let addr = format!("{host}:{port}");
        let socket = Arc::new(UdpSocket::bind(&addr).await?);
        tracing::info!(%addr, "udp listener started");

        let (new_peers_tx, new_peers_rx) = mpsc::channel(64);
        self.recv_task = Some(tokio::spawn(recv_loop(socket.clone(), self.peers.clone(), new_peers_tx)));
        self.resend_task = Some(tokio::spawn(resend_loop(self.peers.clone())));
        self.socket = Some(socket);
        self.new_peers_rx = Some(new_peers_rx);
        Ok(())
    }

    pub async fn accept(&mut self, stop_handler: Weak<dyn ConnStopHandler>) -> Result<Accepted, ListenerError> {
        let rx = self.new_peers_rx.as_mut().ok_or(ListenerError::Closed)?;
        let (addr, shared, incoming_rx) = rx.recv().await.ok_or(ListenerError::Closed)?;
        let conn = Arc::new(Conn {
            id: conn_id::next_id(),
            remote_addr: addr.to_string(),
            shared,
            peers: self.peers.clone(),
            closed: AtomicBool::new(false),
            stop_handler,
        });
        let reader = Box::new(FrameReaderImpl { rx: incoming_rx });
        Ok(Accepted { conn, reader })
    }

    pub async fn close(&mut self) {
        if let Some(task) = self.recv_task.take() {
            task.abort();
        }
        if let Some(task) = self.resend_task.take() {
            task.abort();
        }
        self.socket.take();
        self.new_peers_rx.take();
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}

async fn recv_loop(
    socket: Arc<UdpSocket>,
    peers: Arc<DashMap<SocketAddr, Arc<ConnShared>>>,
    new_peers_tx: mpsc::Sender<NewPeer>,
) {
    let mut buf = vec![0u8; MAX_PACKET_LEN + HEADER_LEN];
    loop {
        let (n, addr) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "udp recv error, stopping listener loop");
                return;
            },
        };
        if n == 0 {
            continue;
        }
        let tag = buf[0];

        if tag == TAG_ACK {
            if n < 5 {
                continue;
            }
            let seq = u32::from_be_bytes(buf[1..5].try_into().expect("4 bytes"));
            if let Some(shared) = peers.get(&addr) {
                shared.pending.remove(&seq);
            }
            continue;
        }

        if tag != TAG_DATA || n < HEADER_LEN {
            continue;
        }
        let seq = u32::from_be_bytes(buf[1..5].try_into().expect("4 bytes"));
        let len = u32::from_be_bytes(buf[5..9].try_into().expect("4 bytes")) as usize;
        if len == 0 || len > MAX_PACKET_LEN || HEADER_LEN + len > n {
            continue;
        }
        let payload = Bytes::copy_from_slice(&buf[HEADER_LEN..HEADER_LEN + len]);

        let shared = match peers.get(&addr) {
            Some(existing) => existing.clone(),
            None => {
                let (incoming_tx, incoming_rx) = mpsc::channel(PEER_CHANNEL_DEPTH);
                let shared = Arc::new(ConnShared {
                    addr,
                    socket: socket.clone(),
                    next_seq: AtomicU32::new(0),
                    last_delivered: AtomicI64::new(-1),
                    pending: DashMap::new(),
                    incoming_tx,
                });
                peers.insert(addr, shared.clone());
                if new_peers_tx.try_send((addr, shared.clone(), incoming_rx)).is_err() {
                    tracing::warn!(%addr, "udp accept backlog full, dropping new peer");
                    peers.remove(&addr);
                }
                shared
            },
        };

        let ack = encode_ack(seq);
        let _ = socket.send_to(&ack, addr).await;

        if i64::from(seq) > shared.last_delivered.load(Ordering::Relaxed) {
            shared.last_delivered.store(i64::from(seq), Ordering::Relaxed);
            let _ = shared.incoming_tx.try_send(payload);
        }
    }
}

async fn resend_loop(peers: Arc<DashMap<SocketAddr, Arc<ConnShared>>>) {
    let mut ticker = tokio::time::interval(RESEND_INTERVAL);
    loop {
        ticker.tick().await;
        let snapshot: Vec<Arc<ConnShared>> = peers.iter().map(|e| e.value().clone()).collect();
        for shared in snapshot {
            let mut dead: Vec<u32> = Vec::new();
            for mut entry in shared.pending.iter_mut() {
                if entry.sent_at.elapsed() < RESEND_INTERVAL {
                    continue;
                }
                if entry.tries >= MAX_RETRIES {
                    dead.push(*entry.key());
                    continue;
                }
                entry.tries += 1;
                entry.sent_at = Instant::now();
                let _ = shared.socket.send_to(&entry.datagram, shared.addr).await;
            }
            for seq in dead {
                shared.pending.remove(&seq);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_roundtrip_encoding() {
        let ack = encode_ack(7);
        assert_eq!(ack[0], TAG_ACK);
        assert_eq!(u32::from_be_bytes(ack[1..5].try_into().unwrap()), 7);
    }

    #[test]
    fn data_header_carries_seq_and_len() {
        let datagram = encode_data(3, b"hi");
        assert_eq!(datagram[0], TAG_DATA);
        assert_eq!(u32::from_be_bytes(datagram[1..5].try_into().unwrap()), 3);
        assert_eq!(u32::from_be_bytes(datagram[5..9].try_into().unwrap()), 2);
        assert_eq!(&datagram[9..], b"hi");
    }

    struct NoopStop;
    impl ConnStopHandler for NoopStop {
        fn on_conn_stop(&self, _conn_id: u32) {}
    }

    #[tokio::test]
    async fn accept_and_roundtrip_over_real_sockets() {
        let mut listener = Listener::new();
        listener.listen("127.0.0.1", 0).await.unwrap();
        let server_addr = listener.socket.as_ref().unwrap().local_addr().unwrap();

        let client = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        client.connect(server_addr).await.unwrap();
        let datagram = encode_data(0, b"hello");
        client.send(&datagram).await.unwrap();

        let no_stop: Weak<dyn ConnStopHandler> = Weak::<NoopStop>::new();
        let accepted = listener.accept(no_stop).await.unwrap();
        let mut reader = accepted.reader;
        let frame = reader.read_frame().await.unwrap();
        assert_eq!(&frame[..], b"hello");

        let mut ack_buf = [0u8; 16];
        let n = client.recv(&mut ack_buf).await.unwrap();
        assert_eq!(ack_buf[0..n][0], TAG_ACK);
    }
}
