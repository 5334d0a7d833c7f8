// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Hashed async writer pool (part of C7). Each outbound write is gzip'd and
//! pushed to a worker keyed by `conn_id % worker_count`, so writes to the
//! same connection stay ordered while different connections fan out across
//! workers — the async counterpart of `taskx.TaskPool[T]`'s per-key channel
//! array, minus the generic callback (writes here don't need one).

use std::{io::Write, sync::Arc};

use flate2::{Compression, write::GzEncoder};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

use crate::{service::error::ServiceError, session::Manager};

#[derive(Debug, Clone)]
pub struct WriterPoolConfig {
    pub worker_count: usize,
    pub queue_size: usize,
    /// When the per-worker queue is full: drop the write (`true`) or block
    /// the caller until space frees up (`false`).
    pub drop_when_full: bool,
    pub compress: bool,
}

impl Default for WriterPoolConfig {
    fn default() -> Self {
        Self { worker_count: 4, queue_size: 256, drop_when_full: false, compress: false }
    }
}

struct Job {
    conn_id: u32,
    payload: Vec<u8>,
}

pub struct WriterPool {
    senders: Vec<mpsc::Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    config: WriterPoolConfig,
}

impl WriterPool {
    pub fn new(config: WriterPoolConfig, sessions: Arc<Manager>) -> Self {
        let mut senders = Vec::with_capacity(config.worker_count);
        let mut handles = Vec::with_capacity(config.worker_count);
        for _ in 0..config.worker_count.max(1) {
            let (tx, mut rx) = mpsc::channel::<Job>(config.queue_size.max(1));
            let sessions = sessions.clone();
            let compress = config.compress;
            let handle = tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    let bytes = if compress { gzip(&job.payload) } else { job.payload };
                    if let Err(err) = sessions.push(job.conn_id, &bytes).await {
                        warn!(conn_id = job.conn_id, %err, "writer pool push failed");
                    }
                }
            });
            senders.push(tx);
            handles.push(handle);
        }
        Self { senders, handles, config }
    }

    fn worker_for(&self, conn_id: u32) -> &mpsc::Sender<Job> {
        &self.senders[(conn_id as usize) % self.senders.len()]
    }

    pub async fn submit(&self, conn_id: u32, payload: Vec<u8>) -> Result<(), ServiceError> {
        let job = Job { conn_id, payload };
        let sender = self.worker_for(conn_id);
        if self.config.drop_when_full {
            sender.try_send(job).map_err(|_| ServiceError::Backpressure(conn_id))
        } else {
            sender.send(job).await.map_err(|_| ServiceError::Backpressure(conn_id))
        }
    }

    pub async fn stop(self) {
        drop(self.senders);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(data).is_err() {
        return data.to_vec();
    }
    encoder.finish().unwrap_or_else(|_| data.to_vec())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use flate2::read::GzDecoder;
    use std::io::Read;

    use super::*;
    use crate::{net::Connection, session::ManagerConfig, transport::TransportError};

    struct FakeConn(u32, AtomicBool, std::sync::Mutex<Vec<u8>>);

    #[async_trait]
    impl Connection for FakeConn {
        fn id(&self) -> u32 {
            self.0
        }

        fn remote_addr(&self) -> &str {
            "x"
        }

        async fn write(&self, buf: &[u8]) -> Result<(), TransportError> {
            self.2.lock().unwrap().extend_from_slice(buf);
            Ok(())
        }

        fn close(&self) {
            self.1.store(true, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.1.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn submit_compresses_and_delivers_to_session() {
        let manager = Manager::new(ManagerConfig::default(), None);
        let conn = Arc::new(FakeConn(1, AtomicBool::new(false), std::sync::Mutex::new(Vec::new())));
        manager.bind(conn.clone() as Arc<dyn Connection>);

        let pool = WriterPool::new(
            WriterPoolConfig { worker_count: 2, queue_size: 8, compress: true, ..Default::default() },
            manager.clone(),
        );
        pool.submit(1, b"hello world".to_vec()).await.unwrap();
        // `stop` drains every worker's queue before returning, so the write
        // has already landed by the time it resolves.
        pool.stop().await;

        assert_eq!(*conn.2.lock().unwrap(), gzip(b"hello world"));
        manager.shutdown().await;
    }

    #[test]
    fn gzip_round_trips() {
        let compressed = gzip(b"round trip me");
        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        assert_eq!(out, "round trip me");
    }

    #[tokio::test]
    async fn submit_for_unbound_connection_enqueues_and_warns_without_panicking() {
        let manager = Manager::new(ManagerConfig::default(), None);
        let pool = WriterPool::new(WriterPoolConfig { worker_count: 1, queue_size: 1, ..Default::default() }, manager.clone());
        // No session bound for conn_id 42: the worker logs and drops the
        // write, `submit` itself still succeeds since it only enqueues.
        pool.submit(42, b"x".to_vec()).await.unwrap();
        pool.stop().await;
        manager.shutdown().await;
    }
}
