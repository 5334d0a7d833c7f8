// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use sync_relay::{
    net::Connection,
    router::Registry,
    service::{PluginChain, Service, WriterPoolConfig},
    session::{ManagerConfig, Session, SessionLifecycle},
    transport::TransportError,
};

struct FakeConn(u32, AtomicBool);

#[async_trait::async_trait]
impl Connection for FakeConn {
    fn id(&self) -> u32 {
        self.0
    }

    fn remote_addr(&self) -> &str {
        "fake"
    }

    async fn write(&self, _buf: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&self) {
        self.1.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.1.load(Ordering::SeqCst)
    }
}

struct CountEnds(Arc<AtomicU32>);
impl SessionLifecycle for CountEnds {
    fn on_end(&self, _session: &Arc<Session>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn idle_session_expires_and_fires_on_end_exactly_once() {
    let ends = Arc::new(AtomicU32::new(0));
    let service = Service::new(
        1,
        Registry::new(),
        ManagerConfig { expire_duration: Duration::from_millis(100), check_interval: Duration::from_millis(20) },
        Some(Arc::new(CountEnds(ends.clone()))),
        PluginChain::new(),
        WriterPoolConfig { worker_count: 1, queue_size: 4, ..Default::default() },
    );

    let conn: Arc<dyn Connection> = Arc::new(FakeConn(1, AtomicBool::new(false)));
    service.on_conn_start(conn.clone());
    assert!(service.sessions().get(1).is_some());

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(service.sessions().get(1).is_none(), "session should have expired");
    assert_eq!(ends.load(Ordering::SeqCst), 1, "on_end must fire exactly once");
    assert!(conn.is_closed(), "sweep-driven expiry must close the connection");
}
