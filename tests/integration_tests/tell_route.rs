// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use sync_relay::{
    client::{Client, ClientConfig},
    router::Registry,
    session::ManagerConfig,
};

use super::common::{TEST_SERVICE_ID, build_service, spawn_server};

#[derive(Serialize, Deserialize)]
struct Ping {
    n: u32,
}

#[tokio::test]
async fn tell_route_invokes_handler_exactly_once_with_no_response() {
    let hits = Arc::new(AtomicU32::new(0));
    let registry = Registry::new();
    {
        let hits = hits.clone();
        registry
            .tell(99, move |_ctx, _req: Ping| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
    }
    let service = build_service(registry, ManagerConfig::default());
    let addr = spawn_server(service).await.unwrap();

    let client = Client::connect(&addr, ClientConfig::default(), None).await.unwrap();
    let body = serde_json::to_vec(&Ping { n: 1 }).unwrap();
    client.tell(TEST_SERVICE_ID, 99, &body).await.unwrap();

    // `tell` writes and returns without waiting for any server-side ack, so
    // give the handler a moment to actually run before asserting on it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    client.close();
}
