// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sync_relay::{
    client::{Client, ClientConfig},
    router::Registry,
    session::ManagerConfig,
};

use super::common::{TEST_SERVICE_ID, build_service, spawn_server};

#[derive(Serialize, Deserialize)]
struct Req;
#[derive(Serialize, Deserialize)]
struct Rsp {
    ok: bool,
}

#[tokio::test]
async fn unknown_route_is_dropped_and_connection_stays_usable() {
    let registry = Registry::new();
    registry.ask(1, |_ctx, _req: Req| async move { Rsp { ok: true } }).unwrap();
    let service = build_service(registry, ManagerConfig::default());
    let addr = spawn_server(service).await.unwrap();

    let client = Client::connect(&addr, ClientConfig::default(), None).await.unwrap();
    let body = serde_json::to_vec(&Req).unwrap();

    // Ask to a route nobody registered: no response ever arrives, so the
    // ask must time out rather than hang or error some other way.
    let unknown = client.ask(TEST_SERVICE_ID, 1234, &body);
    let timed_out = tokio::time::timeout(Duration::from_millis(500), unknown).await;
    assert!(timed_out.is_err(), "ask to an unregistered route should never resolve");

    // The connection is still alive: a subsequent valid ask still succeeds.
    let response = client.ask(TEST_SERVICE_ID, 1, &body).await.unwrap();
    let decoded: Rsp = serde_json::from_slice(&response).unwrap();
    assert!(decoded.ok);

    client.close();
}
