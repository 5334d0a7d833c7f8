// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};
use serde_json::json;
use sync_relay::{
    client::{Client, ClientConfig},
    router::Registry,
    session::ManagerConfig,
};

use super::common::{TEST_SERVICE_ID, build_service, spawn_server};

#[derive(Serialize, Deserialize)]
struct Hi {
    msg: String,
}

#[tokio::test]
async fn ask_happy_path() {
    let registry = Registry::new();
    registry.ask(42, |_ctx, _req: Hi| async move { Hi { msg: "hi".into() } }).unwrap();
    let service = build_service(registry, ManagerConfig::default());
    let addr = spawn_server(service).await.unwrap();

    let client = Client::connect(&addr, ClientConfig::default(), None).await.unwrap();
    let body = serde_json::to_vec(&json!({})).unwrap();
    let response = client.ask(TEST_SERVICE_ID, 42, &body).await.unwrap();

    let decoded: Hi = serde_json::from_slice(&response).unwrap();
    assert_eq!(decoded.msg, "hi");

    client.close();
}
