// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use sync_relay::{
    client::{Client, ClientConfig},
    router::Registry,
    session::ManagerConfig,
};

use super::common::{build_service, spawn_server};

#[tokio::test]
async fn heartbeats_keep_the_session_alive_past_its_expire_duration() {
    let session_config = ManagerConfig {
        expire_duration: Duration::from_millis(200),
        check_interval: Duration::from_millis(20),
    };
    let service = build_service(Registry::new(), session_config);
    let addr = spawn_server(service.clone()).await.unwrap();

    let client = Client::connect(
        &addr,
        ClientConfig { heartbeat_interval: Duration::from_millis(50), ..ClientConfig::default() },
        None,
    )
    .await
    .unwrap();

    // Give the server a beat to register the connection's session.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(service.sessions().len(), 1);

    // Heartbeats every 50ms against a 200ms expiry: the session must
    // survive at least a second of continued traffic.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(service.sessions().len(), 1, "session should still be alive under active heartbeats");

    client.close();

    // Once the client stops (and its heartbeat loop with it), the sweep
    // must expire the session within a few check intervals.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(service.sessions().len(), 0, "session should expire once heartbeats stop");
}
