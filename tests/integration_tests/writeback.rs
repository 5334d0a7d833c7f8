// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev
//
// S5/S6 exercise the synchronizer against a real Redis and a real MySQL
// instance, so they only run when both `REDIS_URL` and `MYSQL_URL` are set,
// the same convention this crate's iSCSI-target tests use for `TEST_CONFIG`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::{MySqlPool, Row as _};
use sync_relay::{
    Row,
    sync::{CacheHandler, FlushConfig, LeaseConfig, LeaseManager, Marker, StoreHandler, Synchronizer},
};

#[derive(Debug, Clone, Serialize, Deserialize, Row, sqlx::FromRow)]
#[row(table = "writeback_records")]
struct Record {
    #[row(primary = 0)]
    #[row(cache = 0)]
    id: i64,
    #[row(cache = 1)]
    name: String,
    age: i64,
}

fn live_urls() -> Option<(String, String)> {
    let redis = std::env::var("REDIS_URL").ok()?;
    let mysql = std::env::var("MYSQL_URL").ok()?;
    Some((redis, mysql))
}

async fn build_synchronizer(redis_url: &str, mysql_url: &str) -> anyhow::Result<std::sync::Arc<Synchronizer<Record>>> {
    let pool = MySqlPool::connect(mysql_url).await?;
    sqlx::query(
        "create table if not exists writeback_records (id bigint primary key, name varchar(64), age bigint)",
    )
    .execute(&pool)
    .await?;

    let redis_client = redis::Client::open(redis_url)?;
    let conn = redis_client.get_connection_manager().await?;

    let lease = LeaseManager::new(conn.clone(), LeaseConfig {
        max_try_duration: Duration::from_secs(2),
        retry_interval: Duration::from_millis(20),
        lease_ttl: Duration::from_secs(5),
        renew_interval: Duration::from_secs(2),
    });
    let cache = CacheHandler::<Record>::new(conn.clone(), "writeback-test");
    let store = StoreHandler::<Record>::new(pool);
    let marker = Marker::<Record>::new(conn, "writeback-test-dirty");

    Ok(Synchronizer::new(lease, cache, store, marker, "writeback-test-lock", || FlushConfig {
        flush_interval: Duration::from_millis(200),
        batch: 50,
        expire_time: Duration::from_secs(60),
    }))
}

#[tokio::test]
async fn writeback_converges_to_the_store_after_a_flush_tick() {
    let Some((redis_url, mysql_url)) = live_urls() else {
        eprintln!("skipping: set REDIS_URL and MYSQL_URL to run this test");
        return;
    };
    let sync = build_synchronizer(&redis_url, &mysql_url).await.unwrap();

    let record = Record { id: 1, name: "a".into(), age: 30 };
    sync.save_one(&record, true).await.unwrap();

    let cached = sync.load_one(&["1".into(), "a".into()], &["1".into()], true).await.unwrap();
    assert_eq!(cached.map(|r| r.age), Some(30));

    tokio::time::sleep(Duration::from_millis(500)).await;

    let pool = MySqlPool::connect(&mysql_url).await.unwrap();
    let row = sqlx::query("select age from writeback_records where id = 1").fetch_one(&pool).await.unwrap();
    let age: i64 = row.get("age");
    assert_eq!(age, 30, "flush tick should have written the row to the store");
}

#[tokio::test]
async fn concurrent_saves_on_one_key_leave_a_consistent_final_state() {
    let Some((redis_url, mysql_url)) = live_urls() else {
        eprintln!("skipping: set REDIS_URL and MYSQL_URL to run this test");
        return;
    };
    let sync = build_synchronizer(&redis_url, &mysql_url).await.unwrap();

    let writers = (0 .. 50).map(|age| {
        let sync = sync.clone();
        tokio::spawn(async move {
            let record = Record { id: 2, name: "b".into(), age };
            sync.save_one(&record, true).await.unwrap();
        })
    });
    futures_util::future::join_all(writers).await;

    let cached = sync.load_one(&["2".into(), "b".into()], &["2".into()], true).await.unwrap();
    assert!(cached.is_some(), "cache must reflect exactly one of the concurrent writers");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let pool = MySqlPool::connect(&mysql_url).await.unwrap();
    let row = sqlx::query("select age from writeback_records where id = 2").fetch_one(&pool).await.unwrap();
    let age: i64 = row.get("age");
    assert!((0 .. 50).contains(&age), "store must reflect one of the 50 concurrent writers, got {age}");
}
