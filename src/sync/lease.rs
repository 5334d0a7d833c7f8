// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Distributed lease (C8): a Redis `SET NX PX` lock with a background
//! renewer, a straight port of `hutool/redisx/lock.go`'s `Lock` type onto
//! `tokio::time` + `CancellationToken` instead of a goroutine + `sync.WaitGroup`.

use std::time::Duration;

use redis::{Script, aio::ConnectionManager};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use super::error::SyncError;

#[derive(Debug, Clone)]
pub struct LeaseConfig {
    pub max_try_duration: Duration,
    pub retry_interval: Duration,
    pub lease_ttl: Duration,
    pub renew_interval: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            max_try_duration: Duration::from_secs(10),
            retry_interval: Duration::from_millis(100),
            lease_ttl: Duration::from_secs(10),
            renew_interval: Duration::from_millis(100),
        }
    }
}

/// Refreshes the TTL only if the stored value still matches our token;
/// otherwise another holder has taken over and we must stop renewing.
fn refresh_script() -> Script {
    Script::new(
        r#"
        local current = redis.call("GET", KEYS[1])
        if current == ARGV[1] then
            return redis.call("PEXPIRE", KEYS[1], ARGV[2])
        else
            return 0
        end
        "#,
    )
}

/// Deletes only if the stored value still matches our token.
fn delete_script() -> Script {
    Script::new(
        r#"
        if redis.call("GET", KEYS[1]) == ARGV[1] then
            return redis.call("DEL", KEYS[1])
        else
            return 0
        end
        "#,
    )
}

#[derive(Clone)]
pub struct LeaseManager {
    conn: ConnectionManager,
    config: LeaseConfig,
}

impl LeaseManager {
    pub fn new(conn: ConnectionManager, config: LeaseConfig) -> Self {
        Self { conn, config }
    }

    /// One-shot attempt; `None` means the key is already held elsewhere.
    pub async fn try_lock(&self, key: impl Into<String>) -> Result<Option<Lease>, SyncError> {
        let key = key.into();
        let token = Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();
        let ttl_ms = self.config.lease_ttl.as_millis() as u64;

        let acquired: bool = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();

        if !acquired {
            return Ok(None);
        }

        let cancel = CancellationToken::new();
        let handle = spawn_renewer(self.conn.clone(), key.clone(), token.clone(), self.config.renew_interval, self.config.lease_ttl, cancel.clone());
        Ok(Some(Lease { conn: self.conn.clone(), key, token, cancel, renew_handle: Some(handle) }))
    }

    /// Retries at `retry_interval` until acquired or `max_try_duration` elapses.
    pub async fn lock(&self, key: impl Into<String>) -> Result<Lease, SyncError> {
        let key = key.into();
        if let Some(lease) = self.try_lock(&key).await? {
            return Ok(lease);
        }

        let deadline = tokio::time::Instant::now() + self.config.max_try_duration;
        let mut ticker = tokio::time::interval(self.config.retry_interval);
        loop {
            ticker.tick().await;
            if tokio::time::Instant::now() >= deadline {
                return Err(SyncError::LockTimeout(key));
            }
            if let Some(lease) = self.try_lock(&key).await? {
                return Ok(lease);
            }
        }
    }
}

fn spawn_renewer(conn: ConnectionManager, key: String, token: String, renew_interval: Duration, lease_ttl: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut conn = conn;
        let mut ticker = tokio::time::interval(renew_interval);
        let ttl_ms = lease_ttl.as_millis() as u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    match refresh_script().key(&key).arg(&token).arg(ttl_ms).invoke_async::<i64>(&mut conn).await {
                        Ok(1) => {},
                        Ok(_) => {
                            warn!(%key, "lease taken over by another holder, stopping renewer");
                            return;
                        },
                        Err(err) => {
                            warn!(%key, %err, "lease renew failed");
                            return;
                        },
                    }
                }
            }
        }
    })
}

/// A held lease. Dropping without calling [`Lease::unlock`] leaves the
/// renewer running until the process exits; `unlock` is the clean path.
pub struct Lease {
    conn: ConnectionManager,
    key: String,
    token: String,
    cancel: CancellationToken,
    renew_handle: Option<JoinHandle<()>>,
}

impl Lease {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn unlock(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.renew_handle.take() {
            let _ = handle.await;
        }
        let mut conn = self.conn.clone();
        if let Err(err) = delete_script().key(&self.key).arg(&self.token).invoke_async::<i64>(&mut conn).await {
            warn!(key = %self.key, %err, "unlock failed");
        }
    }
}
