// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Synchronizer (C12): ties the lease, cache, store and marker together into
//! the read-through/write-behind contract, grounded in `sync/sync.go`'s
//! `Synchronizer[T]`. Two deliberate deviations from that source, both
//! recorded in DESIGN.md:
//!
//! - `load_one`'s cache-miss path backfills the cache with the store's
//!   result before returning it; the source drops the store's result and
//!   always returns `(nil, nil)` on a miss.
//! - `flush_one_key` unmarks the dirty key only after a successful store
//!   write; the source never unmarks at all, so every tick re-flushes every
//!   key that was ever marked.

use std::{sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::{cache::CacheHandler, error::SyncError, field_meta::RowMeta, lease::LeaseManager, marker::Marker, store::StoreHandler};

#[derive(Debug, Clone, Copy)]
pub struct FlushConfig {
    pub flush_interval: Duration,
    pub batch: isize,
    pub expire_time: Duration,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self { flush_interval: Duration::from_secs(5), batch: 100, expire_time: Duration::from_secs(300) }
    }
}

fn build_lock_key(prefix: &str, cache_values: &[String]) -> String {
    format!("{}:{}", prefix, cache_values.join(":"))
}

pub struct Synchronizer<T> {
    lease: LeaseManager,
    cache: CacheHandler<T>,
    store: StoreHandler<T>,
    marker: Marker<T>,
    lock_prefix: String,
    flush_config: Box<dyn Fn() -> FlushConfig + Send + Sync>,
    cancel: CancellationToken,
}

impl<T> Synchronizer<T>
where
    T: RowMeta + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static + for<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow>,
{
    pub fn new(
        lease: LeaseManager,
        cache: CacheHandler<T>,
        store: StoreHandler<T>,
        marker: Marker<T>,
        lock_prefix: impl Into<String>,
        flush_config: impl Fn() -> FlushConfig + Send + Sync + 'static,
    ) -> Arc<Self> {
        let sc = Arc::new(Self {
            lease,
            cache,
            store,
            marker,
            lock_prefix: lock_prefix.into(),
            flush_config: Box::new(flush_config),
            cancel: CancellationToken::new(),
        });
        sc.clone().spawn_flush_loop();
        sc
    }

    fn lock_key(&self, cache_values: &[String]) -> String {
        build_lock_key(&self.lock_prefix, cache_values)
    }

    pub async fn save_one(&self, data: &T, need_lock: bool) -> Result<(), SyncError> {
        let cache_values = data.cache_values();
        let _lease = if need_lock { Some(self.lease.lock(self.lock_key(&cache_values)).await?) } else { None };

        let config = (self.flush_config)();
        self.cache.save_one(data, config.expire_time).await?;
        self.marker.mark(&cache_values).await?;

        if let Some(lease) = _lease {
            lease.unlock().await;
        }
        Ok(())
    }

    /// Read-through: a cache miss falls back to the store and backfills the
    /// cache before returning, so the next read is a hit.
    pub async fn load_one(&self, cache_values: &[String], primary_values: &[String], need_lock: bool) -> Result<Option<T>, SyncError> {
        let _lease = if need_lock { Some(self.lease.lock(self.lock_key(cache_values)).await?) } else { None };

        let config = (self.flush_config)();
        let result = match self.cache.load_one(cache_values).await? {
            Some(hit) => {
                self.cache.expire(cache_values, Some(config.expire_time)).await?;
                Some(hit)
            },
            None => match self.store.load_one(primary_values).await? {
                Some(from_store) => {
                    self.cache.save_one(&from_store, config.expire_time).await?;
                    Some(from_store)
                },
                None => None,
            },
        };

        if let Some(lease) = _lease {
            lease.unlock().await;
        }
        Ok(result)
    }

    pub async fn del_one(&self, cache_values: &[String], primary_values: &[String], need_lock: bool) -> Result<(), SyncError> {
        let _lease = if need_lock { Some(self.lease.lock(self.lock_key(cache_values)).await?) } else { None };

        self.cache.del_one(cache_values).await?;
        self.marker.unmark(cache_values).await?;
        self.store.del_one(primary_values).await?;

        if let Some(lease) = _lease {
            lease.unlock().await;
        }
        Ok(())
    }

    fn spawn_flush_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let interval = (self.flush_config)().flush_interval;
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(interval) => self.flush_redis_to_db().await,
                }
            }
        })
    }

    async fn flush_redis_to_db(&self) {
        let config = (self.flush_config)();
        let dirty = match self.marker.drain(config.batch).await {
            Ok(keys) => keys,
            Err(err) => {
                error!(%err, "fetch dirty key list failed");
                return;
            },
        };

        for cache_values in dirty {
            if let Err(err) = self.flush_one_key(&cache_values).await {
                warn!(%err, ?cache_values, "flush to store failed, leaving key marked for retry");
            }
        }
    }

    async fn flush_one_key(&self, cache_values: &[String]) -> Result<(), SyncError> {
        let lease = self.lease.lock(self.lock_key(cache_values)).await?;

        let result = async {
            let Some(data) = self.cache.load_one(cache_values).await? else {
                return Ok(());
            };
            self.store.save_one(&data).await?;
            self.marker.unmark(cache_values).await?;
            Ok(())
        }
        .await;

        lease.unlock().await;
        result
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flush_config_is_sane() {
        let config = FlushConfig::default();
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert_eq!(config.batch, 100);
        assert_eq!(config.expire_time, Duration::from_secs(300));
    }

    #[test]
    fn lock_key_joins_prefix_and_cache_values() {
        assert_eq!(build_lock_key("lock-prefix", &["3".into(), "42".into()]), "lock-prefix:3:42");
    }
}
