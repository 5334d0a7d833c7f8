// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Cache handler (C9): Redis-backed read/write for one row type, grounded in
//! `redis_impl/base.go`'s `BaseRedisSyncHandler`. The key is
//! `prefix:cachefield1:cachefield2:...`; values are the whole struct as JSON.

use std::{marker::PhantomData, time::Duration};

use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};

use super::{error::SyncError, field_meta::RowMeta};

fn build_key(prefix: &str, cache_values: &[String]) -> String {
    let mut key = prefix.to_string();
    for v in cache_values {
        key.push(':');
        key.push_str(v);
    }
    key
}

pub struct CacheHandler<T> {
    conn: ConnectionManager,
    prefix: String,
    _marker: PhantomData<T>,
}

impl<T> CacheHandler<T>
where
    T: RowMeta + Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self { conn, prefix: prefix.into(), _marker: PhantomData }
    }

    fn redis_key(&self, cache_values: &[String]) -> String {
        build_key(&self.prefix, cache_values)
    }

    /// `None` on a cache miss; never surfaces a generic error for it.
    pub async fn load_one(&self, cache_values: &[String]) -> Result<Option<T>, SyncError> {
        let key = self.redis_key(cache_values);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await?;
        match raw {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        }
    }

    pub async fn save_one(&self, data: &T, expire: Duration) -> Result<(), SyncError> {
        let key = self.redis_key(&data.cache_values());
        let body = serde_json::to_string(data)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(&key, body, expire.as_secs().max(1)).await?;
        Ok(())
    }

    pub async fn del_one(&self, cache_values: &[String]) -> Result<(), SyncError> {
        let key = self.redis_key(cache_values);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await?;
        Ok(())
    }

    /// `duration == None` persists the key (removes its TTL), matching the
    /// source's `duration == -1` sentinel.
    pub async fn expire(&self, cache_values: &[String], duration: Option<Duration>) -> Result<(), SyncError> {
        let key = self.redis_key(cache_values);
        let mut conn = self.conn.clone();
        match duration {
            Some(d) => {
                let _: () = conn.expire(&key, d.as_secs().max(1) as i64).await?;
            },
            None => {
                let _: () = conn.persist(&key).await?;
            },
        }
        Ok(())
    }
}
