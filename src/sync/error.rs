// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

/// `CacheMiss` is deliberately absent: a miss is `Option::None`, never an
/// error variant, matching `redis_impl/base.go`'s `LoadOne` returning
/// `(nil, nil)` on `redis.Nil`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("timed out acquiring lease for {0}")]
    LockTimeout(String),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("serialisation error: {0}")]
    Serde(#[from] serde_json::Error),
}
