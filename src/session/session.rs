// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-connection session: an attribute bag plus the liveness timestamp the
//! sweep and keepalive paths serialize through one lock, matching the
//! source's `sync.RWMutex` scoped solely around `Expired`/`keepAlive`.

use std::{
    any::Any,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::net::Connection;

pub struct Session {
    conn: Arc<dyn Connection>,
    attrs: DashMap<String, Box<dyn Any + Send + Sync>>,
    last_active: Mutex<Instant>,
}

impl Session {
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self { conn, attrs: DashMap::new(), last_active: Mutex::new(Instant::now()) }
    }

    pub fn conn_id(&self) -> u32 {
        self.conn.id()
    }

    pub fn conn(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    pub async fn keepalive(&self) {
        *self.last_active.lock().await = Instant::now();
    }

    pub async fn is_expired(&self, expire_duration: Duration) -> bool {
        self.last_active.lock().await.elapsed() > expire_duration
    }

    pub fn set_attr<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.attrs.insert(key.into(), Box::new(value));
    }

    pub fn get_attr<T: Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
        self.attrs.get(key).and_then(|v| v.downcast_ref::<T>().cloned())
    }

    pub fn remove_attr(&self, key: &str) {
        self.attrs.remove(key);
    }
}
