// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Session manager (C4): concurrent session map keyed by connection id, a
//! background expiry sweep, and lifecycle callbacks. Mirrors `sync.Map` +
//! the `checkAlive` ticker loop, adapted to the `tokio::select!` +
//! `CancellationToken` idiom used elsewhere in this crate.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{sync::Mutex, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use super::{error::SessionError, session::Session};
use crate::net::Connection;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub expire_duration: Duration,
    pub check_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { expire_duration: Duration::from_secs(10), check_interval: Duration::from_secs(5) }
    }
}

pub trait SessionLifecycle: Send + Sync {
    fn on_bind(&self, _session: &Arc<Session>) {}

    fn on_end(&self, _session: &Arc<Session>) {}
}

pub struct Manager {
    sessions: DashMap<u32, Arc<Session>>,
    config: ManagerConfig,
    lifecycle: Option<Arc<dyn SessionLifecycle>>,
    cancel: CancellationToken,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Manager {
    pub fn new(config: ManagerConfig, lifecycle: Option<Arc<dyn SessionLifecycle>>) -> Arc<Self> {
        let manager = Arc::new(Self {
            sessions: DashMap::new(),
            config,
            lifecycle,
            cancel: CancellationToken::new(),
            sweep_handle: Mutex::new(None),
        });
        manager.clone().spawn_sweep();
        manager
    }

    fn spawn_sweep(self: Arc<Self>) {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(self.config.check_interval);
            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = ticker.tick() => self.sweep_expired().await,
                }
            }
        });
        // `new` is sync, so stash via try_lock; nothing else holds the lock
        // this early.
        if let Ok(mut slot) = self.sweep_handle.try_lock() {
            *slot = Some(handle);
        }
    }

    async fn sweep_expired(&self) {
        let ids: Vec<u32> = self.sessions.iter().map(|e| *e.key()).collect();
        let mut expired = Vec::new();
        for id in ids {
            let Some(session) = self.get(id) else { continue };
            if session.is_expired(self.config.expire_duration).await {
                expired.push(id);
            }
        }
        for conn_id in expired {
            self.remove(conn_id);
        }
    }

    /// Creates or returns the existing session for a connection. Creation
    /// fires `on_bind` exactly once.
    pub fn bind(&self, conn: Arc<dyn Connection>) -> Arc<Session> {
        let id = conn.id();
        if let Some(existing) = self.sessions.get(&id) {
            return existing.clone();
        }
        let session = Arc::new(Session::new(conn));
        self.sessions.insert(id, session.clone());
        if let Some(lc) = &self.lifecycle {
            lc.on_bind(&session);
        }
        session
    }

    pub fn get(&self, conn_id: u32) -> Option<Arc<Session>> {
        self.sessions.get(&conn_id).map(|e| e.clone())
    }

    pub async fn keepalive(&self, conn_id: u32) {
        if let Some(session) = self.get(conn_id) {
            session.keepalive().await;
        }
    }

    /// Idempotent: only the first caller observes `on_end`/connection close.
    pub fn remove(&self, conn_id: u32) {
        if let Some((_, session)) = self.sessions.remove(&conn_id) {
            if let Some(lc) = &self.lifecycle {
                lc.on_end(&session);
            }
            session.conn().close();
        }
    }

    pub async fn push(&self, conn_id: u32, bytes: &[u8]) -> Result<(), SessionError> {
        let session = self.get(conn_id).ok_or(SessionError::NotFound(conn_id))?;
        session.conn().write(bytes).await.map_err(SessionError::from)
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.sweep_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
