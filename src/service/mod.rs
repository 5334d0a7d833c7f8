// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RPC service (C6 + C7): ties the router registry, session manager, plugin
//! chain and writer pool together and implements the per-frame dispatch
//! contract, a direct translation of `service.go`'s `OnConnRead` /
//! `handleOnPacket` / `Push` trio.

pub mod error;
pub mod plugin;
pub mod writer_pool;

use std::sync::{Arc, Weak};

use tracing::{debug, warn};

pub use self::{
    error::ServiceError,
    plugin::{Plugin, PluginChain},
    writer_pool::{WriterPool, WriterPoolConfig},
};
use crate::{
    codec::{c2s::C2SFrame, s2c},
    net::{Connection, ConnStopHandler},
    router::{Context, Registry},
    session::{Manager, ManagerConfig, SessionLifecycle},
};

pub struct Service {
    service_id: u32,
    registry: Registry,
    sessions: Arc<Manager>,
    plugins: PluginChain,
    writer_pool: WriterPool,
}

impl Service {
    pub fn new(
        service_id: u32,
        registry: Registry,
        session_config: ManagerConfig,
        lifecycle: Option<Arc<dyn SessionLifecycle>>,
        plugins: PluginChain,
        writer_pool_config: WriterPoolConfig,
    ) -> Arc<Self> {
        let sessions = Manager::new(session_config, lifecycle);
        let writer_pool = WriterPool::new(writer_pool_config, sessions.clone());
        Arc::new(Self { service_id, registry, sessions, plugins, writer_pool })
    }

    pub fn sessions(&self) -> &Arc<Manager> {
        &self.sessions
    }

    /// Called once a transport accepts a connection; binds its session.
    pub fn on_conn_start(&self, conn: Arc<dyn Connection>) {
        let session = self.sessions.bind(conn);
        debug!(conn_id = session.conn_id(), "session bound");
    }

    /// The five-step dispatch contract for one decoded client→server frame.
    pub async fn on_frame(&self, conn_id: u32, frame: C2SFrame) -> Result<(), ServiceError> {
        let session = self.sessions.get(conn_id).ok_or(crate::session::SessionError::NotFound(conn_id))?;

        // 1. Heartbeat short-circuits everything else.
        let C2SFrame::Request { service_id, route_id, req_id, one_way, body } = frame else {
            self.sessions.keepalive(conn_id).await;
            self.plugins.do_heartbeat(&session);
            return Ok(());
        };

        // 2. pre_read may veto the packet outright.
        if !self.plugins.do_pre_read(&session, &body) {
            return Ok(());
        }

        // 3. Packets addressed to another service are silently dropped, not
        // an error: multiple services can share one listener/route space.
        if service_id != self.service_id {
            return Ok(());
        }

        let ctx = Context { req_id, session: session.clone() };

        if one_way {
            // 4. Fire-and-forget: decode failures close the connection, miss
            // on lookup just drops (no response channel to report on).
            // post_read fires after decode, before the handler is polled.
            let Some(prepared) = self.registry.prepare_tell(route_id, ctx, body) else {
                return Ok(());
            };
            let (decoded, fut) = prepared?;
            self.plugins.do_post_read(&session, &decoded);
            fut.await?;
        } else {
            // 5. Request/response: serialise the handler's reply and hand it
            // to the writer pool under the original req_id.
            let Some(prepared) = self.registry.prepare_ask(route_id, ctx, body) else {
                return Ok(());
            };
            let (decoded, fut) = prepared?;
            self.plugins.do_post_read(&session, &decoded);
            let rsp_body = fut.await?;
            let frame = s2c::encode_response(req_id, &rsp_body);
            self.writer_pool.submit(conn_id, frame.to_vec()).await?;
        }
        Ok(())
    }

    /// Server-initiated push, outside of any request/response cycle.
    pub async fn push(&self, conn_id: u32, route_id: u32, payload: &[u8]) -> Result<(), ServiceError> {
        let frame = s2c::encode_push(self.service_id, route_id, payload);
        self.writer_pool.submit(conn_id, frame.to_vec()).await
    }

    pub async fn stop(self: Arc<Self>) {
        self.plugins.do_pre_stop();
        self.sessions.shutdown().await;
        let service = match Arc::try_unwrap(self) {
            Ok(service) => service,
            Err(shared) => {
                warn!("stop() called with outstanding Service references; writer pool left running");
                shared.plugins.do_post_stop();
                return;
            },
        };
        service.writer_pool.stop().await;
        service.plugins.do_post_stop();
    }
}

impl ConnStopHandler for Service {
    fn on_conn_stop(&self, conn_id: u32) {
        self.sessions.remove(conn_id);
    }
}

/// Adapts `Arc<Service>` to the `Weak<dyn ConnStopHandler>` every transport
/// listener's `accept` expects, without the caller threading an extra type
/// parameter through.
pub fn stop_handler(service: &Arc<Service>) -> Weak<dyn ConnStopHandler> {
    Arc::downgrade(service) as Weak<dyn ConnStopHandler>
}
