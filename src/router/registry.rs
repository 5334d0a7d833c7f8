// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Router registry (C5): typed `ask`/`tell` handlers erased behind a boxed
//! closure at registration, matching `registry.go`'s `any`-typed handler
//! table but with a thin typed facade on the registration side, the way
//! generics let implementation languages offer one.

use std::{future::Future, pin::Pin};

use bytes::Bytes;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::{context::Context, error::RouterError};

type AskFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, RouterError>> + Send>>;
type TellFuture = Pin<Box<dyn Future<Output = Result<(), RouterError>> + Send>>;

/// A prepared call: decode already ran, `Value` is the decoded request
/// re-serialised for `Plugin::post_read`, and the future (not yet polled)
/// runs the handler and encodes its reply.
type AskHandler = Box<dyn Fn(Context, Bytes) -> Result<(Value, AskFuture), RouterError> + Send + Sync>;
type TellHandler = Box<dyn Fn(Context, Bytes) -> Result<(Value, TellFuture), RouterError> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    asks: DashMap<u32, AskHandler>,
    tells: DashMap<u32, TellHandler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route expecting a typed response. Duplicate `route_id`
    /// registration within the `ask` kind is a programmer error.
    pub fn ask<Req, Rsp, F, Fut>(&self, route_id: u32, handler: F) -> Result<(), RouterError>
    where
        Req: DeserializeOwned + Serialize + Send + 'static,
        Rsp: Serialize + Send + 'static,
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Rsp> + Send + 'static,
    {
        if self.asks.contains_key(&route_id) {
            return Err(RouterError::DuplicateRoute { kind: "ask", route_id });
        }
        let boxed: AskHandler = Box::new(move |ctx, body| {
            let req: Req = serde_json::from_slice(&body).map_err(RouterError::Decode)?;
            let decoded = serde_json::to_value(&req).unwrap_or(Value::Null);
            let handler_call = handler(ctx, req);
            let fut: AskFuture = Box::pin(async move {
                let rsp = handler_call.await;
                serde_json::to_vec(&rsp).map_err(RouterError::Encode)
            });
            Ok((decoded, fut))
        });
        self.asks.insert(route_id, boxed);
        Ok(())
    }

    /// Registers a fire-and-forget route. Duplicate `route_id` registration
    /// within the `tell` kind is a programmer error.
    pub fn tell<Req, F, Fut>(&self, route_id: u32, handler: F) -> Result<(), RouterError>
    where
        Req: DeserializeOwned + Serialize + Send + 'static,
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.tells.contains_key(&route_id) {
            return Err(RouterError::DuplicateRoute { kind: "tell", route_id });
        }
        let boxed: TellHandler = Box::new(move |ctx, body| {
            let req: Req = serde_json::from_slice(&body).map_err(RouterError::Decode)?;
            let decoded = serde_json::to_value(&req).unwrap_or(Value::Null);
            let fut = handler(ctx, req);
            let fut: TellFuture = Box::pin(async move {
                fut.await;
                Ok(())
            });
            Ok((decoded, fut))
        });
        self.tells.insert(route_id, boxed);
        Ok(())
    }

    pub fn has_ask(&self, route_id: u32) -> bool {
        self.asks.contains_key(&route_id)
    }

    pub fn has_tell(&self, route_id: u32) -> bool {
        self.tells.contains_key(&route_id)
    }

    /// Decodes the request and builds the handler's (unpolled) future
    /// without running it, so the caller can fire `Plugin::post_read` in
    /// between. Returns `None` on an unregistered route, `Some(Err(_))` on
    /// a decode failure.
    pub fn prepare_ask(&self, route_id: u32, ctx: Context, body: Bytes) -> Option<Result<(Value, AskFuture), RouterError>> {
        let entry = self.asks.get(&route_id)?;
        Some((entry)(ctx, body))
    }

    /// Fire-and-forget counterpart of [`Registry::prepare_ask`].
    pub fn prepare_tell(&self, route_id: u32, ctx: Context, body: Bytes) -> Option<Result<(Value, TellFuture), RouterError>> {
        let entry = self.tells.get(&route_id)?;
        Some((entry)(ctx, body))
    }

    pub async fn dispatch_ask(&self, route_id: u32, ctx: Context, body: Bytes) -> Option<Result<Vec<u8>, RouterError>> {
        match self.prepare_ask(route_id, ctx, body)? {
            Ok((_decoded, fut)) => Some(fut.await),
            Err(e) => Some(Err(e)),
        }
    }

    pub async fn dispatch_tell(&self, route_id: u32, ctx: Context, body: Bytes) -> Option<Result<(), RouterError>> {
        match self.prepare_tell(route_id, ctx, body)? {
            Ok((_decoded, fut)) => Some(fut.await),
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use async_trait::async_trait;
    use serde::Deserialize;

    use super::*;
    use crate::{net::Connection, session::Session, transport::TransportError};

    struct FakeConn;
    #[async_trait]
    impl Connection for FakeConn {
        fn id(&self) -> u32 {
            1
        }

        fn remote_addr(&self) -> &str {
            "x"
        }

        async fn write(&self, _buf: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }

        fn close(&self) {}

        fn is_closed(&self) -> bool {
            false
        }
    }

    fn ctx() -> Context {
        Context { req_id: 7, session: Arc::new(Session::new(Arc::new(FakeConn))) }
    }

    #[derive(Deserialize, Serialize)]
    struct Ping {
        n: u32,
    }

    #[derive(Serialize, Deserialize)]
    struct Pong {
        n: u32,
    }

    #[tokio::test]
    async fn ask_round_trips_through_json() {
        let registry = Registry::new();
        registry
            .ask(42, |_ctx, req: Ping| async move { Pong { n: req.n + 1 } })
            .unwrap();

        let body = Bytes::from(serde_json::to_vec(&Ping { n: 1 }).unwrap());
        let rsp = registry.dispatch_ask(42, ctx(), body).await.unwrap().unwrap();
        let pong: Pong = serde_json::from_slice(&rsp).unwrap();
        assert_eq!(pong.n, 2);
    }

    #[tokio::test]
    async fn tell_invokes_handler_exactly_once() {
        let registry = Registry::new();
        let called = Arc::new(AtomicU32::new(0));
        let called_clone = called.clone();
        registry
            .tell(99, move |_ctx, _req: Ping| {
                let called = called_clone.clone();
                async move {
                    called.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        let body = Bytes::from(serde_json::to_vec(&Ping { n: 0 }).unwrap());
        registry.dispatch_tell(99, ctx(), body).await.unwrap().unwrap();
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_route_returns_none() {
        let registry = Registry::new();
        assert!(registry.dispatch_ask(1234, ctx(), Bytes::new()).await.is_none());
    }

    #[test]
    fn duplicate_ask_registration_is_rejected() {
        let registry = Registry::new();
        registry.ask(1, |_c, _r: Ping| async move { Pong { n: 0 } }).unwrap();
        let err = registry.ask(1, |_c, _r: Ping| async move { Pong { n: 0 } }).unwrap_err();
        assert!(matches!(err, RouterError::DuplicateRoute { route_id: 1, .. }));
    }
}
