// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Uniform connection identity (C3). `Connection` is the shareable
//! write/close handle; the read side is owned exclusively by whichever task
//! runs the per-connection read loop, so it is not part of this trait.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::transport::TransportError;

/// Invoked exactly once, the first time a connection transitions to closed.
pub trait ConnStopHandler: Send + Sync {
    fn on_conn_stop(&self, conn_id: u32);
}

#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> u32;

    fn remote_addr(&self) -> &str;

    async fn write(&self, buf: &[u8]) -> Result<(), TransportError>;

    /// Idempotent; first caller wins and triggers `on_conn_stop`.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

#[async_trait]
pub trait FrameReader: Send {
    async fn read_frame(&mut self) -> Result<Bytes, TransportError>;
}

pub struct Accepted {
    pub conn: Arc<dyn Connection>,
    pub reader: Box<dyn FrameReader>,
}
