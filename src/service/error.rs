// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

use crate::{codec::CodecError, net::ListenerError, router::RouterError, session::SessionError, transport::TransportError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("router error: {0}")]
    Router(#[from] RouterError),

    #[error("packet addressed to service {got}, this service is {want}")]
    ForeignService { want: u32, got: u32 },

    #[error("no route registered for route id {0}")]
    UnknownRoute(u32),

    #[error("writer pool is full for connection {0}")]
    Backpressure(u32),
}
