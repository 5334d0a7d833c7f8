// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connection & listener abstraction (C3): one [`conn::Connection`] per
//! accepted peer across three transports (stream TCP, reliable UDP,
//! message-framed WebSocket).

pub mod conn;
pub mod conn_id;
pub mod error;
pub mod tcp;
pub mod udp;
pub mod ws;

pub use conn::{Accepted, ConnStopHandler, Connection, FrameReader};
pub use error::ListenerError;
